use crate::error::SmallError;

pub type SmallResult = Result<(), SmallError>;
