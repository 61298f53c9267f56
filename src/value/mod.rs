mod constant;
mod range;

pub use constant::{Constant, Type};
pub use range::ConstantRange;
