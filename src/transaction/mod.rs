pub mod tx;

pub use tx::{Transaction, TransactionStatus};
