pub mod frame;
pub mod pool;
pub mod tx_buffer_mgr;

pub use frame::Frame;
pub use pool::BufferPool;
pub use tx_buffer_mgr::TxBufferMgr;
