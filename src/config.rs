//! Process-wide configuration, read once at startup from the environment
//! (spec §6 "Configuration keys").
//!
//! Grounded on the teacher's hard-coded `DEFAULT_PAGE_SIZE`/`TIMEOUT`
//! constants (`btree::page_cache`, `transaction::concurrent_status`),
//! generalized into a small struct read from the environment rather than
//! compiled in, since the teacher never needed to — this crate has no
//! external config crate in its dependency stack (neither does the
//! teacher), so reading `std::env::var` directly matches its texture.

use std::time::Duration;

use crate::buffer::pool::{DEFAULT_EPSILON, DEFAULT_MAX_TIME};

#[derive(Clone, Copy, Debug)]
pub struct Config {
    pub buffer_pool_size: usize,
    pub max_time: Duration,
    pub epsilon: Duration,
    pub lock_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            buffer_pool_size: 1024,
            max_time: DEFAULT_MAX_TIME,
            epsilon: DEFAULT_EPSILON,
            lock_timeout: crate::concurrency::lock_mgr::DEFAULT_LOCK_TIMEOUT,
        }
    }
}

impl Config {
    /// Read `BufferMgr.BUFFER_POOL_SIZE`, `BufferMgr.MAX_TIME`, and
    /// `BufferMgr.EPSILON` from the environment, falling back to the
    /// defaults for whichever are absent or malformed (spec §6).
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            buffer_pool_size: env_usize("BufferMgr.BUFFER_POOL_SIZE", defaults.buffer_pool_size),
            max_time: env_millis("BufferMgr.MAX_TIME", defaults.max_time),
            epsilon: env_millis("BufferMgr.EPSILON", defaults.epsilon),
            lock_timeout: defaults.lock_timeout,
        }
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}
