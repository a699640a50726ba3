//! Platform abstraction layer
//!
//! Handles browser/native differences for:
//! - Time (wall clock for seeds and score dates)
//! - Storage (LocalStorage on web, JSON files or memory natively)
//! - Browser bindings (wasm only)

pub mod storage;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use storage::{KeyValueStore, MemoryStore};
#[cfg(not(target_arch = "wasm32"))]
pub use storage::FileStore;

/// Wall-clock milliseconds since the Unix epoch
#[cfg(target_arch = "wasm32")]
pub fn now_ms() -> u64 {
    js_sys::Date::now() as u64
}

/// Wall-clock milliseconds since the Unix epoch
#[cfg(not(target_arch = "wasm32"))]
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
