use log::{info, warn};

const KEY_CURSOR: &str = "cursor";
const KEY_BOOT_COUNT: &str = "bcnt";

/// Write to the durable store failed. Never fatal; callers log and keep
/// their in-memory state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StoreError;

/// Namespaced non-volatile key-value storage (NVS on the real device).
/// Commits are expected to complete within a bounded latency.
pub trait KvStore {
    fn get_i32(&mut self, key: &str) -> Option<i32>;
    fn set_i32(&mut self, key: &str, value: i32) -> Result<(), StoreError>;
}

/// Persists the catalog cursor across power cycles. Written through on every
/// committed advance, read back only at startup.
pub struct CursorStore<K: KvStore> {
    kv: K,
}

impl<K: KvStore> CursorStore<K> {
    /// Opens the store and bumps the boot counter. The counter is a
    /// best-effort diagnostic and is not crash-atomic with the cursor.
    pub fn open(mut kv: K) -> Self {
        let boot_count = kv.get_i32(KEY_BOOT_COUNT).unwrap_or(0);
        info!("boot count {}", boot_count);
        if kv.set_i32(KEY_BOOT_COUNT, boot_count + 1).is_err() {
            warn!("failed to persist boot counter");
        }
        Self { kv }
    }

    /// Last committed cursor, or 0 if nothing was ever stored.
    pub fn get(&mut self) -> i32 {
        self.kv.get_i32(KEY_CURSOR).unwrap_or(0)
    }

    pub fn set(&mut self, value: i32) -> Result<(), StoreError> {
        self.kv.set_i32(KEY_CURSOR, value)
    }
}
