use serde::{Deserialize, Serialize};

use kinora_core::scan::DEFAULT_BATCH_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Files committed per transaction. Never zero once loaded.
    pub batch_size: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl ScannerConfig {
    /// Replace a zero batch size with the default. Returns `true` when a
    /// replacement happened.
    pub fn normalize(&mut self) -> bool {
        if self.batch_size == 0 {
            self.batch_size = DEFAULT_BATCH_SIZE;
            true
        } else {
            false
        }
    }
}
