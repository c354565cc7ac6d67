//! Reference store configuration.

use std::path::PathBuf;

use serde::Deserialize;

/// Configuration for the sled-backed reference store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path to the database directory.
    pub path: PathBuf,

    /// Page cache capacity in bytes.
    pub cache_capacity: u64,

    /// Flush interval in milliseconds. None means flush on every write.
    pub flush_every_ms: Option<u64>,

    /// Enable zstd compression.
    pub compression: bool,

    /// Temporary database (deleted on drop).
    pub temporary: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./ormscope_data"),
            cache_capacity: 64 * 1024 * 1024, // 64MB
            flush_every_ms: Some(500),
            compression: false,
            temporary: false,
        }
    }
}

impl StoreConfig {
    /// Create a configuration for the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Create a temporary configuration for testing.
    pub fn temporary() -> Self {
        Self {
            path: PathBuf::new(),
            temporary: true,
            ..Default::default()
        }
    }

    /// Set the page cache capacity.
    pub fn with_cache_capacity(mut self, bytes: u64) -> Self {
        self.cache_capacity = bytes;
        self
    }

    /// Set the flush interval.
    pub fn with_flush_every_ms(mut self, ms: Option<u64>) -> Self {
        self.flush_every_ms = ms;
        self
    }

    /// Enable or disable compression.
    pub fn with_compression(mut self, compression: bool) -> Self {
        self.compression = compression;
        self
    }

    pub(crate) fn to_sled_config(&self) -> sled::Config {
        let mut config = sled::Config::new()
            .cache_capacity(self.cache_capacity)
            .use_compression(self.compression)
            .flush_every_ms(self.flush_every_ms);

        if self.temporary {
            config = config.temporary(true);
        } else {
            config = config.path(&self.path);
        }

        config
    }
}
