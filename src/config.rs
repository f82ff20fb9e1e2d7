use crate::error::LogError;
use crate::storage::index::ENTRY_WIDTH;
use serde::{Deserialize, Serialize};

/// Fallback for `max_store_bytes` and `max_index_bytes` left at zero.
pub const DEFAULT_MAX_SEGMENT_BYTES: u64 = 1024;

/// Log configuration.
///
/// The crate never loads this itself; hosts deserialize it from whatever
/// source they use and hand it to [`crate::log::Log::open`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub segment: SegmentConfig,
}

/// Per-segment limits and the starting offset of a brand-new log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    /// Store size at which a segment stops accepting appends.
    pub max_store_bytes: u64,

    /// Index file capacity. Also the size of the memory mapping.
    pub max_index_bytes: u64,

    /// Offset assigned to the first record of an empty log.
    pub initial_offset: u64,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            max_store_bytes: DEFAULT_MAX_SEGMENT_BYTES,
            max_index_bytes: DEFAULT_MAX_SEGMENT_BYTES,
            initial_offset: 0,
        }
    }
}

impl Config {
    /// Build a config with explicit segment limits.
    pub fn with_segment(max_store_bytes: u64, max_index_bytes: u64, initial_offset: u64) -> Self {
        Self {
            segment: SegmentConfig {
                max_store_bytes,
                max_index_bytes,
                initial_offset,
            },
        }
    }

    /// Replace zero limits with defaults, then validate.
    ///
    /// # Errors
    /// - `InvalidConfig` if the index cannot hold a single entry
    /// - `InvalidConfig` if the index capacity does not fit in memory
    pub fn normalized(mut self) -> Result<Self, LogError> {
        if self.segment.max_store_bytes == 0 {
            self.segment.max_store_bytes = DEFAULT_MAX_SEGMENT_BYTES;
        }
        if self.segment.max_index_bytes == 0 {
            self.segment.max_index_bytes = DEFAULT_MAX_SEGMENT_BYTES;
        }

        if self.segment.max_index_bytes < ENTRY_WIDTH {
            return Err(LogError::InvalidConfig(format!(
                "max_index_bytes {} cannot hold a single {}-byte entry",
                self.segment.max_index_bytes, ENTRY_WIDTH
            )));
        }
        if usize::try_from(self.segment.max_index_bytes).is_err() {
            return Err(LogError::InvalidConfig(format!(
                "max_index_bytes {} exceeds addressable memory",
                self.segment.max_index_bytes
            )));
        }

        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_limits_fall_back_to_defaults() {
        let config = Config::with_segment(0, 0, 16).normalized().unwrap();

        assert_eq!(config.segment.max_store_bytes, DEFAULT_MAX_SEGMENT_BYTES);
        assert_eq!(config.segment.max_index_bytes, DEFAULT_MAX_SEGMENT_BYTES);
        assert_eq!(config.segment.initial_offset, 16);
    }

    #[test]
    fn test_index_smaller_than_one_entry_is_rejected() {
        let result = Config::with_segment(1024, ENTRY_WIDTH - 1, 0).normalized();

        assert!(matches!(result, Err(LogError::InvalidConfig(_))));
    }

    #[test]
    fn test_deserialize_partial_json() {
        let config: Config =
            serde_json::from_str(r#"{"segment": {"max_store_bytes": 4096}}"#).unwrap();

        assert_eq!(config.segment.max_store_bytes, 4096);
        assert_eq!(config.segment.max_index_bytes, DEFAULT_MAX_SEGMENT_BYTES);
        assert_eq!(config.segment.initial_offset, 0);
    }

    #[test]
    fn test_deserialize_empty_object_uses_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();

        assert_eq!(config, Config::default());
    }
}
