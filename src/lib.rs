//! Shared-memory frame channel for the Huahualive virtual camera
//!
//! A single producer publishes raw BGRA bitmaps into a fixed-layout shared
//! region; a separate consumer process reads the latest frame. The region
//! holds exactly one frame: no history, no backlog.

pub mod channel;
pub mod error;
pub mod frame;
pub mod shm;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use channel::Channel;
pub use error::{InitError, SendError, SendFailure};
pub use frame::FrameRequest;

use crate::frame::header::{HEADER_SIZE, MAX_FRAME_BYTES};

/// Channel configuration.
///
/// The defaults are the wire contract: the consumer resolves the same
/// object names out-of-band, so overriding the prefix only makes sense for
/// tests or a side-by-side producer/consumer pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Prefix for the four named OS objects
    pub name_prefix: String,
    /// Bounded wait for the cross-process write lock
    pub lock_timeout_ms: u64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            name_prefix: "HuahualiveCapture".to_string(),
            lock_timeout_ms: 100,
        }
    }
}

impl ChannelConfig {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            name_prefix: prefix.into(),
            ..Self::default()
        }
    }

    pub fn region_name(&self) -> String {
        format!("{}_Data", self.name_prefix)
    }

    pub fn sent_name(&self) -> String {
        format!("{}_Sent", self.name_prefix)
    }

    pub fn want_name(&self) -> String {
        format!("{}_Want", self.name_prefix)
    }

    pub fn mutex_name(&self) -> String {
        format!("{}_Mutx", self.name_prefix)
    }

    /// Total region size: header plus the declared maximum payload
    pub fn region_capacity(&self) -> usize {
        HEADER_SIZE + MAX_FRAME_BYTES
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_names_match_wire_contract() {
        let config = ChannelConfig::default();
        assert_eq!(config.region_name(), "HuahualiveCapture_Data");
        assert_eq!(config.sent_name(), "HuahualiveCapture_Sent");
        assert_eq!(config.want_name(), "HuahualiveCapture_Want");
        assert_eq!(config.mutex_name(), "HuahualiveCapture_Mutx");
    }

    #[test]
    fn capacity_covers_header_and_headroom() {
        let config = ChannelConfig::default();
        assert_eq!(config.region_capacity(), 32 + 3840 * 2160 * 4 * 2);
    }
}
