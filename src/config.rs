//! Gateway configuration

use crate::scrub::ScrubMode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Time-to-live for staged transactions, in seconds.
///
/// A paused request that receives no confirm/cancel within this window
/// silently disappears from the ephemeral store, original payload included.
pub const PENDING_TTL_SECS: u64 = 300;

/// Gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// TTL for staged transactions awaiting confirmation, in seconds.
    pub pending_ttl_secs: u64,
    /// Maximum attempts for the audit-trail write.
    pub trail_retry_attempts: u32,
    /// Initial backoff between trail-write attempts, in milliseconds.
    /// Doubles after each failure.
    pub trail_retry_base_ms: u64,
    /// Rewrite mode used when a request does not specify one.
    pub default_mode: ScrubMode,
    /// Origin label used when a request does not carry one.
    pub default_source: String,
}

impl GatewayConfig {
    pub fn pending_ttl(&self) -> Duration {
        Duration::from_secs(self.pending_ttl_secs)
    }

    pub fn trail_retry_base(&self) -> Duration {
        Duration::from_millis(self.trail_retry_base_ms)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            pending_ttl_secs: PENDING_TTL_SECS,
            trail_retry_attempts: 3,
            trail_retry_base_ms: 500,
            default_mode: ScrubMode::Redact,
            default_source: "api-gateway".to_string(),
        }
    }
}
