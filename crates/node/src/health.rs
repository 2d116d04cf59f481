//! Health sampling.

use crate::instance::InstanceStatus;
use serde::Serialize;
use std::time::Duration;

/// Sync lag at or above which an instance is unhealthy.
pub const UNHEALTHY_LAG: u64 = 100;

/// RPC latency at or above which an instance is unhealthy.
pub const UNHEALTHY_LATENCY: Duration = Duration::from_secs(10);

/// One health observation of a chain instance.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSample {
    /// The instance status at sampling time.
    pub status: InstanceStatus,
    /// Round-trip latency of a `latest-block-number` call.
    pub latency: Duration,
    /// The tip the peer reported, if the call succeeded.
    pub tip: Option<u64>,
    /// The indexed watermark.
    pub watermark: Option<u64>,
    /// `tip - watermark`, when both are known.
    pub sync_lag: Option<u64>,
    /// Time since the instance started, while running.
    pub uptime: Option<Duration>,
    /// The most recent error, if any.
    pub last_error: Option<String>,
}

impl HealthSample {
    /// Healthy iff the lag is small, the endpoint answers promptly, and the
    /// instance is not in the error state.
    pub fn healthy(&self) -> bool {
        if self.status == InstanceStatus::Error {
            return false;
        }
        if self.latency >= UNHEALTHY_LATENCY {
            return false;
        }
        match self.sync_lag {
            Some(lag) => lag < UNHEALTHY_LAG,
            // An unreadable tip is not healthy.
            None => self.tip.is_some(),
        }
    }
}
