// ── Runtime cache configuration ──
//
// These types describe *how* the cache talks to the Carrot cloud and how
// often. They carry credential data and timing, but never touch disk.
// The binary builds them from `carrot-config` and hands them in.

use std::time::Duration;

use secrecy::SecretString;

/// Account credentials for the Carrot cloud.
#[derive(Debug, Clone)]
pub struct AccountCredentials {
    pub email: String,
    pub password: SecretString,
}

/// Timing and buffering for the light cache engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Delay between engine start and the first poll.
    pub settle_delay: Duration,
    /// Time between light status polls.
    pub poll_interval: Duration,
    /// Time between session renewals. The first login happens immediately.
    pub renewal_interval: Duration,
    /// Change batches buffered per subscriber before it is considered lagging.
    pub change_buffer: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(3),
            poll_interval: Duration::from_secs(3),
            renewal_interval: Duration::from_secs(3 * 60 * 60),
            change_buffer: 256,
        }
    }
}
