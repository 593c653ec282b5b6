use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::AvionicsState;
use crate::core::Config;
use crate::protocol::ChannelId;

/// Nulls tracked channels whose last decode is older than the timeout.
///
/// Each tracked channel is FRESH while its value is set and STALE once the
/// monitor has nulled it. Only the dispatcher moves a channel back to FRESH,
/// by writing a new value and timestamp together.
#[derive(Debug, Clone)]
pub struct FreshnessMonitor {
    tracked: Vec<ChannelId>,
    timeout: Duration,
    period: Duration,
}

impl FreshnessMonitor {
    /// Creates a monitor for the given channels
    pub fn new(tracked: Vec<ChannelId>, timeout: Duration, period: Duration) -> Self {
        let mut tracked = tracked;
        tracked.sort();
        tracked.dedup();
        FreshnessMonitor {
            tracked,
            timeout,
            period,
        }
    }

    /// Creates a monitor from the freshness settings of a configuration
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.tracked_channels.clone(),
            config.freshness_timeout,
            config.freshness_interval,
        )
    }

    /// Channels this monitor owns
    pub fn tracked(&self) -> &[ChannelId] {
        &self.tracked
    }

    /// Checks every tracked channel once and returns those that just went stale
    pub fn sweep(&self, state: &AvionicsState, now: Instant) -> Vec<ChannelId> {
        let mut expired = Vec::new();
        for &channel in &self.tracked {
            if state.invalidate_if_stale(channel, now, self.timeout) {
                warn!(%channel, timeout_ms = self.timeout.as_millis() as u64, "channel stale, value nulled");
                expired.push(channel);
            }
        }
        expired
    }

    /// Sweeps on a fixed period until cancelled
    pub async fn run(self, state: Arc<AvionicsState>, cancel: CancellationToken) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!(channels = ?self.tracked, "freshness monitor started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.sweep(&state, Instant::now());
                }
            }
        }

        debug!("freshness monitor stopped");
    }
}
