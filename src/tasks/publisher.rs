use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::core::Result;
use crate::network::ClientChannel;
use crate::state::AvionicsState;

/// Pushes the full snapshot to the display on a fixed cadence.
///
/// Every push overwrites the previous one on the client side, so a failed
/// push is logged and simply superseded by the next tick.
pub struct Publisher<C> {
    client: Arc<C>,
    state: Arc<AvionicsState>,
    period: Duration,
}

impl<C: ClientChannel> Publisher<C> {
    pub fn new(client: Arc<C>, state: Arc<AvionicsState>, period: Duration) -> Self {
        Publisher {
            client,
            state,
            period,
        }
    }

    /// Publishes one snapshot; `Ok(false)` when no client is open
    pub async fn publish_once(&self) -> Result<bool> {
        if !self.client.is_open() {
            return Ok(false);
        }
        let document = serde_json::to_value(self.state.snapshot())?;
        self.client.push_json(document).await?;
        Ok(true)
    }

    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        debug!(period_ms = self.period.as_millis() as u64, "publisher started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => match self.publish_once().await {
                    Ok(true) => trace!("snapshot published"),
                    Ok(false) => {}
                    Err(e) => warn!(error = %e, "failed to publish snapshot"),
                }
            }
        }

        debug!("publisher stopped");
    }
}
