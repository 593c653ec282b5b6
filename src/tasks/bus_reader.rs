use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::core::Error;
use crate::network::BusTransport;
use crate::state::AvionicsState;

/// Pause before receiving again after a transport error
pub const RECEIVE_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Frame counters kept by the bus reader
#[derive(Debug, Default)]
pub struct BusStats {
    decoded: AtomicU64,
    malformed: AtomicU64,
    unknown: AtomicU64,
    transport_errors: AtomicU64,
}

impl BusStats {
    pub fn decoded(&self) -> u64 {
        self.decoded.load(Ordering::Relaxed)
    }

    pub fn malformed(&self) -> u64 {
        self.malformed.load(Ordering::Relaxed)
    }

    pub fn unknown(&self) -> u64 {
        self.unknown.load(Ordering::Relaxed)
    }

    pub fn transport_errors(&self) -> u64 {
        self.transport_errors.load(Ordering::Relaxed)
    }
}

/// Feeds every received frame into the shared state.
///
/// A bad frame never stops the reader; only cancellation or a closed bus does.
pub struct BusReader<B> {
    bus: Arc<B>,
    state: Arc<AvionicsState>,
    stats: Arc<BusStats>,
}

impl<B: BusTransport> BusReader<B> {
    pub fn new(bus: Arc<B>, state: Arc<AvionicsState>) -> Self {
        BusReader {
            bus,
            state,
            stats: Arc::new(BusStats::default()),
        }
    }

    /// Counters shared with whoever wants to report them
    pub fn stats(&self) -> Arc<BusStats> {
        self.stats.clone()
    }

    pub async fn run(self, cancel: CancellationToken) {
        info!("bus reader started");

        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => break,
                received = self.bus.receive() => received,
            };

            match received {
                Ok(Some(frame)) => match self.state.dispatch(&frame, Instant::now()) {
                    Ok(channel) => {
                        self.stats.decoded.fetch_add(1, Ordering::Relaxed);
                        trace!(%channel, "frame applied");
                    }
                    Err(Error::UnknownChannel(id)) => {
                        self.stats.unknown.fetch_add(1, Ordering::Relaxed);
                        debug!(id = %format!("0x{:03X}", id), "ignoring frame");
                    }
                    Err(e) => {
                        self.stats.malformed.fetch_add(1, Ordering::Relaxed);
                        warn!(id = %format!("0x{:03X}", frame.id), error = %e, "dropping frame");
                    }
                },
                Ok(None) => {
                    warn!("bus closed, no further frames");
                    break;
                }
                Err(e) => {
                    self.stats.transport_errors.fetch_add(1, Ordering::Relaxed);
                    warn!(error = %e, "bus receive failed");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = sleep(RECEIVE_RETRY_DELAY) => {}
                    }
                }
            }
        }

        info!(
            decoded = self.stats.decoded(),
            malformed = self.stats.malformed(),
            unknown = self.stats.unknown(),
            "bus reader stopped"
        );
    }
}
