use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::core::Result;
use crate::state::AvionicsState;

/// Largest position change accepted between two polls
pub const MAX_POSITION_STEP: i32 = 100;

/// One reading of the rotary encoder and its push button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSample {
    pub count: i32,
    pub pressed: bool,
}

/// Operator input hardware, polled synchronously
pub trait InputDevice: Send + 'static {
    fn read(&mut self) -> Result<InputSample>;
}

/// Filters encoder glitches and counter wraparound
#[derive(Debug, Default, Clone)]
pub struct InputTracker {
    position: Option<i32>,
}

impl InputTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the new position if the sample is plausible
    pub fn accept(&mut self, sample: InputSample) -> Option<i32> {
        let position = sample.count.saturating_neg();
        match self.position {
            Some(last) if (i64::from(position) - i64::from(last)).abs() >= i64::from(MAX_POSITION_STEP) => {
                debug!(last, position, "encoder jump ignored");
                None
            }
            _ => {
                self.position = Some(position);
                Some(position)
            }
        }
    }

    pub fn position(&self) -> Option<i32> {
        self.position
    }
}

/// Polls an input device and writes position and button into the state
pub struct InputPoller<D> {
    device: D,
    state: Arc<AvionicsState>,
    period: Duration,
    tracker: InputTracker,
}

impl<D: InputDevice> InputPoller<D> {
    pub fn new(device: D, state: Arc<AvionicsState>, period: Duration) -> Self {
        InputPoller {
            device,
            state,
            period,
            tracker: InputTracker::new(),
        }
    }

    /// Reads the device once
    pub fn poll(&mut self) -> Result<()> {
        let sample = self.device.read()?;
        apply_sample(&mut self.tracker, &self.state, sample);
        Ok(())
    }

    /// Polls until cancelled; reads run on the blocking pool
    pub async fn run(self, cancel: CancellationToken) {
        let InputPoller {
            mut device,
            state,
            period,
            mut tracker,
        } = self;
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!("input poller started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let read = tokio::task::spawn_blocking(move || {
                let sample = device.read();
                (device, sample)
            });
            match read.await {
                Ok((returned, sample)) => {
                    device = returned;
                    match sample {
                        Ok(sample) => apply_sample(&mut tracker, &state, sample),
                        Err(e) => warn!(error = %e, "input read failed"),
                    }
                }
                Err(e) => {
                    error!(error = %e, "input device read panicked");
                    break;
                }
            }
        }

        debug!("input poller stopped");
    }
}

fn apply_sample(tracker: &mut InputTracker, state: &AvionicsState, sample: InputSample) {
    if let Some(position) = tracker.accept(sample) {
        state.set_position(position);
    }
    state.set_pressed(sample.pressed);
}
