use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{Backlight, ControlCommand};
use crate::core::Config;
use crate::network::BusTransport;
use crate::protocol::altimeter_setting_frame;
use crate::util::clamp_to;

/// Last altimeter setting put on the bus and when
#[derive(Debug, Clone, Copy)]
pub struct OutboundBaroState {
    last_sent_value: Option<i32>,
    last_sent_at: Instant,
}

impl OutboundBaroState {
    /// Starts the resend clock at `now` with nothing sent yet
    pub fn new(now: Instant) -> Self {
        OutboundBaroState {
            last_sent_value: None,
            last_sent_at: now,
        }
    }

    /// Send on change, or when the resend period has fully elapsed
    pub fn should_send(&self, value: i32, now: Instant, period: Duration) -> bool {
        self.last_sent_value != Some(value) || now > self.last_sent_at + period
    }

    /// Records a send attempt, successful or not
    pub fn record(&mut self, value: i32, now: Instant) {
        self.last_sent_value = Some(value);
        self.last_sent_at = now;
    }

    pub fn last_sent_value(&self) -> Option<i32> {
        self.last_sent_value
    }

    pub fn last_sent_at(&self) -> Instant {
        self.last_sent_at
    }
}

/// What a command actually did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandOutcome {
    /// Clamped setting, if a frame was attempted
    pub qnh_transmitted: Option<i32>,
    /// Clamped brightness, if the backlight accepted it
    pub brightness_applied: Option<u8>,
}

/// Clamps a brightness request to 0..=100
pub fn clamp_brightness(raw: i64) -> u8 {
    clamp_to::<u8>(raw, 0, 100)
}

/// Validates display commands and turns them into bus frames and backlight changes.
///
/// Nothing is reported back to the display; every failure is logged here.
pub struct ControlHandler<B, L> {
    bus: Option<Arc<B>>,
    backlight: Option<L>,
    qnh_min: i32,
    qnh_max: i32,
    resend_period: Duration,
    out_id: u32,
    outbound: OutboundBaroState,
}

impl<B, L> ControlHandler<B, L>
where
    B: BusTransport,
    L: Backlight,
{
    /// Creates a handler; either collaborator may be missing
    pub fn new(config: &Config, bus: Option<Arc<B>>, backlight: Option<L>, now: Instant) -> Self {
        ControlHandler {
            bus,
            backlight,
            qnh_min: config.qnh_min,
            qnh_max: config.qnh_max,
            resend_period: config.qnh_resend_period,
            out_id: config.qnh_out_id,
            outbound: OutboundBaroState::new(now),
        }
    }

    /// Clamps an altimeter setting to the configured band
    pub fn clamp_qnh(&self, raw: i64) -> i32 {
        clamp_to::<i32>(raw, self.qnh_min, self.qnh_max)
    }

    /// Outbound hysteresis state
    pub fn outbound(&self) -> &OutboundBaroState {
        &self.outbound
    }

    /// Applies one command
    pub async fn handle(&mut self, command: ControlCommand, now: Instant) -> CommandOutcome {
        let mut outcome = CommandOutcome::default();

        if let Some(raw) = command.qnh {
            let value = self.clamp_qnh(raw);
            if i64::from(value) != raw {
                debug!(requested = raw, applied = value, "altimeter setting clamped");
            }
            if self.outbound.should_send(value, now, self.resend_period) {
                transmit_qnh(self.bus.as_deref(), self.out_id, value).await;
                self.outbound.record(value, now);
                outcome.qnh_transmitted = Some(value);
            } else {
                debug!(qnh = value, "altimeter setting unchanged, not resent yet");
            }
        }

        if let Some(raw) = command.brightness {
            let percent = clamp_brightness(raw);
            match self.backlight.as_mut() {
                Some(backlight) => match backlight.set_brightness(percent) {
                    Ok(()) => outcome.brightness_applied = Some(percent),
                    Err(e) => warn!(percent, error = %e, "failed to set brightness"),
                },
                None => debug!(percent, "no backlight, brightness ignored"),
            }
        }

        outcome
    }

    /// Handles commands from the display until cancelled or the sender goes away
    pub async fn run(mut self, mut commands: mpsc::Receiver<ControlCommand>, cancel: CancellationToken) {
        info!(
            bus = self.bus.is_some(),
            backlight = self.backlight.is_some(),
            "control handler started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                command = commands.recv() => match command {
                    Some(command) => {
                        self.handle(command, Instant::now()).await;
                    }
                    None => break,
                }
            }
        }

        debug!("control handler stopped");
    }
}

async fn transmit_qnh<B: BusTransport>(bus: Option<&B>, out_id: u32, value: i32) {
    let Some(bus) = bus else {
        debug!(qnh = value, "no bus, altimeter setting not transmitted");
        return;
    };

    let frame = match altimeter_setting_frame(out_id, value) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(qnh = value, error = %e, "failed to encode altimeter setting");
            return;
        }
    };

    match bus.send(frame).await {
        Ok(()) => debug!(qnh = value, "altimeter setting sent"),
        Err(e) => warn!(qnh = value, error = %e, "failed to send altimeter setting"),
    }
}
