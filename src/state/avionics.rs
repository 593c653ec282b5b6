use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::core::Result;
use crate::protocol::{
    self, Acceleration, AirData, AltimeterSetting, Attitude, Axis, ChannelId, Frame, GpsPosition,
    GpsVector, PressureData, Reading, TimeSync,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Last-known value of one channel plus the instant it was decoded
#[derive(Debug)]
struct Slot<T> {
    value: Option<T>,
    last_seen: Option<Instant>,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Slot {
            value: None,
            last_seen: None,
        }
    }
}

impl<T> Slot<T> {
    fn set(&mut self, value: T, now: Instant) {
        self.value = Some(value);
        self.last_seen = Some(now);
    }
}

/// Type-erased view of a channel cell, used by the freshness monitor
trait ChannelCell: Send + Sync {
    fn last_seen(&self) -> Option<Instant>;
    fn is_known(&self) -> bool;
    fn invalidate_if_stale(&self, now: Instant, timeout: Duration) -> bool;
}

impl<T: Send> ChannelCell for Mutex<Slot<T>> {
    fn last_seen(&self) -> Option<Instant> {
        lock(self).last_seen
    }

    fn is_known(&self) -> bool {
        lock(self).value.is_some()
    }

    fn invalidate_if_stale(&self, now: Instant, timeout: Duration) -> bool {
        let mut slot = lock(self);
        let stale = match slot.last_seen {
            Some(seen) => now.saturating_duration_since(seen) > timeout,
            None => false,
        };
        if stale && slot.value.is_some() {
            slot.value = None;
            return true;
        }
        false
    }
}

/// Operator input owned by the input task
#[derive(Debug, Default, Clone, Copy)]
struct OperatorInput {
    position: Option<i32>,
    pressed: Option<bool>,
}

/// Live aggregate of every channel's last-known value.
///
/// Each channel lives in its own cell so that no writer ever waits on another
/// channel's writer. Value and decode timestamp share a cell and are always
/// written together; the timestamps of all cells form the last-seen registry
/// consulted by the freshness monitor.
#[derive(Debug, Default)]
pub struct AvionicsState {
    air: Mutex<Slot<AirData>>,
    pressure: Mutex<Slot<PressureData>>,
    altimeter: Mutex<Slot<AltimeterSetting>>,
    attitude: Mutex<Slot<Attitude>>,
    acceleration: Mutex<Slot<Acceleration>>,
    gps_position: Mutex<Slot<GpsPosition>>,
    gps_vector: Mutex<Slot<GpsVector>>,
    mag_x: Mutex<Slot<f32>>,
    mag_y: Mutex<Slot<f32>>,
    mag_z: Mutex<Slot<f32>>,
    time_sync: Mutex<Slot<TimeSync>>,
    operator: Mutex<OperatorInput>,
}

impl AvionicsState {
    /// Creates a state with every field unknown
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes a frame and applies it in one step.
    ///
    /// On error nothing is written.
    pub fn dispatch(&self, frame: &Frame, now: Instant) -> Result<ChannelId> {
        let reading = protocol::decode(frame)?;
        let channel = reading.channel();
        self.apply(reading, now);
        Ok(channel)
    }

    /// Writes a decoded reading and its timestamp into the channel's cell
    pub fn apply(&self, reading: Reading, now: Instant) {
        match reading {
            Reading::AirData(v) => lock(&self.air).set(v, now),
            Reading::Pressure(v) => lock(&self.pressure).set(v, now),
            Reading::AltimeterSetting(v) => lock(&self.altimeter).set(v, now),
            Reading::Attitude(v) => lock(&self.attitude).set(v, now),
            Reading::Acceleration(v) => lock(&self.acceleration).set(v, now),
            Reading::GpsPosition(v) => lock(&self.gps_position).set(v, now),
            Reading::GpsVector(v) => lock(&self.gps_vector).set(v, now),
            Reading::Magnetic { axis, value } => lock(self.magnetic(axis)).set(value, now),
            Reading::TimeSync(v) => lock(&self.time_sync).set(v, now),
        }
    }

    fn magnetic(&self, axis: Axis) -> &Mutex<Slot<f32>> {
        match axis {
            Axis::X => &self.mag_x,
            Axis::Y => &self.mag_y,
            Axis::Z => &self.mag_z,
        }
    }

    fn cell(&self, channel: ChannelId) -> &dyn ChannelCell {
        match channel {
            ChannelId::AirPrimary => &self.air,
            ChannelId::Pressure => &self.pressure,
            ChannelId::AltimeterSetting => &self.altimeter,
            ChannelId::Attitude => &self.attitude,
            ChannelId::Acceleration => &self.acceleration,
            ChannelId::GpsPosition => &self.gps_position,
            ChannelId::GpsVector => &self.gps_vector,
            ChannelId::MagneticX => &self.mag_x,
            ChannelId::MagneticY => &self.mag_y,
            ChannelId::MagneticZ => &self.mag_z,
            ChannelId::TimeSync => &self.time_sync,
        }
    }

    /// Instant of the channel's most recent successful decode
    pub fn last_seen(&self, channel: ChannelId) -> Option<Instant> {
        self.cell(channel).last_seen()
    }

    /// Whether the channel currently holds a value
    pub fn is_known(&self, channel: ChannelId) -> bool {
        self.cell(channel).is_known()
    }

    /// Nulls the channel if its last decode is older than `timeout`.
    ///
    /// Returns true only on the FRESH to STALE transition.
    pub fn invalidate_if_stale(&self, channel: ChannelId, now: Instant, timeout: Duration) -> bool {
        self.cell(channel).invalidate_if_stale(now, timeout)
    }

    /// Records a new encoder position
    pub fn set_position(&self, position: i32) {
        lock(&self.operator).position = Some(position);
    }

    /// Records the push button state
    pub fn set_pressed(&self, pressed: bool) {
        lock(&self.operator).pressed = Some(pressed);
    }

    /// Copies every field into a flat snapshot.
    ///
    /// Channels are read one at a time, so fields from different channels may
    /// come from different instants.
    pub fn snapshot(&self) -> Snapshot {
        let air = lock(&self.air).value;
        let pressure = lock(&self.pressure).value;
        let altimeter = lock(&self.altimeter).value;
        let attitude = lock(&self.attitude).value;
        let acceleration = lock(&self.acceleration).value;
        let gps_position = lock(&self.gps_position).value;
        let gps_vector = lock(&self.gps_vector).value;
        let magx = lock(&self.mag_x).value;
        let magy = lock(&self.mag_y).value;
        let magz = lock(&self.mag_z).value;
        let time = lock(&self.time_sync).value;
        let operator = *lock(&self.operator);

        Snapshot {
            altitude: air.map(|a| a.altitude),
            airspeed: air.map(|a| a.airspeed),
            vsi: air.map(|a| a.vsi),
            static_pressure: pressure.map(|p| p.static_pressure),
            temperature: pressure.map(|p| p.temperature),
            differential_pressure: pressure.map(|p| p.differential_pressure),
            qnh: altimeter.map(|q| q.inhg_hundredths),
            qnh_hpa: altimeter.map(|q| q.hpa),
            yaw: attitude.map(|a| a.yaw),
            pitch: attitude.map(|a| a.pitch),
            roll: attitude.map(|a| a.roll),
            turn_rate: attitude.map(|a| a.turn_rate),
            accx: acceleration.map(|a| a.x),
            accy: acceleration.map(|a| a.y),
            accz: acceleration.map(|a| a.z),
            calib: acceleration.map(|a| a.calibration),
            latitude: gps_position.map(|g| g.latitude),
            longitude: gps_position.map(|g| g.longitude),
            gps_speed: gps_vector.map(|g| g.speed),
            gps_altitude: gps_vector.map(|g| g.altitude),
            true_track: gps_vector.map(|g| g.true_track),
            magx,
            magy,
            magz,
            tm_year: time.map(|t| t.year),
            tm_mon: time.map(|t| t.month),
            tm_mday: time.map(|t| t.day),
            tm_hour: time.map(|t| t.hour),
            tm_min: time.map(|t| t.minute),
            tm_sec: time.map(|t| t.second),
            position: operator.position,
            pressed: operator.pressed,
        }
    }
}

/// Flat copy of the state as pushed to the display client.
///
/// Unknown fields serialize as JSON `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    pub altitude: Option<i32>,
    pub airspeed: Option<i16>,
    pub vsi: Option<i16>,
    pub static_pressure: Option<i16>,
    pub temperature: Option<i8>,
    pub differential_pressure: Option<i16>,
    pub qnh: Option<f64>,
    pub qnh_hpa: Option<i16>,
    pub yaw: Option<f64>,
    pub pitch: Option<f64>,
    pub roll: Option<f64>,
    pub turn_rate: Option<i16>,
    pub accx: Option<i16>,
    pub accy: Option<i16>,
    pub accz: Option<i16>,
    pub calib: Option<i16>,
    pub latitude: Option<i32>,
    pub longitude: Option<i32>,
    pub gps_speed: Option<i16>,
    pub gps_altitude: Option<i16>,
    pub true_track: Option<i16>,
    pub magx: Option<f32>,
    pub magy: Option<f32>,
    pub magz: Option<f32>,
    pub tm_year: Option<i32>,
    pub tm_mon: Option<u8>,
    pub tm_mday: Option<u8>,
    pub tm_hour: Option<u8>,
    pub tm_min: Option<u8>,
    pub tm_sec: Option<u8>,
    pub position: Option<i32>,
    pub pressed: Option<bool>,
}
