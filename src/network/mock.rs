//! In-memory collaborators for tests

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::mpsc;

use super::{BusTransport, ClientChannel};
use crate::core::{Error, Result};
use crate::protocol::Frame;
use crate::tasks::encoder::{
    BUTTON_PIN, ENCODER_BASE, ENCODER_POSITION, GPIO_BASE, GPIO_BULK, STATUS_BASE, STATUS_VERSION,
};

/// Bus fed from a channel that records every send attempt
pub struct MockBus {
    inbound: tokio::sync::Mutex<mpsc::Receiver<Frame>>,
    attempts: Mutex<Vec<Frame>>,
    fail_sends: AtomicBool,
    failing_receives: AtomicUsize,
    closes: AtomicUsize,
}

impl MockBus {
    pub fn new() -> (Self, mpsc::Sender<Frame>) {
        let (tx, rx) = mpsc::channel(64);
        let bus = MockBus {
            inbound: tokio::sync::Mutex::new(rx),
            attempts: Mutex::new(Vec::new()),
            fail_sends: AtomicBool::new(false),
            failing_receives: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
        };
        (bus, tx)
    }

    pub fn attempts(&self) -> Vec<Frame> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Makes the next `count` receives fail before frames flow again
    pub fn fail_next_receives(&self, count: usize) {
        self.failing_receives.store(count, Ordering::SeqCst);
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl BusTransport for MockBus {
    async fn send(&self, frame: Frame) -> Result<()> {
        self.attempts.lock().unwrap().push(frame);
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(Error::transport_send("mock bus offline"));
        }
        Ok(())
    }

    async fn receive(&self) -> Result<Option<Frame>> {
        let failing = self
            .failing_receives
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(Error::device_unavailable("mock bus read error"));
        }
        Ok(self.inbound.lock().await.recv().await)
    }

    async fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Client that collects pushed documents
#[derive(Default)]
pub struct MockClient {
    open: AtomicBool,
    fail: AtomicBool,
    pushed: Mutex<Vec<Value>>,
}

impl MockClient {
    pub fn new(open: bool) -> Self {
        let client = MockClient::default();
        client.set_open(open);
        client
    }

    pub fn set_open(&self, open: bool) {
        self.open.store(open, Ordering::SeqCst);
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn pushed(&self) -> Vec<Value> {
        self.pushed.lock().unwrap().clone()
    }
}

impl ClientChannel for MockClient {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn push_json(&self, value: Value) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::transport_send("mock client broken pipe"));
        }
        self.pushed.lock().unwrap().push(value);
        Ok(())
    }
}

#[derive(Default)]
struct SeesawRegisters {
    values: HashMap<(u8, u8), [u8; 4]>,
    selected: Option<(u8, u8)>,
    writes: Vec<Vec<u8>>,
}

/// I2C endpoint answering like a seesaw rotary encoder breakout.
///
/// Clones share registers, so a test can keep a handle after moving one into
/// the device under test. A default instance has no registers and NACKs reads.
#[derive(Clone, Default)]
pub struct MockSeesaw {
    registers: Arc<Mutex<SeesawRegisters>>,
}

impl MockSeesaw {
    pub fn new(product: u16) -> Self {
        let seesaw = MockSeesaw::default();
        seesaw.set(STATUS_BASE, STATUS_VERSION, (u32::from(product) << 16) | 0x2A11);
        seesaw.set(ENCODER_BASE, ENCODER_POSITION, 0);
        seesaw.set_pressed(false);
        seesaw
    }

    fn set(&self, base: u8, function: u8, value: u32) {
        self.registers
            .lock()
            .unwrap()
            .values
            .insert((base, function), value.to_be_bytes());
    }

    pub fn set_position(&self, count: i32) {
        self.set(ENCODER_BASE, ENCODER_POSITION, count as u32);
    }

    /// Button pin reads low while pressed; every other pin floats high
    pub fn set_pressed(&self, pressed: bool) {
        let pins = if pressed { !(1u32 << BUTTON_PIN) } else { u32::MAX };
        self.set(GPIO_BASE, GPIO_BULK, pins);
    }

    /// Register writes carrying data, in order
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.registers.lock().unwrap().writes.clone()
    }
}

impl io::Write for MockSeesaw {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut registers = self.registers.lock().unwrap();
        match buf {
            [base, function] => registers.selected = Some((*base, *function)),
            _ => registers.writes.push(buf.to_vec()),
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Read for MockSeesaw {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let registers = self.registers.lock().unwrap();
        let value = registers
            .selected
            .and_then(|selected| registers.values.get(&selected))
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "no acknowledge"))?;
        let len = buf.len().min(value.len());
        buf[..len].copy_from_slice(&value[..len]);
        Ok(len)
    }
}
