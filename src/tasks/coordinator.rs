use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{timeout, timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{BusReader, InputDevice, InputPoller, Publisher};
use crate::control::{Backlight, ControlCommand, ControlHandler};
use crate::core::{Config, Result};
use crate::network::{BusTransport, ClientChannel};
use crate::state::{AvionicsState, FreshnessMonitor};

/// How long an aborted task gets to unwind before cleanup continues
pub const ABORT_WAIT: Duration = Duration::from_millis(100);

/// Owns the long-running tasks and the bus.
///
/// Every task watches one shared cancellation token. Shutdown cancels it,
/// waits out the grace period, aborts whatever is left and then releases the
/// bus exactly once.
pub struct Coordinator<B, C> {
    config: Config,
    bus: Option<Arc<B>>,
    client: Arc<C>,
    state: Arc<AvionicsState>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<(&'static str, JoinHandle<()>)>>,
    bus_released: AtomicBool,
}

impl<B, C> Coordinator<B, C>
where
    B: BusTransport,
    C: ClientChannel,
{
    pub fn new(config: Config, bus: Option<Arc<B>>, client: Arc<C>, state: Arc<AvionicsState>) -> Self {
        Coordinator {
            config,
            bus,
            client,
            state,
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
            bus_released: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> &Arc<AvionicsState> {
        &self.state
    }

    /// Token cancelled at shutdown, for tasks spawned outside the coordinator
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Starts the bus reader, freshness monitor, publisher and control handler
    pub fn start<L: Backlight>(&self, commands: mpsc::Receiver<ControlCommand>, backlight: Option<L>) {
        match &self.bus {
            Some(bus) => {
                let reader = BusReader::new(bus.clone(), self.state.clone());
                self.spawn("bus-reader", reader.run(self.cancel.clone()));
            }
            None => warn!("no bus, bus fields will stay unknown"),
        }

        let monitor = FreshnessMonitor::from_config(&self.config);
        self.spawn("freshness", monitor.run(self.state.clone(), self.cancel.clone()));

        let publisher = Publisher::new(
            self.client.clone(),
            self.state.clone(),
            self.config.publish_interval,
        );
        self.spawn("publisher", publisher.run(self.cancel.clone()));

        let handler = ControlHandler::new(&self.config, self.bus.clone(), backlight, Instant::now());
        self.spawn("control", handler.run(commands, self.cancel.clone()));

        info!("core tasks started");
    }

    /// Starts polling an operator input device
    pub fn start_input<D: InputDevice>(&self, device: D) {
        let poller = InputPoller::new(device, self.state.clone(), self.config.input_poll_interval);
        self.spawn("input", poller.run(self.cancel.clone()));
    }

    /// Spawns a task that is awaited or aborted at shutdown
    pub fn spawn<F>(&self, name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task);
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((name, handle));
        debug!(task = name, "task spawned");
    }

    /// Stops every task and releases the bus; safe to call more than once
    pub async fn shutdown(&self) -> Result<()> {
        self.cancel.cancel();

        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
        let deadline = Instant::now() + self.config.shutdown_grace;
        for (name, mut handle) in tasks {
            match timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => debug!(task = name, "task stopped"),
                Ok(Err(e)) => warn!(task = name, error = %e, "task ended abnormally"),
                Err(_) => {
                    warn!(task = name, "task did not stop in time, aborting");
                    handle.abort();
                    if timeout(ABORT_WAIT, handle).await.is_err() {
                        warn!(task = name, "aborted task still running");
                    }
                }
            }
        }

        self.release_bus().await?;
        info!("shutdown complete");
        Ok(())
    }

    /// Closes the bus once; `Ok(false)` if already released or absent
    pub async fn release_bus(&self) -> Result<bool> {
        if self.bus_released.swap(true, Ordering::SeqCst) {
            return Ok(false);
        }
        let Some(bus) = &self.bus else {
            return Ok(false);
        };
        bus.close().await?;
        info!("bus released");
        Ok(true)
    }
}
