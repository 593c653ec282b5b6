use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use efis_core::control::SysfsBacklight;
use efis_core::network::{bind_listener, serve_clients, ClientSlot, FieldBus};
use efis_core::state::AvionicsState;
use efis_core::tasks::{Coordinator, SeesawEncoder};
use efis_core::{Config, Result};

/// Control commands buffered between the client connection and the handler
const COMMAND_QUEUE: usize = 16;

#[tokio::main]
async fn main() {
    let config = match std::env::args().nth(1) {
        Some(path) => match Config::load(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("failed to load config {}: {}", path, e);
                std::process::exit(2);
            }
        },
        None => Config::default(),
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = run(config).await {
        error!(error = %e, "efis core failed");
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<()> {
    info!(version = efis_core::VERSION, "starting efis core");

    let bus = match FieldBus::open(&config.bus).await {
        Ok(bus) => bus.map(Arc::new),
        Err(e) => {
            warn!(error = %e, "field bus unavailable, running without it");
            None
        }
    };

    let backlight = match &config.backlight_device {
        Some(device) => SysfsBacklight::open(device),
        None => SysfsBacklight::detect(),
    };
    let backlight = match backlight {
        Ok(backlight) => Some(backlight),
        Err(e) => {
            info!(error = %e, "no backlight, brightness commands will be ignored");
            None
        }
    };

    let encoder = match &config.encoder {
        Some(encoder) => match SeesawEncoder::open(&encoder.device, encoder.address) {
            Ok(device) => Some(device),
            Err(e) => {
                info!(error = %e, "no rotary encoder, position and button stay unknown");
                None
            }
        },
        None => {
            info!("no rotary encoder configured");
            None
        }
    };

    let listener = bind_listener(config.client_bind_addr)?;
    let slot = Arc::new(ClientSlot::new());
    let (commands_tx, commands_rx) = mpsc::channel(COMMAND_QUEUE);

    let coordinator = Coordinator::new(config, bus, slot.clone(), Arc::new(AvionicsState::new()));
    coordinator.spawn(
        "clients",
        serve_clients(listener, slot, commands_tx, coordinator.cancel_token()),
    );
    coordinator.start(commands_rx, backlight);
    if let Some(encoder) = encoder {
        coordinator.start_input(encoder);
    }

    wait_for_signal().await;
    info!("shutting down");
    coordinator.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(terminate) => terminate,
        Err(e) => {
            warn!(error = %e, "cannot listen for SIGTERM");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
