pub mod calibration;
pub mod config;
pub mod device;
pub mod serial;

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;

pub use calibration::{CalibrationSnapshot, CalibrationStore, SENSORS_MAX, SENSOR_MAX_VALUE};
pub use config::PadSettings;
pub use device::{ConnectionState, DeviceError, PadMonitor, ReconnectController, TickOutcome};
pub use serial::{DeviceSession, SerialInterface, SerialLink};

/// Connect to the pad described by `settings` and poll it until Ctrl+C or SIGTERM.
pub async fn run(settings: PadSettings) -> anyhow::Result<()> {
    let port = settings.port_name.clone();
    let baud_rate = settings.baud_rate;
    let interface = tokio::task::spawn_blocking(move || SerialInterface::open(port.as_deref(), baud_rate))
        .await?
        .context("Failed to open serial port")?;
    log::info!("Connected to {}", interface.port_name());

    run_with_link(interface, settings, shutdown_signal()).await
}

/// Resolves on Ctrl+C, or on SIGTERM where the platform has it.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                log::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => log::info!("Received Ctrl+C"),
        _ = terminate => log::info!("Received SIGTERM"),
    }
}

/// Same as [`run`] over an already-open link, stopping when `shutdown` resolves.
pub async fn run_with_link<L, F>(link: L, settings: PadSettings, shutdown: F) -> anyhow::Result<()>
where
    L: SerialLink + Send + 'static,
    F: std::future::Future<Output = ()>,
{
    let connect_settings = settings.clone();
    let controller =
        tokio::task::spawn_blocking(move || ReconnectController::connect(link, &connect_settings))
            .await?
            .context("Pad did not come up")?;

    let monitor = PadMonitor::start(controller, settings.reconnect_interval());
    let reporter = tokio::spawn(report_snapshots(monitor.subscribe(), settings.report_json));

    shutdown.await;
    log::info!("Shutting down");

    monitor.stop().await.context("Failed to save profile")?;
    reporter.await?;
    Ok(())
}

/// Emit every snapshot as a JSON line, or log pressed-state and link changes.
async fn report_snapshots(mut rx: watch::Receiver<Arc<CalibrationSnapshot>>, as_json: bool) {
    let mut last: Option<(bool, Vec<bool>)> = None;

    loop {
        let snapshot = rx.borrow_and_update().clone();

        if as_json {
            match serde_json::to_string(&*snapshot) {
                Ok(line) => println!("{}", line),
                Err(e) => log::warn!("Failed to serialize snapshot: {}", e),
            }
        } else {
            let state = (snapshot.connected, snapshot.pressed.clone());
            if last.as_ref() != Some(&state) {
                log::info!(
                    "[{}] {} pressed: {} thresholds: {:?}",
                    snapshot.updated_at.format("%H:%M:%S%.3f"),
                    if snapshot.connected { "connected" } else { "disconnected" },
                    pressed_pattern(&snapshot.pressed),
                    snapshot.thresholds
                );
                last = Some(state);
            }
        }

        if rx.changed().await.is_err() {
            break;
        }
    }
}

/// One character per sensor: `#` pressed, `.` released.
pub fn pressed_pattern(pressed: &[bool]) -> String {
    pressed.iter().map(|&p| if p { '#' } else { '.' }).collect()
}
