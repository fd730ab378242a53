use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::calibration::CalibrationSnapshot;
use crate::config::ProfileError;
use crate::serial::SerialLink;

use super::{ReconnectController, Result, TickOutcome};

/// Background polling of one pad.
///
/// The controller does blocking serial I/O, so the loop runs on tokio's
/// blocking pool and checks the stop channel between ticks.
pub struct PadMonitor {
    task_handle: JoinHandle<std::result::Result<(), ProfileError>>,
    stop_tx: mpsc::Sender<()>,
    snapshots: watch::Receiver<Arc<CalibrationSnapshot>>,
}

impl PadMonitor {
    /// Start polling. Must be called from within a tokio runtime.
    pub fn start<L>(controller: ReconnectController<L>, reconnect_interval: Duration) -> Self
    where
        L: SerialLink + Send + 'static,
    {
        let (snapshot_tx, snapshots) = watch::channel(Arc::new(controller.snapshot()));
        let controller = controller.with_snapshot_sender(snapshot_tx);

        let (stop_tx, stop_rx) = mpsc::channel(1);
        let task_handle = tokio::task::spawn_blocking(move || {
            Self::polling_loop(controller, stop_rx, reconnect_interval)
        });

        Self {
            task_handle,
            stop_tx,
            snapshots,
        }
    }

    /// Latest snapshot plus change notifications. The channel closes once
    /// the polling loop has exited.
    pub fn subscribe(&self) -> watch::Receiver<Arc<CalibrationSnapshot>> {
        self.snapshots.clone()
    }

    pub fn latest(&self) -> Arc<CalibrationSnapshot> {
        self.snapshots.borrow().clone()
    }

    /// Stop polling and wait for the final profile save.
    pub async fn stop(self) -> Result<()> {
        // Fails only if the loop already exited.
        let _ = self.stop_tx.send(()).await;
        self.task_handle.await??;
        Ok(())
    }

    fn polling_loop<L: SerialLink>(
        mut controller: ReconnectController<L>,
        mut stop_rx: mpsc::Receiver<()>,
        reconnect_interval: Duration,
    ) -> std::result::Result<(), ProfileError> {
        log::info!("Polling pad with {} sensors", controller.store().sensor_count());
        let mut ticks = 0u64;

        loop {
            match stop_rx.try_recv() {
                Ok(()) | Err(TryRecvError::Disconnected) => {
                    log::info!("Received stop signal after {} ticks", ticks);
                    break;
                }
                Err(TryRecvError::Empty) => {}
            }

            ticks += 1;
            match controller.tick() {
                TickOutcome::Disconnected | TickOutcome::StillDisconnected => {
                    std::thread::sleep(reconnect_interval);
                }
                TickOutcome::Reconnected => log::info!("Pad reconnected"),
                TickOutcome::Updated { .. } | TickOutcome::Silent => {}
            }
        }

        controller.shutdown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PadSettings;
    use crate::serial::mock::ScriptedLink;

    #[tokio::test]
    async fn test_stop_ends_polling_and_closes_channel() {
        let link = ScriptedLink::with_lines(&["v 1 2", "t 3 4"]);
        let controller = ReconnectController::connect(link, &PadSettings::default()).unwrap();

        let monitor = PadMonitor::start(controller, Duration::from_millis(1));
        let mut rx = monitor.subscribe();
        assert_eq!(monitor.latest().thresholds, vec![3, 4]);

        monitor.stop().await.unwrap();
        while rx.changed().await.is_ok() {}
        assert_eq!(rx.borrow().sensor_count, 2);
    }
}
