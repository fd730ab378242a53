use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::watch;

use crate::calibration::{CalibrationSnapshot, CalibrationStore, StoreError, SENSORS_MAX};
use crate::config::{self, PadSettings, ProfileError};
use crate::serial::{DeviceSession, SerialLink, SessionError};

use super::{ConnectionState, DeviceError, Result, TickOutcome};

/// Polls the pad and keeps the calibration store in sync across disconnects.
///
/// `Connected` ticks run one values query. A link fault moves to
/// `Disconnected`, where each tick makes a single reopen attempt. A successful
/// reopen runs [`Self::on_reconnect`] before the next values query.
pub struct ReconnectController<L: SerialLink> {
    session: DeviceSession<L>,
    store: CalibrationStore,
    state: ConnectionState,
    profile_path: Option<PathBuf>,
    snapshot_tx: Option<watch::Sender<Arc<CalibrationSnapshot>>>,
    seq: u64,
    finished: bool,
}

impl<L: SerialLink> ReconnectController<L> {
    /// Discover the sensor count on an already-open link and synchronize thresholds.
    ///
    /// Fails when the pad does not answer the first values query with at
    /// least one number, or reports more than [`SENSORS_MAX`] sensors.
    pub fn connect(link: L, settings: &PadSettings) -> Result<Self> {
        let mut session = DeviceSession::new(link, settings);

        let report = session.query_values()?;
        let sensor_count = report.count;
        if sensor_count == 0 {
            return Err(DeviceError::NoResponse);
        }
        if sensor_count > SENSORS_MAX {
            return Err(DeviceError::TooManySensors {
                count: sensor_count,
                max: SENSORS_MAX,
            });
        }
        log::info!("Sensor count: {}", sensor_count);

        session.set_capacity(sensor_count);
        let mut store = CalibrationStore::new(sensor_count)?;
        store.apply_report(&report);

        let mut controller = Self {
            session,
            store,
            state: ConnectionState::Connected,
            profile_path: settings.profile_path.clone(),
            snapshot_tx: None,
            seq: 0,
            finished: false,
        };
        controller.apply_stray_reports();
        if let Err(e) = controller.on_reconnect() {
            // Nothing trustworthy to save yet.
            controller.finished = true;
            return Err(e.into());
        }

        Ok(controller)
    }

    /// Publish a snapshot after every change to the store or the link state.
    pub fn with_snapshot_sender(mut self, tx: watch::Sender<Arc<CalibrationSnapshot>>) -> Self {
        self.snapshot_tx = Some(tx);
        self.publish_snapshot();
        self
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn store(&self) -> &CalibrationStore {
        &self.store
    }

    pub fn session(&self) -> &DeviceSession<L> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut DeviceSession<L> {
        &mut self.session
    }

    pub fn profile_path(&self) -> Option<&PathBuf> {
        self.profile_path.as_ref()
    }

    pub fn snapshot(&self) -> CalibrationSnapshot {
        self.store.snapshot(self.state == ConnectionState::Connected, self.seq)
    }

    /// Run one polling step. Never blocks longer than the session's read limits.
    pub fn tick(&mut self) -> TickOutcome {
        match self.state {
            ConnectionState::Connected => self.poll_values(),
            ConnectionState::Disconnected => self.try_reconnect(),
        }
    }

    fn poll_values(&mut self) -> TickOutcome {
        match self.session.query_values() {
            Ok(report) => {
                self.store.apply_report(&report);
                self.apply_stray_reports();
                if report.is_truncated() {
                    log::debug!(
                        "Values report carried {} numbers for {} sensors",
                        report.count,
                        self.store.sensor_count()
                    );
                }
                self.publish_snapshot();

                if report.is_empty() {
                    TickOutcome::Silent
                } else {
                    TickOutcome::Updated { count: report.count }
                }
            }
            Err(e) => {
                self.mark_disconnected(&e);
                TickOutcome::Disconnected
            }
        }
    }

    fn try_reconnect(&mut self) -> TickOutcome {
        if let Err(e) = self.session.reopen() {
            log::debug!("Reopen failed: {}", e);
            return TickOutcome::StillDisconnected;
        }

        log::info!("Link reopened, resynchronizing thresholds");
        self.state = ConnectionState::Connected;
        match self.on_reconnect() {
            Ok(()) => {
                self.publish_snapshot();
                TickOutcome::Reconnected
            }
            Err(e) => {
                self.mark_disconnected(&e);
                TickOutcome::Disconnected
            }
        }
    }

    /// Entry action of the `Connected` state: read the pad's thresholds once,
    /// then push the saved profile (if any) back to the pad.
    fn on_reconnect(&mut self) -> std::result::Result<(), SessionError> {
        let report = self.session.query_thresholds()?;
        if report.is_empty() {
            log::warn!("Pad did not report its thresholds");
        } else {
            self.store.apply_report(&report);
        }
        self.apply_stray_reports();

        self.reapply_profile()
    }

    fn reapply_profile(&mut self) -> std::result::Result<(), SessionError> {
        let Some(path) = self.profile_path.clone() else {
            return Ok(());
        };

        let thresholds = match config::load_profile_file(&path, self.store.sensor_count()) {
            Ok(thresholds) => thresholds,
            Err(e) => {
                log::warn!("Profile '{}' not applied: {}", path.display(), e);
                return Ok(());
            }
        };

        log::info!("Setting thresholds from profile file...");
        for (index, value) in thresholds.into_iter().enumerate() {
            let stored = match self.store.set_threshold(index, i64::from(value)) {
                Ok(stored) => stored,
                Err(e) => {
                    log::warn!("Skipping profile entry: {}", e);
                    continue;
                }
            };
            self.session.set_threshold(index, i64::from(stored))?;
        }
        self.apply_stray_reports();

        Ok(())
    }

    /// Set one threshold: the store is updated first, then the pad.
    ///
    /// Out-of-range indices are rejected before any I/O. The pad's echo is
    /// not verified; the next thresholds report confirms the value.
    pub fn set_threshold(&mut self, index: usize, value: i64) -> Result<i32> {
        let sensor_count = self.store.sensor_count();
        if index >= sensor_count {
            return Err(StoreError::IndexOutOfRange { index, sensor_count }.into());
        }
        if self.state == ConnectionState::Disconnected {
            return Err(DeviceError::NotConnected);
        }

        let stored = self.store.set_threshold(index, value)?;
        match self.session.set_threshold(index, i64::from(stored)) {
            Ok(_) => {
                self.apply_stray_reports();
                self.publish_snapshot();
                Ok(stored)
            }
            Err(e) => {
                if e.is_link_fault() {
                    self.mark_disconnected(&e);
                }
                Err(e.into())
            }
        }
    }

    /// Write the current thresholds to the profile file, if one is configured.
    pub fn save_profile(&self) -> std::result::Result<(), ProfileError> {
        match &self.profile_path {
            Some(path) => config::save_profile_file(path, &self.store),
            None => Ok(()),
        }
    }

    /// Final profile save; the port is closed when the controller drops.
    pub fn shutdown(mut self) -> std::result::Result<(), ProfileError> {
        self.finished = true;
        self.save_profile()
    }

    fn apply_stray_reports(&mut self) {
        for report in self.session.take_stray_reports() {
            self.store.apply_report(&report);
        }
    }

    fn mark_disconnected(&mut self, err: &SessionError) {
        log::error!("{}; waiting for the pad to come back", err);
        self.state = ConnectionState::Disconnected;
        self.publish_snapshot();
    }

    fn publish_snapshot(&mut self) {
        if self.snapshot_tx.is_none() {
            return;
        }
        self.seq += 1;
        let snapshot = Arc::new(self.snapshot());
        if let Some(tx) = &self.snapshot_tx {
            tx.send_replace(snapshot);
        }
    }
}

impl<L: SerialLink> Drop for ReconnectController<L> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(e) = self.save_profile() {
            log::warn!("Failed to save profile on exit: {}", e);
        }
    }
}
