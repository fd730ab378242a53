pub mod binary;
pub mod settings;

pub use binary::{ProfileError, ThresholdProfile, PROFILE_SIGNATURE};
pub use settings::{LogLevel, PadSettings, SettingsError};

use std::fs;
use std::path::{Path, PathBuf};

use crate::calibration::CalibrationStore;

/// Read a profile file for a pad with `expected_sensor_count` sensors.
pub fn load_profile_file(path: &Path, expected_sensor_count: usize) -> Result<Vec<u32>, ProfileError> {
    let data = fs::read(path)?;
    binary::load(&data, expected_sensor_count)
}

/// Write the store's thresholds, replacing any previous file in one rename.
pub fn save_profile_file(path: &Path, store: &CalibrationStore) -> Result<(), ProfileError> {
    let tmp = temp_path(path);
    fs::write(&tmp, binary::save(store))?;
    fs::rename(&tmp, path)?;
    log::info!("Saved profile '{}'", path.display());
    Ok(())
}

/// `<path>.tmp`, next to the profile so the rename stays on one filesystem.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}
