//! Current sensor readings and thresholds for the connected pad.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::serial::{Report, ReportTag};

/// Hard upper bound on sensors per pad.
pub const SENSORS_MAX: usize = 64;
/// Largest value a sensor reading or threshold can take.
pub const SENSOR_MAX_VALUE: i32 = 1023;

pub fn clamp_sensor_value(value: i64) -> i32 {
    // Result lies in 0..=1023 so the narrowing cast is lossless.
    value.clamp(0, i64::from(SENSOR_MAX_VALUE)) as i32
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Sensor count must be between 1 and {max}, got {count}")]
    InvalidSensorCount { count: usize, max: usize },

    #[error("Sensor index {index} out of range (sensor count {sensor_count})")]
    IndexOutOfRange { index: usize, sensor_count: usize },
}

/// Fixed-capacity arrays of values and thresholds.
///
/// Both arrays always expose exactly `sensor_count` entries, all within
/// `0..=SENSOR_MAX_VALUE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalibrationStore {
    sensor_count: usize,
    values: [i32; SENSORS_MAX],
    thresholds: [i32; SENSORS_MAX],
}

impl CalibrationStore {
    pub fn new(sensor_count: usize) -> Result<Self, StoreError> {
        if sensor_count == 0 || sensor_count > SENSORS_MAX {
            return Err(StoreError::InvalidSensorCount {
                count: sensor_count,
                max: SENSORS_MAX,
            });
        }

        Ok(Self {
            sensor_count,
            values: [0; SENSORS_MAX],
            thresholds: [0; SENSORS_MAX],
        })
    }

    pub fn sensor_count(&self) -> usize {
        self.sensor_count
    }

    pub fn values(&self) -> &[i32] {
        &self.values[..self.sensor_count]
    }

    pub fn thresholds(&self) -> &[i32] {
        &self.thresholds[..self.sensor_count]
    }

    /// A sensor counts as pressed when its reading is strictly above its threshold.
    pub fn is_pressed(&self, index: usize) -> bool {
        index < self.sensor_count && self.values[index] > self.thresholds[index]
    }

    pub fn pressed(&self) -> Vec<bool> {
        (0..self.sensor_count).map(|i| self.is_pressed(i)).collect()
    }

    /// Fold a report into the array named by its tag.
    ///
    /// Only the first `min(numbers, sensor_count)` slots are overwritten; the
    /// rest keep their previous contents. Returns the number of slots written.
    pub fn apply_report(&mut self, report: &Report) -> usize {
        let dest = match report.tag {
            ReportTag::Values => &mut self.values,
            ReportTag::Thresholds => &mut self.thresholds,
            ReportTag::Unrecognized => return 0,
        };

        let n = report.numbers.len().min(self.sensor_count);
        for (slot, &number) in dest[..n].iter_mut().zip(&report.numbers) {
            *slot = clamp_sensor_value(i64::from(number));
        }
        n
    }

    /// Store a clamped threshold and return the value actually stored.
    pub fn set_threshold(&mut self, index: usize, value: i64) -> Result<i32, StoreError> {
        if index >= self.sensor_count {
            return Err(StoreError::IndexOutOfRange {
                index,
                sensor_count: self.sensor_count,
            });
        }

        let value = clamp_sensor_value(value);
        self.thresholds[index] = value;
        Ok(value)
    }

    pub fn snapshot(&self, connected: bool, seq: u64) -> CalibrationSnapshot {
        CalibrationSnapshot::capture(self, connected, seq)
    }
}

/// Immutable copy of the store handed to renderers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSnapshot {
    pub sensor_count: usize,
    pub values: Vec<i32>,
    pub thresholds: Vec<i32>,
    pub pressed: Vec<bool>,
    pub connected: bool,
    pub seq: u64,
    pub updated_at: DateTime<Utc>,
}

impl CalibrationSnapshot {
    pub fn capture(store: &CalibrationStore, connected: bool, seq: u64) -> Self {
        Self {
            sensor_count: store.sensor_count(),
            values: store.values().to_vec(),
            thresholds: store.thresholds().to_vec(),
            pressed: store.pressed(),
            connected,
            seq,
            updated_at: Utc::now(),
        }
    }
}
