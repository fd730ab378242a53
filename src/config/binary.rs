use serde::{Deserialize, Serialize};

use crate::calibration::CalibrationStore;

/// First 8 bytes of every profile file, trailing space included.
pub const PROFILE_SIGNATURE: [u8; 8] = *b"danspad ";

const SIGNATURE_SIZE: usize = PROFILE_SIGNATURE.len();
const COUNT_SIZE: usize = 4;
const THRESHOLD_SIZE: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("Profile signature does not match")]
    SignatureMismatch,

    #[error("Invalid profile file: needed {needed} bytes, found {available}")]
    Truncated { needed: usize, available: usize },

    #[error("Profile has {stored} thresholds, connected pad has {expected}")]
    SensorCountMismatch { stored: u32, expected: usize },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Saved thresholds of one pad.
///
/// Layout (little-endian): signature, `u32` sensor count, then one `u32`
/// threshold per sensor in index order. No version field, no checksum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdProfile {
    pub thresholds: Vec<u32>,
}

impl ThresholdProfile {
    pub fn from_store(store: &CalibrationStore) -> Self {
        Self {
            thresholds: store
                .thresholds()
                .iter()
                .map(|&t| u32::try_from(t).unwrap_or(0))
                .collect(),
        }
    }

    pub fn sensor_count(&self) -> usize {
        self.thresholds.len()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer =
            Vec::with_capacity(SIGNATURE_SIZE + COUNT_SIZE + self.thresholds.len() * THRESHOLD_SIZE);

        buffer.extend_from_slice(&PROFILE_SIGNATURE);
        buffer.extend_from_slice(&(self.thresholds.len() as u32).to_le_bytes());
        for threshold in &self.thresholds {
            buffer.extend_from_slice(&threshold.to_le_bytes());
        }

        buffer
    }

    /// Parse a profile written for a pad with `expected_sensor_count` sensors.
    ///
    /// Checks run in file order: signature, count field, count match, data.
    /// Bytes after the last threshold are ignored.
    pub fn from_bytes(data: &[u8], expected_sensor_count: usize) -> Result<Self, ProfileError> {
        match data.get(..SIGNATURE_SIZE) {
            Some(signature) if signature == PROFILE_SIGNATURE => {}
            _ => return Err(ProfileError::SignatureMismatch),
        }

        let stored = read_u32_le(data, SIGNATURE_SIZE)?;
        if stored as usize != expected_sensor_count {
            return Err(ProfileError::SensorCountMismatch {
                stored,
                expected: expected_sensor_count,
            });
        }

        let start = SIGNATURE_SIZE + COUNT_SIZE;
        let end = start + expected_sensor_count * THRESHOLD_SIZE;
        let body = data.get(start..end).ok_or(ProfileError::Truncated {
            needed: end,
            available: data.len(),
        })?;

        let thresholds = body
            .chunks_exact(THRESHOLD_SIZE)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        Ok(Self { thresholds })
    }
}

fn read_u32_le(data: &[u8], offset: usize) -> Result<u32, ProfileError> {
    let end = offset + COUNT_SIZE;
    let bytes = data.get(offset..end).ok_or(ProfileError::Truncated {
        needed: end,
        available: data.len(),
    })?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Serialize the store's thresholds.
pub fn save(store: &CalibrationStore) -> Vec<u8> {
    ThresholdProfile::from_store(store).to_bytes()
}

/// Parse saved thresholds; exactly `expected_sensor_count` values on success.
pub fn load(data: &[u8], expected_sensor_count: usize) -> Result<Vec<u32>, ProfileError> {
    ThresholdProfile::from_bytes(data, expected_sensor_count).map(|p| p.thresholds)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(thresholds: &[i64]) -> CalibrationStore {
        let mut store = CalibrationStore::new(thresholds.len()).unwrap();
        for (i, &t) in thresholds.iter().enumerate() {
            store.set_threshold(i, t).unwrap();
        }
        store
    }

    #[test]
    fn test_layout_matches_file_format() {
        let bytes = save(&store_with(&[1, 1023]));
        assert_eq!(&bytes[..8], b"danspad ");
        assert_eq!(&bytes[8..12], &[2, 0, 0, 0]);
        assert_eq!(&bytes[12..16], &[1, 0, 0, 0]);
        assert_eq!(&bytes[16..20], &[0xFF, 0x03, 0, 0]);
        assert_eq!(bytes.len(), 20);
    }

    #[test]
    fn test_profile_roundtrip() {
        let store = store_with(&[0, 17, 512, 1023]);
        let loaded = load(&save(&store), store.sensor_count()).unwrap();
        let expected: Vec<u32> = store.thresholds().iter().map(|&t| t as u32).collect();
        assert_eq!(loaded, expected);
    }

    #[test]
    fn test_signature_mismatch() {
        let mut bytes = save(&store_with(&[5]));
        bytes[7] = 0;
        assert!(matches!(load(&bytes, 1), Err(ProfileError::SignatureMismatch)));
        assert!(matches!(load(b"dans", 1), Err(ProfileError::SignatureMismatch)));
        assert!(matches!(load(b"", 1), Err(ProfileError::SignatureMismatch)));
    }

    #[test]
    fn test_missing_count_is_truncated() {
        let bytes = b"danspad \x03\x00";
        assert!(matches!(
            load(bytes, 3),
            Err(ProfileError::Truncated { needed: 12, available: 10 })
        ));
    }

    #[test]
    fn test_sensor_count_mismatch() {
        let bytes = save(&store_with(&[1, 2, 3, 4]));
        assert!(matches!(
            load(&bytes, 3),
            Err(ProfileError::SensorCountMismatch { stored: 4, expected: 3 })
        ));
    }

    #[test]
    fn test_short_threshold_data_is_truncated() {
        let mut bytes = save(&store_with(&[1, 2, 3]));
        bytes.truncate(bytes.len() - 2);
        assert!(matches!(
            load(&bytes, 3),
            Err(ProfileError::Truncated { needed: 24, available: 22 })
        ));
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let mut bytes = save(&store_with(&[9, 8]));
        bytes.extend_from_slice(b"junk");
        assert_eq!(load(&bytes, 2).unwrap(), vec![9, 8]);
    }
}
