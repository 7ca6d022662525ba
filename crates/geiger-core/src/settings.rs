//! Persisted alarm settings
//!
//! Binary format:
//! - version: 1 byte ([`SETTINGS_VERSION`])
//! - payload: postcard-encoded [`AlarmThresholds`]
//!
//! The record is padded to [`SETTINGS_RECORD_LEN`] bytes so it can live in a
//! fixed-size flash or file slot.

use log::warn;
use thiserror_no_std::Error;

use crate::alarm::AlarmThresholds;

/// Current on-storage layout version
pub const SETTINGS_VERSION: u8 = 1;

/// Size of one stored settings record (version byte + payload + padding)
pub const SETTINGS_RECORD_LEN: usize = 16;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Settings record is empty")]
    Empty,
    #[error("Unsupported settings version {0}")]
    UnsupportedVersion(u8),
    #[error("Settings payload could not be decoded")]
    Decode,
    #[error("Settings do not fit in a {0}-byte record")]
    Encode(usize),
}

/// Encode thresholds into a fixed-size record.
pub fn encode(thresholds: &AlarmThresholds) -> Result<[u8; SETTINGS_RECORD_LEN], SettingsError> {
    let mut record = [0u8; SETTINGS_RECORD_LEN];
    record[0] = SETTINGS_VERSION;
    postcard::to_slice(thresholds, &mut record[1..])
        .map_err(|_| SettingsError::Encode(SETTINGS_RECORD_LEN))?;
    Ok(record)
}

/// Decode a stored record. Trailing padding is ignored.
pub fn decode(bytes: &[u8]) -> Result<AlarmThresholds, SettingsError> {
    let (&version, payload) = bytes.split_first().ok_or(SettingsError::Empty)?;
    if version != SETTINGS_VERSION {
        return Err(SettingsError::UnsupportedVersion(version));
    }

    let (thresholds, _padding) =
        postcard::take_from_bytes::<AlarmThresholds>(payload).map_err(|_| SettingsError::Decode)?;
    Ok(thresholds)
}

/// Decode a stored record, treating anything unreadable as "no thresholds".
///
/// The alarm evaluator reads `None` as disabled.
pub fn load_or_disabled(bytes: &[u8]) -> Option<AlarmThresholds> {
    match decode(bytes) {
        Ok(thresholds) => Some(thresholds),
        Err(e) => {
            warn!("Ignoring stored alarm settings: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_thresholds_survive_reload() {
        let thresholds = AlarmThresholds {
            current_rate_limit: 2.5,
            cumulative_dose_limit: 0.75,
            enabled: true,
        };

        let record = encode(&thresholds).unwrap();
        assert_eq!(record[0], SETTINGS_VERSION);
        assert_eq!(decode(&record), Ok(thresholds));
    }

    #[test]
    fn test_rejects_unknown_version() {
        let mut record = encode(&AlarmThresholds::default()).unwrap();
        record[0] = 7;

        assert_eq!(decode(&record), Err(SettingsError::UnsupportedVersion(7)));
        assert_eq!(load_or_disabled(&record), None);
    }

    #[test]
    fn test_blank_storage_means_disabled() {
        assert_eq!(decode(&[]), Err(SettingsError::Empty));
        // Erased flash reads back as 0xFF
        assert_eq!(load_or_disabled(&[0xFF; SETTINGS_RECORD_LEN]), None);
    }

    #[test]
    fn test_truncated_payload() {
        let record = encode(&AlarmThresholds::default()).unwrap();
        assert_eq!(decode(&record[..3]), Err(SettingsError::Decode));
    }
}
