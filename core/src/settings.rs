//! Protocol settings shared by every node of a network
//!
//! Values are expressed in human units in the JSON file and converted to
//! nanoseconds by the accessors, since every ledger timestamp is in nanoseconds.

use crate::error::SettingsError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const NANOSECONDS_PER_SECOND: i64 = 1_000_000_000;
const SECONDS_PER_DAY: f64 = 24. * 3600.;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolSettings {
    /// Maximum number of blocks returned by a single blocks request
    pub blocks_count_limit: u64,
    /// Reward of the genesis block, in smallest units
    pub genesis_amount: u64,
    pub half_life_in_days: f64,
    /// Reserved: served to neighbors so that settings files stay
    /// interchangeable, but no value computation reads it
    pub income_base: u64,
    /// Value every yielding output converges to
    pub income_limit: u64,
    pub minimal_transaction_fee: u64,
    /// Time between two blocks
    pub validation_interval_in_seconds: i64,
    /// Maximum wait for a neighbor's blocks during reconciliation
    pub validation_timeout_in_seconds: i64,
    /// Reconciliation rounds per validation interval
    pub verifications_count_per_validation: i64,
}

impl Default for ProtocolSettings {
    fn default() -> Self {
        Self {
            blocks_count_limit: 1_000,
            genesis_amount: 100_000_000_000_000,
            half_life_in_days: 373.59,
            income_base: 50_000_000_000,
            income_limit: 10_000_000_000_000,
            minimal_transaction_fee: 1_000,
            validation_interval_in_seconds: 60,
            validation_timeout_in_seconds: 5,
            verifications_count_per_validation: 6,
        }
    }
}

impl ProtocolSettings {
    /// Load and validate settings from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let contents = std::fs::read_to_string(path)?;
        let settings: ProtocolSettings = serde_json::from_str(&contents)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if !(self.half_life_in_days > 0.) {
            return Err(SettingsError::Invalid(format!(
                "half life must be positive, got {} days",
                self.half_life_in_days
            )));
        }
        if self.validation_interval_in_seconds <= 0 {
            return Err(SettingsError::Invalid(format!(
                "validation interval must be positive, got {}s",
                self.validation_interval_in_seconds
            )));
        }
        if self.validation_timeout_in_seconds < 0 {
            return Err(SettingsError::Invalid(format!(
                "validation timeout must not be negative, got {}s",
                self.validation_timeout_in_seconds
            )));
        }
        if self.verifications_count_per_validation < 1 {
            return Err(SettingsError::Invalid(
                "at least one verification per validation is required".to_string(),
            ));
        }
        if self.blocks_count_limit == 0 {
            return Err(SettingsError::Invalid(
                "blocks count limit must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Serialized form served to neighbors
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn half_life_ns(&self) -> f64 {
        self.half_life_in_days * SECONDS_PER_DAY * NANOSECONDS_PER_SECOND as f64
    }

    /// Timestamp increment between two consecutive blocks, in nanoseconds
    pub fn block_period(&self) -> i64 {
        self.validation_interval_in_seconds
            .saturating_mul(NANOSECONDS_PER_SECOND)
    }

    pub fn validation_timer(&self) -> Duration {
        Duration::from_secs(self.validation_interval_in_seconds.max(0) as u64)
    }

    pub fn validation_timeout(&self) -> Duration {
        Duration::from_secs(self.validation_timeout_in_seconds.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_settings_are_valid() {
        assert!(ProtocolSettings::default().validate().is_ok());
    }

    #[test]
    fn test_unit_conversions() {
        let settings = ProtocolSettings {
            half_life_in_days: 1.,
            validation_interval_in_seconds: 60,
            validation_timeout_in_seconds: 5,
            ..Default::default()
        };

        assert_eq!(settings.half_life_ns(), 86_400_000_000_000.);
        assert_eq!(settings.block_period(), 60_000_000_000);
        assert_eq!(settings.validation_timer(), Duration::from_secs(60));
        assert_eq!(settings.validation_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_load_from_file() {
        let settings = ProtocolSettings {
            genesis_amount: 1000,
            ..Default::default()
        };
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&settings.to_bytes().unwrap()).unwrap();

        let loaded = ProtocolSettings::load(file.path()).unwrap();

        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_served_settings_keep_reserved_income_base() {
        let settings = ProtocolSettings {
            income_base: 7,
            ..Default::default()
        };

        let served: serde_json::Value = serde_json::from_slice(&settings.to_bytes().unwrap()).unwrap();

        assert_eq!(served["income_base"], 7);
        assert_eq!(served["income_limit"], settings.income_limit);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let error = ProtocolSettings::load(dir.path().join("missing.json")).unwrap_err();

        assert!(matches!(error, SettingsError::Io(_)));
        assert!(error.to_string().starts_with("unable to open file"));
    }

    #[test]
    fn test_load_malformed_file_fails() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{\"genesis_amount\": \"lots\"}").unwrap();

        let error = ProtocolSettings::load(file.path()).unwrap_err();

        assert!(error.to_string().starts_with("unable to unmarshal"));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let settings = ProtocolSettings {
            validation_interval_in_seconds: 0,
            ..Default::default()
        };
        assert!(matches!(settings.validate(), Err(SettingsError::Invalid(_))));

        let settings = ProtocolSettings {
            half_life_in_days: -1.,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }
}
