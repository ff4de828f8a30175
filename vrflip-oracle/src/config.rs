use serde::{Deserialize, Serialize};
use vrflip_core::{LedgerError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Paid from the fee vault to the oracle on every request.
    pub request_fee: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            request_fee: 50_000,
        }
    }
}

impl OracleConfig {
    pub fn validate(&self) -> Result<()> {
        if self.request_fee == 0 {
            return Err(LedgerError::config("Request fee must be greater than 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        assert!(OracleConfig::default().validate().is_ok());
        assert!(OracleConfig { request_fee: 0 }.validate().is_err());
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: OracleConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.request_fee, OracleConfig::default().request_fee);
    }
}
