use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Charged to the fee payer per transaction signature.
    pub signature_fee: u64,
    pub max_call_depth: usize,
    pub max_instructions: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            signature_fee: 5_000,
            max_call_depth: 4,
            max_instructions: 64,
        }
    }
}

impl LedgerConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: LedgerConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_call_depth == 0 {
            return Err(LedgerError::config("Max call depth must be greater than 0"));
        }

        if self.max_instructions == 0 {
            return Err(LedgerError::config(
                "Max instructions must be greater than 0",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        assert!(LedgerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_depth_rejected() {
        let config = LedgerConfig {
            max_call_depth: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(LedgerError::Config(_))));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"signature_fee": 10}}"#).unwrap();

        let config = LedgerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.signature_fee, 10);
        assert_eq!(config.max_call_depth, 4);
    }
}
