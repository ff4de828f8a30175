use serde::{Deserialize, Serialize};
use vrflip_core::{Address, LedgerError, Result};

/// Per-instance settings of the wager program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoinFlipConfig {
    /// Program that serves randomness requests.
    pub oracle_program: Address,
    /// Identity request records must name as their publisher.
    pub oracle_authority: Address,
    pub min_stake: u64,
}

impl CoinFlipConfig {
    pub fn new(oracle_authority: Address) -> Self {
        Self {
            oracle_program: vrflip_oracle::id(),
            oracle_authority,
            min_stake: 1,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_stake == 0 {
            return Err(LedgerError::config("Minimum stake must be greater than 0"));
        }

        if self.oracle_authority == Address::default() {
            return Err(LedgerError::config("Oracle authority must be set"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        let config = CoinFlipConfig::new(Address::from_label("oracle"));
        assert!(config.validate().is_ok());
        assert_eq!(config.oracle_program, vrflip_oracle::id());

        let zero_stake = CoinFlipConfig {
            min_stake: 0,
            ..config.clone()
        };
        assert!(zero_stake.validate().is_err());

        let no_oracle = CoinFlipConfig::new(Address::default());
        assert!(no_oracle.validate().is_err());
    }
}
