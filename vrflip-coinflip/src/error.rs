use crate::state::CoinStatus;
use thiserror::Error;
use vrflip_core::ProgramError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoinFlipError {
    #[error("Supplied address does not match its derivation seeds")]
    SeedMismatch,

    #[error("Request record is not served by the expected oracle")]
    InvalidOracle,

    #[error("Invalid wager state: {0:?}")]
    InvalidState(CoinStatus),

    #[error("Caller is not authorized for this wager")]
    Unauthorized,

    #[error("Insufficient balance: need {need}, have {available}")]
    InsufficientFunds { need: u64, available: u64 },

    #[error("Wager already exists")]
    AlreadyInitialized,

    #[error("Randomness has not been published yet")]
    NotFulfilled,

    #[error("Acceptor must differ from the initiator")]
    InvalidAcceptor,

    #[error("Stake {stake} is below the minimum of {min}")]
    InvalidStake { stake: u64, min: u64 },

    #[error("Request record already has a request in flight")]
    StaleRequest,
}

impl From<CoinFlipError> for ProgramError {
    fn from(err: CoinFlipError) -> Self {
        ProgramError::custom(err)
    }
}
