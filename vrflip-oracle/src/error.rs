use thiserror::Error;
use vrflip_core::ProgramError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("Signer is not authorized for this request record")]
    Unauthorized,

    #[error("Request record already initialized")]
    AlreadyInitialized,

    #[error("Random value already published")]
    AlreadyFulfilled,

    #[error("Supplied address does not match its derivation seeds")]
    SeedMismatch,

    #[error("Oracle does not match the one the record was initialized with")]
    InvalidOracle,

    #[error("A request is already in flight")]
    RequestInFlight,

    #[error("No randomness has been requested")]
    NoPendingRequest,

    #[error("Fee vault cannot pay the request fee: need {need}, have {available}")]
    InsufficientFunds { need: u64, available: u64 },
}

impl From<OracleError> for ProgramError {
    fn from(err: OracleError) -> Self {
        ProgramError::custom(err)
    }
}
