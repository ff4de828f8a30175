use crate::address::Address;
use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Missing signature for {0}")]
    MissingSignature(Address),

    #[error("Invalid signature for {0}")]
    InvalidSignature(Address),

    #[error("Transaction {0} was already processed")]
    DuplicateTransaction(Uuid),

    #[error("Transaction has no instructions")]
    EmptyTransaction,

    #[error("Transaction has {count} instructions, limit is {limit}")]
    TooManyInstructions { count: usize, limit: usize },

    #[error("Insufficient funds: need {need}, have {available}")]
    InsufficientFunds { need: u64, available: u64 },

    #[error("Account not found: {0}")]
    AccountNotFound(Address),

    #[error("Account already exists: {0}")]
    AccountAlreadyExists(Address),

    #[error("Account {0} is not part of this instruction")]
    AccountNotInInstruction(Address),

    #[error("Instruction expects at least {expected} accounts, got {actual}")]
    NotEnoughAccountKeys { expected: usize, actual: usize },

    #[error("Invalid account data for {address}: {reason}")]
    InvalidAccountData { address: Address, reason: String },

    #[error("Account {address} is owned by {actual}, expected {expected}")]
    IllegalOwner {
        address: Address,
        expected: Address,
        actual: Address,
    },

    #[error("Read-only account {0} was modified")]
    ReadonlyModified(Address),

    #[error("Data of account {0} was modified by a program that does not own it")]
    ExternalDataModified(Address),

    #[error("Balance of account {0} was spent by a program that does not own it")]
    ExternalBalanceSpent(Address),

    #[error("Owner of account {0} was changed illegally")]
    IllegalOwnerChange(Address),

    #[error("Instruction changed total balance from {before} to {after}")]
    UnbalancedInstruction { before: u128, after: u128 },

    #[error("Cross-program call escalated privileges of {0}")]
    PrivilegeEscalation(Address),

    #[error("Program not found: {0}")]
    ProgramNotFound(Address),

    #[error("Call depth {depth} exceeds limit {limit}")]
    CallDepthExceeded { depth: usize, limit: usize },

    #[error("Invalid derivation seeds: {0}")]
    InvalidSeeds(String),

    #[error("Arithmetic overflow")]
    ArithmeticOverflow,

    #[error("Program {program} failed: {source}")]
    Program {
        program: Address,
        #[source]
        source: Box<ProgramError>,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LedgerError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn invalid_seeds(msg: impl Into<String>) -> Self {
        Self::InvalidSeeds(msg.into())
    }

    pub fn invalid_data(address: Address, reason: impl Into<String>) -> Self {
        Self::InvalidAccountData {
            address,
            reason: reason.into(),
        }
    }

    /// Find a program-specific error anywhere in the failure chain, including
    /// failures raised inside cross-program calls.
    pub fn program_error<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        let mut current: Option<&(dyn std::error::Error + 'static)> = Some(self);
        while let Some(err) = current {
            if let Some(found) = err.downcast_ref::<E>() {
                return Some(found);
            }
            current = err.source();
        }
        None
    }
}

/// Failure returned by a program while it processes an instruction.
#[derive(Error, Debug)]
pub enum ProgramError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("{0}")]
    Custom(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl ProgramError {
    pub fn custom<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Custom(Box::new(err))
    }
}

pub type ProgramResult = std::result::Result<(), ProgramError>;
