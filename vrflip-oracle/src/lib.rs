//! vrflip oracle - randomness requests and publication
//!
//! A request record is derived per requesting party. Its current authority
//! asks for randomness, paying a fee from the record's vault, and the
//! oracle named at initialization publishes a 64-byte value exactly once
//! per request.

pub mod config;
pub mod cpi;
pub mod error;
pub mod instruction;
pub mod processor;
pub mod session;
pub mod state;

pub use config::OracleConfig;
pub use error::OracleError;
pub use instruction::{fee_vault_address, request_address, OracleInstruction};
pub use processor::RandomnessOracle;
pub use session::OracleSession;
pub use state::{read_random, RandomValue, RequestRecord, RequestStatus};

use vrflip_core::Address;

pub const REQUEST_SEED: &[u8] = b"r-seed";
pub const VAULT_SEED: &[u8] = b"v-seed";

/// Program id of the randomness oracle.
pub fn id() -> Address {
    Address::from_label("vrflip-oracle")
}
