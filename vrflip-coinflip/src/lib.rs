//! Two-party coin flip settled with oracle randomness
//!
//! The initiator opens a wager and escrows a stake in a program-owned
//! vault. The acceptor matches it, which asks the oracle for randomness on
//! the wager's behalf. Once the value is published either party reveals
//! the coin and the vault pays out to the winner.

pub mod config;
pub mod error;
pub mod instruction;
pub mod outcome;
pub mod processor;
pub mod state;


pub use config::CoinFlipConfig;
pub use error::CoinFlipError;
pub use instruction::{CoinAddresses, CoinFlipInstruction};
pub use outcome::{determine_winner, Side};
pub use processor::CoinFlip;
pub use state::{Coin, CoinStatus};

use vrflip_core::Address;

pub const COIN_SEED: &[u8] = b"coin-seed";
pub const VAULT_SEED: &[u8] = b"vault-seed";

/// Program id of the coin flip program.
pub fn id() -> Address {
    Address::from_label("vrflip-coinflip")
}
