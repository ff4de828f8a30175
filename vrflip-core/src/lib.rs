//! vrflip core - in-process ledger host for vrflip programs
//!
//! Provides ed25519 identities, program-derived addresses, owned accounts
//! and atomic, signed transactions with cross-program invocation. State is
//! kept in SQLite so a ledger can be reopened where it left off.

pub mod account;
pub mod address;
pub mod config;
pub mod error;
pub mod instruction;
pub mod runtime;
pub mod storage;
pub mod system;
pub mod types;

pub use account::{Account, AccountState};
pub use address::{Address, Keypair};
pub use config::LedgerConfig;
pub use error::{LedgerError, ProgramError, ProgramResult, Result};
pub use instruction::{decode_payload, AccountMeta, Instruction, Transaction};
pub use runtime::{InvokeContext, Ledger, LedgerBuilder, Program};
pub use system::SYSTEM_PROGRAM_ID;
pub use types::{Clock, Receipt};
