use crate::state::RandomValue;
use crate::{id, REQUEST_SEED, VAULT_SEED};
use serde::{Deserialize, Serialize};
use vrflip_core::{system, AccountMeta, Address, Instruction, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OracleInstruction {
    /// Accounts: `[record, fee vault, authority (signer), oracle, system program]`
    Initialize { request_bump: u8, vault_bump: u8 },
    /// Accounts: `[record, authority (signer), new authority]`
    TransferAuthority,
    /// Accounts: `[record, fee vault, authority (signer), oracle, system program]`
    RequestRandom,
    /// Accounts: `[record, oracle (signer)]`
    PublishRandom { value: RandomValue },
}

/// Request record address for `requester`, with its bump.
pub fn request_address(requester: &Address) -> Result<(Address, u8)> {
    Address::find_derived(&[REQUEST_SEED, requester.as_ref()], &id())
}

/// Fee vault address for `requester`, with its bump.
pub fn fee_vault_address(requester: &Address) -> Result<(Address, u8)> {
    Address::find_derived(&[VAULT_SEED, requester.as_ref()], &id())
}

/// Set up the request record and fee vault for `requester`, naming `oracle`
/// as the only publisher.
pub fn initialize(requester: &Address, oracle: &Address) -> Result<Instruction> {
    let (record, request_bump) = request_address(requester)?;
    let (fee_vault, vault_bump) = fee_vault_address(requester)?;
    Instruction::new(
        id(),
        &OracleInstruction::Initialize {
            request_bump,
            vault_bump,
        },
        vec![
            AccountMeta::new(record, false),
            AccountMeta::new(fee_vault, false),
            AccountMeta::new(*requester, true),
            AccountMeta::new_readonly(*oracle, false),
            AccountMeta::new_readonly(system::SYSTEM_PROGRAM_ID, false),
        ],
    )
}

pub fn transfer_authority(
    record: &Address,
    authority: &Address,
    new_authority: &Address,
) -> Result<Instruction> {
    Instruction::new(
        id(),
        &OracleInstruction::TransferAuthority,
        vec![
            AccountMeta::new(*record, false),
            AccountMeta::new_readonly(*authority, true),
            AccountMeta::new_readonly(*new_authority, false),
        ],
    )
}

pub fn request_random(
    record: &Address,
    fee_vault: &Address,
    authority: &Address,
    oracle: &Address,
) -> Result<Instruction> {
    Instruction::new(
        id(),
        &OracleInstruction::RequestRandom,
        vec![
            AccountMeta::new(*record, false),
            AccountMeta::new(*fee_vault, false),
            AccountMeta::new_readonly(*authority, true),
            AccountMeta::new(*oracle, false),
            AccountMeta::new_readonly(system::SYSTEM_PROGRAM_ID, false),
        ],
    )
}

pub fn publish_random(record: &Address, oracle: &Address, value: RandomValue) -> Result<Instruction> {
    Instruction::new(
        id(),
        &OracleInstruction::PublishRandom { value },
        vec![
            AccountMeta::new(*record, false),
            AccountMeta::new_readonly(*oracle, true),
        ],
    )
}
