//! Helpers for programs that call the oracle from inside their own
//! instructions. The caller must list the oracle program, and the system
//! program for requests, among its own accounts.

use crate::instruction;
use vrflip_core::{Address, InvokeContext, Result};

pub struct RequestRandomAccounts {
    pub requester: Address,
    pub fee_vault: Address,
    /// Current request authority. Usually a derived address of the caller,
    /// proven through `signer_seeds`.
    pub authority: Address,
    pub oracle: Address,
}

pub struct TransferAuthorityAccounts {
    pub requester: Address,
    pub authority: Address,
    pub new_authority: Address,
}

pub fn request_random(
    ctx: &mut InvokeContext<'_>,
    accounts: &RequestRandomAccounts,
    signer_seeds: &[&[&[u8]]],
) -> Result<()> {
    let ix = instruction::request_random(
        &accounts.requester,
        &accounts.fee_vault,
        &accounts.authority,
        &accounts.oracle,
    )?;
    ctx.invoke_signed(&ix, signer_seeds)
}

pub fn transfer_authority(
    ctx: &mut InvokeContext<'_>,
    accounts: &TransferAuthorityAccounts,
    signer_seeds: &[&[&[u8]]],
) -> Result<()> {
    let ix = instruction::transfer_authority(
        &accounts.requester,
        &accounts.authority,
        &accounts.new_authority,
    )?;
    ctx.invoke_signed(&ix, signer_seeds)
}
