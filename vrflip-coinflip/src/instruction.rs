use crate::{id, COIN_SEED, VAULT_SEED};
use serde::{Deserialize, Serialize};
use vrflip_core::{AccountMeta, Address, Instruction, Result, SYSTEM_PROGRAM_ID};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CoinFlipInstruction {
    /// Accounts: `[coin, vault, requester, initiator (signer), acceptor, oracle,
    /// oracle fee vault, oracle program, system program]`
    CreateCoin {
        coin_bump: u8,
        req_bump: u8,
        vault_bump: u8,
        amount: u64,
    },
    /// Accounts: `[acceptor (signer), vault, initiator, requester, oracle,
    /// oracle fee vault, oracle program, system program, coin]`
    ApproveFlip,
    /// Accounts: `[initiator, acceptor, vault, requester, caller (signer),
    /// oracle program, system program, coin]`
    RevealCoin,
    /// Accounts: `[coin, vault, initiator (signer), requester, oracle program]`
    CloseCoin,
}

/// Every derived address a wager opened by one initiator touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoinAddresses {
    pub coin: Address,
    pub coin_bump: u8,
    pub vault: Address,
    pub vault_bump: u8,
    pub requester: Address,
    pub req_bump: u8,
    pub oracle_fee_vault: Address,
}

impl CoinAddresses {
    pub fn derive(initiator: &Address) -> Result<Self> {
        let (coin, coin_bump) = Address::find_derived(&[COIN_SEED, initiator.as_ref()], &id())?;
        let (vault, vault_bump) = Address::find_derived(&[VAULT_SEED, initiator.as_ref()], &id())?;
        let (requester, req_bump) = vrflip_oracle::request_address(initiator)?;
        let (oracle_fee_vault, _) = vrflip_oracle::fee_vault_address(initiator)?;

        Ok(Self {
            coin,
            coin_bump,
            vault,
            vault_bump,
            requester,
            req_bump,
            oracle_fee_vault,
        })
    }
}

pub fn create_coin(
    initiator: &Address,
    acceptor: &Address,
    oracle: &Address,
    amount: u64,
) -> Result<Instruction> {
    let addresses = CoinAddresses::derive(initiator)?;
    Instruction::new(
        id(),
        &CoinFlipInstruction::CreateCoin {
            coin_bump: addresses.coin_bump,
            req_bump: addresses.req_bump,
            vault_bump: addresses.vault_bump,
            amount,
        },
        vec![
            AccountMeta::new(addresses.coin, false),
            AccountMeta::new(addresses.vault, false),
            AccountMeta::new(addresses.requester, false),
            AccountMeta::new(*initiator, true),
            AccountMeta::new_readonly(*acceptor, false),
            AccountMeta::new_readonly(*oracle, false),
            AccountMeta::new_readonly(addresses.oracle_fee_vault, false),
            AccountMeta::new_readonly(vrflip_oracle::id(), false),
            AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
        ],
    )
}

pub fn approve_flip(acceptor: &Address, initiator: &Address, oracle: &Address) -> Result<Instruction> {
    let addresses = CoinAddresses::derive(initiator)?;
    Instruction::new(
        id(),
        &CoinFlipInstruction::ApproveFlip,
        vec![
            AccountMeta::new(*acceptor, true),
            AccountMeta::new(addresses.vault, false),
            AccountMeta::new_readonly(*initiator, false),
            AccountMeta::new(addresses.requester, false),
            AccountMeta::new(*oracle, false),
            AccountMeta::new(addresses.oracle_fee_vault, false),
            AccountMeta::new_readonly(vrflip_oracle::id(), false),
            AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
            AccountMeta::new(addresses.coin, false),
        ],
    )
}

pub fn reveal_coin(caller: &Address, initiator: &Address, acceptor: &Address) -> Result<Instruction> {
    let addresses = CoinAddresses::derive(initiator)?;
    Instruction::new(
        id(),
        &CoinFlipInstruction::RevealCoin,
        vec![
            AccountMeta::new(*initiator, false),
            AccountMeta::new(*acceptor, false),
            AccountMeta::new(addresses.vault, false),
            AccountMeta::new_readonly(addresses.requester, false),
            AccountMeta::new_readonly(*caller, true),
            AccountMeta::new_readonly(vrflip_oracle::id(), false),
            AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
            AccountMeta::new(addresses.coin, false),
        ],
    )
}

pub fn close_coin(initiator: &Address) -> Result<Instruction> {
    let addresses = CoinAddresses::derive(initiator)?;
    Instruction::new(
        id(),
        &CoinFlipInstruction::CloseCoin,
        vec![
            AccountMeta::new(addresses.coin, false),
            AccountMeta::new(addresses.vault, false),
            AccountMeta::new(*initiator, true),
            AccountMeta::new(addresses.requester, false),
            AccountMeta::new_readonly(vrflip_oracle::id(), false),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addresses_are_per_initiator() {
        let alice = Address::from_label("alice");
        let bob = Address::from_label("bob");

        let a = CoinAddresses::derive(&alice).unwrap();
        let b = CoinAddresses::derive(&bob).unwrap();
        assert_eq!(a, CoinAddresses::derive(&alice).unwrap());
        assert_ne!(a.coin, b.coin);
        assert_ne!(a.coin, a.vault);
        assert!(!a.coin.is_on_curve());
        assert!(!a.vault.is_on_curve());
        assert_eq!(a.requester, vrflip_oracle::request_address(&alice).unwrap().0);
    }

    #[test]
    fn test_create_coin_account_order() {
        let initiator = Address::from_label("initiator");
        let acceptor = Address::from_label("acceptor");
        let oracle = Address::from_label("oracle");
        let ix = create_coin(&initiator, &acceptor, &oracle, 10).unwrap();

        assert_eq!(ix.program_id, id());
        assert_eq!(ix.accounts.len(), 9);
        assert!(ix.accounts[3].is_signer);
        assert_eq!(ix.accounts[3].address, initiator);
        assert_eq!(ix.accounts[7].address, vrflip_oracle::id());
    }
}
