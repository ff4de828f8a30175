//! Built-in program that owns every plain (keypair) account. It creates
//! accounts for other programs and moves funds between plain accounts.

use crate::address::Address;
use crate::error::{LedgerError, ProgramResult, Result};
use crate::instruction::{decode_payload, AccountMeta, Instruction};
use crate::runtime::{InvokeContext, Program};
use serde::{Deserialize, Serialize};

pub const SYSTEM_PROGRAM_ID: Address = Address::new([0u8; 32]);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SystemInstruction {
    /// Accounts: `[payer (signer, writable), new account (signer, writable)]`
    CreateAccount { balance: u64, owner: Address },
    /// Accounts: `[from (signer, writable), to (writable)]`
    Transfer { amount: u64 },
}

pub fn create_account(
    payer: &Address,
    new_account: &Address,
    balance: u64,
    owner: &Address,
) -> Result<Instruction> {
    Instruction::new(
        SYSTEM_PROGRAM_ID,
        &SystemInstruction::CreateAccount {
            balance,
            owner: *owner,
        },
        vec![
            AccountMeta::new(*payer, true),
            AccountMeta::new(*new_account, true),
        ],
    )
}

pub fn transfer(from: &Address, to: &Address, amount: u64) -> Result<Instruction> {
    Instruction::new(
        SYSTEM_PROGRAM_ID,
        &SystemInstruction::Transfer { amount },
        vec![AccountMeta::new(*from, true), AccountMeta::new(*to, false)],
    )
}

pub struct SystemProgram;

impl SystemProgram {
    fn create_account(
        ctx: &mut InvokeContext<'_>,
        balance: u64,
        owner: Address,
    ) -> ProgramResult {
        let payer = ctx.key(0)?;
        let new_account = ctx.key(1)?;
        ctx.require_signer(&payer)?;
        ctx.require_signer(&new_account)?;

        // Funds sent to the address ahead of time are kept and topped up.
        if ctx.account(&new_account)?.is_initialized() {
            return Err(LedgerError::AccountAlreadyExists(new_account).into());
        }

        ctx.account_mut(&payer)?.debit(balance)?;
        let account = ctx.account_mut(&new_account)?;
        account.credit(balance)?;
        account.owner = owner;

        ctx.log(format!("created {} owned by {}", new_account, owner));
        Ok(())
    }

    fn transfer(ctx: &mut InvokeContext<'_>, amount: u64) -> ProgramResult {
        let from = ctx.key(0)?;
        let to = ctx.key(1)?;
        ctx.require_signer(&from)?;

        let source = ctx.account(&from)?;
        if !source.data.is_empty() {
            return Err(LedgerError::invalid_data(from, "transfer source must not hold data").into());
        }

        ctx.account_mut(&from)?.debit(amount)?;
        ctx.account_mut(&to)?.credit(amount)?;
        Ok(())
    }
}

impl Program for SystemProgram {
    fn id(&self) -> Address {
        SYSTEM_PROGRAM_ID
    }

    fn name(&self) -> &'static str {
        "system"
    }

    fn process(&self, ctx: &mut InvokeContext<'_>, data: &[u8]) -> ProgramResult {
        match decode_payload::<SystemInstruction>(data)? {
            SystemInstruction::CreateAccount { balance, owner } => {
                Self::create_account(ctx, balance, owner)
            }
            SystemInstruction::Transfer { amount } => Self::transfer(ctx, amount),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Keypair;
    use crate::error::ProgramError;
    use crate::instruction::Transaction;
    use crate::runtime::Ledger;

    const FUNDING: u64 = 1_000_000;

    #[tokio::test]
    async fn test_create_account_keeps_existing_balance() {
        let payer = Keypair::generate();
        let bystander = Keypair::generate();
        let target = Keypair::generate();
        let owner = Address::from_label("owner");
        let ledger = Ledger::builder()
            .genesis_account(payer.address(), FUNDING)
            .genesis_account(bystander.address(), FUNDING)
            .build()
            .await
            .unwrap();

        let dust = transfer(&bystander.address(), &target.address(), 1).unwrap();
        let tx = Transaction::new_signed(vec![dust], &[&bystander]).unwrap();
        ledger.process_transaction(&tx).await.unwrap();

        let ix = create_account(&payer.address(), &target.address(), 500, &owner).unwrap();
        let tx = Transaction::new_signed(vec![ix], &[&payer, &target]).unwrap();
        ledger.process_transaction(&tx).await.unwrap();

        let account = ledger.account(&target.address()).await.unwrap();
        assert_eq!(account.balance, 501);
        assert_eq!(account.owner, owner);
        assert!(account.data.is_empty());
    }

    #[tokio::test]
    async fn test_create_account_rejects_assigned_account() {
        let payer = Keypair::generate();
        let target = Keypair::generate();
        let owner = Address::from_label("owner");
        let ledger = Ledger::builder()
            .genesis_account(payer.address(), FUNDING)
            .build()
            .await
            .unwrap();

        let ix = create_account(&payer.address(), &target.address(), 500, &owner).unwrap();
        let tx = Transaction::new_signed(vec![ix], &[&payer, &target]).unwrap();
        ledger.process_transaction(&tx).await.unwrap();

        let again = create_account(&payer.address(), &target.address(), 500, &owner).unwrap();
        let tx = Transaction::new_signed(vec![again], &[&payer, &target]).unwrap();
        let err = ledger.process_transaction(&tx).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Program { source, .. }
                if matches!(*source, ProgramError::Ledger(LedgerError::AccountAlreadyExists(a)) if a == target.address())
        ));
        assert_eq!(ledger.balance(&target.address()).await, 500);
    }
}
