use super::Program;
use crate::account::{Account, AccountState};
use crate::address::Address;
use crate::config::LedgerConfig;
use crate::error::{LedgerError, Result};
use crate::instruction::{AccountMeta, Instruction};
use crate::types::Clock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Working copy of every account a transaction touches. Dropped on failure,
/// written back on success.
#[derive(Debug, Default)]
pub(crate) struct AccountCache {
    accounts: HashMap<Address, Account>,
}

impl AccountCache {
    pub(crate) fn load(committed: &HashMap<Address, Account>, addresses: &[Address]) -> Self {
        let accounts = addresses
            .iter()
            .map(|address| (*address, committed.get(address).cloned().unwrap_or_default()))
            .collect();
        Self { accounts }
    }

    pub(crate) fn get(&self, address: &Address) -> Result<&Account> {
        self.accounts
            .get(address)
            .ok_or(LedgerError::AccountNotInInstruction(*address))
    }

    pub(crate) fn get_mut(&mut self, address: &Address) -> Result<&mut Account> {
        self.accounts
            .get_mut(address)
            .ok_or(LedgerError::AccountNotInInstruction(*address))
    }

    pub(crate) fn into_accounts(self) -> HashMap<Address, Account> {
        self.accounts
    }
}

pub(crate) struct Executor {
    pub(crate) programs: HashMap<Address, Arc<dyn Program>>,
    pub(crate) config: LedgerConfig,
    pub(crate) clock: Clock,
}

impl Executor {
    pub(crate) fn execute(
        &self,
        cache: &mut AccountCache,
        instruction: &Instruction,
        signers: &HashSet<Address>,
        depth: usize,
        logs: &mut Vec<String>,
    ) -> Result<()> {
        if depth > self.config.max_call_depth {
            return Err(LedgerError::CallDepthExceeded {
                depth,
                limit: self.config.max_call_depth,
            });
        }

        let program = self
            .programs
            .get(&instruction.program_id)
            .cloned()
            .ok_or(LedgerError::ProgramNotFound(instruction.program_id))?;

        let mut flags: HashMap<Address, (bool, bool)> = HashMap::new();
        for meta in &instruction.accounts {
            if meta.is_signer && !signers.contains(&meta.address) {
                return Err(LedgerError::MissingSignature(meta.address));
            }
            let entry = flags.entry(meta.address).or_insert((false, false));
            entry.0 |= meta.is_signer;
            entry.1 |= meta.is_writable;
        }

        let mut pre = HashMap::new();
        for address in flags.keys() {
            pre.insert(*address, cache.get(address)?.clone());
        }

        logs.push(format!("Program {} ({}) invoke [{}]", program.id(), program.name(), depth));

        let mut ctx = InvokeContext {
            executor: self,
            cache,
            program_id: instruction.program_id,
            metas: &instruction.accounts,
            flags,
            checkpoint: pre.clone(),
            depth,
            logs,
        };

        if let Err(source) = program.process(&mut ctx, &instruction.data) {
            ctx.logs
                .push(format!("Program {} failed: {}", instruction.program_id, source));
            return Err(LedgerError::Program {
                program: instruction.program_id,
                source: Box::new(source),
            });
        }

        ctx.verify_changes()?;

        let before: u128 = pre.values().map(|account| account.balance as u128).sum();
        let mut after: u128 = 0;
        for address in pre.keys() {
            after += ctx.cache.get(address)?.balance as u128;
        }
        if before != after {
            return Err(LedgerError::UnbalancedInstruction { before, after });
        }

        ctx.logs
            .push(format!("Program {} success", instruction.program_id));
        Ok(())
    }
}

/// Everything a program can see and touch while processing one instruction.
pub struct InvokeContext<'a> {
    executor: &'a Executor,
    cache: &'a mut AccountCache,
    program_id: Address,
    metas: &'a [AccountMeta],
    // address -> (is_signer, is_writable)
    flags: HashMap<Address, (bool, bool)>,
    checkpoint: HashMap<Address, Account>,
    depth: usize,
    logs: &'a mut Vec<String>,
}

impl<'a> InvokeContext<'a> {
    pub fn program_id(&self) -> Address {
        self.program_id
    }

    pub fn clock(&self) -> Clock {
        self.executor.clock
    }

    pub fn accounts(&self) -> &[AccountMeta] {
        self.metas
    }

    /// Address at position `index` of the instruction's account list.
    pub fn key(&self, index: usize) -> Result<Address> {
        self.metas
            .get(index)
            .map(|meta| meta.address)
            .ok_or(LedgerError::NotEnoughAccountKeys {
                expected: index + 1,
                actual: self.metas.len(),
            })
    }

    pub fn is_signer(&self, address: &Address) -> bool {
        self.flags.get(address).is_some_and(|(signer, _)| *signer)
    }

    pub fn is_writable(&self, address: &Address) -> bool {
        self.flags.get(address).is_some_and(|(_, writable)| *writable)
    }

    pub fn require_signer(&self, address: &Address) -> Result<()> {
        if !self.is_signer(address) {
            return Err(LedgerError::MissingSignature(*address));
        }
        Ok(())
    }

    pub fn account(&self, address: &Address) -> Result<&Account> {
        if !self.flags.contains_key(address) {
            return Err(LedgerError::AccountNotInInstruction(*address));
        }
        self.cache.get(address)
    }

    pub fn account_mut(&mut self, address: &Address) -> Result<&mut Account> {
        if !self.flags.contains_key(address) {
            return Err(LedgerError::AccountNotInInstruction(*address));
        }
        if !self.is_writable(address) {
            return Err(LedgerError::ReadonlyModified(*address));
        }
        self.cache.get_mut(address)
    }

    /// Decode typed state from an account owned by `owner`.
    pub fn load<T: AccountState>(&self, address: &Address, owner: &Address) -> Result<T> {
        let account = self.account(address)?;
        if account.owner != *owner {
            return Err(LedgerError::IllegalOwner {
                address: *address,
                expected: *owner,
                actual: account.owner,
            });
        }
        T::try_from_account(address, account)
    }

    pub fn store<T: AccountState>(&mut self, address: &Address, state: &T) -> Result<()> {
        let data = state.to_account_data()?;
        self.account_mut(address)?.data = data;
        Ok(())
    }

    /// Move funds out of an account this program owns.
    pub fn transfer_owned(&mut self, from: &Address, to: &Address, amount: u64) -> Result<()> {
        let program_id = self.program_id;
        let source = self.account_mut(from)?;
        if source.owner != program_id {
            return Err(LedgerError::ExternalBalanceSpent(*from));
        }
        source.debit(amount)?;
        self.account_mut(to)?.credit(amount)?;
        Ok(())
    }

    pub fn log(&mut self, message: impl Into<String>) {
        self.logs.push(format!("Program log: {}", message.into()));
    }

    pub fn invoke(&mut self, instruction: &Instruction) -> Result<()> {
        self.invoke_signed(instruction, &[])
    }

    /// Call another program. Accounts derived from `signer_seeds` under this
    /// program's id count as signers in the callee.
    pub fn invoke_signed(
        &mut self,
        instruction: &Instruction,
        signer_seeds: &[&[&[u8]]],
    ) -> Result<()> {
        if !self.flags.contains_key(&instruction.program_id) {
            return Err(LedgerError::AccountNotInInstruction(instruction.program_id));
        }

        let derived = signer_seeds
            .iter()
            .map(|seeds| Address::create_derived(seeds, &self.program_id))
            .collect::<Result<Vec<_>>>()?;

        let mut signers = HashSet::new();
        for meta in &instruction.accounts {
            let (caller_signer, caller_writable) = self
                .flags
                .get(&meta.address)
                .copied()
                .ok_or(LedgerError::AccountNotInInstruction(meta.address))?;

            if meta.is_writable && !caller_writable {
                return Err(LedgerError::PrivilegeEscalation(meta.address));
            }
            if meta.is_signer {
                if caller_signer || derived.contains(&meta.address) {
                    signers.insert(meta.address);
                } else {
                    return Err(LedgerError::PrivilegeEscalation(meta.address));
                }
            }
        }

        self.verify_changes()?;
        self.executor.execute(
            &mut *self.cache,
            instruction,
            &signers,
            self.depth + 1,
            &mut *self.logs,
        )?;

        for (address, account) in self.checkpoint.iter_mut() {
            *account = self.cache.get(address)?.clone();
        }
        Ok(())
    }

    fn verify_changes(&self) -> Result<()> {
        for (address, before) in &self.checkpoint {
            let after = self.cache.get(address)?;
            verify_account_change(&self.program_id, address, self.is_writable(address), before, after)?;
        }
        Ok(())
    }
}

fn verify_account_change(
    program_id: &Address,
    address: &Address,
    writable: bool,
    before: &Account,
    after: &Account,
) -> Result<()> {
    if before == after {
        return Ok(());
    }
    if !writable {
        return Err(LedgerError::ReadonlyModified(*address));
    }

    let owned = before.owner == *program_id;
    if before.owner != after.owner && (!owned || !after.data.is_empty()) {
        return Err(LedgerError::IllegalOwnerChange(*address));
    }
    if before.data != after.data && !owned {
        return Err(LedgerError::ExternalDataModified(*address));
    }
    if after.balance < before.balance && !owned {
        return Err(LedgerError::ExternalBalanceSpent(*address));
    }
    Ok(())
}
