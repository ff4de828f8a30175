pub mod context;

pub use context::InvokeContext;

use crate::account::{Account, AccountState};
use crate::address::Address;
use crate::config::LedgerConfig;
use crate::error::{LedgerError, ProgramResult, Result};
use crate::instruction::Transaction;
use crate::storage::{AccountStore, Storage, TransactionStore};
use crate::system::{SystemProgram, SYSTEM_PROGRAM_ID};
use crate::types::{Clock, Receipt};
use chrono::Utc;
use context::{AccountCache, Executor};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// On-ledger program. Processing is synchronous and must only touch the
/// ledger through the supplied context.
pub trait Program: Send + Sync {
    fn id(&self) -> Address;
    fn name(&self) -> &'static str;
    fn process(&self, ctx: &mut InvokeContext<'_>, data: &[u8]) -> ProgramResult;
}

struct LedgerState {
    accounts: HashMap<Address, Account>,
    slot: u64,
    processed: HashSet<Uuid>,
}

/// Transaction host. Transactions are applied one at a time; each either
/// commits every change it made or none.
pub struct Ledger {
    config: LedgerConfig,
    programs: RwLock<HashMap<Address, Arc<dyn Program>>>,
    state: Mutex<LedgerState>,
    storage: Arc<Storage>,
}

impl Ledger {
    pub fn builder() -> LedgerBuilder {
        LedgerBuilder::default()
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn register_program(&self, program: Arc<dyn Program>) -> Result<()> {
        let id = program.id();
        let mut programs = self.programs.write();
        if programs.contains_key(&id) {
            return Err(LedgerError::config(format!(
                "Program {} is already registered",
                id
            )));
        }

        tracing::info!("Registered program '{}' at {}", program.name(), id);
        programs.insert(id, program);
        Ok(())
    }

    pub async fn process_transaction(&self, tx: &Transaction) -> Result<Receipt> {
        let result = self.apply(tx).await;
        match &result {
            Ok(receipt) => tracing::debug!(
                "Transaction {} committed at slot {} (fee {})",
                receipt.id,
                receipt.slot,
                receipt.fee
            ),
            Err(e) => tracing::warn!("Transaction {} rejected: {}", tx.id(), e),
        }
        result
    }

    async fn apply(&self, tx: &Transaction) -> Result<Receipt> {
        if tx.instructions().is_empty() {
            return Err(LedgerError::EmptyTransaction);
        }
        if tx.instructions().len() > self.config.max_instructions {
            return Err(LedgerError::TooManyInstructions {
                count: tx.instructions().len(),
                limit: self.config.max_instructions,
            });
        }

        let signers = tx.verify()?;
        let programs = self.programs.read().clone();

        let mut state = self.state.lock().await;
        if state.processed.contains(&tx.id()) {
            return Err(LedgerError::DuplicateTransaction(tx.id()));
        }

        let executor = Executor {
            programs,
            config: self.config.clone(),
            clock: Clock {
                slot: state.slot + 1,
                unix_timestamp: Utc::now().timestamp(),
            },
        };

        let mut cache = AccountCache::load(&state.accounts, &tx.account_addresses());
        let fee = self
            .config
            .signature_fee
            .checked_mul(tx.signature_count() as u64)
            .ok_or(LedgerError::ArithmeticOverflow)?;
        let payer = cache.get_mut(&tx.fee_payer())?;
        if payer.owner != SYSTEM_PROGRAM_ID || !payer.data.is_empty() {
            return Err(LedgerError::IllegalOwner {
                address: tx.fee_payer(),
                expected: SYSTEM_PROGRAM_ID,
                actual: payer.owner,
            });
        }
        payer.debit(fee)?;

        let mut logs = Vec::new();
        for instruction in tx.instructions() {
            executor.execute(&mut cache, instruction, &signers, 1, &mut logs)?;
        }

        let changes: Vec<(Address, Account)> = cache
            .into_accounts()
            .into_iter()
            .filter(|(address, account)| {
                state.accounts.get(address).cloned().unwrap_or_default() != *account
            })
            .collect();

        let receipt = Receipt {
            id: tx.id(),
            slot: executor.clock.slot,
            fee_payer: tx.fee_payer(),
            fee,
            logs,
            processed_at: Utc::now(),
        };

        self.storage.commit(&changes, &receipt).await?;

        for (address, account) in changes {
            if account.is_empty() {
                state.accounts.remove(&address);
            } else {
                state.accounts.insert(address, account);
            }
        }
        state.slot = receipt.slot;
        state.processed.insert(receipt.id);

        Ok(receipt)
    }

    pub async fn account(&self, address: &Address) -> Option<Account> {
        self.state.lock().await.accounts.get(address).cloned()
    }

    pub async fn balance(&self, address: &Address) -> u64 {
        self.account(address)
            .await
            .map(|account| account.balance)
            .unwrap_or(0)
    }

    pub async fn state<T: AccountState>(&self, address: &Address) -> Result<T> {
        let account = self
            .account(address)
            .await
            .ok_or(LedgerError::AccountNotFound(*address))?;
        T::try_from_account(address, &account)
    }

    pub async fn accounts_owned_by(&self, owner: &Address) -> Vec<(Address, Account)> {
        let state = self.state.lock().await;
        let mut owned: Vec<(Address, Account)> = state
            .accounts
            .iter()
            .filter(|(_, account)| account.owner == *owner)
            .map(|(address, account)| (*address, account.clone()))
            .collect();
        owned.sort_by_key(|(address, _)| *address);
        owned
    }

    pub async fn slot(&self) -> u64 {
        self.state.lock().await.slot
    }

    pub async fn receipt(&self, id: Uuid) -> Result<Option<Receipt>> {
        TransactionStore::new(&self.storage).load_receipt(id).await
    }
}

#[derive(Default)]
pub struct LedgerBuilder {
    config: LedgerConfig,
    db_path: Option<PathBuf>,
    programs: Vec<Arc<dyn Program>>,
    genesis: Vec<(Address, u64)>,
}

impl LedgerBuilder {
    pub fn config(mut self, config: LedgerConfig) -> Self {
        self.config = config;
        self
    }

    /// Persist to a SQLite file instead of an in-memory database.
    pub fn database(mut self, path: &Path) -> Self {
        self.db_path = Some(path.to_path_buf());
        self
    }

    pub fn program(mut self, program: Arc<dyn Program>) -> Self {
        self.programs.push(program);
        self
    }

    /// Starting balance for a plain account. Ignored when the account
    /// already exists in the database.
    pub fn genesis_account(mut self, address: Address, balance: u64) -> Self {
        self.genesis.push((address, balance));
        self
    }

    pub async fn build(self) -> Result<Ledger> {
        self.config.validate()?;

        let storage = match &self.db_path {
            Some(path) => Storage::new(path).await?,
            None => Storage::in_memory().await?,
        };

        let mut accounts: HashMap<Address, Account> = AccountStore::new(&storage)
            .load_all()
            .await?
            .into_iter()
            .collect();
        let transactions = TransactionStore::new(&storage);
        let slot = transactions.latest_slot().await?;
        let processed = transactions.processed_ids().await?;

        let genesis: Vec<(Address, Account)> = self
            .genesis
            .iter()
            .filter(|(address, _)| !accounts.contains_key(address))
            .map(|(address, balance)| (*address, Account::new(*balance, SYSTEM_PROGRAM_ID)))
            .collect();
        if !genesis.is_empty() {
            AccountStore::new(&storage).save_accounts(&genesis, slot).await?;
            accounts.extend(genesis);
        }

        tracing::info!(
            "Opened ledger at slot {} with {} accounts",
            slot,
            accounts.len()
        );

        let ledger = Ledger {
            config: self.config,
            programs: RwLock::new(HashMap::new()),
            state: Mutex::new(LedgerState {
                accounts,
                slot,
                processed,
            }),
            storage: Arc::new(storage),
        };

        ledger.register_program(Arc::new(SystemProgram))?;
        for program in self.programs {
            ledger.register_program(program)?;
        }
        Ok(ledger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Keypair;
    use crate::error::ProgramError;
    use crate::instruction::{AccountMeta, Instruction};
    use crate::system;
    use tempfile::tempdir;

    const FUNDING: u64 = 1_000_000;

    /// Program that tries to move funds out of whatever account it is given.
    struct Drain;

    impl Program for Drain {
        fn id(&self) -> Address {
            Address::from_label("drain")
        }

        fn name(&self) -> &'static str {
            "drain"
        }

        fn process(&self, ctx: &mut InvokeContext<'_>, _data: &[u8]) -> ProgramResult {
            let victim = ctx.key(0)?;
            let thief = ctx.key(1)?;
            let amount = ctx.account(&victim)?.balance;
            ctx.account_mut(&victim)?.debit(amount)?;
            ctx.account_mut(&thief)?.credit(amount)?;
            Ok(())
        }
    }

    /// Program that asks the system program to move funds from an account it
    /// was given without that account's signature.
    struct Escalate;

    impl Program for Escalate {
        fn id(&self) -> Address {
            Address::from_label("escalate")
        }

        fn name(&self) -> &'static str {
            "escalate"
        }

        fn process(&self, ctx: &mut InvokeContext<'_>, _data: &[u8]) -> ProgramResult {
            let victim = ctx.key(0)?;
            let thief = ctx.key(1)?;
            ctx.invoke(&system::transfer(&victim, &thief, 1)?)?;
            Ok(())
        }
    }

    fn init_tracing() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }

    async fn funded_ledger(keys: &[&Keypair]) -> Ledger {
        let mut builder = Ledger::builder()
            .program(Arc::new(Drain))
            .program(Arc::new(Escalate));
        for key in keys {
            builder = builder.genesis_account(key.address(), FUNDING);
        }
        builder.build().await.unwrap()
    }

    #[tokio::test]
    async fn test_transfer_charges_fee() {
        init_tracing();
        let alice = Keypair::generate();
        let bob = Keypair::generate();
        let ledger = funded_ledger(&[&alice]).await;

        let ix = system::transfer(&alice.address(), &bob.address(), 1_000).unwrap();
        let tx = Transaction::new_signed(vec![ix], &[&alice]).unwrap();
        let receipt = ledger.process_transaction(&tx).await.unwrap();

        assert_eq!(receipt.fee, 5_000);
        assert_eq!(receipt.slot, 1);
        assert_eq!(ledger.balance(&bob.address()).await, 1_000);
        assert_eq!(ledger.balance(&alice.address()).await, FUNDING - 1_000 - 5_000);
    }

    #[tokio::test]
    async fn test_failed_transaction_has_no_effect() {
        let alice = Keypair::generate();
        let bob = Keypair::generate();
        let ledger = funded_ledger(&[&alice]).await;

        let ok = system::transfer(&alice.address(), &bob.address(), 1_000).unwrap();
        let too_much = system::transfer(&alice.address(), &bob.address(), FUNDING).unwrap();
        let tx = Transaction::new_signed(vec![ok, too_much], &[&alice]).unwrap();

        let err = ledger.process_transaction(&tx).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Program { source, .. }
                if matches!(*source, ProgramError::Ledger(LedgerError::InsufficientFunds { .. }))
        ));
        assert_eq!(ledger.balance(&alice.address()).await, FUNDING);
        assert_eq!(ledger.balance(&bob.address()).await, 0);
        assert_eq!(ledger.slot().await, 0);
    }

    #[tokio::test]
    async fn test_replayed_transaction_rejected() {
        let alice = Keypair::generate();
        let bob = Keypair::generate();
        let ledger = funded_ledger(&[&alice]).await;

        let ix = system::transfer(&alice.address(), &bob.address(), 10).unwrap();
        let tx = Transaction::new_signed(vec![ix], &[&alice]).unwrap();
        ledger.process_transaction(&tx).await.unwrap();

        let err = ledger.process_transaction(&tx).await.unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateTransaction(id) if id == tx.id()));
        assert_eq!(ledger.balance(&bob.address()).await, 10);
    }

    #[tokio::test]
    async fn test_program_cannot_spend_foreign_account() {
        let alice = Keypair::generate();
        let mallory = Keypair::generate();
        let ledger = funded_ledger(&[&alice, &mallory]).await;

        let ix = Instruction {
            program_id: Address::from_label("drain"),
            accounts: vec![
                AccountMeta::new(alice.address(), false),
                AccountMeta::new(mallory.address(), true),
            ],
            data: Vec::new(),
        };
        let tx = Transaction::new_signed(vec![ix], &[&mallory]).unwrap();

        let err = ledger.process_transaction(&tx).await.unwrap_err();
        assert!(matches!(err, LedgerError::ExternalBalanceSpent(a) if a == alice.address()));
        assert_eq!(ledger.balance(&alice.address()).await, FUNDING);
    }

    #[tokio::test]
    async fn test_cross_program_call_cannot_forge_signer() {
        let alice = Keypair::generate();
        let mallory = Keypair::generate();
        let ledger = funded_ledger(&[&alice, &mallory]).await;

        let ix = Instruction {
            program_id: Address::from_label("escalate"),
            accounts: vec![
                AccountMeta::new(alice.address(), false),
                AccountMeta::new(mallory.address(), true),
                AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
            ],
            data: Vec::new(),
        };
        let tx = Transaction::new_signed(vec![ix], &[&mallory]).unwrap();

        let err = ledger.process_transaction(&tx).await.unwrap_err();
        assert!(err.to_string().contains("escalated"));
        assert_eq!(ledger.balance(&alice.address()).await, FUNDING);
    }

    #[tokio::test]
    async fn test_unsigned_fee_payer_rejected() {
        let alice = Keypair::generate();
        let bob = Keypair::generate();
        let ledger = funded_ledger(&[&alice]).await;

        let ix = system::transfer(&alice.address(), &bob.address(), 10).unwrap();
        let tx = Transaction::new(vec![ix], alice.address())
            .sign(&[&bob])
            .unwrap();

        let err = ledger.process_transaction(&tx).await.unwrap_err();
        assert!(matches!(err, LedgerError::MissingSignature(_)));
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("ledger.db");
        let alice = Keypair::generate();
        let bob = Keypair::generate();

        let tx = {
            let ledger = Ledger::builder()
                .database(&db_path)
                .genesis_account(alice.address(), FUNDING)
                .build()
                .await
                .unwrap();
            let ix = system::transfer(&alice.address(), &bob.address(), 500).unwrap();
            let tx = Transaction::new_signed(vec![ix], &[&alice]).unwrap();
            ledger.process_transaction(&tx).await.unwrap();
            tx
        };

        let reopened = Ledger::builder()
            .database(&db_path)
            .genesis_account(alice.address(), FUNDING)
            .build()
            .await
            .unwrap();

        assert_eq!(reopened.slot().await, 1);
        assert_eq!(reopened.balance(&bob.address()).await, 500);
        assert_eq!(reopened.balance(&alice.address()).await, FUNDING - 500 - 5_000);
        assert!(reopened.receipt(tx.id()).await.unwrap().is_some());
        assert!(matches!(
            reopened.process_transaction(&tx).await,
            Err(LedgerError::DuplicateTransaction(_))
        ));
    }
}
