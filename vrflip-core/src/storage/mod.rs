pub mod account_store;
pub mod transaction_store;

pub use account_store::AccountStore;
pub use transaction_store::TransactionStore;

use crate::account::Account;
use crate::address::Address;
use crate::error::{LedgerError, Result};
use crate::types::Receipt;
use rusqlite::{params, Connection};
use std::path::Path;
use tokio::sync::Mutex;

pub struct Storage {
    conn: Mutex<Connection>,
}

impl Storage {
    pub async fn new(db_path: &Path) -> Result<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LedgerError::internal(format!("Failed to create directory: {}", e)))?;
        }

        let conn = Connection::open(db_path)?;
        Self::with_connection(conn).await
    }

    pub async fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn).await
    }

    async fn with_connection(conn: Connection) -> Result<Self> {
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.init_schema().await?;
        Ok(storage)
    }

    async fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().await;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS accounts (
                address TEXT PRIMARY KEY,
                owner TEXT NOT NULL,
                balance INTEGER NOT NULL,
                data BLOB NOT NULL,
                updated_slot INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS transactions (
                id TEXT PRIMARY KEY,
                slot INTEGER NOT NULL,
                fee_payer TEXT NOT NULL,
                fee INTEGER NOT NULL,
                logs TEXT NOT NULL,
                processed_at INTEGER NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    pub async fn get_connection(&self) -> tokio::sync::MutexGuard<'_, Connection> {
        self.conn.lock().await
    }

    /// Write a transaction's account changes and its receipt atomically.
    /// Empty accounts are deleted.
    pub async fn commit(&self, changes: &[(Address, Account)], receipt: &Receipt) -> Result<()> {
        let mut conn = self.conn.lock().await;
        let db_tx = conn.transaction()?;

        for (address, account) in changes {
            write_account(&db_tx, address, account, receipt.slot)?;
        }
        let slot = to_sql(receipt.slot, "slot")?;
        let fee = to_sql(receipt.fee, "fee")?;

        db_tx.execute(
            "INSERT INTO transactions (id, slot, fee_payer, fee, logs, processed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                receipt.id.to_string(),
                slot,
                receipt.fee_payer.to_string(),
                fee,
                serde_json::to_string(&receipt.logs)?,
                receipt.processed_at.timestamp(),
            ],
        )?;

        db_tx.commit()?;
        Ok(())
    }
}

/// SQLite integers are signed 64-bit.
pub(crate) fn to_sql(value: u64, column: &str) -> Result<i64> {
    i64::try_from(value)
        .map_err(|_| LedgerError::internal(format!("{} {} does not fit in storage", column, value)))
}

pub(crate) fn from_sql(value: i64, column: &str) -> Result<u64> {
    u64::try_from(value)
        .map_err(|_| LedgerError::internal(format!("Corrupt {} in storage: {}", column, value)))
}

pub(crate) fn write_account(
    conn: &Connection,
    address: &Address,
    account: &Account,
    slot: u64,
) -> Result<()> {
    if account.is_empty() {
        conn.execute(
            "DELETE FROM accounts WHERE address = ?1",
            params![address.to_string()],
        )?;
    } else {
        let balance = to_sql(account.balance, "balance")?;
        let slot = to_sql(slot, "slot")?;
        conn.execute(
            "INSERT OR REPLACE INTO accounts (address, owner, balance, data, updated_slot)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                address.to_string(),
                account.owner.to_string(),
                balance,
                account.data,
                slot,
            ],
        )?;
    }
    Ok(())
}
