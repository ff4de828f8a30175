use crate::account::Account;
use crate::address::Address;
use crate::error::{LedgerError, Result};
use crate::storage::{from_sql, write_account, Storage};
use rusqlite::params;
use std::str::FromStr;

pub struct AccountStore<'a> {
    storage: &'a Storage,
}

impl<'a> AccountStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    pub async fn save_accounts(&self, accounts: &[(Address, Account)], slot: u64) -> Result<()> {
        let mut conn = self.storage.get_connection().await;
        let db_tx = conn.transaction()?;
        for (address, account) in accounts {
            write_account(&db_tx, address, account, slot)?;
        }
        db_tx.commit()?;
        Ok(())
    }

    pub async fn load_account(&self, address: &Address) -> Result<Option<Account>> {
        let conn = self.storage.get_connection().await;

        let mut stmt =
            conn.prepare("SELECT owner, balance, data FROM accounts WHERE address = ?1")?;
        let mut rows = stmt.query(params![address.to_string()])?;

        match rows.next()? {
            Some(row) => {
                let owner: String = row.get(0)?;
                let balance: i64 = row.get(1)?;
                Ok(Some(Account {
                    balance: from_sql(balance, "balance")?,
                    owner: Address::from_str(&owner)?,
                    data: row.get(2)?,
                }))
            }
            None => Ok(None),
        }
    }

    pub async fn load_all(&self) -> Result<Vec<(Address, Account)>> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare("SELECT address, owner, balance, data FROM accounts")?;
        let rows = stmt.query_map([], |row| {
            let address: String = row.get(0)?;
            let owner: String = row.get(1)?;
            let balance: i64 = row.get(2)?;
            let data: Vec<u8> = row.get(3)?;
            Ok((address, owner, balance, data))
        })?;

        let mut accounts = Vec::new();
        for row in rows {
            let (address, owner, balance, data) = row?;
            let address = Address::from_str(&address)
                .map_err(|e| LedgerError::internal(format!("Corrupt account row: {}", e)))?;
            let account = Account {
                balance: from_sql(balance, "balance")?,
                owner: Address::from_str(&owner)?,
                data,
            };
            accounts.push((address, account));
        }

        Ok(accounts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::SYSTEM_PROGRAM_ID;

    #[tokio::test]
    async fn test_save_and_load_account() {
        let storage = Storage::in_memory().await.unwrap();
        let store = AccountStore::new(&storage);
        let address = Address::from_label("stored");
        let mut account = Account::new(42, Address::from_label("owner"));
        account.data = vec![1, 2, 3];

        store.save_accounts(&[(address, account.clone())], 1).await.unwrap();

        assert_eq!(store.load_account(&address).await.unwrap(), Some(account));
        assert_eq!(store.load_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_account_is_deleted() {
        let storage = Storage::in_memory().await.unwrap();
        let store = AccountStore::new(&storage);
        let address = Address::from_label("stored");

        store
            .save_accounts(&[(address, Account::new(5, SYSTEM_PROGRAM_ID))], 1)
            .await
            .unwrap();
        store
            .save_accounts(&[(address, Account::default())], 2)
            .await
            .unwrap();

        assert_eq!(store.load_account(&address).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_balance_beyond_storage_range_rejected() {
        let storage = Storage::in_memory().await.unwrap();
        let store = AccountStore::new(&storage);
        let address = Address::from_label("whale");

        let result = store
            .save_accounts(&[(address, Account::new(u64::MAX, SYSTEM_PROGRAM_ID))], 1)
            .await;
        assert!(matches!(result, Err(LedgerError::Internal(_))));
        assert_eq!(store.load_account(&address).await.unwrap(), None);

        let ceiling = i64::MAX as u64;
        store
            .save_accounts(&[(address, Account::new(ceiling, SYSTEM_PROGRAM_ID))], 1)
            .await
            .unwrap();
        assert_eq!(
            store.load_account(&address).await.unwrap().map(|a| a.balance),
            Some(ceiling)
        );
    }
}
