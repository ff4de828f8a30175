use crate::address::Address;
use crate::error::{LedgerError, Result};
use crate::storage::{from_sql, Storage};
use crate::types::Receipt;
use chrono::{DateTime, Utc};
use rusqlite::params;
use std::collections::HashSet;
use std::str::FromStr;
use uuid::Uuid;

pub struct TransactionStore<'a> {
    storage: &'a Storage,
}

impl<'a> TransactionStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    pub async fn load_receipt(&self, id: Uuid) -> Result<Option<Receipt>> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare(
            "SELECT slot, fee_payer, fee, logs, processed_at FROM transactions WHERE id = ?1",
        )?;
        let mut rows = stmt.query(params![id.to_string()])?;

        let Some(row) = rows.next()? else {
            return Ok(None);
        };

        let slot: i64 = row.get(0)?;
        let fee_payer: String = row.get(1)?;
        let fee: i64 = row.get(2)?;
        let logs: String = row.get(3)?;
        let processed_at: i64 = row.get(4)?;

        Ok(Some(Receipt {
            id,
            slot: from_sql(slot, "slot")?,
            fee_payer: Address::from_str(&fee_payer)?,
            fee: from_sql(fee, "fee")?,
            logs: serde_json::from_str(&logs)?,
            processed_at: DateTime::from_timestamp(processed_at, 0).unwrap_or_else(Utc::now),
        }))
    }

    pub async fn latest_slot(&self) -> Result<u64> {
        let conn = self.storage.get_connection().await;

        let slot: Option<i64> =
            conn.query_row("SELECT MAX(slot) FROM transactions", [], |row| row.get(0))?;

        from_sql(slot.unwrap_or(0), "slot")
    }

    pub async fn processed_ids(&self) -> Result<HashSet<Uuid>> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare("SELECT id FROM transactions")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut ids = HashSet::new();
        for row in rows {
            let id = Uuid::parse_str(&row?)
                .map_err(|e| LedgerError::internal(format!("Corrupt transaction id: {}", e)))?;
            ids.insert(id);
        }

        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_receipt_round_trip() {
        let storage = Storage::in_memory().await.unwrap();
        let receipt = Receipt {
            id: Uuid::new_v4(),
            slot: 3,
            fee_payer: Address::from_label("payer"),
            fee: 5_000,
            logs: vec!["Program log: hello".to_string()],
            processed_at: Utc::now(),
        };

        storage.commit(&[], &receipt).await.unwrap();

        let store = TransactionStore::new(&storage);
        let loaded = store.load_receipt(receipt.id).await.unwrap().unwrap();
        assert_eq!(loaded.slot, 3);
        assert_eq!(loaded.logs, receipt.logs);
        assert_eq!(store.latest_slot().await.unwrap(), 3);
        assert!(store.processed_ids().await.unwrap().contains(&receipt.id));
    }

    #[tokio::test]
    async fn test_empty_store_starts_at_slot_zero() {
        let storage = Storage::in_memory().await.unwrap();
        let store = TransactionStore::new(&storage);
        assert_eq!(store.latest_slot().await.unwrap(), 0);
        assert!(store.load_receipt(Uuid::new_v4()).await.unwrap().is_none());
    }
}
