use crate::address::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ledger time as seen by programs during one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clock {
    pub slot: u64,
    pub unix_timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub id: Uuid,
    pub slot: u64,
    pub fee_payer: Address,
    pub fee: u64,
    pub logs: Vec<String>,
    pub processed_at: DateTime<Utc>,
}
