use crate::address::Address;
use crate::error::{LedgerError, Result};
use crate::system::SYSTEM_PROGRAM_ID;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const DISCRIMINATOR_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub balance: u64,
    pub owner: Address,
    pub data: Vec<u8>,
}

impl Default for Account {
    fn default() -> Self {
        Self {
            balance: 0,
            owner: SYSTEM_PROGRAM_ID,
            data: Vec::new(),
        }
    }
}

impl Account {
    pub fn new(balance: u64, owner: Address) -> Self {
        Self {
            balance,
            owner,
            data: Vec::new(),
        }
    }

    /// An empty account is indistinguishable from one that never existed.
    pub fn is_empty(&self) -> bool {
        self.balance == 0 && self.data.is_empty() && self.owner == SYSTEM_PROGRAM_ID
    }

    /// Owned by a program or holding data. A plain account that only holds
    /// a balance can still be created over.
    pub fn is_initialized(&self) -> bool {
        self.owner != SYSTEM_PROGRAM_ID || !self.data.is_empty()
    }

    pub fn credit(&mut self, amount: u64) -> Result<()> {
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or(LedgerError::ArithmeticOverflow)?;
        Ok(())
    }

    pub fn debit(&mut self, amount: u64) -> Result<()> {
        if self.balance < amount {
            return Err(LedgerError::InsufficientFunds {
                need: amount,
                available: self.balance,
            });
        }
        self.balance -= amount;
        Ok(())
    }
}

/// Typed program state stored in an account's data, prefixed with an
/// 8-byte discriminator derived from the type name.
pub trait AccountState: Serialize + DeserializeOwned {
    const TYPE_NAME: &'static str;

    fn discriminator() -> [u8; DISCRIMINATOR_LEN] {
        let mut hasher = Sha256::new();
        hasher.update(b"account:");
        hasher.update(Self::TYPE_NAME.as_bytes());
        let hash = hasher.finalize();

        let mut out = [0u8; DISCRIMINATOR_LEN];
        out.copy_from_slice(&hash[..DISCRIMINATOR_LEN]);
        out
    }

    fn try_from_account(address: &Address, account: &Account) -> Result<Self> {
        let data = &account.data;
        if data.len() < DISCRIMINATOR_LEN {
            return Err(LedgerError::invalid_data(*address, "account holds no state"));
        }
        if data[..DISCRIMINATOR_LEN] != Self::discriminator() {
            return Err(LedgerError::invalid_data(
                *address,
                format!("not a {} account", Self::TYPE_NAME),
            ));
        }
        serde_json::from_slice(&data[DISCRIMINATOR_LEN..])
            .map_err(|e| LedgerError::invalid_data(*address, e.to_string()))
    }

    fn to_account_data(&self) -> Result<Vec<u8>> {
        let mut data = Self::discriminator().to_vec();
        data.extend(serde_json::to_vec(self)?);
        Ok(data)
    }
}
