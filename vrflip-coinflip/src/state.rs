use crate::outcome::Side;
use serde::{Deserialize, Serialize};
use vrflip_core::{AccountState, Address};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoinStatus {
    Created,
    Approved,
    Revealed,
}

/// Wager record stored at the coin address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub initiator: Address,
    pub acceptor: Address,
    pub stake: u64,
    pub status: CoinStatus,
    /// Oracle request record the outcome is read from.
    pub requester: Address,
    pub vault: Address,
    pub oracle_program: Address,
    pub bump: u8,
    pub vault_bump: u8,
    pub created_at: i64,
    pub approved_at: Option<i64>,
    pub revealed_at: Option<i64>,
    pub winner: Option<Side>,
}

impl AccountState for Coin {
    const TYPE_NAME: &'static str = "Coin";
}

impl Coin {
    pub fn party(&self, side: Side) -> Address {
        match side {
            Side::Initiator => self.initiator,
            Side::Acceptor => self.acceptor,
        }
    }

    pub fn is_party(&self, address: &Address) -> bool {
        *address == self.initiator || *address == self.acceptor
    }

    pub fn winner_address(&self) -> Option<Address> {
        self.winner.map(|side| self.party(side))
    }
}
