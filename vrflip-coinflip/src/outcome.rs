use serde::{Deserialize, Serialize};
use vrflip_oracle::RandomValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Initiator,
    Acceptor,
}

/// Low half of the first byte goes to the acceptor, high half to the initiator.
pub fn determine_winner(value: &RandomValue) -> Side {
    if value.as_bytes()[0] < 0x80 {
        Side::Acceptor
    } else {
        Side::Initiator
    }
}
