use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use vrflip_core::{Address, AccountState};

pub const RANDOM_VALUE_LEN: usize = 64;

/// 64 bytes of published randomness.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct RandomValue(pub [u8; RANDOM_VALUE_LEN]);

impl RandomValue {
    pub fn new(bytes: [u8; RANDOM_VALUE_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; RANDOM_VALUE_LEN] {
        &self.0
    }
}

impl fmt::Debug for RandomValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RandomValue({}..)", hex::encode(&self.0[..8]))
    }
}

impl Serialize for RandomValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for RandomValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        let bytes: [u8; RANDOM_VALUE_LEN] = bytes.try_into().map_err(|_| {
            serde::de::Error::custom(format!("expected {} bytes", RANDOM_VALUE_LEN))
        })?;
        Ok(Self(bytes))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    Idle,
    Requested,
    Fulfilled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRecord {
    /// Party the record was derived from.
    pub requester: Address,
    /// Identity currently allowed to request randomness.
    pub authority: Address,
    /// Sole identity allowed to publish.
    pub oracle: Address,
    pub status: RequestStatus,
    pub value: Option<RandomValue>,
    /// Number of requests made against this record.
    pub nonce: u64,
    pub bump: u8,
    pub vault_bump: u8,
    pub requested_at: Option<i64>,
    pub fulfilled_at: Option<i64>,
}

impl AccountState for RequestRecord {
    const TYPE_NAME: &'static str = "RequestRecord";
}

impl RequestRecord {
    pub fn new(requester: Address, oracle: Address, bump: u8, vault_bump: u8) -> Self {
        Self {
            requester,
            authority: requester,
            oracle,
            status: RequestStatus::Idle,
            value: None,
            nonce: 0,
            bump,
            vault_bump,
            requested_at: None,
            fulfilled_at: None,
        }
    }

    pub fn is_fulfilled(&self) -> bool {
        self.status == RequestStatus::Fulfilled
    }

    /// Start a new round after a fulfilled one. The nonce is kept.
    pub(crate) fn recycle(&mut self) {
        self.status = RequestStatus::Idle;
        self.value = None;
        self.requested_at = None;
        self.fulfilled_at = None;
    }
}

/// The published value, if any.
pub fn read_random(record: &RequestRecord) -> Option<RandomValue> {
    match record.status {
        RequestStatus::Fulfilled => record.value,
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_value_serializes_as_hex() {
        let mut bytes = [0u8; RANDOM_VALUE_LEN];
        bytes[0] = 0xab;
        let value = RandomValue::new(bytes);

        let json = serde_json::to_string(&value).unwrap();
        assert!(json.starts_with("\"ab00"));
        assert_eq!(serde_json::from_str::<RandomValue>(&json).unwrap(), value);
        assert!(serde_json::from_str::<RandomValue>("\"abcd\"").is_err());
    }

    #[test]
    fn test_read_random_only_when_fulfilled() {
        let requester = Address::from_label("requester");
        let mut record = RequestRecord::new(requester, Address::from_label("oracle"), 254, 253);
        assert_eq!(read_random(&record), None);

        record.status = RequestStatus::Fulfilled;
        record.value = Some(RandomValue::new([7; RANDOM_VALUE_LEN]));
        assert_eq!(read_random(&record), Some(RandomValue::new([7; RANDOM_VALUE_LEN])));

        record.recycle();
        assert_eq!(read_random(&record), None);
        assert_eq!(record.authority, requester);
    }
}
