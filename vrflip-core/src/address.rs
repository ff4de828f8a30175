use crate::error::{LedgerError, Result};
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

pub const ADDRESS_BYTES: usize = 32;
pub const MAX_SEEDS: usize = 16;
pub const MAX_SEED_LEN: usize = 32;

const DERIVED_ADDRESS_MARKER: &[u8] = b"vrflip:derived-address";

/// 32-byte account address. Either an ed25519 public key or a derived
/// address that no private key can sign for.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_BYTES]);

impl Address {
    pub const fn new(bytes: [u8; ADDRESS_BYTES]) -> Self {
        Self(bytes)
    }

    pub fn to_bytes(self) -> [u8; ADDRESS_BYTES] {
        self.0
    }

    /// Stable address for a well-known name, used for program ids.
    pub fn from_label(label: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"vrflip:label");
        hasher.update(label.as_bytes());
        Self(hasher.finalize().into())
    }

    pub fn is_on_curve(&self) -> bool {
        VerifyingKey::from_bytes(&self.0).is_ok()
    }

    /// Derive the address for `seeds` (bump included) under `program_id`.
    /// Fails if the hash lands on the ed25519 curve.
    pub fn create_derived(seeds: &[&[u8]], program_id: &Address) -> Result<Address> {
        validate_seeds(seeds, 0)?;
        let candidate = hash_seeds(seeds, program_id);
        if candidate.is_on_curve() {
            return Err(LedgerError::invalid_seeds("derived address is on curve"));
        }
        Ok(candidate)
    }

    /// Search bumps from 255 down and return the first valid derived address.
    pub fn find_derived(seeds: &[&[u8]], program_id: &Address) -> Result<(Address, u8)> {
        validate_seeds(seeds, 1)?;
        for bump in (0..=u8::MAX).rev() {
            let bump_seed = [bump];
            let mut with_bump: Vec<&[u8]> = seeds.to_vec();
            with_bump.push(&bump_seed);

            let candidate = hash_seeds(&with_bump, program_id);
            if !candidate.is_on_curve() {
                return Ok((candidate, bump));
            }
        }
        Err(LedgerError::invalid_seeds("no viable bump found"))
    }
}

fn validate_seeds(seeds: &[&[u8]], reserved: usize) -> Result<()> {
    if seeds.len() + reserved > MAX_SEEDS {
        return Err(LedgerError::invalid_seeds(format!(
            "{} seeds given, at most {} allowed",
            seeds.len() + reserved,
            MAX_SEEDS
        )));
    }
    if let Some(seed) = seeds.iter().find(|seed| seed.len() > MAX_SEED_LEN) {
        return Err(LedgerError::invalid_seeds(format!(
            "seed of {} bytes exceeds {} bytes",
            seed.len(),
            MAX_SEED_LEN
        )));
    }
    Ok(())
}

fn hash_seeds(seeds: &[&[u8]], program_id: &Address) -> Address {
    let mut hasher = Sha256::new();
    for seed in seeds {
        hasher.update(seed);
    }
    hasher.update(program_id.as_ref());
    hasher.update(DERIVED_ADDRESS_MARKER);
    Address(hasher.finalize().into())
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({}..)", &hex::encode(&self.0[..6]))
    }
}

impl FromStr for Address {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = hex::decode(s)
            .map_err(|e| LedgerError::internal(format!("Invalid address '{}': {}", s, e)))?;
        let bytes: [u8; ADDRESS_BYTES] = bytes.try_into().map_err(|_| {
            LedgerError::internal(format!("Invalid address '{}': expected 32 bytes", s))
        })?;
        Ok(Self(bytes))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// ed25519 signing identity.
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    pub fn generate() -> Self {
        Self::from_secret(rand::random::<[u8; 32]>())
    }

    pub fn from_secret(secret: [u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&secret),
        }
    }

    pub fn address(&self) -> Address {
        Address(self.signing_key.verifying_key().to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("address", &self.address())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_address_is_on_curve() {
        let keypair = Keypair::generate();
        assert!(keypair.address().is_on_curve());
    }

    #[test]
    fn test_find_derived_is_deterministic() {
        let program = Address::from_label("test-program");
        let owner = Keypair::generate().address();

        let (first, bump) = Address::find_derived(&[b"vault-seed", owner.as_ref()], &program).unwrap();
        let (second, _) = Address::find_derived(&[b"vault-seed", owner.as_ref()], &program).unwrap();
        assert_eq!(first, second);
        assert!(!first.is_on_curve());

        let recreated =
            Address::create_derived(&[b"vault-seed", owner.as_ref(), &[bump]], &program).unwrap();
        assert_eq!(first, recreated);
    }

    #[test]
    fn test_derivation_depends_on_tag_and_program() {
        let owner = Keypair::generate().address();
        let program_a = Address::from_label("a");
        let program_b = Address::from_label("b");

        let (coin, _) = Address::find_derived(&[b"coin-seed", owner.as_ref()], &program_a).unwrap();
        let (vault, _) = Address::find_derived(&[b"vault-seed", owner.as_ref()], &program_a).unwrap();
        let (other, _) = Address::find_derived(&[b"coin-seed", owner.as_ref()], &program_b).unwrap();

        assert_ne!(coin, vault);
        assert_ne!(coin, other);
    }

    #[test]
    fn test_oversized_seed_rejected() {
        let program = Address::from_label("test-program");
        let long_seed = [7u8; 33];
        let result = Address::create_derived(&[&long_seed], &program);
        assert!(matches!(result, Err(LedgerError::InvalidSeeds(_))));
    }

    #[test]
    fn test_address_string_round_trip() {
        let address = Keypair::generate().address();
        let parsed: Address = address.to_string().parse().unwrap();
        assert_eq!(address, parsed);
        assert!("abcd".parse::<Address>().is_err());
    }
}
