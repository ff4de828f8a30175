use crate::address::{Address, Keypair};
use crate::error::{LedgerError, Result};
use ed25519_dalek::{Signature, VerifyingKey};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountMeta {
    pub address: Address,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountMeta {
    pub fn new(address: Address, is_signer: bool) -> Self {
        Self {
            address,
            is_signer,
            is_writable: true,
        }
    }

    pub fn new_readonly(address: Address, is_signer: bool) -> Self {
        Self {
            address,
            is_signer,
            is_writable: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub program_id: Address,
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
}

impl Instruction {
    pub fn new<T: Serialize>(
        program_id: Address,
        payload: &T,
        accounts: Vec<AccountMeta>,
    ) -> Result<Self> {
        Ok(Self {
            program_id,
            accounts,
            data: serde_json::to_vec(payload)?,
        })
    }
}

pub fn decode_payload<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(data)?)
}

#[derive(Serialize)]
struct Message<'a> {
    id: &'a Uuid,
    fee_payer: &'a Address,
    instructions: &'a [Instruction],
}

/// Signed, atomically applied batch of instructions.
#[derive(Debug, Clone)]
pub struct Transaction {
    id: Uuid,
    fee_payer: Address,
    instructions: Vec<Instruction>,
    signatures: Vec<(Address, [u8; 64])>,
}

impl Transaction {
    pub fn new(instructions: Vec<Instruction>, fee_payer: Address) -> Self {
        Self {
            id: Uuid::new_v4(),
            fee_payer,
            instructions,
            signatures: Vec::new(),
        }
    }

    /// Build and sign in one step; the first signer pays the fee.
    pub fn new_signed(instructions: Vec<Instruction>, signers: &[&Keypair]) -> Result<Self> {
        let fee_payer = signers
            .first()
            .map(|kp| kp.address())
            .ok_or_else(|| LedgerError::internal("Transaction needs at least one signer"))?;
        Self::new(instructions, fee_payer).sign(signers)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn fee_payer(&self) -> Address {
        self.fee_payer
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn signature_count(&self) -> usize {
        self.signatures.len()
    }

    pub fn message(&self) -> Result<Vec<u8>> {
        let message = Message {
            id: &self.id,
            fee_payer: &self.fee_payer,
            instructions: &self.instructions,
        };
        Ok(serde_json::to_vec(&message)?)
    }

    pub fn sign(mut self, signers: &[&Keypair]) -> Result<Self> {
        let message = self.message()?;
        for keypair in signers {
            let address = keypair.address();
            self.signatures.retain(|(signer, _)| *signer != address);
            self.signatures.push((address, keypair.sign(&message)));
        }
        Ok(self)
    }

    /// Check every signature and that every account flagged as signer signed.
    pub fn verify(&self) -> Result<HashSet<Address>> {
        let message = self.message()?;
        let mut signers = HashSet::new();

        for (address, signature) in &self.signatures {
            let key = VerifyingKey::from_bytes(&address.to_bytes())
                .map_err(|_| LedgerError::InvalidSignature(*address))?;
            key.verify_strict(&message, &Signature::from_bytes(signature))
                .map_err(|_| LedgerError::InvalidSignature(*address))?;
            signers.insert(*address);
        }

        if !signers.contains(&self.fee_payer) {
            return Err(LedgerError::MissingSignature(self.fee_payer));
        }

        for meta in self.instructions.iter().flat_map(|ix| ix.accounts.iter()) {
            if meta.is_signer && !signers.contains(&meta.address) {
                return Err(LedgerError::MissingSignature(meta.address));
            }
        }

        Ok(signers)
    }

    /// Every account the transaction touches, fee payer first.
    pub fn account_addresses(&self) -> Vec<Address> {
        let mut seen = HashSet::new();
        let mut addresses = Vec::new();
        let metas = self.instructions.iter().flat_map(|ix| ix.accounts.iter());
        for address in std::iter::once(self.fee_payer).chain(metas.map(|meta| meta.address)) {
            if seen.insert(address) {
                addresses.push(address);
            }
        }
        addresses
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_instruction(signer: Address) -> Instruction {
        Instruction::new(
            Address::from_label("program"),
            &"ping",
            vec![AccountMeta::new(signer, true)],
        )
        .unwrap()
    }

    #[test]
    fn test_signed_transaction_verifies() {
        let payer = Keypair::generate();
        let tx = Transaction::new_signed(vec![sample_instruction(payer.address())], &[&payer])
            .unwrap();

        let signers = tx.verify().unwrap();
        assert!(signers.contains(&payer.address()));
        assert_eq!(tx.signature_count(), 1);
    }

    #[test]
    fn test_missing_account_signature() {
        let payer = Keypair::generate();
        let other = Keypair::generate();
        let tx = Transaction::new_signed(vec![sample_instruction(other.address())], &[&payer])
            .unwrap();

        let result = tx.verify();
        assert!(matches!(result, Err(LedgerError::MissingSignature(a)) if a == other.address()));
    }

    #[test]
    fn test_tampered_transaction_rejected() {
        let payer = Keypair::generate();
        let mut tx = Transaction::new_signed(vec![sample_instruction(payer.address())], &[&payer])
            .unwrap();
        tx.instructions[0].data = b"\"pong\"".to_vec();

        assert!(matches!(
            tx.verify(),
            Err(LedgerError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_account_addresses_deduplicated() {
        let payer = Keypair::generate();
        let tx = Transaction::new(
            vec![
                sample_instruction(payer.address()),
                sample_instruction(payer.address()),
            ],
            payer.address(),
        );
        assert_eq!(tx.account_addresses().len(), 1);
    }
}
