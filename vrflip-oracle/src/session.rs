use crate::instruction;
use crate::state::{RandomValue, RequestRecord, RequestStatus, RANDOM_VALUE_LEN};
use rand::Rng;
use std::sync::Arc;
use vrflip_core::{AccountState, Address, Keypair, Ledger, Receipt, Result, Transaction};

/// Off-ledger oracle process: finds requests assigned to its identity and
/// publishes values for them.
pub struct OracleSession {
    keypair: Keypair,
    ledger: Arc<Ledger>,
}

impl OracleSession {
    pub fn new(keypair: Keypair, ledger: Arc<Ledger>) -> Self {
        Self { keypair, ledger }
    }

    pub fn address(&self) -> Address {
        self.keypair.address()
    }

    pub async fn publish_random(&self, request: &Address, value: RandomValue) -> Result<Receipt> {
        let ix = instruction::publish_random(request, &self.address(), value)?;
        let tx = Transaction::new_signed(vec![ix], &[&self.keypair])?;
        let receipt = self.ledger.process_transaction(&tx).await?;

        tracing::info!("Oracle {} published randomness for {}", self.address(), request);
        Ok(receipt)
    }

    /// Requested but unfulfilled records naming this oracle, by address.
    pub async fn pending_requests(&self) -> Vec<(Address, RequestRecord)> {
        let me = self.address();
        self.ledger
            .accounts_owned_by(&crate::id())
            .await
            .into_iter()
            .filter_map(|(address, account)| {
                RequestRecord::try_from_account(&address, &account)
                    .ok()
                    .map(|record| (address, record))
            })
            .filter(|(_, record)| record.oracle == me && record.status == RequestStatus::Requested)
            .collect()
    }

    /// Publish fresh randomness for every pending request.
    pub async fn fulfill_pending(&self) -> Result<Vec<Address>> {
        let mut fulfilled = Vec::new();
        for (address, _) in self.pending_requests().await {
            let mut bytes = [0u8; RANDOM_VALUE_LEN];
            rand::rng().fill(&mut bytes[..]);
            self.publish_random(&address, RandomValue::new(bytes)).await?;
            fulfilled.push(address);
        }

        if !fulfilled.is_empty() {
            tracing::info!("Oracle {} fulfilled {} requests", self.address(), fulfilled.len());
        }
        Ok(fulfilled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::{fee_vault_address, request_address};
    use crate::processor::RandomnessOracle;
    use crate::state::read_random;

    #[tokio::test]
    async fn test_session_fulfills_only_its_requests() -> anyhow::Result<()> {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let alice = Keypair::generate();
        let bob = Keypair::generate();
        let oracle = Keypair::generate();
        let other_oracle = Keypair::generate();
        let ledger = Arc::new(
            Ledger::builder()
                .program(Arc::new(RandomnessOracle::default()))
                .genesis_account(alice.address(), 1_000_000)
                .genesis_account(bob.address(), 1_000_000)
                .genesis_account(oracle.address(), 1_000_000)
                .build()
                .await?,
        );

        for (party, assigned) in [(&alice, &oracle), (&bob, &other_oracle)] {
            let (record, _) = request_address(&party.address())?;
            let (fee_vault, _) = fee_vault_address(&party.address())?;
            let setup = vec![
                instruction::initialize(&party.address(), &assigned.address())?,
                instruction::request_random(
                    &record,
                    &fee_vault,
                    &party.address(),
                    &assigned.address(),
                )?,
            ];
            let tx = Transaction::new_signed(setup, &[party])?;
            ledger.process_transaction(&tx).await?;
        }

        let session = OracleSession::new(oracle, ledger.clone());
        let pending = session.pending_requests().await;
        assert_eq!(pending.len(), 1);

        let (alice_record, _) = request_address(&alice.address())?;
        assert_eq!(pending[0].0, alice_record);

        let fulfilled = session.fulfill_pending().await?;
        assert_eq!(fulfilled, vec![alice_record]);
        assert!(session.pending_requests().await.is_empty());

        let record: RequestRecord = ledger.state(&alice_record).await?;
        assert!(read_random(&record).is_some());

        let (bob_record, _) = request_address(&bob.address())?;
        let record: RequestRecord = ledger.state(&bob_record).await?;
        assert!(read_random(&record).is_none());
        Ok(())
    }
}
