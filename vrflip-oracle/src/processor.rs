use crate::config::OracleConfig;
use crate::error::OracleError;
use crate::instruction::OracleInstruction;
use crate::state::{RandomValue, RequestRecord, RequestStatus};
use crate::{REQUEST_SEED, VAULT_SEED};
use vrflip_core::{
    decode_payload, system, Address, InvokeContext, LedgerError, Program, ProgramResult,
};

/// The randomness request program.
#[derive(Debug, Clone, Default)]
pub struct RandomnessOracle {
    config: OracleConfig,
}

fn verify_derived(
    seeds: &[&[u8]],
    program_id: &Address,
    expected: &Address,
) -> Result<(), OracleError> {
    match Address::create_derived(seeds, program_id) {
        Ok(derived) if derived == *expected => Ok(()),
        _ => Err(OracleError::SeedMismatch),
    }
}

impl RandomnessOracle {
    pub fn new(config: OracleConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    fn initialize(
        &self,
        ctx: &mut InvokeContext<'_>,
        request_bump: u8,
        vault_bump: u8,
    ) -> ProgramResult {
        let record = ctx.key(0)?;
        let fee_vault = ctx.key(1)?;
        let authority = ctx.key(2)?;
        let oracle = ctx.key(3)?;
        ctx.require_signer(&authority)?;

        let program_id = ctx.program_id();
        let request_bump_seed = [request_bump];
        let record_seeds: &[&[u8]] = &[REQUEST_SEED, authority.as_ref(), &request_bump_seed];
        verify_derived(record_seeds, &program_id, &record)?;

        let vault_bump_seed = [vault_bump];
        let vault_seeds: &[&[u8]] = &[VAULT_SEED, authority.as_ref(), &vault_bump_seed];
        verify_derived(vault_seeds, &program_id, &fee_vault)?;

        if ctx.account(&record)?.is_initialized() || ctx.account(&fee_vault)?.is_initialized() {
            return Err(OracleError::AlreadyInitialized.into());
        }

        ctx.invoke_signed(
            &system::create_account(&authority, &record, 0, &program_id)?,
            &[record_seeds],
        )?;
        ctx.invoke_signed(
            &system::create_account(&authority, &fee_vault, self.config.request_fee, &program_id)?,
            &[vault_seeds],
        )?;

        let state = RequestRecord::new(authority, oracle, request_bump, vault_bump);
        ctx.store(&record, &state)?;

        ctx.log(format!("request record {} initialized", record));
        tracing::info!("Initialized request record {} for {}", record, authority);
        Ok(())
    }

    fn transfer_authority(&self, ctx: &mut InvokeContext<'_>) -> ProgramResult {
        let record_key = ctx.key(0)?;
        let authority = ctx.key(1)?;
        let new_authority = ctx.key(2)?;

        let mut record: RequestRecord = ctx.load(&record_key, &ctx.program_id())?;
        if !ctx.is_signer(&authority) || record.authority != authority {
            return Err(OracleError::Unauthorized.into());
        }

        match record.status {
            RequestStatus::Requested => return Err(OracleError::RequestInFlight.into()),
            RequestStatus::Fulfilled => record.recycle(),
            RequestStatus::Idle => {}
        }

        record.authority = new_authority;
        ctx.store(&record_key, &record)?;

        tracing::debug!("Request authority of {} moved to {}", record_key, new_authority);
        Ok(())
    }

    fn request_random(&self, ctx: &mut InvokeContext<'_>) -> ProgramResult {
        let record_key = ctx.key(0)?;
        let fee_vault = ctx.key(1)?;
        let authority = ctx.key(2)?;
        let oracle = ctx.key(3)?;

        let program_id = ctx.program_id();
        let mut record: RequestRecord = ctx.load(&record_key, &program_id)?;
        if !ctx.is_signer(&authority) || record.authority != authority {
            return Err(OracleError::Unauthorized.into());
        }
        if record.oracle != oracle {
            return Err(OracleError::InvalidOracle.into());
        }
        match record.status {
            RequestStatus::Requested => return Err(OracleError::RequestInFlight.into()),
            RequestStatus::Fulfilled => return Err(OracleError::AlreadyFulfilled.into()),
            RequestStatus::Idle => {}
        }

        let vault_bump_seed = [record.vault_bump];
        verify_derived(
            &[VAULT_SEED, record.requester.as_ref(), &vault_bump_seed],
            &program_id,
            &fee_vault,
        )?;

        let fee = self.config.request_fee;
        let available = ctx.account(&fee_vault)?.balance;
        if available < fee {
            return Err(OracleError::InsufficientFunds {
                need: fee,
                available,
            }
            .into());
        }
        ctx.transfer_owned(&fee_vault, &oracle, fee)?;

        record.nonce = record
            .nonce
            .checked_add(1)
            .ok_or(LedgerError::ArithmeticOverflow)?;
        record.status = RequestStatus::Requested;
        record.requested_at = Some(ctx.clock().unix_timestamp);
        ctx.store(&record_key, &record)?;

        ctx.log(format!("randomness requested for {} (nonce {})", record_key, record.nonce));
        tracing::info!("Randomness requested for {} (nonce {})", record_key, record.nonce);
        Ok(())
    }

    fn publish_random(&self, ctx: &mut InvokeContext<'_>, value: RandomValue) -> ProgramResult {
        let record_key = ctx.key(0)?;
        let oracle = ctx.key(1)?;

        let mut record: RequestRecord = ctx.load(&record_key, &ctx.program_id())?;
        if !ctx.is_signer(&oracle) || record.oracle != oracle {
            return Err(OracleError::Unauthorized.into());
        }
        match record.status {
            RequestStatus::Fulfilled => return Err(OracleError::AlreadyFulfilled.into()),
            RequestStatus::Idle => return Err(OracleError::NoPendingRequest.into()),
            RequestStatus::Requested => {}
        }

        record.value = Some(value);
        record.status = RequestStatus::Fulfilled;
        record.fulfilled_at = Some(ctx.clock().unix_timestamp);
        ctx.store(&record_key, &record)?;

        ctx.log(format!("randomness published for {}", record_key));
        tracing::info!("Randomness published for {}", record_key);
        Ok(())
    }
}

impl Program for RandomnessOracle {
    fn id(&self) -> Address {
        crate::id()
    }

    fn name(&self) -> &'static str {
        "oracle"
    }

    fn process(&self, ctx: &mut InvokeContext<'_>, data: &[u8]) -> ProgramResult {
        match decode_payload::<OracleInstruction>(data)? {
            OracleInstruction::Initialize {
                request_bump,
                vault_bump,
            } => self.initialize(ctx, request_bump, vault_bump),
            OracleInstruction::TransferAuthority => self.transfer_authority(ctx),
            OracleInstruction::RequestRandom => self.request_random(ctx),
            OracleInstruction::PublishRandom { value } => self.publish_random(ctx, value),
        }
    }
}
