use crate::config::CoinFlipConfig;
use crate::error::CoinFlipError;
use crate::instruction::CoinFlipInstruction;
use crate::outcome::determine_winner;
use crate::state::{Coin, CoinStatus};
use crate::{COIN_SEED, VAULT_SEED};
use vrflip_core::{
    decode_payload, system, Address, InvokeContext, Program, ProgramResult, Result,
    SYSTEM_PROGRAM_ID,
};
use vrflip_oracle::cpi::{RequestRandomAccounts, TransferAuthorityAccounts};
use vrflip_oracle::{read_random, RequestRecord, RequestStatus};

/// The coin flip wager program.
#[derive(Debug, Clone)]
pub struct CoinFlip {
    config: CoinFlipConfig,
}

fn verify_derived(
    seeds: &[&[u8]],
    program_id: &Address,
    expected: &Address,
) -> std::result::Result<(), CoinFlipError> {
    match Address::create_derived(seeds, program_id) {
        Ok(derived) if derived == *expected => Ok(()),
        _ => Err(CoinFlipError::SeedMismatch),
    }
}

fn ensure_funds(available: u64, need: u64) -> std::result::Result<(), CoinFlipError> {
    if available < need {
        return Err(CoinFlipError::InsufficientFunds { need, available });
    }
    Ok(())
}

impl CoinFlip {
    pub fn new(config: CoinFlipConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &CoinFlipConfig {
        &self.config
    }

    /// Check that the accounts passed alongside a coin are the ones it was
    /// created with.
    fn verify_links(
        &self,
        ctx: &InvokeContext<'_>,
        coin: &Coin,
        coin_key: &Address,
        vault: &Address,
        requester: &Address,
        oracle_program: &Address,
    ) -> std::result::Result<(), CoinFlipError> {
        let bump = [coin.bump];
        verify_derived(
            &[COIN_SEED, coin.initiator.as_ref(), &bump],
            &ctx.program_id(),
            coin_key,
        )?;
        if *vault != coin.vault || *requester != coin.requester {
            return Err(CoinFlipError::SeedMismatch);
        }
        if *oracle_program != coin.oracle_program {
            return Err(CoinFlipError::InvalidOracle);
        }
        Ok(())
    }

    fn create_coin(
        &self,
        ctx: &mut InvokeContext<'_>,
        coin_bump: u8,
        req_bump: u8,
        vault_bump: u8,
        amount: u64,
    ) -> ProgramResult {
        let coin = ctx.key(0)?;
        let vault = ctx.key(1)?;
        let requester = ctx.key(2)?;
        let initiator = ctx.key(3)?;
        let acceptor = ctx.key(4)?;
        let oracle = ctx.key(5)?;
        let oracle_fee_vault = ctx.key(6)?;
        let oracle_program = ctx.key(7)?;

        if !ctx.is_signer(&initiator) {
            return Err(CoinFlipError::Unauthorized.into());
        }
        if oracle_program != self.config.oracle_program {
            return Err(CoinFlipError::InvalidOracle.into());
        }

        let program_id = ctx.program_id();
        let coin_bump_seed = [coin_bump];
        let coin_seeds: &[&[u8]] = &[COIN_SEED, initiator.as_ref(), &coin_bump_seed];
        verify_derived(coin_seeds, &program_id, &coin)?;

        let vault_bump_seed = [vault_bump];
        let vault_seeds: &[&[u8]] = &[VAULT_SEED, initiator.as_ref(), &vault_bump_seed];
        verify_derived(vault_seeds, &program_id, &vault)?;

        let req_bump_seed = [req_bump];
        verify_derived(
            &[vrflip_oracle::REQUEST_SEED, initiator.as_ref(), &req_bump_seed],
            &oracle_program,
            &requester,
        )?;

        if ctx.account(&coin)?.is_initialized() || ctx.account(&vault)?.is_initialized() {
            return Err(CoinFlipError::AlreadyInitialized.into());
        }

        let record: RequestRecord = ctx.load(&requester, &oracle_program)?;
        if record.oracle != oracle || oracle != self.config.oracle_authority {
            return Err(CoinFlipError::InvalidOracle.into());
        }
        let fee_vault_bump = [record.vault_bump];
        verify_derived(
            &[vrflip_oracle::VAULT_SEED, initiator.as_ref(), &fee_vault_bump],
            &oracle_program,
            &oracle_fee_vault,
        )?;
        if record.status == RequestStatus::Requested {
            return Err(CoinFlipError::StaleRequest.into());
        }

        if acceptor == initiator {
            return Err(CoinFlipError::InvalidAcceptor.into());
        }
        if amount < self.config.min_stake {
            return Err(CoinFlipError::InvalidStake {
                stake: amount,
                min: self.config.min_stake,
            }
            .into());
        }
        ensure_funds(ctx.account(&initiator)?.balance, amount)?;

        ctx.invoke_signed(
            &system::create_account(&initiator, &coin, 0, &program_id)?,
            &[coin_seeds],
        )?;
        ctx.invoke_signed(
            &system::create_account(&initiator, &vault, amount, &program_id)?,
            &[vault_seeds],
        )?;

        let state = Coin {
            initiator,
            acceptor,
            stake: amount,
            status: CoinStatus::Created,
            requester,
            vault,
            oracle_program,
            bump: coin_bump,
            vault_bump,
            created_at: ctx.clock().unix_timestamp,
            approved_at: None,
            revealed_at: None,
            winner: None,
        };
        ctx.store(&coin, &state)?;

        // The coin now decides when randomness is requested.
        vrflip_oracle::cpi::transfer_authority(
            ctx,
            &TransferAuthorityAccounts {
                requester,
                authority: initiator,
                new_authority: coin,
            },
            &[],
        )?;

        ctx.log(format!("coin {} created with stake {}", coin, amount));
        tracing::info!(
            "Coin {} created by {} for {} with stake {}",
            coin,
            initiator,
            acceptor,
            amount
        );
        Ok(())
    }

    fn approve_flip(&self, ctx: &mut InvokeContext<'_>) -> ProgramResult {
        let acceptor = ctx.key(0)?;
        let vault = ctx.key(1)?;
        let initiator = ctx.key(2)?;
        let requester = ctx.key(3)?;
        let oracle = ctx.key(4)?;
        let oracle_fee_vault = ctx.key(5)?;
        let oracle_program = ctx.key(6)?;
        let coin_key = ctx.key(8)?;

        let mut coin: Coin = ctx.load(&coin_key, &ctx.program_id())?;
        if !ctx.is_signer(&acceptor) || acceptor != coin.acceptor {
            return Err(CoinFlipError::Unauthorized.into());
        }
        if initiator != coin.initiator {
            return Err(CoinFlipError::SeedMismatch.into());
        }
        self.verify_links(ctx, &coin, &coin_key, &vault, &requester, &oracle_program)?;
        if coin.status != CoinStatus::Created {
            return Err(CoinFlipError::InvalidState(coin.status).into());
        }
        ensure_funds(ctx.account(&acceptor)?.balance, coin.stake)?;

        ctx.invoke(&system::transfer(&acceptor, &vault, coin.stake)?)?;

        let bump = [coin.bump];
        let coin_seeds: &[&[u8]] = &[COIN_SEED, initiator.as_ref(), &bump];
        vrflip_oracle::cpi::request_random(
            ctx,
            &RequestRandomAccounts {
                requester,
                fee_vault: oracle_fee_vault,
                authority: coin_key,
                oracle,
            },
            &[coin_seeds],
        )?;

        coin.status = CoinStatus::Approved;
        coin.approved_at = Some(ctx.clock().unix_timestamp);
        ctx.store(&coin_key, &coin)?;

        ctx.log(format!("coin {} approved", coin_key));
        tracing::info!("Coin {} approved by {}", coin_key, acceptor);
        Ok(())
    }

    fn reveal_coin(&self, ctx: &mut InvokeContext<'_>) -> ProgramResult {
        let initiator = ctx.key(0)?;
        let acceptor = ctx.key(1)?;
        let vault = ctx.key(2)?;
        let requester = ctx.key(3)?;
        let caller = ctx.key(4)?;
        let oracle_program = ctx.key(5)?;
        let coin_key = ctx.key(7)?;

        let mut coin: Coin = ctx.load(&coin_key, &ctx.program_id())?;
        if !ctx.is_signer(&caller) || !coin.is_party(&caller) {
            return Err(CoinFlipError::Unauthorized.into());
        }
        if initiator != coin.initiator || acceptor != coin.acceptor {
            return Err(CoinFlipError::Unauthorized.into());
        }
        self.verify_links(ctx, &coin, &coin_key, &vault, &requester, &oracle_program)?;
        if coin.status != CoinStatus::Approved {
            return Err(CoinFlipError::InvalidState(coin.status).into());
        }

        let record: RequestRecord = ctx.load(&requester, &coin.oracle_program)?;
        let value = read_random(&record).ok_or(CoinFlipError::NotFulfilled)?;

        let side = determine_winner(&value);
        let winner = coin.party(side);
        let pot = ctx.account(&vault)?.balance;
        ctx.transfer_owned(&vault, &winner, pot)?;

        coin.status = CoinStatus::Revealed;
        coin.revealed_at = Some(ctx.clock().unix_timestamp);
        coin.winner = Some(side);
        ctx.store(&coin_key, &coin)?;

        ctx.log(format!("coin {} revealed, {:?} wins {}", coin_key, side, pot));
        tracing::info!("Coin {} revealed: {} wins {}", coin_key, winner, pot);
        Ok(())
    }

    fn close_coin(&self, ctx: &mut InvokeContext<'_>) -> ProgramResult {
        let coin_key = ctx.key(0)?;
        let vault = ctx.key(1)?;
        let initiator = ctx.key(2)?;
        let requester = ctx.key(3)?;
        let oracle_program = ctx.key(4)?;

        let coin: Coin = ctx.load(&coin_key, &ctx.program_id())?;
        if !ctx.is_signer(&initiator) || initiator != coin.initiator {
            return Err(CoinFlipError::Unauthorized.into());
        }
        self.verify_links(ctx, &coin, &coin_key, &vault, &requester, &oracle_program)?;
        if coin.status != CoinStatus::Revealed {
            return Err(CoinFlipError::InvalidState(coin.status).into());
        }

        // Hand the request record back so the initiator can flip again.
        let bump = [coin.bump];
        let coin_seeds: &[&[u8]] = &[COIN_SEED, initiator.as_ref(), &bump];
        vrflip_oracle::cpi::transfer_authority(
            ctx,
            &TransferAuthorityAccounts {
                requester,
                authority: coin_key,
                new_authority: initiator,
            },
            &[coin_seeds],
        )?;

        for account in [vault, coin_key] {
            let leftover = ctx.account(&account)?.balance;
            if leftover > 0 {
                ctx.transfer_owned(&account, &initiator, leftover)?;
            }
        }

        let account = ctx.account_mut(&coin_key)?;
        account.data.clear();
        account.owner = SYSTEM_PROGRAM_ID;
        ctx.account_mut(&vault)?.owner = SYSTEM_PROGRAM_ID;

        ctx.log(format!("coin {} closed", coin_key));
        tracing::info!("Coin {} closed by {}", coin_key, initiator);
        Ok(())
    }
}

impl Program for CoinFlip {
    fn id(&self) -> Address {
        crate::id()
    }

    fn name(&self) -> &'static str {
        "coinflip"
    }

    fn process(&self, ctx: &mut InvokeContext<'_>, data: &[u8]) -> ProgramResult {
        match decode_payload::<CoinFlipInstruction>(data)? {
            CoinFlipInstruction::CreateCoin {
                coin_bump,
                req_bump,
                vault_bump,
                amount,
            } => self.create_coin(ctx, coin_bump, req_bump, vault_bump, amount),
            CoinFlipInstruction::ApproveFlip => self.approve_flip(ctx),
            CoinFlipInstruction::RevealCoin => self.reveal_coin(ctx),
            CoinFlipInstruction::CloseCoin => self.close_coin(ctx),
        }
    }
}
