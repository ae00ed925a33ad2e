// =============================================================================
// Pool Initialization
// =============================================================================
// One primary pool and one backstop pool exist per stable mint. The backstop
// carries an additional BackstopState account holding its supported-asset
// set and per-asset debt counters.
// =============================================================================

use anchor_lang::prelude::*;
use anchor_spl::token::Mint;

use crate::constants::{BACKSTOP_SEED, BACKSTOP_STATE_SEED, POOL_SEED};
use crate::state::{BackstopState, Pool, PoolKind};

/// Fee configuration supplied at pool creation, RATE_PRECISION rates.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy)]
pub struct PoolFees {
    pub entry_fee_rate: u64,
    pub protocol_fee_rate: u64,
    pub support_fee_rate: u64,
    pub liquidation_fee_rate: u64,
}

#[derive(Accounts)]
pub struct InitializePool<'info> {
    /// Becomes the pool admin
    #[account(mut)]
    pub admin: Signer<'info>,

    /// The stable unit this deployment is quoted in
    pub stable_mint: Account<'info, Mint>,

    #[account(
        init,
        payer = admin,
        space = 8 + Pool::INIT_SPACE,
        seeds = [POOL_SEED, stable_mint.key().as_ref()],
        bump
    )]
    pub pool: Account<'info, Pool>,

    pub system_program: Program<'info, System>,
}

pub fn handler_initialize_pool(ctx: Context<InitializePool>, fees: PoolFees) -> Result<()> {
    let pool = &mut ctx.accounts.pool;
    pool.admin = ctx.accounts.admin.key();
    pool.stable_mint = ctx.accounts.stable_mint.key();
    pool.kind = PoolKind::Primary;
    pool.entry_fee_rate = fees.entry_fee_rate;
    pool.protocol_fee_rate = fees.protocol_fee_rate;
    pool.support_fee_rate = fees.support_fee_rate;
    pool.liquidation_fee_rate = fees.liquidation_fee_rate;
    pool.is_paused = false;
    pool.bump = ctx.bumps.pool;

    msg!("Primary pool initialized for stable mint {}", pool.stable_mint);
    Ok(())
}

#[derive(Accounts)]
pub struct InitializeBackstop<'info> {
    /// Becomes the backstop admin
    #[account(mut)]
    pub admin: Signer<'info>,

    pub stable_mint: Account<'info, Mint>,

    #[account(
        init,
        payer = admin,
        space = 8 + Pool::INIT_SPACE,
        seeds = [BACKSTOP_SEED, stable_mint.key().as_ref()],
        bump
    )]
    pub backstop_pool: Account<'info, Pool>,

    #[account(
        init,
        payer = admin,
        space = 8 + BackstopState::INIT_SPACE,
        seeds = [BACKSTOP_STATE_SEED, backstop_pool.key().as_ref()],
        bump
    )]
    pub backstop_state: Account<'info, BackstopState>,

    pub system_program: Program<'info, System>,
}

pub fn handler_initialize_backstop(ctx: Context<InitializeBackstop>, fees: PoolFees) -> Result<()> {
    let pool = &mut ctx.accounts.backstop_pool;
    pool.admin = ctx.accounts.admin.key();
    pool.stable_mint = ctx.accounts.stable_mint.key();
    pool.kind = PoolKind::Backstop;
    pool.entry_fee_rate = fees.entry_fee_rate;
    pool.protocol_fee_rate = fees.protocol_fee_rate;
    pool.support_fee_rate = fees.support_fee_rate;
    pool.liquidation_fee_rate = fees.liquidation_fee_rate;
    pool.is_paused = false;
    pool.bump = ctx.bumps.backstop_pool;

    let state = &mut ctx.accounts.backstop_state;
    state.backstop_pool = ctx.accounts.backstop_pool.key();
    state.bump = ctx.bumps.backstop_state;

    msg!(
        "Backstop pool initialized for stable mint {}",
        ctx.accounts.backstop_pool.stable_mint
    );
    Ok(())
}
