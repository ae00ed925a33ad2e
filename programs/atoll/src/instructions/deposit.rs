// =============================================================================
// Deposit Instruction
// =============================================================================
// Deposits liquidity into the primary pool against a position entry.
//
// Flow:
// 1. Interest accrues for the flowing asset (with support-fee collection)
// 2. The ledger mints deposit shares against the target bucket
// 3. Tokens move from the user to the asset vault
// 4. The share delta is persisted on the user's position entry
//
// The flowing asset depends on the entry class: AssetToStable deposits the
// entry's asset, StableToAsset deposits the stable unit.
// =============================================================================

use anchor_lang::prelude::*;
use anchor_spl::token::{self, Mint, Token, TokenAccount, Transfer};

use crate::constants::{BACKSTOP_SEED, BACKSTOP_STATE_SEED, POOL_SEED, POSITION_SEED};
use crate::error::LedgerError;
use crate::events::LiquidityDeposited;
use crate::instructions::common::accrue_and_collect;
use crate::state::{BackstopState, Pool, Position, PositionClass};

#[derive(Accounts)]
pub struct DepositLiquidity<'info> {
    #[account(mut)]
    pub user: Signer<'info>,

    #[account(
        mut,
        seeds = [POOL_SEED, pool.stable_mint.as_ref()],
        bump = pool.bump,
        constraint = !pool.is_paused @ LedgerError::PoolPaused
    )]
    pub pool: Account<'info, Pool>,

    #[account(
        mut,
        seeds = [BACKSTOP_SEED, pool.stable_mint.as_ref()],
        bump = backstop_pool.bump
    )]
    pub backstop_pool: Account<'info, Pool>,

    #[account(
        mut,
        seeds = [BACKSTOP_STATE_SEED, backstop_pool.key().as_ref()],
        bump = backstop_state.bump
    )]
    pub backstop_state: Account<'info, BackstopState>,

    #[account(
        init_if_needed,
        payer = user,
        space = 8 + Position::INIT_SPACE,
        seeds = [POSITION_SEED, pool.key().as_ref(), user.key().as_ref()],
        bump
    )]
    pub position: Account<'info, Position>,

    /// The non-stable asset keying the position entry
    pub asset_mint: Account<'info, Mint>,

    /// User's token account for the flowing asset
    #[account(
        mut,
        constraint = user_token.owner == user.key() @ LedgerError::InvalidTokenAccountOwner
    )]
    pub user_token: Account<'info, TokenAccount>,

    /// Primary vault of the flowing asset
    #[account(mut)]
    pub vault: Account<'info, TokenAccount>,

    /// Backstop vault of the flowing asset, for support-fee collection.
    /// Optional: only required when the asset is backstop-supported.
    #[account(mut)]
    pub backstop_vault: Option<Account<'info, TokenAccount>>,

    pub token_program: Program<'info, Token>,
    pub system_program: Program<'info, System>,
}

pub fn handler_deposit(
    ctx: Context<DepositLiquidity>,
    amount: u64,
    class: PositionClass,
    collateral_only: bool,
) -> Result<()> {
    require!(amount > 0, LedgerError::InvalidAmount);

    let asset_key = ctx.accounts.asset_mint.key();
    let pool = &mut ctx.accounts.pool;
    require!(asset_key != pool.stable_mint, LedgerError::InvalidMint);
    pool.asset(&asset_key)?;

    let flow_mint = match class {
        PositionClass::AssetToStable => asset_key,
        PositionClass::StableToAsset => pool.stable_mint,
    };
    require!(
        ctx.accounts.vault.key() == pool.asset(&flow_mint)?.vault,
        LedgerError::InvalidVault
    );
    require!(
        ctx.accounts.user_token.mint == flow_mint,
        LedgerError::InvalidMint
    );

    let now = Clock::get()?.unix_timestamp;
    accrue_and_collect(
        &mut ctx.accounts.pool,
        &mut ctx.accounts.backstop_pool,
        &mut ctx.accounts.backstop_state,
        &flow_mint,
        &ctx.accounts.vault,
        ctx.accounts.backstop_vault.as_ref(),
        &ctx.accounts.token_program,
        now,
    )?;

    let share = ctx
        .accounts
        .pool
        .deposit(&flow_mint, amount as u128, collateral_only)?;

    // First-touch position setup, then persist the share delta.
    let pool_key = ctx.accounts.pool.key();
    let user_key = ctx.accounts.user.key();
    let position = &mut ctx.accounts.position;
    if position.owner == Pubkey::default() {
        position.pool = pool_key;
        position.owner = user_key;
        position.bump = ctx.bumps.position;
    }
    position.record_deposit(&asset_key, class, share, collateral_only)?;

    token::transfer(
        CpiContext::new(
            ctx.accounts.token_program.to_account_info(),
            Transfer {
                from: ctx.accounts.user_token.to_account_info(),
                to: ctx.accounts.vault.to_account_info(),
                authority: ctx.accounts.user.to_account_info(),
            },
        ),
        amount,
    )?;

    emit!(LiquidityDeposited {
        user: user_key,
        pool: pool_key,
        mint: flow_mint,
        amount,
        share,
        collateral_only,
        timestamp: now,
    });
    msg!("Deposited {} for {} shares", amount, share);

    Ok(())
}
