// =============================================================================
// Borrow With Rebalance Instruction
// =============================================================================
// Borrows the entry's asset against stable collateral, then - if the
// resulting StableToAsset entry is unsafe - reallocates stable deposits
// across the user's unprotected StableToAsset coins toward one common
// health factor, raising additional stable from AssetToStable headroom
// (greedy first-fit) when the reallocation alone cannot cover the
// requirement. Fails with CannotBorrowWithRebalance when capacity across
// both classes is exhausted.
// =============================================================================

use anchor_lang::prelude::*;
use anchor_spl::token::{Mint, Token, TokenAccount};

use crate::constants::{BACKSTOP_SEED, BACKSTOP_STATE_SEED, POOL_SEED, POSITION_SEED};
use crate::error::LedgerError;
use crate::events::{LiquidityBorrowed, PositionRebalanced};
use crate::instructions::common::{
    accrue_and_collect, build_snapshots, execute_steps, stable_price, transfer_borrow_payouts,
};
use crate::math::interest::{accrue_interest, SupportFeeMode};
use crate::math::rebalance::{is_safe, plan_reallocation, plan_stable_raise, ReallocationOutcome};
use crate::state::backstop::route_borrow;
use crate::state::{BackstopState, Pool, Position, PositionClass};

#[derive(Accounts)]
pub struct BorrowWithRebalance<'info> {
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
        mut,
        seeds = [POSITION_SEED, pool.key().as_ref(), user.key().as_ref()],
        bump = position.bump,
        constraint = position.owner == user.key() @ LedgerError::Unauthorized
    )]
    pub position: Account<'info, Position>,

    /// The asset being borrowed (keys the StableToAsset entry)
    pub asset_mint: Account<'info, Mint>,

    /// User's token account for the borrowed asset
    #[account(
        mut,
        constraint = user_token.owner == user.key() @ LedgerError::InvalidTokenAccountOwner
    )]
    pub user_token: Account<'info, TokenAccount>,

    /// Primary vault of the borrowed asset
    #[account(mut)]
    pub vault: Account<'info, TokenAccount>,

    /// Backstop vault of the borrowed asset
    #[account(mut)]
    pub backstop_vault: Option<Account<'info, TokenAccount>>,

    pub token_program: Program<'info, Token>,
}

pub fn handler_borrow_with_rebalance(
    ctx: Context<BorrowWithRebalance>,
    amount: u64,
) -> Result<()> {
    require!(amount > 0, LedgerError::InvalidAmount);

    let asset_key = ctx.accounts.asset_mint.key();
    let stable_mint = ctx.accounts.pool.stable_mint;
    require!(asset_key != stable_mint, LedgerError::InvalidMint);
    require!(
        ctx.accounts.vault.key() == ctx.accounts.pool.asset(&asset_key)?.vault,
        LedgerError::InvalidVault
    );
    require!(
        ctx.accounts.user_token.mint == asset_key,
        LedgerError::InvalidMint
    );

    let now = Clock::get()?.unix_timestamp;
    // The borrowed asset accrues with full collection (its vault pair is at
    // hand); the stable leg carries its support fee forward.
    accrue_and_collect(
        &mut ctx.accounts.pool,
        &mut ctx.accounts.backstop_pool,
        &mut ctx.accounts.backstop_state,
        &asset_key,
        &ctx.accounts.vault,
        ctx.accounts.backstop_vault.as_ref(),
        &ctx.accounts.token_program,
        now,
    )?;
    accrue_interest(
        &mut ctx.accounts.pool,
        &stable_mint,
        SupportFeeMode::Carry(&mut ctx.accounts.backstop_state),
        now,
    )?;

    // The borrow itself is unconditional; safety is restored afterwards.
    let routing = route_borrow(
        &mut ctx.accounts.pool,
        &mut ctx.accounts.backstop_pool,
        &mut ctx.accounts.backstop_state,
        &asset_key,
        amount as u128,
    )?;
    ctx.accounts.position.record_borrow(
        &asset_key,
        PositionClass::StableToAsset,
        routing.debt_share,
    )?;

    transfer_borrow_payouts(
        &ctx.accounts.pool,
        &ctx.accounts.backstop_pool,
        &ctx.accounts.vault,
        ctx.accounts.backstop_vault.as_ref(),
        &ctx.accounts.user_token,
        &ctx.accounts.token_program,
        &asset_key,
        &routing,
    )?;

    let entry_index = ctx
        .accounts
        .position
        .entry_index(&asset_key, PositionClass::StableToAsset)
        .ok_or(LedgerError::NotInitialized)?;

    let snapshots = build_snapshots(
        &ctx.accounts.pool,
        &ctx.accounts.position,
        ctx.remaining_accounts,
        false,
        now,
    )?;
    let target = snapshots
        .iter()
        .find(|c| c.entry_index == entry_index)
        .ok_or(LedgerError::NotInitialized)?;

    if is_safe(target.collateral_volume, target.threshold, target.debt_volume)? {
        msg!("Borrow left the position safe - no rebalance needed");
        return emit_borrow(&ctx, amount, &routing, now);
    }

    // Unsafe: equalize across the unprotected StableToAsset coins, raising
    // stable from AssetToStable headroom when deposits alone cannot cover.
    let unprotected: Vec<_> = snapshots
        .iter()
        .filter(|c| !ctx.accounts.position.entries[c.entry_index].protected)
        .copied()
        .collect();
    let sta_coins: Vec<_> = unprotected
        .iter()
        .filter(|c| c.class == PositionClass::StableToAsset)
        .copied()
        .collect();
    let ats_coins: Vec<_> = unprotected
        .iter()
        .filter(|c| c.class == PositionClass::AssetToStable)
        .copied()
        .collect();
    require!(
        sta_coins.iter().any(|c| c.entry_index == entry_index),
        LedgerError::CannotBorrowWithRebalance
    );

    let price = stable_price(&ctx.accounts.pool, ctx.remaining_accounts, now)?;
    let mut steps;
    let mut stable_borrowed = 0u128;
    match plan_reallocation(&sta_coins, 0)? {
        ReallocationOutcome::Balanced(plan) => {
            steps = plan;
        }
        ReallocationOutcome::Shortfall(missing) => {
            let (raise_steps, raised) = plan_stable_raise(&ats_coins, missing)?;
            require!(raised >= missing, LedgerError::CannotBorrowWithRebalance);
            stable_borrowed = raised;
            steps = raise_steps;
            match plan_reallocation(&sta_coins, raised)? {
                ReallocationOutcome::Balanced(mut plan) => steps.append(&mut plan),
                ReallocationOutcome::Shortfall(_) => {
                    return Err(LedgerError::CannotBorrowWithRebalance.into())
                }
            }
        }
    }

    let summary = execute_steps(
        &mut ctx.accounts.pool,
        &mut ctx.accounts.position,
        price,
        &steps,
        entry_index,
    )?;

    emit!(PositionRebalanced {
        user: ctx.accounts.user.key(),
        pool: ctx.accounts.pool.key(),
        stable_reallocated: summary.withdrawn,
        stable_borrowed,
        timestamp: now,
    });
    msg!(
        "Rebalanced: {} stable reallocated, {} stable raised",
        summary.withdrawn,
        summary.borrowed
    );

    emit_borrow(&ctx, amount, &routing, now)
}

fn emit_borrow(
    ctx: &Context<BorrowWithRebalance>,
    amount: u64,
    routing: &crate::state::backstop::BorrowRouting,
    now: i64,
) -> Result<()> {
    let total_fee = routing
        .local_fee
        .checked_add(routing.backstop_fee)
        .ok_or(LedgerError::MathOverflow)?;
    emit!(LiquidityBorrowed {
        user: ctx.accounts.user.key(),
        pool: ctx.accounts.pool.key(),
        mint: ctx.accounts.asset_mint.key(),
        amount,
        from_local: routing
            .from_local
            .try_into()
            .map_err(|_| LedgerError::MathOverflow)?,
        from_backstop: routing
            .from_backstop
            .try_into()
            .map_err(|_| LedgerError::MathOverflow)?,
        total_fee: total_fee
            .try_into()
            .map_err(|_| LedgerError::MathOverflow)?,
        timestamp: now,
    });
    Ok(())
}
