// =============================================================================
// Borrow Instruction
// =============================================================================
// Borrows the entry's debt asset, splitting liquidity between the primary
// pool and the backstop. Payouts come from both vaults; entry fees accrue
// per portion. The resulting entry must stay within its LTV capacity
// (oracles for both legs via remaining_accounts).
// =============================================================================

use anchor_lang::prelude::*;
use anchor_spl::token::{Mint, Token, TokenAccount};

use crate::constants::{BACKSTOP_SEED, BACKSTOP_STATE_SEED, POOL_SEED, POSITION_SEED};
use crate::error::LedgerError;
use crate::events::LiquidityBorrowed;
use crate::instructions::common::{accrue_and_collect, build_snapshots, transfer_borrow_payouts};
use crate::math::rebalance::within_ltv;
use crate::state::backstop::route_borrow;
use crate::state::{BackstopState, Pool, Position, PositionClass};

#[derive(Accounts)]
pub struct BorrowLiquidity<'info> {
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

    /// The non-stable asset keying the position entry
    pub asset_mint: Account<'info, Mint>,

    /// User's token account for the debt asset (receives the payout)
    #[account(
        mut,
        constraint = user_token.owner == user.key() @ LedgerError::InvalidTokenAccountOwner
    )]
    pub user_token: Account<'info, TokenAccount>,

    /// Primary vault of the debt asset
    #[account(mut)]
    pub vault: Account<'info, TokenAccount>,

    /// Backstop vault of the debt asset
    #[account(mut)]
    pub backstop_vault: Option<Account<'info, TokenAccount>>,

    pub token_program: Program<'info, Token>,
}

pub fn handler_borrow(
    ctx: Context<BorrowLiquidity>,
    amount: u64,
    class: PositionClass,
) -> Result<()> {
    require!(amount > 0, LedgerError::InvalidAmount);

    let asset_key = ctx.accounts.asset_mint.key();
    let pool = &ctx.accounts.pool;
    require!(asset_key != pool.stable_mint, LedgerError::InvalidMint);
    pool.asset(&asset_key)?;

    // The debt asset is the opposite leg of the deposit flow.
    let flow_mint = match class {
        PositionClass::AssetToStable => pool.stable_mint,
        PositionClass::StableToAsset => asset_key,
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

    let routing = route_borrow(
        &mut ctx.accounts.pool,
        &mut ctx.accounts.backstop_pool,
        &mut ctx.accounts.backstop_state,
        &flow_mint,
        amount as u128,
    )?;
    ctx.accounts
        .position
        .record_borrow(&asset_key, class, routing.debt_share)?;

    // The new debt must stay within the entry's LTV capacity.
    let snapshots = build_snapshots(
        &ctx.accounts.pool,
        &ctx.accounts.position,
        ctx.remaining_accounts,
        false,
        now,
    )?;
    let entry_index = ctx
        .accounts
        .position
        .entry_index(&asset_key, class)
        .ok_or(LedgerError::NotInitialized)?;
    let coin = snapshots
        .iter()
        .find(|c| c.entry_index == entry_index)
        .ok_or(LedgerError::NotInitialized)?;
    require!(
        within_ltv(coin.collateral_volume, coin.ltv, coin.debt_volume)?,
        LedgerError::PositionUnsafe
    );

    transfer_borrow_payouts(
        &ctx.accounts.pool,
        &ctx.accounts.backstop_pool,
        &ctx.accounts.vault,
        ctx.accounts.backstop_vault.as_ref(),
        &ctx.accounts.user_token,
        &ctx.accounts.token_program,
        &flow_mint,
        &routing,
    )?;

    let total_fee = routing
        .local_fee
        .checked_add(routing.backstop_fee)
        .ok_or(LedgerError::MathOverflow)?;
    emit!(LiquidityBorrowed {
        user: ctx.accounts.user.key(),
        pool: ctx.accounts.pool.key(),
        mint: flow_mint,
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
    msg!(
        "Borrowed {}: {} local, {} backstop, {} fees",
        amount,
        routing.from_local,
        routing.from_backstop,
        total_fee
    );

    Ok(())
}
