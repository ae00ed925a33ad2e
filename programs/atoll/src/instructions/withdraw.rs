// =============================================================================
// Withdraw Instruction
// =============================================================================
// Withdraws liquidity from the primary pool. When the entry carries debt,
// the post-withdrawal position must stay within its LTV capacity; the
// oracle accounts for both legs arrive via remaining_accounts.
// =============================================================================

use anchor_lang::prelude::*;
use anchor_spl::token::{self, Mint, Token, TokenAccount, Transfer};

use crate::constants::{BACKSTOP_SEED, BACKSTOP_STATE_SEED, POOL_SEED, POSITION_SEED};
use crate::error::LedgerError;
use crate::events::LiquidityWithdrawn;
use crate::instructions::common::{accrue_and_collect, build_snapshots};
use crate::math::rebalance::within_ltv;
use crate::state::{BackstopState, Pool, Position, PositionClass};

#[derive(Accounts)]
pub struct WithdrawLiquidity<'info> {
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

    /// User's token account for the flowing asset
    #[account(
        mut,
        constraint = user_token.owner == user.key() @ LedgerError::InvalidTokenAccountOwner
    )]
    pub user_token: Account<'info, TokenAccount>,

    /// Primary vault of the flowing asset
    #[account(mut)]
    pub vault: Account<'info, TokenAccount>,

    /// Backstop vault of the flowing asset, for support-fee collection
    #[account(mut)]
    pub backstop_vault: Option<Account<'info, TokenAccount>>,

    pub token_program: Program<'info, Token>,
}

pub fn handler_withdraw(
    ctx: Context<WithdrawLiquidity>,
    amount: u64,
    class: PositionClass,
    collateral_only: bool,
) -> Result<()> {
    require!(amount > 0, LedgerError::InvalidAmount);

    let asset_key = ctx.accounts.asset_mint.key();
    let pool = &ctx.accounts.pool;
    require!(asset_key != pool.stable_mint, LedgerError::InvalidMint);

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

    // The withdrawer can never take more value than their shares entitle:
    // the amount is capped by the share value before the ledger mutates.
    let entry = ctx
        .accounts
        .position
        .entry(&asset_key, class)
        .ok_or(LedgerError::InsufficientBalance)?;
    let entry_share = if collateral_only {
        entry.collateral_only_share
    } else {
        entry.deposited_share
    };
    let has_debt = entry.borrowed_share > 0;
    let entitled = ctx
        .accounts
        .pool
        .asset(&flow_mint)?
        .bucket(collateral_only)
        .share_value(entry_share)?;
    require!(amount as u128 <= entitled, LedgerError::InsufficientBalance);

    let share = ctx
        .accounts
        .pool
        .withdraw(&flow_mint, amount as u128, collateral_only)?;
    ctx.accounts
        .position
        .record_withdrawal(&asset_key, class, share, collateral_only)?;

    // Debt-carrying entries must stay within LTV after the withdrawal.
    if has_debt {
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
    }

    let stable_mint = ctx.accounts.pool.stable_mint;
    let pool_seeds = &[
        ctx.accounts.pool.seed_prefix(),
        stable_mint.as_ref(),
        &[ctx.accounts.pool.bump],
    ];
    let signer_seeds = &[&pool_seeds[..]];
    token::transfer(
        CpiContext::new_with_signer(
            ctx.accounts.token_program.to_account_info(),
            Transfer {
                from: ctx.accounts.vault.to_account_info(),
                to: ctx.accounts.user_token.to_account_info(),
                authority: ctx.accounts.pool.to_account_info(),
            },
            signer_seeds,
        ),
        amount,
    )?;

    emit!(LiquidityWithdrawn {
        user: ctx.accounts.user.key(),
        pool: ctx.accounts.pool.key(),
        mint: flow_mint,
        amount,
        share,
        collateral_only,
        timestamp: now,
    });
    msg!("Withdrew {} for {} shares", amount, share);

    Ok(())
}
