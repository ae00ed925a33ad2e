// =============================================================================
// Repay Instruction
// =============================================================================
// Repays the entry's debt asset. Backstop debt retires first, fee bucket
// before principal within the backstop leg; the remainder returns to the
// primary pool. Custody splits across both vaults accordingly.
// =============================================================================

use anchor_lang::prelude::*;
use anchor_spl::token::{self, Mint, Token, TokenAccount, Transfer};

use crate::constants::{BACKSTOP_SEED, BACKSTOP_STATE_SEED, POOL_SEED, POSITION_SEED};
use crate::error::LedgerError;
use crate::events::LiquidityRepaid;
use crate::instructions::common::accrue_and_collect;
use crate::state::backstop::route_repay;
use crate::state::{BackstopState, Pool, Position, PositionClass};

#[derive(Accounts)]
pub struct RepayLiquidity<'info> {
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

    /// User's token account for the debt asset (source of the repayment)
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

pub fn handler_repay(
    ctx: Context<RepayLiquidity>,
    amount: u64,
    class: PositionClass,
) -> Result<()> {
    require!(amount > 0, LedgerError::InvalidAmount);

    let asset_key = ctx.accounts.asset_mint.key();
    let pool = &ctx.accounts.pool;
    require!(asset_key != pool.stable_mint, LedgerError::InvalidMint);

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

    let routing = route_repay(
        &mut ctx.accounts.pool,
        &mut ctx.accounts.backstop_pool,
        &mut ctx.accounts.backstop_state,
        &flow_mint,
        amount as u128,
    )?;
    ctx.accounts
        .position
        .record_repay(&asset_key, class, routing.debt_share)?;

    if routing.to_local > 0 {
        token::transfer(
            CpiContext::new(
                ctx.accounts.token_program.to_account_info(),
                Transfer {
                    from: ctx.accounts.user_token.to_account_info(),
                    to: ctx.accounts.vault.to_account_info(),
                    authority: ctx.accounts.user.to_account_info(),
                },
            ),
            routing
                .to_local
                .try_into()
                .map_err(|_| LedgerError::MathOverflow)?,
        )?;
    }
    if routing.to_backstop > 0 {
        let backstop_vault = ctx
            .accounts
            .backstop_vault
            .as_ref()
            .ok_or(LedgerError::InvalidVault)?;
        require!(
            backstop_vault.key() == ctx.accounts.backstop_pool.asset(&flow_mint)?.vault,
            LedgerError::InvalidVault
        );
        token::transfer(
            CpiContext::new(
                ctx.accounts.token_program.to_account_info(),
                Transfer {
                    from: ctx.accounts.user_token.to_account_info(),
                    to: backstop_vault.to_account_info(),
                    authority: ctx.accounts.user.to_account_info(),
                },
            ),
            routing
                .to_backstop
                .try_into()
                .map_err(|_| LedgerError::MathOverflow)?,
        )?;
    }

    emit!(LiquidityRepaid {
        user: ctx.accounts.user.key(),
        pool: ctx.accounts.pool.key(),
        mint: flow_mint,
        amount,
        to_backstop: routing
            .to_backstop
            .try_into()
            .map_err(|_| LedgerError::MathOverflow)?,
        to_local: routing
            .to_local
            .try_into()
            .map_err(|_| LedgerError::MathOverflow)?,
        timestamp: now,
    });
    msg!(
        "Repaid {}: {} to backstop, {} to local",
        amount,
        routing.to_backstop,
        routing.to_local
    );

    Ok(())
}
