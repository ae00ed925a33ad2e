// =============================================================================
// Backstop Deposit / Withdraw Instructions
// =============================================================================
// The backstop pool's own depositors. Their yield arrives as support fees
// and backstop entry fees folded into the normal bucket, so shares are all
// the bookkeeping a backstop depositor needs - there is no borrowing
// against backstop deposits and no interest accrual on the backstop side.
// =============================================================================

use anchor_lang::prelude::*;
use anchor_spl::token::{self, Mint, Token, TokenAccount, Transfer};

use crate::constants::{BACKSTOP_DEPOSIT_SEED, BACKSTOP_SEED};
use crate::error::LedgerError;
use crate::events::{LiquidityDeposited, LiquidityWithdrawn};
use crate::state::{BackstopDeposit, Pool};

#[derive(Accounts)]
pub struct DepositBackstop<'info> {
    #[account(mut)]
    pub user: Signer<'info>,

    #[account(
        mut,
        seeds = [BACKSTOP_SEED, backstop_pool.stable_mint.as_ref()],
        bump = backstop_pool.bump,
        constraint = !backstop_pool.is_paused @ LedgerError::PoolPaused
    )]
    pub backstop_pool: Account<'info, Pool>,

    pub mint: Account<'info, Mint>,

    #[account(
        init_if_needed,
        payer = user,
        space = 8 + BackstopDeposit::INIT_SPACE,
        seeds = [
            BACKSTOP_DEPOSIT_SEED,
            backstop_pool.key().as_ref(),
            mint.key().as_ref(),
            user.key().as_ref()
        ],
        bump
    )]
    pub deposit_record: Account<'info, BackstopDeposit>,

    #[account(
        mut,
        constraint = user_token.owner == user.key() @ LedgerError::InvalidTokenAccountOwner,
        constraint = user_token.mint == mint.key() @ LedgerError::InvalidMint
    )]
    pub user_token: Account<'info, TokenAccount>,

    #[account(mut)]
    pub vault: Account<'info, TokenAccount>,

    pub token_program: Program<'info, Token>,
    pub system_program: Program<'info, System>,
}

pub fn handler_deposit_backstop(ctx: Context<DepositBackstop>, amount: u64) -> Result<()> {
    require!(amount > 0, LedgerError::InvalidAmount);

    let mint = ctx.accounts.mint.key();
    let pool = &mut ctx.accounts.backstop_pool;
    require!(
        ctx.accounts.vault.key() == pool.asset(&mint)?.vault,
        LedgerError::InvalidVault
    );

    let share = pool.deposit(&mint, amount as u128, false)?;

    let record = &mut ctx.accounts.deposit_record;
    if record.owner == Pubkey::default() {
        record.pool = ctx.accounts.backstop_pool.key();
        record.owner = ctx.accounts.user.key();
        record.mint = mint;
        record.bump = ctx.bumps.deposit_record;
    }
    record.share = record
        .share
        .checked_add(share)
        .ok_or(LedgerError::MathOverflow)?;

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

    let now = Clock::get()?.unix_timestamp;
    emit!(LiquidityDeposited {
        user: ctx.accounts.user.key(),
        pool: ctx.accounts.backstop_pool.key(),
        mint,
        amount,
        share,
        collateral_only: false,
        timestamp: now,
    });
    msg!("Backstop deposit of {} for {} shares", amount, share);

    Ok(())
}

#[derive(Accounts)]
pub struct WithdrawBackstop<'info> {
    #[account(mut)]
    pub user: Signer<'info>,

    #[account(
        mut,
        seeds = [BACKSTOP_SEED, backstop_pool.stable_mint.as_ref()],
        bump = backstop_pool.bump,
        constraint = !backstop_pool.is_paused @ LedgerError::PoolPaused
    )]
    pub backstop_pool: Account<'info, Pool>,

    pub mint: Account<'info, Mint>,

    #[account(
        mut,
        seeds = [
            BACKSTOP_DEPOSIT_SEED,
            backstop_pool.key().as_ref(),
            mint.key().as_ref(),
            user.key().as_ref()
        ],
        bump = deposit_record.bump,
        constraint = deposit_record.owner == user.key() @ LedgerError::Unauthorized
    )]
    pub deposit_record: Account<'info, BackstopDeposit>,

    #[account(
        mut,
        constraint = user_token.owner == user.key() @ LedgerError::InvalidTokenAccountOwner,
        constraint = user_token.mint == mint.key() @ LedgerError::InvalidMint
    )]
    pub user_token: Account<'info, TokenAccount>,

    #[account(mut)]
    pub vault: Account<'info, TokenAccount>,

    pub token_program: Program<'info, Token>,
}

pub fn handler_withdraw_backstop(ctx: Context<WithdrawBackstop>, amount: u64) -> Result<()> {
    require!(amount > 0, LedgerError::InvalidAmount);

    let mint = ctx.accounts.mint.key();
    let pool = &mut ctx.accounts.backstop_pool;
    require!(
        ctx.accounts.vault.key() == pool.asset(&mint)?.vault,
        LedgerError::InvalidVault
    );

    // Cap at the depositor's entitlement, then at what liquidity remains
    // after outstanding backstop draws.
    let entitled = pool
        .asset(&mint)?
        .normal
        .share_value(ctx.accounts.deposit_record.share)?;
    require!(amount as u128 <= entitled, LedgerError::InsufficientBalance);
    require!(
        amount as u128 <= pool.available_liquidity(),
        LedgerError::InsufficientBalance
    );

    let share = pool.withdraw(&mint, amount as u128, false)?;
    let record = &mut ctx.accounts.deposit_record;
    record.share = record
        .share
        .checked_sub(share)
        .ok_or(LedgerError::MathUnderflow)?;

    let stable_mint = ctx.accounts.backstop_pool.stable_mint;
    let pool_seeds = &[
        ctx.accounts.backstop_pool.seed_prefix(),
        stable_mint.as_ref(),
        &[ctx.accounts.backstop_pool.bump],
    ];
    let signer_seeds = &[&pool_seeds[..]];
    token::transfer(
        CpiContext::new_with_signer(
            ctx.accounts.token_program.to_account_info(),
            Transfer {
                from: ctx.accounts.vault.to_account_info(),
                to: ctx.accounts.user_token.to_account_info(),
                authority: ctx.accounts.backstop_pool.to_account_info(),
            },
            signer_seeds,
        ),
        amount,
    )?;

    let now = Clock::get()?.unix_timestamp;
    emit!(LiquidityWithdrawn {
        user: ctx.accounts.user.key(),
        pool: ctx.accounts.backstop_pool.key(),
        mint,
        amount,
        share,
        collateral_only: false,
        timestamp: now,
    });
    msg!("Backstop withdrawal of {} for {} shares", amount, share);

    Ok(())
}
