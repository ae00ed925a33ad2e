// =============================================================================
// Harvest Fees Instruction
// =============================================================================
// Moves accrued protocol fees out of pool custody to the treasury. Capped
// by the unharvested claim and by lendable liquidity, so collateral-only
// deposits can never be impaired.
// =============================================================================

use anchor_lang::prelude::*;
use anchor_spl::token::{self, Mint, Token, TokenAccount, Transfer};

use crate::error::LedgerError;
use crate::events::ProtocolFeesHarvested;
use crate::state::Pool;

#[derive(Accounts)]
pub struct HarvestFees<'info> {
    pub admin: Signer<'info>,

    /// Primary or backstop pool; both accrue fees the same way
    #[account(
        mut,
        constraint = pool.admin == admin.key() @ LedgerError::Unauthorized
    )]
    pub pool: Account<'info, Pool>,

    /// The asset whose vault the fees are taken from
    pub mint: Account<'info, Mint>,

    #[account(mut)]
    pub vault: Account<'info, TokenAccount>,

    /// Treasury destination for the harvested fees
    #[account(
        mut,
        constraint = treasury_token.mint == mint.key() @ LedgerError::InvalidMint
    )]
    pub treasury_token: Account<'info, TokenAccount>,

    pub token_program: Program<'info, Token>,
}

pub fn handler_harvest_fees(ctx: Context<HarvestFees>, amount: u64) -> Result<()> {
    require!(amount > 0, LedgerError::InvalidAmount);

    let mint = ctx.accounts.mint.key();
    let pool = &mut ctx.accounts.pool;
    require!(
        ctx.accounts.vault.key() == pool.asset(&mint)?.vault,
        LedgerError::InvalidVault
    );

    let unharvested = pool
        .protocol_fees_accrued
        .checked_sub(pool.protocol_fees_harvested)
        .ok_or(LedgerError::MathUnderflow)?;
    require!(amount as u128 <= unharvested, LedgerError::InsufficientBalance);
    require!(
        amount as u128 <= pool.available_liquidity(),
        LedgerError::InsufficientBalance
    );
    require!(
        amount <= ctx.accounts.vault.amount,
        LedgerError::InsufficientBalance
    );

    pool.protocol_fees_harvested = pool
        .protocol_fees_harvested
        .checked_add(amount as u128)
        .ok_or(LedgerError::MathOverflow)?;
    pool.held_balance = pool
        .held_balance
        .checked_sub(amount as u128)
        .ok_or(LedgerError::MathUnderflow)?;

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
                to: ctx.accounts.treasury_token.to_account_info(),
                authority: ctx.accounts.pool.to_account_info(),
            },
            signer_seeds,
        ),
        amount,
    )?;

    let now = Clock::get()?.unix_timestamp;
    emit!(ProtocolFeesHarvested {
        pool: ctx.accounts.pool.key(),
        mint,
        amount,
        timestamp: now,
    });
    msg!("Harvested {} of protocol fees", amount);

    Ok(())
}
