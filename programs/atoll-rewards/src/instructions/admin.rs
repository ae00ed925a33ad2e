use anchor_lang::prelude::*;
use anchor_spl::token::{self, Token, TokenAccount, Transfer};

use crate::constants::{DISTRIBUTION_SEED, MAX_EMISSION_PER_SEC};
use crate::error::RewardsError;
use crate::state::DistributionState;

#[derive(Accounts)]
pub struct AdminDistribution<'info> {
    pub admin: Signer<'info>,

    #[account(
        mut,
        seeds = [DISTRIBUTION_SEED, distribution.stake_mint.as_ref()],
        bump = distribution.bump,
        constraint = distribution.admin == admin.key() @ RewardsError::Unauthorized
    )]
    pub distribution: Account<'info, DistributionState>,
}

/// Change the emission rate. The index advances at the old rate first so
/// the change is never retroactive.
pub fn handler_set_emission(ctx: Context<AdminDistribution>, emission_per_sec: u64) -> Result<()> {
    require!(
        emission_per_sec <= MAX_EMISSION_PER_SEC,
        RewardsError::EmissionTooHigh
    );

    let now = Clock::get()?.unix_timestamp;
    let distribution = &mut ctx.accounts.distribution;
    distribution.update_global_index(now)?;
    distribution.emission_per_sec = emission_per_sec;

    msg!("Emission set to {}/sec", emission_per_sec);
    Ok(())
}

pub fn handler_pause_distribution(ctx: Context<AdminDistribution>, paused: bool) -> Result<()> {
    ctx.accounts.distribution.is_paused = paused;
    msg!("Distribution paused: {}", paused);
    Ok(())
}

/// Top the reward vault up, e.g. from harvested pool fees.
#[derive(Accounts)]
pub struct FundRewards<'info> {
    #[account(mut)]
    pub admin: Signer<'info>,

    #[account(
        seeds = [DISTRIBUTION_SEED, distribution.stake_mint.as_ref()],
        bump = distribution.bump,
        constraint = distribution.admin == admin.key() @ RewardsError::Unauthorized
    )]
    pub distribution: Account<'info, DistributionState>,

    #[account(
        mut,
        constraint = source.mint == distribution.reward_mint @ RewardsError::InvalidRewardMint,
        constraint = source.owner == admin.key() @ RewardsError::InvalidTokenAccountOwner
    )]
    pub source: Account<'info, TokenAccount>,

    #[account(
        mut,
        constraint = reward_vault.key() == distribution.reward_vault @ RewardsError::InvalidPDA
    )]
    pub reward_vault: Account<'info, TokenAccount>,

    pub token_program: Program<'info, Token>,
}

pub fn handler_fund_rewards(ctx: Context<FundRewards>, amount: u64) -> Result<()> {
    require!(amount > 0, RewardsError::InvalidAmount);

    token::transfer(
        CpiContext::new(
            ctx.accounts.token_program.to_account_info(),
            Transfer {
                from: ctx.accounts.source.to_account_info(),
                to: ctx.accounts.reward_vault.to_account_info(),
                authority: ctx.accounts.admin.to_account_info(),
            },
        ),
        amount,
    )?;

    msg!("Reward vault funded with {}", amount);
    Ok(())
}
