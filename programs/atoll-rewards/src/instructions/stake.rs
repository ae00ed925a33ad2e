use anchor_lang::prelude::*;
use anchor_spl::token::{self, Token, TokenAccount, Transfer};

use crate::constants::{DISTRIBUTION_SEED, MIN_STAKE_AMOUNT, USER_REWARD_SEED};
use crate::error::RewardsError;
use crate::state::{DistributionState, UserReward};

/// Stake tokens to start earning the emission.
///
/// # Flow
/// 1. Advance the global index, then accrue the user at the new index
/// 2. Transfer stake tokens into the vault
/// 3. Record the new stake (no retroactive rewards: accrual ran first)
#[derive(Accounts)]
pub struct Stake<'info> {
    #[account(mut)]
    pub user: Signer<'info>,

    #[account(
        mut,
        seeds = [DISTRIBUTION_SEED, distribution.stake_mint.as_ref()],
        bump = distribution.bump,
        constraint = !distribution.is_paused @ RewardsError::DistributionPaused
    )]
    pub distribution: Account<'info, DistributionState>,

    #[account(
        init_if_needed,
        payer = user,
        space = 8 + UserReward::INIT_SPACE,
        seeds = [USER_REWARD_SEED, distribution.key().as_ref(), user.key().as_ref()],
        bump
    )]
    pub user_reward: Account<'info, UserReward>,

    #[account(
        mut,
        constraint = user_stake_account.mint == distribution.stake_mint @ RewardsError::InvalidStakeMint,
        constraint = user_stake_account.owner == user.key() @ RewardsError::InvalidTokenAccountOwner
    )]
    pub user_stake_account: Account<'info, TokenAccount>,

    #[account(
        mut,
        constraint = stake_vault.key() == distribution.stake_vault @ RewardsError::InvalidPDA
    )]
    pub stake_vault: Account<'info, TokenAccount>,

    pub token_program: Program<'info, Token>,
    pub system_program: Program<'info, System>,
}

pub fn handler_stake(ctx: Context<Stake>, amount: u64) -> Result<()> {
    require!(amount > 0, RewardsError::InvalidAmount);
    require!(amount >= MIN_STAKE_AMOUNT, RewardsError::BelowMinimumStake);

    let now = Clock::get()?.unix_timestamp;
    let distribution = &mut ctx.accounts.distribution;
    distribution.update_global_index(now)?;

    let distribution_key = distribution.key();
    let user_key = ctx.accounts.user.key();
    let global_index = distribution.global_index;

    let user_reward = &mut ctx.accounts.user_reward;
    if user_reward.owner == Pubkey::default() {
        user_reward.distribution = distribution_key;
        user_reward.owner = user_key;
        user_reward.bump = ctx.bumps.user_reward;
        user_reward.reward_index = global_index;
    }
    user_reward.accrue(global_index)?;
    user_reward.record_stake(amount, now)?;

    distribution.total_staked = distribution
        .total_staked
        .checked_add(amount)
        .ok_or(RewardsError::MathOverflow)?;

    token::transfer(
        CpiContext::new(
            ctx.accounts.token_program.to_account_info(),
            Transfer {
                from: ctx.accounts.user_stake_account.to_account_info(),
                to: ctx.accounts.stake_vault.to_account_info(),
                authority: ctx.accounts.user.to_account_info(),
            },
        ),
        amount,
    )?;

    msg!(
        "Staked {}. Total staked: {}",
        amount,
        ctx.accounts.distribution.total_staked
    );
    Ok(())
}
