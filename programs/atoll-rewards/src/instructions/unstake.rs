use anchor_lang::prelude::*;
use anchor_spl::token::{self, Token, TokenAccount, Transfer};

use crate::constants::{DISTRIBUTION_SEED, USER_REWARD_SEED};
use crate::error::RewardsError;
use crate::state::{DistributionState, UserReward};

/// Unstake tokens. Accrued rewards stay on the account and remain
/// claimable.
#[derive(Accounts)]
pub struct Unstake<'info> {
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
        mut,
        seeds = [USER_REWARD_SEED, distribution.key().as_ref(), user.key().as_ref()],
        bump = user_reward.bump,
        constraint = user_reward.owner == user.key() @ RewardsError::InvalidAuthority
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
}

pub fn handler_unstake(ctx: Context<Unstake>, amount: u64) -> Result<()> {
    require!(amount > 0, RewardsError::InvalidAmount);

    let now = Clock::get()?.unix_timestamp;
    let distribution = &mut ctx.accounts.distribution;
    distribution.update_global_index(now)?;
    let global_index = distribution.global_index;

    let user_reward = &mut ctx.accounts.user_reward;
    user_reward.accrue(global_index)?;
    user_reward.record_unstake(amount, now)?;

    distribution.total_staked = distribution
        .total_staked
        .checked_sub(amount)
        .ok_or(RewardsError::MathUnderflow)?;

    let stake_mint = ctx.accounts.distribution.stake_mint;
    let distribution_seeds = &[
        DISTRIBUTION_SEED,
        stake_mint.as_ref(),
        &[ctx.accounts.distribution.bump],
    ];
    let signer_seeds = &[&distribution_seeds[..]];
    token::transfer(
        CpiContext::new_with_signer(
            ctx.accounts.token_program.to_account_info(),
            Transfer {
                from: ctx.accounts.stake_vault.to_account_info(),
                to: ctx.accounts.user_stake_account.to_account_info(),
                authority: ctx.accounts.distribution.to_account_info(),
            },
            signer_seeds,
        ),
        amount,
    )?;

    msg!(
        "Unstaked {}. Remaining stake: {}",
        amount,
        ctx.accounts.user_reward.staked_amount
    );
    Ok(())
}
