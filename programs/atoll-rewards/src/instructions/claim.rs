use anchor_lang::prelude::*;
use anchor_spl::token::{self, Token, TokenAccount, Transfer};

use crate::constants::{DISTRIBUTION_SEED, USER_REWARD_SEED};
use crate::error::RewardsError;
use crate::state::{DistributionState, UserReward};

/// Claim accrued rewards.
///
/// # Flow
/// 1. Advance the global index and accrue the user
/// 2. Fail with NoClaimableAmount when nothing has accrued
/// 3. Transfer rewards from the vault, capped by its balance
#[derive(Accounts)]
pub struct Claim<'info> {
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
        constraint = user_reward_account.mint == distribution.reward_mint @ RewardsError::InvalidRewardMint,
        constraint = user_reward_account.owner == user.key() @ RewardsError::InvalidTokenAccountOwner
    )]
    pub user_reward_account: Account<'info, TokenAccount>,

    #[account(
        mut,
        constraint = reward_vault.key() == distribution.reward_vault @ RewardsError::InvalidPDA
    )]
    pub reward_vault: Account<'info, TokenAccount>,

    pub token_program: Program<'info, Token>,
}

pub fn handler_claim(ctx: Context<Claim>) -> Result<()> {
    let now = Clock::get()?.unix_timestamp;
    let distribution = &mut ctx.accounts.distribution;
    distribution.update_global_index(now)?;
    let global_index = distribution.global_index;

    let user_reward = &mut ctx.accounts.user_reward;
    user_reward.accrue(global_index)?;

    require!(
        user_reward.unclaimed_reward > 0,
        RewardsError::NoClaimableAmount
    );

    // Pay what the vault can cover; the rest stays claimable.
    let payout = user_reward
        .unclaimed_reward
        .min(ctx.accounts.reward_vault.amount);
    require!(payout > 0, RewardsError::InsufficientRewardBalance);
    user_reward.record_claim(payout)?;

    let distribution = &mut ctx.accounts.distribution;
    distribution.total_claimed = distribution
        .total_claimed
        .checked_add(payout)
        .ok_or(RewardsError::MathOverflow)?;

    let stake_mint = distribution.stake_mint;
    let distribution_seeds = &[DISTRIBUTION_SEED, stake_mint.as_ref(), &[distribution.bump]];
    let signer_seeds = &[&distribution_seeds[..]];
    token::transfer(
        CpiContext::new_with_signer(
            ctx.accounts.token_program.to_account_info(),
            Transfer {
                from: ctx.accounts.reward_vault.to_account_info(),
                to: ctx.accounts.user_reward_account.to_account_info(),
                authority: ctx.accounts.distribution.to_account_info(),
            },
            signer_seeds,
        ),
        payout,
    )?;

    msg!(
        "Claimed {} rewards. Lifetime claimed: {}",
        payout,
        ctx.accounts.user_reward.total_claimed
    );
    Ok(())
}
