use anchor_lang::prelude::*;
use anchor_spl::token::{Mint, Token, TokenAccount};

use crate::constants::{
    DISTRIBUTION_SEED, MAX_EMISSION_PER_SEC, REWARD_VAULT_SEED, STAKE_VAULT_SEED,
};
use crate::error::RewardsError;
use crate::state::DistributionState;

/// Create the distribution for a stake mint: the global state plus both
/// vaults, all PDAs owned by the program.
#[derive(Accounts)]
pub struct Initialize<'info> {
    #[account(mut)]
    pub admin: Signer<'info>,

    pub stake_mint: Account<'info, Mint>,

    pub reward_mint: Account<'info, Mint>,

    #[account(
        init,
        payer = admin,
        space = 8 + DistributionState::INIT_SPACE,
        seeds = [DISTRIBUTION_SEED, stake_mint.key().as_ref()],
        bump
    )]
    pub distribution: Account<'info, DistributionState>,

    #[account(
        init,
        payer = admin,
        token::mint = stake_mint,
        token::authority = distribution,
        seeds = [STAKE_VAULT_SEED, distribution.key().as_ref()],
        bump
    )]
    pub stake_vault: Account<'info, TokenAccount>,

    #[account(
        init,
        payer = admin,
        token::mint = reward_mint,
        token::authority = distribution,
        seeds = [REWARD_VAULT_SEED, distribution.key().as_ref()],
        bump
    )]
    pub reward_vault: Account<'info, TokenAccount>,

    pub token_program: Program<'info, Token>,
    pub system_program: Program<'info, System>,
}

pub fn handler_initialize(ctx: Context<Initialize>, emission_per_sec: u64) -> Result<()> {
    require!(
        emission_per_sec <= MAX_EMISSION_PER_SEC,
        RewardsError::EmissionTooHigh
    );

    let distribution = &mut ctx.accounts.distribution;
    distribution.admin = ctx.accounts.admin.key();
    distribution.stake_mint = ctx.accounts.stake_mint.key();
    distribution.reward_mint = ctx.accounts.reward_mint.key();
    distribution.stake_vault = ctx.accounts.stake_vault.key();
    distribution.reward_vault = ctx.accounts.reward_vault.key();
    distribution.emission_per_sec = emission_per_sec;
    distribution.last_updated = Clock::get()?.unix_timestamp;
    distribution.bump = ctx.bumps.distribution;
    distribution.stake_vault_bump = ctx.bumps.stake_vault;
    distribution.reward_vault_bump = ctx.bumps.reward_vault;

    msg!(
        "Distribution initialized: {} rewards/sec for stakers of {}",
        emission_per_sec,
        distribution.stake_mint
    );
    Ok(())
}
