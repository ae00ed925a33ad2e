// =============================================================================
// Atoll Rewards - Deposit Reward Distribution
// =============================================================================
// Emission-based reward sidecar for Atoll pool depositors: stake the pool's
// receipt token, earn a fixed per-second emission split pro rata through a
// global reward index. Reward state is created on first stake and never
// destroyed.
// =============================================================================

pub mod constants;
pub mod error;
pub mod instructions;
pub mod state;

use anchor_lang::prelude::*;

pub use constants::*;
pub use error::*;
pub use instructions::*;
pub use state::*;

declare_id!("3vPXb93jTK53aLWgMYpyikDdvPBucoazaHs7kURbBWvz");

#[program]
pub mod atoll_rewards {
    use super::*;

    /// Create the distribution for a stake mint
    ///
    /// # Arguments
    /// * `emission_per_sec` - reward base units emitted per second
    pub fn initialize(ctx: Context<Initialize>, emission_per_sec: u64) -> Result<()> {
        instructions::initialize::handler_initialize(ctx, emission_per_sec)
    }

    /// Stake tokens to start earning the emission
    pub fn stake(ctx: Context<Stake>, amount: u64) -> Result<()> {
        instructions::stake::handler_stake(ctx, amount)
    }

    /// Unstake tokens; accrued rewards remain claimable
    pub fn unstake(ctx: Context<Unstake>, amount: u64) -> Result<()> {
        instructions::unstake::handler_unstake(ctx, amount)
    }

    /// Claim accrued rewards; fails with NoClaimableAmount when nothing
    /// has accrued
    pub fn claim(ctx: Context<Claim>) -> Result<()> {
        instructions::claim::handler_claim(ctx)
    }

    /// Change the emission rate (admin only, never retroactive)
    pub fn set_emission(ctx: Context<AdminDistribution>, emission_per_sec: u64) -> Result<()> {
        instructions::admin::handler_set_emission(ctx, emission_per_sec)
    }

    /// Pause or unpause the distribution (admin only)
    pub fn pause_distribution(ctx: Context<AdminDistribution>, paused: bool) -> Result<()> {
        instructions::admin::handler_pause_distribution(ctx, paused)
    }

    /// Top the reward vault up, e.g. from harvested pool fees (admin only)
    pub fn fund_rewards(ctx: Context<FundRewards>, amount: u64) -> Result<()> {
        instructions::admin::handler_fund_rewards(ctx, amount)
    }
}
