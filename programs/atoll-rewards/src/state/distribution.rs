use anchor_lang::prelude::*;

use crate::constants::REWARD_PRECISION;
use crate::error::RewardsError;

/// Global distribution state
/// PDA: ["distribution", stake_mint]
#[account]
#[derive(Default, InitSpace)]
pub struct DistributionState {
    /// Admin who can pause, fund and retune the emission
    pub admin: Pubkey,

    /// Token staked to earn rewards (the pool's deposit receipt token)
    pub stake_mint: Pubkey,

    /// Reward token paid out to stakers
    pub reward_mint: Pubkey,

    /// Vault holding staked tokens
    /// PDA: ["stake_vault", distribution]
    pub stake_vault: Pubkey,

    /// Vault holding rewards to distribute
    /// PDA: ["reward_vault", distribution]
    pub reward_vault: Pubkey,

    /// Total tokens currently staked
    pub total_staked: u64,

    /// Reward units emitted per second, split pro rata across stakers
    pub emission_per_sec: u64,

    /// Last time the global index advanced
    pub last_updated: i64,

    /// Accumulated reward per staked token, scaled by REWARD_PRECISION.
    /// Time passing with no stakers emits nothing.
    pub global_index: u128,

    /// Total rewards claimed (lifetime)
    pub total_claimed: u64,

    /// Emergency pause flag
    pub is_paused: bool,

    /// PDA bump seed
    pub bump: u8,

    /// Stake vault bump seed
    pub stake_vault_bump: u8,

    /// Reward vault bump seed
    pub reward_vault_bump: u8,
}

impl DistributionState {
    /// Advance the global index to `now`.
    /// index += emission_per_sec * elapsed * PRECISION / total_staked
    pub fn update_global_index(&mut self, now: i64) -> Result<()> {
        if now <= self.last_updated {
            return Ok(());
        }
        let elapsed = (now - self.last_updated) as u128;
        self.last_updated = now;

        if self.total_staked == 0 || self.emission_per_sec == 0 {
            return Ok(());
        }

        let emitted = (self.emission_per_sec as u128)
            .checked_mul(elapsed)
            .ok_or(RewardsError::MathOverflow)?;
        let index_increase = emitted
            .checked_mul(REWARD_PRECISION)
            .ok_or(RewardsError::MathOverflow)?
            .checked_div(self.total_staked as u128)
            .ok_or(RewardsError::DivisionByZero)?;

        self.global_index = self
            .global_index
            .checked_add(index_increase)
            .ok_or(RewardsError::MathOverflow)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> DistributionState {
        DistributionState {
            emission_per_sec: 100,
            last_updated: 1_000,
            total_staked: 50_000,
            ..Default::default()
        }
    }

    #[test]
    fn index_advances_with_time() {
        let mut s = state();
        s.update_global_index(1_010).unwrap();
        // 100/sec * 10s * PRECISION / 50_000 staked
        assert_eq!(s.global_index, 1_000 * REWARD_PRECISION / 50_000);
        assert_eq!(s.last_updated, 1_010);
    }

    #[test]
    fn same_timestamp_is_a_no_op() {
        let mut s = state();
        s.update_global_index(1_000).unwrap();
        assert_eq!(s.global_index, 0);
    }

    #[test]
    fn no_stakers_emits_nothing() {
        let mut s = state();
        s.total_staked = 0;
        s.update_global_index(2_000).unwrap();
        assert_eq!(s.global_index, 0);
        // time still advances so the emission gap is not retroactive
        assert_eq!(s.last_updated, 2_000);
    }
}
