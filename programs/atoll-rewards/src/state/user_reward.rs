use anchor_lang::prelude::*;

use crate::constants::REWARD_PRECISION;
use crate::error::RewardsError;

/// Per-user reward position. Created on first stake, never destroyed.
/// PDA: ["user_reward", distribution, owner]
#[account]
#[derive(Default, InitSpace)]
pub struct UserReward {
    /// The distribution this position belongs to
    pub distribution: Pubkey,

    /// Owner of this position
    pub owner: Pubkey,

    /// Amount of stake tokens deposited
    pub staked_amount: u64,

    /// Snapshot of the global index at the last accrual
    pub reward_index: u128,

    /// Rewards accrued but not yet claimed
    pub unclaimed_reward: u64,

    /// Total rewards claimed (lifetime)
    pub total_claimed: u64,

    /// Timestamp of last stake action
    pub last_stake_time: i64,

    /// PDA bump seed
    pub bump: u8,
}

impl UserReward {
    /// Fold rewards earned since the last snapshot into the unclaimed
    /// balance. Must run before every stake, unstake or claim.
    pub fn accrue(&mut self, global_index: u128) -> Result<()> {
        let index_delta = global_index
            .checked_sub(self.reward_index)
            .ok_or(RewardsError::MathUnderflow)?;
        self.reward_index = global_index;

        if self.staked_amount == 0 || index_delta == 0 {
            return Ok(());
        }

        let pending = (self.staked_amount as u128)
            .checked_mul(index_delta)
            .ok_or(RewardsError::MathOverflow)?
            .checked_div(REWARD_PRECISION)
            .ok_or(RewardsError::DivisionByZero)?;
        let pending: u64 = pending.try_into().map_err(|_| RewardsError::MathOverflow)?;

        self.unclaimed_reward = self
            .unclaimed_reward
            .checked_add(pending)
            .ok_or(RewardsError::MathOverflow)?;
        Ok(())
    }

    pub fn record_stake(&mut self, amount: u64, now: i64) -> Result<()> {
        self.staked_amount = self
            .staked_amount
            .checked_add(amount)
            .ok_or(RewardsError::MathOverflow)?;
        self.last_stake_time = now;
        Ok(())
    }

    pub fn record_unstake(&mut self, amount: u64, now: i64) -> Result<()> {
        require!(self.staked_amount >= amount, RewardsError::InsufficientStake);
        self.staked_amount = self
            .staked_amount
            .checked_sub(amount)
            .ok_or(RewardsError::MathUnderflow)?;
        self.last_stake_time = now;
        Ok(())
    }

    /// Take `amount` out of the unclaimed balance.
    pub fn record_claim(&mut self, amount: u64) -> Result<()> {
        self.unclaimed_reward = self
            .unclaimed_reward
            .checked_sub(amount)
            .ok_or(RewardsError::MathUnderflow)?;
        self.total_claimed = self
            .total_claimed
            .checked_add(amount)
            .ok_or(RewardsError::MathOverflow)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accrual_tracks_index_delta() {
        let mut user = UserReward {
            staked_amount: 1_000,
            ..Default::default()
        };
        user.accrue(5 * REWARD_PRECISION).unwrap();
        assert_eq!(user.unclaimed_reward, 5_000);
        assert_eq!(user.reward_index, 5 * REWARD_PRECISION);

        // no double counting on a repeat accrual
        user.accrue(5 * REWARD_PRECISION).unwrap();
        assert_eq!(user.unclaimed_reward, 5_000);
    }

    #[test]
    fn fresh_stake_earns_nothing_retroactively() {
        let mut user = UserReward::default();
        user.accrue(7 * REWARD_PRECISION).unwrap();
        user.record_stake(1_000, 10).unwrap();
        assert_eq!(user.unclaimed_reward, 0);

        user.accrue(8 * REWARD_PRECISION).unwrap();
        assert_eq!(user.unclaimed_reward, 1_000);
    }

    #[test]
    fn claim_drains_unclaimed() {
        let mut user = UserReward {
            staked_amount: 10,
            unclaimed_reward: 42,
            ..Default::default()
        };
        user.record_claim(42).unwrap();
        assert_eq!(user.unclaimed_reward, 0);
        assert_eq!(user.total_claimed, 42);
        assert!(user.record_claim(1).is_err());
    }
}
