// =============================================================================
// Pool State Account
// =============================================================================
// One Pool account per pool. A deployment runs exactly one Primary pool and
// one Backstop pool per stable mint; both share this layout, addressed by
// different PDA seeds. Per-asset bookkeeping lives in the embedded
// AssetLedger records, keyed by mint.
// =============================================================================

use anchor_lang::prelude::*;

use crate::constants::{BACKSTOP_SEED, MAX_ASSETS, POOL_SEED};
use crate::error::LedgerError;
use crate::math::shares::{to_amount, to_share};

/// Which role a Pool plays in the deployment.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, PartialEq, Eq, InitSpace)]
pub enum PoolKind {
    Primary,
    Backstop,
}

/// One bucket of pooled value: raw amount plus outstanding shares against it.
///
/// Invariant: `shares == 0 <=> amount == 0` after every operation.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Default, InitSpace, Debug)]
pub struct AssetBucket {
    pub amount: u128,
    pub shares: u128,
}

impl AssetBucket {
    /// Value of `share` against this bucket, rounded down.
    pub fn share_value(&self, share: u128) -> Result<u128> {
        to_amount(share, self.amount, self.shares)
    }

    fn add(&mut self, amount: u128, share: u128) -> Result<()> {
        self.amount = self
            .amount
            .checked_add(amount)
            .ok_or(LedgerError::MathOverflow)?;
        self.shares = self
            .shares
            .checked_add(share)
            .ok_or(LedgerError::MathOverflow)?;
        Ok(())
    }

    fn sub(&mut self, amount: u128, share: u128) -> Result<()> {
        self.amount = self
            .amount
            .checked_sub(amount)
            .ok_or(LedgerError::MathUnderflow)?;
        self.shares = self
            .shares
            .checked_sub(share)
            .ok_or(LedgerError::MathUnderflow)?;
        // A drained bucket retires its residual rounding shares so the
        // shares == 0 <=> amount == 0 invariant holds.
        if self.amount == 0 {
            self.shares = 0;
        }
        Ok(())
    }
}

/// Governed per-asset parameters, set when the asset is listed.
///
/// Rates use RATE_PRECISION; the rate model is the dual-slope utilization
/// curve parameterized below.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, InitSpace, Debug)]
pub struct AssetConfig {
    pub oracle: Pubkey,
    pub ltv: u64,
    pub liquidation_threshold: u64,
    pub base_rate: u64,
    pub slope1: u64,
    pub slope2: u64,
    pub optimal_utilization: u64,
}

/// Per-asset bookkeeping: the three value buckets plus accrual bookmark and
/// listing-time configuration. Created when the asset is listed, never
/// destroyed.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, InitSpace, Debug)]
pub struct AssetLedger {
    pub mint: Pubkey,
    /// Vault token account holding this asset's custody for the pool
    pub vault: Pubkey,
    /// Lendable deposits
    pub normal: AssetBucket,
    /// Deposits usable only as collateral, never lent out
    pub collateral_only: AssetBucket,
    /// Outstanding debt (principal plus accrued interest plus entry fees)
    pub borrowed: AssetBucket,
    /// Zero until the first accrual touch primes the asset
    pub last_accrual_timestamp: i64,
    pub config: AssetConfig,
}

impl AssetLedger {
    fn new(mint: Pubkey, vault: Pubkey, config: AssetConfig) -> Self {
        Self {
            mint,
            vault,
            normal: AssetBucket::default(),
            collateral_only: AssetBucket::default(),
            borrowed: AssetBucket::default(),
            last_accrual_timestamp: 0,
            config,
        }
    }

    pub fn bucket(&self, collateral_only: bool) -> &AssetBucket {
        if collateral_only {
            &self.collateral_only
        } else {
            &self.normal
        }
    }

    fn bucket_mut(&mut self, collateral_only: bool) -> &mut AssetBucket {
        if collateral_only {
            &mut self.collateral_only
        } else {
            &mut self.normal
        }
    }
}

/// The pool-wide aggregate. Roll-up totals are kept consistent with the sum
/// over the embedded asset ledgers by every operation.
#[account]
#[derive(InitSpace)]
pub struct Pool {
    pub admin: Pubkey,
    /// The stable unit every volume is quoted in; also a listed asset
    pub stable_mint: Pubkey,
    pub kind: PoolKind,

    // =========================================================================
    // Financial State (raw base units, u128)
    // =========================================================================
    /// Raw token custody attributed to this pool across all assets
    pub held_balance: u128,
    pub total_normal_deposited: u128,
    pub total_collateral_only_deposited: u128,
    pub total_borrowed: u128,
    /// Portion of total_borrowed funded by the backstop (primary pool only)
    pub total_backstop_borrowed: u128,
    pub protocol_fees_accrued: u128,
    pub protocol_fees_harvested: u128,

    // =========================================================================
    // Fee Configuration (RATE_PRECISION)
    // =========================================================================
    pub entry_fee_rate: u64,
    pub protocol_fee_rate: u64,
    pub support_fee_rate: u64,
    pub liquidation_fee_rate: u64,

    pub is_paused: bool,
    pub bump: u8,

    #[max_len(MAX_ASSETS)]
    pub assets: Vec<AssetLedger>,
}

impl Pool {
    /// Seed prefix of this pool's PDA, for signing vault transfers.
    pub fn seed_prefix(&self) -> &'static [u8] {
        match self.kind {
            PoolKind::Primary => POOL_SEED,
            PoolKind::Backstop => BACKSTOP_SEED,
        }
    }

    pub fn asset_index(&self, mint: &Pubkey) -> Result<usize> {
        self.assets
            .iter()
            .position(|a| a.mint == *mint)
            .ok_or(LedgerError::NotInitialized.into())
    }

    pub fn asset(&self, mint: &Pubkey) -> Result<&AssetLedger> {
        Ok(&self.assets[self.asset_index(mint)?])
    }

    pub fn asset_mut(&mut self, mint: &Pubkey) -> Result<&mut AssetLedger> {
        let idx = self.asset_index(mint)?;
        Ok(&mut self.assets[idx])
    }

    /// List an asset on this pool. Idempotent: re-listing an existing mint
    /// leaves its ledger untouched and returns false.
    pub fn list_asset(&mut self, mint: Pubkey, vault: Pubkey, config: AssetConfig) -> Result<bool> {
        if self.assets.iter().any(|a| a.mint == mint) {
            return Ok(false);
        }
        require!(self.assets.len() < MAX_ASSETS, LedgerError::TooManyAssets);
        self.assets.push(AssetLedger::new(mint, vault, config));
        Ok(true)
    }

    /// Liquidity available to lend: custody minus collateral-only deposits,
    /// which are never lendable.
    pub fn available_liquidity(&self) -> u128 {
        self.held_balance
            .saturating_sub(self.total_collateral_only_deposited)
    }

    // =========================================================================
    // Ledger operations. Each returns the share delta the caller persists
    // against the user's position.
    // =========================================================================

    pub fn deposit(&mut self, mint: &Pubkey, amount: u128, collateral_only: bool) -> Result<u128> {
        require!(amount > 0, LedgerError::InvalidAmount);
        let idx = self.asset_index(mint)?;
        let bucket = self.assets[idx].bucket_mut(collateral_only);
        let share = to_share(amount, bucket.amount, bucket.shares)?;
        bucket.add(amount, share)?;

        let total = if collateral_only {
            &mut self.total_collateral_only_deposited
        } else {
            &mut self.total_normal_deposited
        };
        *total = total.checked_add(amount).ok_or(LedgerError::MathOverflow)?;
        self.held_balance = self
            .held_balance
            .checked_add(amount)
            .ok_or(LedgerError::MathOverflow)?;
        Ok(share)
    }

    pub fn withdraw(&mut self, mint: &Pubkey, amount: u128, collateral_only: bool) -> Result<u128> {
        require!(amount > 0, LedgerError::InvalidAmount);
        let idx = self.asset_index(mint)?;
        let bucket = self.assets[idx].bucket_mut(collateral_only);
        require!(amount <= bucket.amount, LedgerError::InsufficientBalance);
        let share = to_share(amount, bucket.amount, bucket.shares)?;
        bucket.sub(amount, share)?;

        let total = if collateral_only {
            &mut self.total_collateral_only_deposited
        } else {
            &mut self.total_normal_deposited
        };
        *total = total.checked_sub(amount).ok_or(LedgerError::MathUnderflow)?;
        self.held_balance = self
            .held_balance
            .checked_sub(amount)
            .ok_or(LedgerError::MathUnderflow)?;
        Ok(share)
    }

    /// Record new debt against an asset's borrowed bucket. `amount_with_fee`
    /// includes entry fees; custody movement is the router's concern.
    pub fn apply_borrow(&mut self, mint: &Pubkey, amount_with_fee: u128) -> Result<u128> {
        require!(amount_with_fee > 0, LedgerError::InvalidAmount);
        let idx = self.asset_index(mint)?;
        let bucket = &mut self.assets[idx].borrowed;
        let share = to_share(amount_with_fee, bucket.amount, bucket.shares)?;
        bucket.add(amount_with_fee, share)?;
        self.total_borrowed = self
            .total_borrowed
            .checked_add(amount_with_fee)
            .ok_or(LedgerError::MathOverflow)?;
        Ok(share)
    }

    /// Retire debt from an asset's borrowed bucket. Custody movement is the
    /// router's concern.
    pub fn apply_repay(&mut self, mint: &Pubkey, amount: u128) -> Result<u128> {
        require!(amount > 0, LedgerError::InvalidAmount);
        let idx = self.asset_index(mint)?;
        let bucket = &mut self.assets[idx].borrowed;
        require!(amount <= bucket.amount, LedgerError::InsufficientBalance);
        let share = to_share(amount, bucket.amount, bucket.shares)?;
        bucket.sub(amount, share)?;
        self.total_borrowed = self
            .total_borrowed
            .checked_sub(amount)
            .ok_or(LedgerError::MathUnderflow)?;
        Ok(share)
    }

    /// Reconciliation identity over the pool-wide roll-ups. The two
    /// uncollected terms are the backstop-state roll-ups for fees charged but
    /// not yet custody-collected; both are zero for a standalone pool.
    pub fn reconciles(&self, uncollected_entry_fees: u128, uncollected_support_fees: u128) -> bool {
        let lhs = self.held_balance;
        let rhs = self
            .total_normal_deposited
            .checked_add(self.total_collateral_only_deposited)
            .and_then(|v| v.checked_add(self.total_backstop_borrowed))
            .and_then(|v| v.checked_add(self.protocol_fees_accrued))
            .and_then(|v| v.checked_sub(self.protocol_fees_harvested))
            .and_then(|v| v.checked_add(uncollected_entry_fees))
            .and_then(|v| v.checked_add(uncollected_support_fees))
            .and_then(|v| v.checked_sub(self.total_borrowed));
        rhs == Some(lhs)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn test_config() -> AssetConfig {
        AssetConfig {
            oracle: Pubkey::new_unique(),
            ltv: 700_000_000,                   // 70%
            liquidation_threshold: 800_000_000, // 80%
            base_rate: 20_000_000,              // 2%
            slope1: 80_000_000,                 // 8%
            slope2: 1_000_000_000,              // 100%
            optimal_utilization: 800_000_000,   // 80%
        }
    }

    pub(crate) fn test_pool(kind: PoolKind) -> Pool {
        Pool {
            admin: Pubkey::new_unique(),
            stable_mint: Pubkey::new_unique(),
            kind,
            held_balance: 0,
            total_normal_deposited: 0,
            total_collateral_only_deposited: 0,
            total_borrowed: 0,
            total_backstop_borrowed: 0,
            protocol_fees_accrued: 0,
            protocol_fees_harvested: 0,
            entry_fee_rate: 5_000_000,        // 0.5%
            protocol_fee_rate: 100_000_000,   // 10%
            support_fee_rate: 50_000_000,     // 5%
            liquidation_fee_rate: 5_000_000,  // 0.5%
            is_paused: false,
            bump: 255,
            assets: Vec::new(),
        }
    }

    pub(crate) fn listed_pool(mint: Pubkey) -> Pool {
        let mut pool = test_pool(PoolKind::Primary);
        pool.list_asset(mint, Pubkey::new_unique(), test_config())
            .unwrap();
        pool
    }

    #[test]
    fn bootstrap_deposit_then_withdraw() {
        let mint = Pubkey::new_unique();
        let mut pool = listed_pool(mint);

        let minted = pool.deposit(&mint, 400_000, false).unwrap();
        assert_eq!(minted, 400_000);
        assert_eq!(pool.total_normal_deposited, 400_000);
        assert_eq!(pool.held_balance, 400_000);

        let burned = pool.withdraw(&mint, 300_000, false).unwrap();
        assert_eq!(burned, 300_000);
        assert_eq!(pool.total_normal_deposited, 100_000);
        assert_eq!(pool.held_balance, 100_000);
        assert!(pool.reconciles(0, 0));
    }

    #[test]
    fn relisting_is_a_no_op() {
        let mint = Pubkey::new_unique();
        let mut pool = listed_pool(mint);
        pool.deposit(&mint, 1_000, false).unwrap();

        let created = pool
            .list_asset(mint, Pubkey::new_unique(), test_config())
            .unwrap();
        assert!(!created);
        assert_eq!(pool.asset(&mint).unwrap().normal.amount, 1_000);
    }

    #[test]
    fn withdraw_over_bucket_fails() {
        let mint = Pubkey::new_unique();
        let mut pool = listed_pool(mint);
        pool.deposit(&mint, 1_000, false).unwrap();
        assert!(pool.withdraw(&mint, 1_001, false).is_err());
    }

    #[test]
    fn collateral_only_excluded_from_liquidity() {
        let mint = Pubkey::new_unique();
        let mut pool = listed_pool(mint);
        pool.deposit(&mint, 5_000, false).unwrap();
        pool.deposit(&mint, 2_000, true).unwrap();
        assert_eq!(pool.available_liquidity(), 5_000);
        assert!(pool.reconciles(0, 0));
    }

    #[test]
    fn drained_bucket_retires_residual_shares() {
        let mint = Pubkey::new_unique();
        let mut pool = listed_pool(mint);
        pool.deposit(&mint, 1_000, false).unwrap();
        // Grow the bucket without minting shares, as interest accrual does.
        pool.asset_mut(&mint).unwrap().normal.amount += 7;
        pool.total_normal_deposited += 7;
        pool.held_balance += 7;

        pool.withdraw(&mint, 1_007, false).unwrap();
        let bucket = pool.asset(&mint).unwrap().normal;
        assert_eq!(bucket.amount, 0);
        assert_eq!(bucket.shares, 0);
    }

    #[test]
    fn unlisted_asset_is_not_initialized() {
        let pool = test_pool(PoolKind::Primary);
        let err = pool.asset(&Pubkey::new_unique()).unwrap_err();
        assert_eq!(err, LedgerError::NotInitialized.into());
    }
}
