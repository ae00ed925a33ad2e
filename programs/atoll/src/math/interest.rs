//! Lazy per-asset interest accrual.
//!
//! Interest compounds once per pool-wide update: the first operation that
//! touches an asset since its last accrual folds the elapsed interest into
//! the asset's buckets, so share-to-amount ratios already reflect interest
//! when the new action executes. Repeated accrual at the same timestamp is
//! a no-op.

use anchor_lang::prelude::*;

use crate::constants::{RATE_PRECISION, SECONDS_PER_YEAR};
use crate::error::LedgerError;
use crate::math::shares::fee_round_up;
use crate::state::backstop::BackstopState;
use crate::state::pool::{AssetConfig, Pool};

/// What one accrual produced. `support_fee_collected` is the custody the
/// instruction must move from the primary vault to the backstop vault.
#[derive(Default)]
pub struct AccrualOutcome {
    pub interest: u128,
    pub protocol_fee: u128,
    pub depositor_share: u128,
    pub support_fee: u128,
    pub support_fee_collected: u128,
}

/// How the support fee of a backstop-supported asset is handled during one
/// accrual.
///
/// Collect extracts custody up to available liquidity and credits the
/// backstop pool; Carry skims the fee but leaves all of it in the
/// uncollected counter, for call sites that do not hold the asset's vault
/// pair. Both keep depositor accounting identical.
pub enum SupportFeeMode<'a> {
    Collect(&'a mut Pool, &'a mut BackstopState),
    Carry(&'a mut BackstopState),
    /// No backstop bookkeeping at all; only valid when the asset is not
    /// backstop-supported.
    Ignore,
}

/// Annual borrow rate from the dual-slope utilization curve.
/// - Below the kink: base_rate + (utilization / optimal) * slope1
/// - Above the kink: base_rate + slope1 + ((utilization - optimal) / (1 - optimal)) * slope2
pub fn borrow_rate(config: &AssetConfig, deposited: u128, borrowed: u128) -> Result<u128> {
    if deposited == 0 {
        return Ok(config.base_rate as u128);
    }

    let utilization = borrowed
        .checked_mul(RATE_PRECISION)
        .ok_or(LedgerError::MathOverflow)?
        .checked_div(deposited)
        .ok_or(LedgerError::DivisionByZero)?;
    let optimal = config.optimal_utilization as u128;

    if utilization <= optimal {
        let variable = utilization
            .checked_mul(config.slope1 as u128)
            .ok_or(LedgerError::MathOverflow)?
            .checked_div(optimal.max(1))
            .ok_or(LedgerError::DivisionByZero)?;
        (config.base_rate as u128)
            .checked_add(variable)
            .ok_or(LedgerError::MathOverflow.into())
    } else {
        let excess = utilization
            .checked_sub(optimal)
            .ok_or(LedgerError::MathUnderflow)?;
        let remaining = RATE_PRECISION
            .checked_sub(optimal)
            .ok_or(LedgerError::MathUnderflow)?;
        let variable = excess
            .checked_mul(config.slope2 as u128)
            .ok_or(LedgerError::MathOverflow)?
            .checked_div(remaining.max(1))
            .ok_or(LedgerError::DivisionByZero)?;
        (config.base_rate as u128)
            .checked_add(config.slope1 as u128)
            .ok_or(LedgerError::MathOverflow)?
            .checked_add(variable)
            .ok_or(LedgerError::MathOverflow.into())
    }
}

/// Fold elapsed interest for one asset into the pool, splitting it between
/// depositors, the protocol treasury and (for backstop-supported assets)
/// the backstop.
///
/// MUST run before any operation touches the asset's buckets.
pub fn accrue_interest(
    pool: &mut Pool,
    mint: &Pubkey,
    mut support_mode: SupportFeeMode,
    now: i64,
) -> Result<AccrualOutcome> {
    let idx = pool.asset_index(mint)?;
    let last = pool.assets[idx].last_accrual_timestamp;

    // First touch primes the asset; nothing to compound yet.
    if last == 0 {
        pool.assets[idx].last_accrual_timestamp = now;
        return Ok(AccrualOutcome::default());
    }
    if now <= last {
        return Ok(AccrualOutcome::default());
    }

    let elapsed = (now - last) as u128;
    let ledger = &pool.assets[idx];
    let deposited = ledger.normal.amount;
    let borrowed = ledger.borrowed.amount;

    let rate = borrow_rate(&ledger.config, deposited, borrowed)?;
    let rcomp = rate
        .checked_mul(elapsed)
        .ok_or(LedgerError::MathOverflow)?
        .checked_div(SECONDS_PER_YEAR)
        .ok_or(LedgerError::DivisionByZero)?;
    let interest = borrowed
        .checked_mul(rcomp)
        .ok_or(LedgerError::MathOverflow)?
        .checked_div(RATE_PRECISION)
        .ok_or(LedgerError::DivisionByZero)?;

    if interest == 0 {
        pool.assets[idx].last_accrual_timestamp = now;
        return Ok(AccrualOutcome::default());
    }

    let protocol_fee = fee_round_up(interest, pool.protocol_fee_rate)?.min(interest);
    let mut depositor_share = interest
        .checked_sub(protocol_fee)
        .ok_or(LedgerError::MathUnderflow)?;

    // Support fee: skimmed from accrued interest for backstop-supported
    // assets, extracted from held liquidity up to what is available, the
    // remainder carried forward.
    let mut support_fee = 0u128;
    let mut collected = 0u128;
    let (backstop_pool, supported) = match &mut support_mode {
        SupportFeeMode::Collect(backstop_pool, backstop_state) => {
            (Some(&mut **backstop_pool), backstop_state.support_mut(mint))
        }
        SupportFeeMode::Carry(backstop_state) => (None, backstop_state.support_mut(mint)),
        SupportFeeMode::Ignore => (None, None),
    };
    if let Some(support) = supported {
        support_fee = fee_round_up(interest, pool.support_fee_rate)?.min(depositor_share);
        depositor_share = depositor_share
            .checked_sub(support_fee)
            .ok_or(LedgerError::MathUnderflow)?;

        let owed = support
            .uncollected_support_fee
            .checked_add(support_fee)
            .ok_or(LedgerError::MathOverflow)?;
        if let Some(backstop_pool) = backstop_pool {
            collected = owed.min(pool.available_liquidity());
            support.uncollected_support_fee = owed
                .checked_sub(collected)
                .ok_or(LedgerError::MathUnderflow)?;

            if collected > 0 {
                pool.held_balance = pool
                    .held_balance
                    .checked_sub(collected)
                    .ok_or(LedgerError::MathUnderflow)?;
                credit_backstop(backstop_pool, mint, collected)?;
            }
        } else {
            support.uncollected_support_fee = owed;
        }
    }

    let ledger = &mut pool.assets[idx];
    ledger.borrowed.amount = ledger
        .borrowed
        .amount
        .checked_add(interest)
        .ok_or(LedgerError::MathOverflow)?;
    ledger.normal.amount = ledger
        .normal
        .amount
        .checked_add(depositor_share)
        .ok_or(LedgerError::MathOverflow)?;
    ledger.last_accrual_timestamp = now;

    pool.total_borrowed = pool
        .total_borrowed
        .checked_add(interest)
        .ok_or(LedgerError::MathOverflow)?;
    pool.total_normal_deposited = pool
        .total_normal_deposited
        .checked_add(depositor_share)
        .ok_or(LedgerError::MathOverflow)?;
    pool.protocol_fees_accrued = pool
        .protocol_fees_accrued
        .checked_add(protocol_fee)
        .ok_or(LedgerError::MathOverflow)?;

    Ok(AccrualOutcome {
        interest,
        protocol_fee,
        depositor_share,
        support_fee,
        support_fee_collected: collected,
    })
}

/// Collected support fees become backstop depositors' yield: the amount is
/// folded into the backstop's normal bucket without minting shares. With no
/// backstop depositors to reward, it accrues to the backstop treasury
/// instead.
fn credit_backstop(backstop_pool: &mut Pool, mint: &Pubkey, collected: u128) -> Result<()> {
    let ledger = backstop_pool.asset_mut(mint)?;
    if ledger.normal.shares == 0 {
        backstop_pool.protocol_fees_accrued = backstop_pool
            .protocol_fees_accrued
            .checked_add(collected)
            .ok_or(LedgerError::MathOverflow)?;
    } else {
        ledger.normal.amount = ledger
            .normal
            .amount
            .checked_add(collected)
            .ok_or(LedgerError::MathOverflow)?;
        backstop_pool.total_normal_deposited = backstop_pool
            .total_normal_deposited
            .checked_add(collected)
            .ok_or(LedgerError::MathOverflow)?;
    }
    backstop_pool.held_balance = backstop_pool
        .held_balance
        .checked_add(collected)
        .ok_or(LedgerError::MathOverflow)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::backstop::BackstopState;
    use crate::state::pool::tests::{listed_pool, test_config, test_pool};
    use crate::state::pool::PoolKind;

    const YEAR: i64 = SECONDS_PER_YEAR as i64;

    fn pool_with_debt(mint: Pubkey) -> Pool {
        let mut pool = listed_pool(mint);
        pool.deposit(&mint, 100_000, false).unwrap();
        pool.apply_borrow(&mint, 50_000).unwrap();
        pool.held_balance -= 50_000;
        pool
    }

    fn backstop_setup(mint: Pubkey) -> (Pool, BackstopState) {
        let mut backstop_pool = test_pool(PoolKind::Backstop);
        backstop_pool
            .list_asset(mint, Pubkey::new_unique(), test_config())
            .unwrap();
        backstop_pool.deposit(&mint, 10_000, false).unwrap();
        let mut state = BackstopState {
            backstop_pool: Pubkey::new_unique(),
            bump: 255,
            supported: Vec::new(),
        };
        state.add_support(mint).unwrap();
        (backstop_pool, state)
    }

    #[test]
    fn first_touch_primes_without_interest() {
        let mint = Pubkey::new_unique();
        let mut pool = pool_with_debt(mint);
        let outcome = accrue_interest(&mut pool, &mint, SupportFeeMode::Ignore, 1_000).unwrap();
        assert_eq!(outcome.interest, 0);
        assert_eq!(pool.asset(&mint).unwrap().last_accrual_timestamp, 1_000);
        assert_eq!(pool.total_borrowed, 50_000);
    }

    #[test]
    fn accrual_is_idempotent_per_timestamp() {
        let mint = Pubkey::new_unique();
        let mut pool = pool_with_debt(mint);
        accrue_interest(&mut pool, &mint, SupportFeeMode::Ignore, 1_000).unwrap();
        accrue_interest(&mut pool, &mint, SupportFeeMode::Ignore, 1_000 + YEAR).unwrap();
        let snapshot = pool.total_borrowed;

        let outcome =
            accrue_interest(&mut pool, &mint, SupportFeeMode::Ignore, 1_000 + YEAR).unwrap();
        assert_eq!(outcome.interest, 0);
        assert_eq!(pool.total_borrowed, snapshot);
    }

    #[test]
    fn interest_splits_between_depositors_and_treasury() {
        let mint = Pubkey::new_unique();
        let mut pool = pool_with_debt(mint);
        accrue_interest(&mut pool, &mint, SupportFeeMode::Ignore, 1_000).unwrap();

        // utilization 50%, optimal 80%: rate = 2% + (50/80) * 8% = 7%
        let outcome =
            accrue_interest(&mut pool, &mint, SupportFeeMode::Ignore, 1_000 + YEAR).unwrap();
        assert_eq!(outcome.interest, 3_500);
        assert_eq!(outcome.protocol_fee, 350); // 10% of interest
        assert_eq!(outcome.depositor_share, 3_150);

        let ledger = pool.asset(&mint).unwrap();
        assert_eq!(ledger.borrowed.amount, 53_500);
        assert_eq!(ledger.normal.amount, 103_150);
        assert!(pool.reconciles(0, 0));
    }

    #[test]
    fn supported_asset_pays_support_fee_to_backstop() {
        let mint = Pubkey::new_unique();
        let mut pool = pool_with_debt(mint);
        let (mut backstop_pool, mut state) = backstop_setup(mint);

        accrue_interest(
            &mut pool,
            &mint,
            SupportFeeMode::Collect(&mut backstop_pool, &mut state),
            1_000,
        )
        .unwrap();
        let outcome = accrue_interest(
            &mut pool,
            &mint,
            SupportFeeMode::Collect(&mut backstop_pool, &mut state),
            1_000 + YEAR,
        )
        .unwrap();

        assert_eq!(outcome.interest, 3_500);
        assert_eq!(outcome.support_fee, 175); // 5% of interest, ceiling
        assert_eq!(outcome.support_fee_collected, 175);
        assert_eq!(outcome.depositor_share, 3_500 - 350 - 175);

        // backstop depositors earn the fee through their share price
        assert_eq!(backstop_pool.asset(&mint).unwrap().normal.amount, 10_175);
        assert_eq!(state.support(&mint).unwrap().uncollected_support_fee, 0);
        assert!(pool.reconciles(0, 0));
        assert!(backstop_pool.reconciles(0, 0));
    }

    #[test]
    fn carry_mode_skims_but_collects_nothing() {
        let mint = Pubkey::new_unique();
        let mut pool = pool_with_debt(mint);
        let (_, mut state) = backstop_setup(mint);

        accrue_interest(&mut pool, &mint, SupportFeeMode::Carry(&mut state), 1_000).unwrap();
        let outcome = accrue_interest(
            &mut pool,
            &mint,
            SupportFeeMode::Carry(&mut state),
            1_000 + YEAR,
        )
        .unwrap();

        assert_eq!(outcome.support_fee, 175);
        assert_eq!(outcome.support_fee_collected, 0);
        assert_eq!(state.support(&mint).unwrap().uncollected_support_fee, 175);
        assert!(pool.reconciles(0, state.uncollected_support_fees()));
    }

    #[test]
    fn support_fee_is_capped_at_liquidity_and_carried() {
        let mint = Pubkey::new_unique();
        let mut pool = listed_pool(mint);
        pool.deposit(&mint, 1_000, false).unwrap();
        pool.apply_borrow(&mint, 900).unwrap();
        pool.held_balance -= 900;
        let (mut backstop_pool, mut state) = backstop_setup(mint);

        accrue_interest(
            &mut pool,
            &mint,
            SupportFeeMode::Collect(&mut backstop_pool, &mut state),
            1,
        )
        .unwrap();
        // utilization 90%: rate = 2% + 8% + (10/20) * 100% = 60%; ten years
        // of it dwarfs the 100 units of held liquidity
        let outcome = accrue_interest(
            &mut pool,
            &mint,
            SupportFeeMode::Collect(&mut backstop_pool, &mut state),
            1 + 10 * YEAR,
        )
        .unwrap();

        assert_eq!(outcome.interest, 5_400);
        assert_eq!(outcome.support_fee, 270);
        assert_eq!(outcome.support_fee_collected, 100); // all the pool had
        assert_eq!(state.support(&mint).unwrap().uncollected_support_fee, 170);
        assert_eq!(pool.held_balance, 0);
        assert!(pool.reconciles(0, state.uncollected_support_fees()));
        assert!(backstop_pool.reconciles(0, 0));
    }
}
