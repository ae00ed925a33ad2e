// =============================================================================
// Backstop State & Liquidity Router
// =============================================================================
// The backstop pool is a secondary liquidity source drawn from when the
// primary pool cannot satisfy a borrow. BackstopState tracks which assets
// may draw backstop liquidity, how much each asset currently owes the
// backstop, and fees charged but not yet collected into custody.
// =============================================================================

use anchor_lang::prelude::*;

use crate::constants::MAX_SUPPORTED_ASSETS;
use crate::error::LedgerError;
use crate::math::shares::fee_round_up;
use crate::state::pool::Pool;

/// Per-asset backstop bookkeeping. Membership in `BackstopState::supported`
/// is the supported-asset set.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, InitSpace)]
pub struct BackstopSupport {
    pub mint: Pubkey,
    /// Outstanding debt the primary pool owes the backstop for this asset
    /// (principal plus backstop entry fees)
    pub borrowed: u128,
    /// Backstop entry fees charged into debt but not yet repaid; repayments
    /// retire this bucket before principal
    pub uncollected_entry_fee: u128,
    /// Support fees owed to the backstop that primary liquidity could not
    /// yet cover; carried forward to the next accrual
    pub uncollected_support_fee: u128,
}

/// One BackstopState account per backstop pool.
/// PDA: ["backstop_state", backstop_pool]
#[account]
#[derive(InitSpace)]
pub struct BackstopState {
    pub backstop_pool: Pubkey,
    pub bump: u8,
    #[max_len(MAX_SUPPORTED_ASSETS)]
    pub supported: Vec<BackstopSupport>,
}

impl BackstopState {
    pub fn support(&self, mint: &Pubkey) -> Option<&BackstopSupport> {
        self.supported.iter().find(|s| s.mint == *mint)
    }

    pub fn support_mut(&mut self, mint: &Pubkey) -> Option<&mut BackstopSupport> {
        self.supported.iter_mut().find(|s| s.mint == *mint)
    }

    /// Whitelist an asset for backstop draws. Errors if already supported.
    pub fn add_support(&mut self, mint: Pubkey) -> Result<()> {
        require!(self.support(&mint).is_none(), LedgerError::AlreadyInitialized);
        require!(
            self.supported.len() < MAX_SUPPORTED_ASSETS,
            LedgerError::TooManyAssets
        );
        self.supported.push(BackstopSupport {
            mint,
            borrowed: 0,
            uncollected_entry_fee: 0,
            uncollected_support_fee: 0,
        });
        Ok(())
    }

    /// Remove an asset from the supported set. Removing a non-member is an
    /// error, and an asset with outstanding backstop debt or uncollected
    /// fees cannot be removed.
    pub fn remove_support(&mut self, mint: &Pubkey) -> Result<()> {
        let idx = self
            .supported
            .iter()
            .position(|s| s.mint == *mint)
            .ok_or(LedgerError::AssetNotSupported)?;
        let entry = &self.supported[idx];
        require!(
            entry.borrowed == 0
                && entry.uncollected_entry_fee == 0
                && entry.uncollected_support_fee == 0,
            LedgerError::InsufficientBalance
        );
        self.supported.remove(idx);
        Ok(())
    }

    /// Roll-ups used by the pool reconciliation identity.
    pub fn uncollected_entry_fees(&self) -> u128 {
        self.supported
            .iter()
            .fold(0, |acc, s| acc.saturating_add(s.uncollected_entry_fee))
    }

    pub fn uncollected_support_fees(&self) -> u128 {
        self.supported
            .iter()
            .fold(0, |acc, s| acc.saturating_add(s.uncollected_support_fee))
    }
}

/// A backstop depositor's share holding for one asset.
/// PDA: ["backstop_deposit", backstop_pool, mint, owner]
#[account]
#[derive(InitSpace)]
pub struct BackstopDeposit {
    pub pool: Pubkey,
    pub owner: Pubkey,
    pub mint: Pubkey,
    pub share: u128,
    pub bump: u8,
}

/// How a routed borrow was split between the two pools.
#[derive(Debug)]
pub struct BorrowRouting {
    /// Paid out to the borrower from primary custody
    pub from_local: u128,
    /// Paid out to the borrower from backstop custody
    pub from_backstop: u128,
    /// Moved from backstop custody into primary custody to cover the local
    /// entry fee when the primary had no liquidity at all
    pub fee_from_backstop: u128,
    pub local_fee: u128,
    pub backstop_fee: u128,
    /// Total debt recorded against the borrower (amount plus both fees)
    pub debt: u128,
    pub debt_share: u128,
}

/// How a routed repayment was split between the two pools.
pub struct RepayRouting {
    /// Custody returned to the backstop vault
    pub to_backstop: u128,
    /// Custody returned to the primary vault
    pub to_local: u128,
    /// Portion of the backstop leg that retired uncollected entry fees
    pub fee_portion: u128,
    pub debt_share: u128,
}

/// Split a borrow between local and backstop liquidity.
///
/// Local liquidity serves the request when it covers amount plus the local
/// entry fee. An empty primary pool routes the whole need through the
/// backstop. Otherwise local liquidity is drained fully and the shortfall
/// drawn from the backstop, each portion carrying its own entry fee - fees
/// are never charged twice on the same value.
pub fn route_borrow(
    pool: &mut Pool,
    backstop_pool: &mut Pool,
    backstop: &mut BackstopState,
    mint: &Pubkey,
    amount: u128,
) -> Result<BorrowRouting> {
    require!(amount > 0, LedgerError::InvalidAmount);

    let local_fee = fee_round_up(amount, pool.entry_fee_rate)?;
    let needed = amount
        .checked_add(local_fee)
        .ok_or(LedgerError::MathOverflow)?;
    let local_liquidity = pool.available_liquidity();

    if needed <= local_liquidity {
        // Served entirely locally; the fee stays in custody as treasury
        // revenue while the borrower owes amount + fee.
        let debt_share = pool.apply_borrow(mint, needed)?;
        pool.held_balance = pool
            .held_balance
            .checked_sub(amount)
            .ok_or(LedgerError::MathUnderflow)?;
        pool.protocol_fees_accrued = pool
            .protocol_fees_accrued
            .checked_add(local_fee)
            .ok_or(LedgerError::MathOverflow)?;
        return Ok(BorrowRouting {
            from_local: amount,
            from_backstop: 0,
            fee_from_backstop: 0,
            local_fee,
            backstop_fee: 0,
            debt: needed,
            debt_share,
        });
    }

    let (local_payout, backstop_principal, fee_from_backstop) = if local_liquidity == 0 {
        // Nothing local: the backstop funds the whole need, local entry fee
        // included; its own fee is charged on the full backstop draw.
        (0u128, needed, local_fee)
    } else {
        // Drain local liquidity fully, draw the shortfall from the backstop.
        let local_payout = local_liquidity.min(amount);
        (local_payout, amount - local_payout, 0u128)
    };

    // Local fee applies to the locally funded portion only when liquidity
    // was drained rather than empty.
    let effective_local_fee = if local_liquidity == 0 {
        local_fee
    } else {
        fee_round_up(local_payout, pool.entry_fee_rate)?
    };
    let backstop_fee = fee_round_up(backstop_principal, backstop_pool.entry_fee_rate)?;

    let backstop_draw = backstop_principal
        .checked_add(backstop_fee)
        .ok_or(LedgerError::MathOverflow)?;
    if backstop_draw > 0 {
        require!(
            backstop.support(mint).is_some(),
            LedgerError::AssetNotSupported
        );
        require!(
            backstop_principal <= backstop_pool.available_liquidity(),
            LedgerError::ExceedsBorrowable
        );
    }

    let debt = if local_liquidity == 0 {
        // needed already carries the local fee
        needed
            .checked_add(backstop_fee)
            .ok_or(LedgerError::MathOverflow)?
    } else {
        local_payout
            .checked_add(effective_local_fee)
            .and_then(|v| v.checked_add(backstop_principal))
            .and_then(|v| v.checked_add(backstop_fee))
            .ok_or(LedgerError::MathOverflow)?
    };

    let debt_share = pool.apply_borrow(mint, debt)?;

    // Primary side: pays out what it had; local entry fees accrue to its
    // treasury either way.
    pool.held_balance = pool
        .held_balance
        .checked_sub(local_payout)
        .ok_or(LedgerError::MathUnderflow)?;
    if fee_from_backstop > 0 {
        pool.held_balance = pool
            .held_balance
            .checked_add(fee_from_backstop)
            .ok_or(LedgerError::MathOverflow)?;
    }
    pool.protocol_fees_accrued = pool
        .protocol_fees_accrued
        .checked_add(effective_local_fee)
        .ok_or(LedgerError::MathOverflow)?;
    pool.total_backstop_borrowed = pool
        .total_backstop_borrowed
        .checked_add(backstop_draw)
        .ok_or(LedgerError::MathOverflow)?;

    // Backstop side: custody leaves for the borrower (and for the primary
    // treasury in the empty-pool case); its entry fee stays uncollected
    // until repaid.
    let backstop_payout = backstop_principal
        .checked_sub(fee_from_backstop)
        .ok_or(LedgerError::MathUnderflow)?;
    if backstop_draw > 0 {
        backstop_pool.held_balance = backstop_pool
            .held_balance
            .checked_sub(backstop_principal)
            .ok_or(LedgerError::MathUnderflow)?;
        backstop_pool.total_borrowed = backstop_pool
            .total_borrowed
            .checked_add(backstop_draw)
            .ok_or(LedgerError::MathOverflow)?;

        let support = backstop
            .support_mut(mint)
            .ok_or(LedgerError::AssetNotSupported)?;
        support.borrowed = support
            .borrowed
            .checked_add(backstop_draw)
            .ok_or(LedgerError::MathOverflow)?;
        support.uncollected_entry_fee = support
            .uncollected_entry_fee
            .checked_add(backstop_fee)
            .ok_or(LedgerError::MathOverflow)?;
    }

    Ok(BorrowRouting {
        from_local: local_payout,
        from_backstop: backstop_payout,
        fee_from_backstop,
        local_fee: effective_local_fee,
        backstop_fee,
        debt,
        debt_share,
    })
}

/// Split a repayment between the two pools. Backstop debt retires first
/// (fixed policy), fee bucket before principal within the backstop leg.
pub fn route_repay(
    pool: &mut Pool,
    backstop_pool: &mut Pool,
    backstop: &mut BackstopState,
    mint: &Pubkey,
    amount: u128,
) -> Result<RepayRouting> {
    require!(amount > 0, LedgerError::InvalidAmount);

    let debt_share = pool.apply_repay(mint, amount)?;

    let backstop_owed = backstop.support(mint).map_or(0, |s| s.borrowed);
    let to_backstop = amount.min(backstop_owed);
    let to_local = amount
        .checked_sub(to_backstop)
        .ok_or(LedgerError::MathUnderflow)?;

    let mut fee_portion = 0u128;
    if to_backstop > 0 {
        let support = backstop
            .support_mut(mint)
            .ok_or(LedgerError::AssetNotSupported)?;
        fee_portion = to_backstop.min(support.uncollected_entry_fee);
        support.uncollected_entry_fee = support
            .uncollected_entry_fee
            .checked_sub(fee_portion)
            .ok_or(LedgerError::MathUnderflow)?;
        support.borrowed = support
            .borrowed
            .checked_sub(to_backstop)
            .ok_or(LedgerError::MathUnderflow)?;

        backstop_pool.held_balance = backstop_pool
            .held_balance
            .checked_add(to_backstop)
            .ok_or(LedgerError::MathOverflow)?;
        backstop_pool.total_borrowed = backstop_pool
            .total_borrowed
            .checked_sub(to_backstop)
            .ok_or(LedgerError::MathUnderflow)?;
        backstop_pool.protocol_fees_accrued = backstop_pool
            .protocol_fees_accrued
            .checked_add(fee_portion)
            .ok_or(LedgerError::MathOverflow)?;

        pool.total_backstop_borrowed = pool
            .total_backstop_borrowed
            .checked_sub(to_backstop)
            .ok_or(LedgerError::MathUnderflow)?;
    }

    if to_local > 0 {
        pool.held_balance = pool
            .held_balance
            .checked_add(to_local)
            .ok_or(LedgerError::MathOverflow)?;
    }

    Ok(RepayRouting {
        to_backstop,
        to_local,
        fee_portion,
        debt_share,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::pool::tests::{listed_pool, test_config, test_pool};
    use crate::state::pool::PoolKind;

    fn setup(mint: Pubkey) -> (Pool, Pool, BackstopState) {
        let pool = listed_pool(mint);
        let mut backstop_pool = test_pool(PoolKind::Backstop);
        backstop_pool
            .list_asset(mint, Pubkey::new_unique(), test_config())
            .unwrap();
        let mut state = BackstopState {
            backstop_pool: Pubkey::new_unique(),
            bump: 255,
            supported: Vec::new(),
        };
        state.add_support(mint).unwrap();
        (pool, backstop_pool, state)
    }

    fn reconciled(pool: &Pool, backstop_pool: &Pool, state: &BackstopState) -> bool {
        pool.reconciles(0, state.uncollected_support_fees())
            && backstop_pool.reconciles(state.uncollected_entry_fees(), 0)
    }

    #[test]
    fn fully_local_borrow_charges_one_fee() {
        let mint = Pubkey::new_unique();
        let (mut pool, mut backstop_pool, mut state) = setup(mint);
        pool.deposit(&mint, 10_050, false).unwrap();
        backstop_pool.deposit(&mint, 100_000, false).unwrap();

        // needed = 10_000 + 50 fits local liquidity exactly
        let routing =
            route_borrow(&mut pool, &mut backstop_pool, &mut state, &mint, 10_000).unwrap();
        assert_eq!(routing.from_local, 10_000);
        assert_eq!(routing.from_backstop, 0);
        assert_eq!(routing.local_fee, 50);
        assert_eq!(routing.backstop_fee, 0);
        assert_eq!(routing.debt, 10_050);
        assert!(reconciled(&pool, &backstop_pool, &state));
    }

    #[test]
    fn split_borrow_drains_local_then_backstop() {
        let mint = Pubkey::new_unique();
        let (mut pool, mut backstop_pool, mut state) = setup(mint);
        pool.deposit(&mint, 10_050, false).unwrap();
        backstop_pool.deposit(&mint, 100_000, false).unwrap();

        // needed = 10_500 + 53 > 10_050: drain local, shortfall to backstop
        let routing =
            route_borrow(&mut pool, &mut backstop_pool, &mut state, &mint, 10_500).unwrap();
        assert_eq!(routing.from_local, 10_050);
        assert_eq!(routing.from_backstop, 450);
        // fee on each portion, never twice on the same value
        assert_eq!(routing.local_fee, 51); // ceil(10_050 * 0.5%)
        assert_eq!(routing.backstop_fee, 3); // ceil(450 * 0.5%)
        assert_eq!(routing.debt, 10_500 + 51 + 3);

        let support = state.support(&mint).unwrap();
        assert_eq!(support.borrowed, 453);
        assert_eq!(
            pool.asset(&mint).unwrap().borrowed.amount,
            routing.debt,
            "outstanding debt equals local + backstop portions"
        );
        assert!(reconciled(&pool, &backstop_pool, &state));
    }

    #[test]
    fn fee_overhang_is_still_served_locally() {
        let mint = Pubkey::new_unique();
        let (mut pool, mut backstop_pool, mut state) = setup(mint);
        // liquidity covers the requested amount but not amount + fee
        pool.deposit(&mint, 10_020, false).unwrap();
        backstop_pool.deposit(&mint, 100_000, false).unwrap();

        let routing =
            route_borrow(&mut pool, &mut backstop_pool, &mut state, &mint, 10_000).unwrap();
        assert_eq!(routing.from_local, 10_000);
        assert_eq!(routing.from_backstop, 0);
        assert_eq!(routing.local_fee, 50);
        assert_eq!(routing.backstop_fee, 0);
        assert_eq!(routing.debt, 10_050);
        assert!(reconciled(&pool, &backstop_pool, &state));
    }

    #[test]
    fn empty_pool_routes_whole_need_through_backstop() {
        let mint = Pubkey::new_unique();
        let (mut pool, mut backstop_pool, mut state) = setup(mint);
        backstop_pool.deposit(&mint, 100_000, false).unwrap();

        let routing =
            route_borrow(&mut pool, &mut backstop_pool, &mut state, &mint, 1_000).unwrap();
        assert_eq!(routing.from_local, 0);
        assert_eq!(routing.from_backstop, 1_000);
        assert_eq!(routing.local_fee, 5);
        assert_eq!(routing.fee_from_backstop, 5);
        // backstop fee charged on the full draw of 1_005
        assert_eq!(routing.backstop_fee, 6);
        assert_eq!(routing.debt, 1_011);
        assert!(reconciled(&pool, &backstop_pool, &state));
    }

    #[test]
    fn unsupported_asset_cannot_draw_backstop() {
        let mint = Pubkey::new_unique();
        let (mut pool, mut backstop_pool, mut state) = setup(mint);
        state.remove_support(&mint).unwrap();
        backstop_pool.deposit(&mint, 100_000, false).unwrap();

        let err =
            route_borrow(&mut pool, &mut backstop_pool, &mut state, &mint, 1_000).unwrap_err();
        assert_eq!(err, LedgerError::AssetNotSupported.into());
    }

    #[test]
    fn borrow_beyond_both_pools_fails() {
        let mint = Pubkey::new_unique();
        let (mut pool, mut backstop_pool, mut state) = setup(mint);
        pool.deposit(&mint, 1_000, false).unwrap();
        backstop_pool.deposit(&mint, 1_000, false).unwrap();

        let err =
            route_borrow(&mut pool, &mut backstop_pool, &mut state, &mint, 5_000).unwrap_err();
        assert_eq!(err, LedgerError::ExceedsBorrowable.into());
    }

    #[test]
    fn repay_retires_backstop_debt_first() {
        let mint = Pubkey::new_unique();
        let (mut pool, mut backstop_pool, mut state) = setup(mint);
        pool.deposit(&mint, 10_050, false).unwrap();
        backstop_pool.deposit(&mint, 100_000, false).unwrap();
        route_borrow(&mut pool, &mut backstop_pool, &mut state, &mint, 10_500).unwrap();
        let owed_backstop = state.support(&mint).unwrap().borrowed; // 453

        let routing =
            route_repay(&mut pool, &mut backstop_pool, &mut state, &mint, 200).unwrap();
        assert_eq!(routing.to_backstop, 200);
        assert_eq!(routing.to_local, 0);
        assert_eq!(state.support(&mint).unwrap().borrowed, owed_backstop - 200);

        let routing =
            route_repay(&mut pool, &mut backstop_pool, &mut state, &mint, 1_000).unwrap();
        assert_eq!(routing.to_backstop, 253);
        assert_eq!(routing.to_local, 747);
        assert_eq!(state.support(&mint).unwrap().borrowed, 0);
        assert!(reconciled(&pool, &backstop_pool, &state));
    }

    #[test]
    fn small_repay_routes_entirely_to_fee_bucket() {
        let mint = Pubkey::new_unique();
        let (mut pool, mut backstop_pool, mut state) = setup(mint);
        backstop_pool.deposit(&mint, 100_000, false).unwrap();
        route_borrow(&mut pool, &mut backstop_pool, &mut state, &mint, 1_000).unwrap();
        let fee = state.support(&mint).unwrap().uncollected_entry_fee; // 6

        // repay below the uncollected fee: all of it goes to the fee bucket
        let routing = route_repay(&mut pool, &mut backstop_pool, &mut state, &mint, 4).unwrap();
        assert_eq!(routing.fee_portion, 4);
        assert_eq!(state.support(&mint).unwrap().uncollected_entry_fee, fee - 4);
        assert_eq!(backstop_pool.protocol_fees_accrued, 4);

        // repay above the remainder: fee bucket first, then principal
        let routing = route_repay(&mut pool, &mut backstop_pool, &mut state, &mint, 100).unwrap();
        assert_eq!(routing.fee_portion, 2);
        assert_eq!(state.support(&mint).unwrap().uncollected_entry_fee, 0);
        assert!(reconciled(&pool, &backstop_pool, &state));
    }

    #[test]
    fn operation_sequence_keeps_both_pools_reconciled() {
        use crate::math::interest::{accrue_interest, SupportFeeMode};

        let mint = Pubkey::new_unique();
        let (mut pool, mut backstop_pool, mut state) = setup(mint);
        pool.deposit(&mint, 100_000, false).unwrap();
        pool.deposit(&mint, 7_000, true).unwrap();
        backstop_pool.deposit(&mint, 50_000, false).unwrap();

        accrue_interest(
            &mut pool,
            &mint,
            SupportFeeMode::Collect(&mut backstop_pool, &mut state),
            1,
        )
        .unwrap();
        route_borrow(&mut pool, &mut backstop_pool, &mut state, &mint, 30_000).unwrap();
        assert!(reconciled(&pool, &backstop_pool, &state));

        // a year of interest on the outstanding debt
        accrue_interest(
            &mut pool,
            &mint,
            SupportFeeMode::Collect(&mut backstop_pool, &mut state),
            1 + 365 * 24 * 3600,
        )
        .unwrap();
        assert!(reconciled(&pool, &backstop_pool, &state));

        route_repay(&mut pool, &mut backstop_pool, &mut state, &mint, 10_000).unwrap();
        pool.withdraw(&mint, 5_000, false).unwrap();
        pool.withdraw(&mint, 7_000, true).unwrap();
        assert!(reconciled(&pool, &backstop_pool, &state));
    }

    #[test]
    fn remove_support_of_non_member_is_an_error() {
        let mint = Pubkey::new_unique();
        let (_, _, mut state) = setup(mint);
        let err = state.remove_support(&Pubkey::new_unique()).unwrap_err();
        assert_eq!(err, LedgerError::AssetNotSupported.into());
    }
}
