//! Health-factor equalization across a user's multi-asset position.
//!
//! All quantities here are volumes in stable units (PRICE_PRECISION
//! normalized); the instruction layer converts between volumes and base
//! units. Two position classes interact through the shared stable leg:
//! AssetToStable coins can raise stable liquidity by borrowing against
//! their collateral headroom, StableToAsset coins consume stable deposits
//! to collateralize their asset debt.

use anchor_lang::prelude::*;

use crate::constants::RATE_PRECISION;
use crate::error::LedgerError;
use crate::math::shares::isqrt;
use crate::state::position::PositionClass;

/// One unprotected position entry reduced to its oracle volumes.
#[derive(Clone, Copy)]
pub struct CoinSnapshot {
    /// Index of the entry in the owning Position
    pub entry_index: usize,
    pub class: PositionClass,
    /// RATE_PRECISION rates of the entry's non-stable asset
    pub ltv: u64,
    pub threshold: u64,
    /// Collateral value in stable units (normal + collateral-only)
    pub collateral_volume: u128,
    /// Debt value in stable units
    pub debt_volume: u128,
}

/// A planned stable-leg adjustment for one entry, in stable units.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum StepAction {
    DepositStable(u128),
    WithdrawStable(u128),
    BorrowStable(u128),
    RepayStable(u128),
}

#[derive(Clone, Copy, Debug)]
pub struct RebalanceStep {
    pub entry_index: usize,
    pub action: StepAction,
}

/// Health factor `collateral_volume * threshold / debt_volume`, scaled by
/// RATE_PRECISION. Debt-free entries are infinitely healthy.
pub fn health_factor(collateral_volume: u128, threshold: u64, debt_volume: u128) -> Result<u128> {
    if debt_volume == 0 {
        return Ok(u128::MAX);
    }
    collateral_volume
        .checked_mul(threshold as u128)
        .ok_or(LedgerError::MathOverflow)?
        .checked_div(debt_volume)
        .ok_or(LedgerError::DivisionByZero.into())
}

pub fn is_safe(collateral_volume: u128, threshold: u64, debt_volume: u128) -> Result<bool> {
    Ok(health_factor(collateral_volume, threshold, debt_volume)? >= RATE_PRECISION)
}

/// Borrow-time check: debt must stay within the LTV capacity of the
/// collateral.
pub fn within_ltv(collateral_volume: u128, ltv: u64, debt_volume: u128) -> Result<bool> {
    let capacity = collateral_volume
        .checked_mul(ltv as u128)
        .ok_or(LedgerError::MathOverflow)?
        .checked_div(RATE_PRECISION)
        .ok_or(LedgerError::DivisionByZero)?;
    Ok(debt_volume <= capacity)
}

/// Stable deposit required to hold `debt_volume` at exactly the LTV
/// capacity: `debt * P / ltv`.
fn required_deposit(debt_volume: u128, ltv: u64) -> Result<u128> {
    if debt_volume == 0 {
        return Ok(0);
    }
    require!(ltv > 0, LedgerError::DivisionByZero);
    debt_volume
        .checked_mul(RATE_PRECISION)
        .ok_or(LedgerError::MathOverflow)?
        .checked_div(ltv as u128)
        .ok_or(LedgerError::DivisionByZero.into())
}

/// Result of planning a stable reallocation: either the steps to execute,
/// or the stable volume still missing for the requirement to be coverable.
pub enum ReallocationOutcome {
    Balanced(Vec<RebalanceStep>),
    Shortfall(u128),
}

/// Plan a reallocation of stable deposits across the StableToAsset coins so
/// every coin lands on one common health factor. `extra_stable` is freshly
/// borrowed stable volume entering the reallocation on top of what the
/// coins already hold.
///
/// Reports the shortfall when total capacity (current deposits plus extra)
/// cannot cover the aggregate requirement even at break-even.
pub fn plan_reallocation(
    coins: &[CoinSnapshot],
    extra_stable: u128,
) -> Result<ReallocationOutcome> {
    let mut total_deposited = extra_stable;
    let mut total_required = 0u128;
    for coin in coins {
        debug_assert!(coin.class == PositionClass::StableToAsset);
        total_deposited = total_deposited
            .checked_add(coin.collateral_volume)
            .ok_or(LedgerError::MathOverflow)?;
        total_required = total_required
            .checked_add(required_deposit(coin.debt_volume, coin.ltv)?)
            .ok_or(LedgerError::MathOverflow)?;
    }
    if total_required == 0 {
        return Ok(ReallocationOutcome::Balanced(Vec::new()));
    }
    if total_deposited < total_required {
        return Ok(ReallocationOutcome::Shortfall(
            total_required - total_deposited,
        ));
    }

    // Proportional targets: t_i = required_i * total / sum(required) puts
    // every coin on the same capacity ratio. Flooring dust lands on the
    // first indebted coin.
    let mut targets = Vec::with_capacity(coins.len());
    let mut assigned = 0u128;
    for coin in coins {
        let required = required_deposit(coin.debt_volume, coin.ltv)?;
        let target = required
            .checked_mul(total_deposited)
            .ok_or(LedgerError::MathOverflow)?
            .checked_div(total_required)
            .ok_or(LedgerError::DivisionByZero)?;
        assigned = assigned
            .checked_add(target)
            .ok_or(LedgerError::MathOverflow)?;
        targets.push(target);
    }
    let dust = total_deposited
        .checked_sub(assigned)
        .ok_or(LedgerError::MathUnderflow)?;
    if let Some(first) = coins
        .iter()
        .position(|c| c.debt_volume > 0)
        .and_then(|i| targets.get_mut(i))
    {
        *first = first.checked_add(dust).ok_or(LedgerError::MathOverflow)?;
    }

    // Withdrawals first so the executor's stable buffer is funded before
    // any deposit draws on it.
    let mut steps = Vec::new();
    for (coin, target) in coins.iter().zip(&targets) {
        if coin.collateral_volume > *target {
            steps.push(RebalanceStep {
                entry_index: coin.entry_index,
                action: StepAction::WithdrawStable(coin.collateral_volume - target),
            });
        }
    }
    for (coin, target) in coins.iter().zip(&targets) {
        if *target > coin.collateral_volume {
            steps.push(RebalanceStep {
                entry_index: coin.entry_index,
                action: StepAction::DepositStable(target - coin.collateral_volume),
            });
        }
    }
    Ok(ReallocationOutcome::Balanced(steps))
}

/// Raise `required` stable volume by borrowing against AssetToStable coins
/// with spare capacity, greedy first-fit in position order. Returns the
/// planned borrows and the volume actually raised.
pub fn plan_stable_raise(
    coins: &[CoinSnapshot],
    required: u128,
) -> Result<(Vec<RebalanceStep>, u128)> {
    let mut steps = Vec::new();
    let mut raised = 0u128;
    for coin in coins {
        debug_assert!(coin.class == PositionClass::AssetToStable);
        if raised >= required {
            break;
        }
        let capacity = coin
            .collateral_volume
            .checked_mul(coin.ltv as u128)
            .ok_or(LedgerError::MathOverflow)?
            .checked_div(RATE_PRECISION)
            .ok_or(LedgerError::DivisionByZero)?;
        let headroom = capacity.saturating_sub(coin.debt_volume);
        let take = headroom.min(required - raised);
        if take > 0 {
            steps.push(RebalanceStep {
                entry_index: coin.entry_index,
                action: StepAction::BorrowStable(take),
            });
            raised = raised.checked_add(take).ok_or(LedgerError::MathOverflow)?;
        }
    }
    Ok((steps, raised))
}

/// The flatten solution: the uniform health factor every coin is pushed to
/// (RATE_PRECISION scale) and the steps that get there.
pub struct FlattenSolution {
    pub factor: u128,
    pub steps: Vec<RebalanceStep>,
}

/// Solve for the single health factor that makes every coin break even
/// simultaneously, capturing the interaction of the two classes through the
/// shared stable leg.
///
/// With y the stable utilization at equilibrium, stable conservation gives
/// `a*y^2 + b*y - c = 0` where `a = sum(collateral * lt)` over
/// AssetToStable, `b = stable deposits - stable debt` (signed) and
/// `c = sum(debt / lt)` over StableToAsset. The equalized health factor is
/// `1/y`; a solution with `1 - y <= 0` means even full flattening cannot
/// reach break-even and flattening is skipped.
pub fn plan_flatten(coins: &[CoinSnapshot]) -> Result<Option<FlattenSolution>> {
    let mut a = 0u128; // stable borrowing capacity of AssetToStable coins
    let mut stable_deposits = 0u128;
    let mut stable_debt = 0u128;
    let mut c = 0u128; // stable requirement of StableToAsset coins

    for coin in coins {
        match coin.class {
            PositionClass::AssetToStable => {
                let capacity = coin
                    .collateral_volume
                    .checked_mul(coin.threshold as u128)
                    .ok_or(LedgerError::MathOverflow)?
                    .checked_div(RATE_PRECISION)
                    .ok_or(LedgerError::DivisionByZero)?;
                a = a.checked_add(capacity).ok_or(LedgerError::MathOverflow)?;
                stable_debt = stable_debt
                    .checked_add(coin.debt_volume)
                    .ok_or(LedgerError::MathOverflow)?;
            }
            PositionClass::StableToAsset => {
                stable_deposits = stable_deposits
                    .checked_add(coin.collateral_volume)
                    .ok_or(LedgerError::MathOverflow)?;
                require!(coin.threshold > 0, LedgerError::DivisionByZero);
                let requirement = coin
                    .debt_volume
                    .checked_mul(RATE_PRECISION)
                    .ok_or(LedgerError::MathOverflow)?
                    .checked_div(coin.threshold as u128)
                    .ok_or(LedgerError::DivisionByZero)?;
                c = c.checked_add(requirement).ok_or(LedgerError::MathOverflow)?;
            }
        }
    }

    if c == 0 {
        // No stable-collateralized debt: nothing for the quadratic to solve.
        return Ok(None);
    }

    let b: i128 = (stable_deposits as i128) - (stable_debt as i128);

    let y = if a == 0 {
        if b <= 0 {
            return Ok(None);
        }
        c.checked_mul(RATE_PRECISION)
            .ok_or(LedgerError::MathOverflow)?
            .checked_div(b as u128)
            .ok_or(LedgerError::DivisionByZero)?
    } else {
        let b_sq = (b as i128)
            .checked_mul(b as i128)
            .ok_or(LedgerError::MathOverflow)? as u128;
        let four_ac = a
            .checked_mul(c)
            .and_then(|v| v.checked_mul(4))
            .ok_or(LedgerError::MathOverflow)?;
        let disc = b_sq
            .checked_add(four_ac)
            .ok_or(LedgerError::MathOverflow)?;
        let root = isqrt(disc) as i128;
        let numerator = root.checked_sub(b).ok_or(LedgerError::MathOverflow)?;
        if numerator <= 0 {
            return Ok(None);
        }
        (numerator as u128)
            .checked_mul(RATE_PRECISION)
            .ok_or(LedgerError::MathOverflow)?
            .checked_div(2u128.checked_mul(a).ok_or(LedgerError::MathOverflow)?)
            .ok_or(LedgerError::DivisionByZero)?
    };

    if y == 0 || y >= RATE_PRECISION {
        // Equalized factor would be at or below break-even.
        return Ok(None);
    }
    let factor = RATE_PRECISION - y;

    // Stable releases (withdraw / fresh borrows) precede consumers so the
    // executor's buffer is always funded.
    let mut releases = Vec::new();
    let mut consumers = Vec::new();
    for coin in coins {
        match coin.class {
            PositionClass::AssetToStable => {
                let capacity = coin
                    .collateral_volume
                    .checked_mul(coin.threshold as u128)
                    .ok_or(LedgerError::MathOverflow)?
                    .checked_div(RATE_PRECISION)
                    .ok_or(LedgerError::DivisionByZero)?;
                let target_debt = capacity
                    .checked_mul(y)
                    .ok_or(LedgerError::MathOverflow)?
                    .checked_div(RATE_PRECISION)
                    .ok_or(LedgerError::DivisionByZero)?;
                if target_debt > coin.debt_volume {
                    releases.push(RebalanceStep {
                        entry_index: coin.entry_index,
                        action: StepAction::BorrowStable(target_debt - coin.debt_volume),
                    });
                } else if target_debt < coin.debt_volume {
                    consumers.push(RebalanceStep {
                        entry_index: coin.entry_index,
                        action: StepAction::RepayStable(coin.debt_volume - target_debt),
                    });
                }
            }
            PositionClass::StableToAsset => {
                require!(coin.threshold > 0, LedgerError::DivisionByZero);
                let requirement = coin
                    .debt_volume
                    .checked_mul(RATE_PRECISION)
                    .ok_or(LedgerError::MathOverflow)?
                    .checked_div(coin.threshold as u128)
                    .ok_or(LedgerError::DivisionByZero)?;
                // ceil(requirement * P / y)
                let target_deposit = requirement
                    .checked_mul(RATE_PRECISION)
                    .ok_or(LedgerError::MathOverflow)?
                    .checked_add(y - 1)
                    .ok_or(LedgerError::MathOverflow)?
                    .checked_div(y)
                    .ok_or(LedgerError::DivisionByZero)?;
                if target_deposit > coin.collateral_volume {
                    consumers.push(RebalanceStep {
                        entry_index: coin.entry_index,
                        action: StepAction::DepositStable(target_deposit - coin.collateral_volume),
                    });
                } else if target_deposit < coin.collateral_volume {
                    releases.push(RebalanceStep {
                        entry_index: coin.entry_index,
                        action: StepAction::WithdrawStable(coin.collateral_volume - target_deposit),
                    });
                }
            }
        }
    }

    let mut steps = releases;
    steps.append(&mut consumers);
    Ok(Some(FlattenSolution { factor, steps }))
}

impl ReallocationOutcome {
    #[cfg(test)]
    fn balanced(self) -> Vec<RebalanceStep> {
        match self {
            ReallocationOutcome::Balanced(steps) => steps,
            ReallocationOutcome::Shortfall(missing) => {
                panic!("expected balanced plan, missing {}", missing)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sta(entry_index: usize, collateral: u128, debt: u128) -> CoinSnapshot {
        CoinSnapshot {
            entry_index,
            class: PositionClass::StableToAsset,
            ltv: 700_000_000,       // 70%
            threshold: 800_000_000, // 80%
            collateral_volume: collateral,
            debt_volume: debt,
        }
    }

    fn ats(entry_index: usize, collateral: u128, debt: u128) -> CoinSnapshot {
        CoinSnapshot {
            entry_index,
            class: PositionClass::AssetToStable,
            ltv: 700_000_000,
            threshold: 800_000_000,
            collateral_volume: collateral,
            debt_volume: debt,
        }
    }

    #[test]
    fn health_factor_thresholds() {
        // 1000 * 80% / 900 < 1: unsafe
        assert!(!is_safe(1_000, 800_000_000, 900).unwrap());
        // 1000 * 80% / 800 == 1: exactly safe
        assert!(is_safe(1_000, 800_000_000, 800).unwrap());
        assert_eq!(health_factor(1_000, 800_000_000, 0).unwrap(), u128::MAX);
    }

    #[test]
    fn reallocation_moves_surplus_to_deficit() {
        // A holds surplus stable, B is undercollateralized; both owe 700 at
        // 70% LTV, so each requires 1000 at break-even.
        let coins = [sta(0, 3_000, 700), sta(1, 500, 700)];
        let steps = plan_reallocation(&coins, 0).unwrap().balanced();

        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].entry_index, 0);
        assert_eq!(steps[0].action, StepAction::WithdrawStable(1_250));
        assert_eq!(steps[1].entry_index, 1);
        assert_eq!(steps[1].action, StepAction::DepositStable(1_250));
        // Both coins land on deposits of 1750: the same 1.75x capacity ratio.
    }

    #[test]
    fn reallocation_conserves_stable() {
        let coins = [sta(0, 4_100, 900), sta(1, 333, 500), sta(2, 1_000, 1_000)];
        let steps = plan_reallocation(&coins, 0).unwrap().balanced();
        let withdrawn: u128 = steps
            .iter()
            .filter_map(|s| match s.action {
                StepAction::WithdrawStable(v) => Some(v),
                _ => None,
            })
            .sum();
        let deposited: u128 = steps
            .iter()
            .filter_map(|s| match s.action {
                StepAction::DepositStable(v) => Some(v),
                _ => None,
            })
            .sum();
        assert_eq!(withdrawn, deposited);
    }

    #[test]
    fn reallocation_reports_exhausted_capacity() {
        // requirement 2000 + 2000 exceeds total deposits of 1500
        let coins = [sta(0, 1_000, 1_400), sta(1, 500, 1_400)];
        match plan_reallocation(&coins, 0).unwrap() {
            ReallocationOutcome::Shortfall(missing) => assert_eq!(missing, 2_500),
            ReallocationOutcome::Balanced(_) => panic!("expected shortfall"),
        }
        // extra stable from a fresh borrow closes the gap exactly
        let steps = plan_reallocation(&coins, 2_500).unwrap().balanced();
        assert!(!steps.is_empty());
    }

    #[test]
    fn stable_raise_is_greedy_first_fit() {
        // X: capacity 700, owes 500 -> headroom 200; Y: headroom 700
        let coins = [ats(0, 1_000, 500), ats(1, 1_000, 0)];
        let (steps, raised) = plan_stable_raise(&coins, 600).unwrap();

        assert_eq!(raised, 600);
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].entry_index, 0);
        assert_eq!(steps[0].action, StepAction::BorrowStable(200));
        assert_eq!(steps[1].entry_index, 1);
        assert_eq!(steps[1].action, StepAction::BorrowStable(400));
    }

    #[test]
    fn stable_raise_reports_shortfall() {
        let coins = [ats(0, 1_000, 500)];
        let (_, raised) = plan_stable_raise(&coins, 600).unwrap();
        assert_eq!(raised, 200);
    }

    #[test]
    fn flatten_reaches_uniform_factor_above_one() {
        // One unsafe StableToAsset coin (hf 0.89) and one AssetToStable coin
        // with plenty of margin.
        let coins = [sta(0, 1_000, 900), ats(1, 10_000, 2_000)];
        let solution = plan_flatten(&coins).unwrap().unwrap();

        // a = 8000, b = 1000 - 2000, c = 900/0.8 = 1125
        // y = (1000 + isqrt(37e6)) / 16000 ~= 0.4426
        assert_eq!(solution.factor, RATE_PRECISION - 442_625_000);

        // The ATS coin borrows stable, the STA coin absorbs it.
        assert_eq!(solution.steps.len(), 2);
        assert_eq!(solution.steps[0].entry_index, 1);
        assert_eq!(solution.steps[0].action, StepAction::BorrowStable(1_541));
        assert_eq!(solution.steps[1].entry_index, 0);
        assert_eq!(solution.steps[1].action, StepAction::DepositStable(1_542));

        // Applying the plan leaves both coins safe with matching factors.
        let sta_deposit = 1_000 + 1_541; // capped at what was released
        let ats_debt = 2_000 + 1_541;
        assert!(is_safe(sta_deposit, 800_000_000, 900).unwrap());
        assert!(is_safe(10_000, 800_000_000, ats_debt).unwrap());
        let hf_sta = health_factor(sta_deposit, 800_000_000, 900).unwrap();
        let hf_ats = health_factor(10_000, 800_000_000, ats_debt).unwrap();
        let diff = hf_sta.abs_diff(hf_ats);
        assert!(diff < 2_000_000, "factors diverge: {} vs {}", hf_sta, hf_ats);
    }

    #[test]
    fn flatten_skips_when_factor_cannot_reach_positive() {
        // Debt everywhere, no margin: equalized factor would sit at or
        // below break-even.
        let coins = [sta(0, 100, 900), ats(1, 1_000, 790)];
        assert!(plan_flatten(&coins).unwrap().is_none());
    }

    #[test]
    fn flatten_without_stable_debt_is_skipped() {
        let coins = [ats(0, 1_000, 100)];
        assert!(plan_flatten(&coins).unwrap().is_none());
    }
}
