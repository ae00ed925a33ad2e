// =============================================================================
// Shared instruction plumbing
// =============================================================================
// Accrual settlement, oracle snapshot assembly and rebalance-step execution
// used by the user-facing instructions. Everything here mutates ledger state
// only; token CPIs stay in the instruction handlers, except the support-fee
// collection transfer which is bound to the accrual that produced it.
// =============================================================================

use anchor_lang::prelude::*;
use anchor_spl::token::{self, Token, TokenAccount, Transfer};

use crate::error::LedgerError;
use crate::events::SupportFeeCollected;
use crate::math::interest::{accrue_interest, SupportFeeMode};
use crate::math::oracle::{find_price, from_volume, volume};
use crate::math::rebalance::{CoinSnapshot, RebalanceStep, StepAction};
use crate::state::backstop::{BackstopState, BorrowRouting};
use crate::state::pool::Pool;
use crate::state::position::{Position, PositionClass};

/// Accrue interest on `mint` with full support-fee collection, moving the
/// collected custody from the primary vault to the backstop vault. Must be
/// atomic with the accrual it originated from, so it lives here rather than
/// in the handlers.
#[allow(clippy::too_many_arguments)]
pub fn accrue_and_collect<'info>(
    pool: &mut Account<'info, Pool>,
    backstop_pool: &mut Account<'info, Pool>,
    backstop_state: &mut Account<'info, BackstopState>,
    mint: &Pubkey,
    vault: &Account<'info, TokenAccount>,
    backstop_vault: Option<&Account<'info, TokenAccount>>,
    token_program: &Program<'info, Token>,
    now: i64,
) -> Result<()> {
    let outcome = accrue_interest(
        pool,
        mint,
        SupportFeeMode::Collect(backstop_pool, backstop_state),
        now,
    )?;

    if outcome.support_fee_collected > 0 {
        let backstop_vault = backstop_vault.ok_or(LedgerError::InvalidVault)?;
        require!(
            backstop_vault.key() == backstop_pool.asset(mint)?.vault,
            LedgerError::InvalidVault
        );
        let collected: u64 = outcome
            .support_fee_collected
            .try_into()
            .map_err(|_| LedgerError::MathOverflow)?;

        let stable_mint = pool.stable_mint;
        let pool_seeds = &[pool.seed_prefix(), stable_mint.as_ref(), &[pool.bump]];
        let signer_seeds = &[&pool_seeds[..]];
        token::transfer(
            CpiContext::new_with_signer(
                token_program.to_account_info(),
                Transfer {
                    from: vault.to_account_info(),
                    to: backstop_vault.to_account_info(),
                    authority: pool.to_account_info(),
                },
                signer_seeds,
            ),
            collected,
        )?;

        emit!(SupportFeeCollected {
            pool: pool.key(),
            backstop_pool: backstop_pool.key(),
            mint: *mint,
            collected,
            carried: backstop_state
                .support(mint)
                .map_or(0, |s| s.uncollected_support_fee),
            timestamp: now,
        });
    }
    Ok(())
}

/// Move the payouts of a routed borrow: the local portion from the primary
/// vault, the backstop portion to the borrower, and (when the primary had
/// no liquidity) the local entry fee from backstop custody into the primary
/// vault.
#[allow(clippy::too_many_arguments)]
pub fn transfer_borrow_payouts<'info>(
    pool: &Account<'info, Pool>,
    backstop_pool: &Account<'info, Pool>,
    vault: &Account<'info, TokenAccount>,
    backstop_vault: Option<&Account<'info, TokenAccount>>,
    user_token: &Account<'info, TokenAccount>,
    token_program: &Program<'info, Token>,
    flow_mint: &Pubkey,
    routing: &BorrowRouting,
) -> Result<()> {
    if routing.from_local > 0 {
        let stable_mint = pool.stable_mint;
        let pool_seeds = &[pool.seed_prefix(), stable_mint.as_ref(), &[pool.bump]];
        let signer_seeds = &[&pool_seeds[..]];
        token::transfer(
            CpiContext::new_with_signer(
                token_program.to_account_info(),
                Transfer {
                    from: vault.to_account_info(),
                    to: user_token.to_account_info(),
                    authority: pool.to_account_info(),
                },
                signer_seeds,
            ),
            routing
                .from_local
                .try_into()
                .map_err(|_| LedgerError::MathOverflow)?,
        )?;
    }

    if routing.from_backstop > 0 || routing.fee_from_backstop > 0 {
        let backstop_vault = backstop_vault.ok_or(LedgerError::InvalidVault)?;
        require!(
            backstop_vault.key() == backstop_pool.asset(flow_mint)?.vault,
            LedgerError::InvalidVault
        );
        let stable_mint = backstop_pool.stable_mint;
        let backstop_seeds = &[
            backstop_pool.seed_prefix(),
            stable_mint.as_ref(),
            &[backstop_pool.bump],
        ];
        let signer_seeds = &[&backstop_seeds[..]];
        if routing.from_backstop > 0 {
            token::transfer(
                CpiContext::new_with_signer(
                    token_program.to_account_info(),
                    Transfer {
                        from: backstop_vault.to_account_info(),
                        to: user_token.to_account_info(),
                        authority: backstop_pool.to_account_info(),
                    },
                    signer_seeds,
                ),
                routing
                    .from_backstop
                    .try_into()
                    .map_err(|_| LedgerError::MathOverflow)?,
            )?;
        }
        if routing.fee_from_backstop > 0 {
            token::transfer(
                CpiContext::new_with_signer(
                    token_program.to_account_info(),
                    Transfer {
                        from: backstop_vault.to_account_info(),
                        to: vault.to_account_info(),
                        authority: backstop_pool.to_account_info(),
                    },
                    signer_seeds,
                ),
                routing
                    .fee_from_backstop
                    .try_into()
                    .map_err(|_| LedgerError::MathOverflow)?,
            )?;
        }
    }
    Ok(())
}

/// Reduce the position's entries to oracle volumes. Oracle accounts arrive
/// via remaining_accounts and are matched against each ledger's configured
/// oracle pubkey.
pub fn build_snapshots(
    pool: &Pool,
    position: &Position,
    oracles: &[AccountInfo],
    skip_protected: bool,
    now: i64,
) -> Result<Vec<CoinSnapshot>> {
    let stable_mint = pool.stable_mint;
    let stable_ledger = pool.asset(&stable_mint)?;
    let stable_price = find_price(oracles, &stable_ledger.config.oracle, now)?.price;

    let mut snapshots = Vec::with_capacity(position.entries.len());
    for (entry_index, entry) in position.entries.iter().enumerate() {
        if entry.is_empty() || (skip_protected && entry.protected) {
            continue;
        }
        let asset_ledger = pool.asset(&entry.mint)?;
        let asset_price = find_price(oracles, &asset_ledger.config.oracle, now)?.price;

        let (collateral_volume, debt_volume) = match entry.class {
            PositionClass::AssetToStable => {
                let collateral = asset_ledger
                    .normal
                    .share_value(entry.deposited_share)?
                    .checked_add(
                        asset_ledger
                            .collateral_only
                            .share_value(entry.collateral_only_share)?,
                    )
                    .ok_or(LedgerError::MathOverflow)?;
                let debt = stable_ledger.borrowed.share_value(entry.borrowed_share)?;
                (
                    volume(asset_price, collateral)?,
                    volume(stable_price, debt)?,
                )
            }
            PositionClass::StableToAsset => {
                let collateral = stable_ledger
                    .normal
                    .share_value(entry.deposited_share)?
                    .checked_add(
                        stable_ledger
                            .collateral_only
                            .share_value(entry.collateral_only_share)?,
                    )
                    .ok_or(LedgerError::MathOverflow)?;
                let debt = asset_ledger.borrowed.share_value(entry.borrowed_share)?;
                (
                    volume(stable_price, collateral)?,
                    volume(asset_price, debt)?,
                )
            }
        };

        snapshots.push(CoinSnapshot {
            entry_index,
            class: entry.class,
            ltv: asset_ledger.config.ltv,
            threshold: asset_ledger.config.liquidation_threshold,
            collateral_volume,
            debt_volume,
        });
    }
    Ok(snapshots)
}

/// The stable price for volume/amount conversion, read once per operation.
pub fn stable_price(pool: &Pool, oracles: &[AccountInfo], now: i64) -> Result<u128> {
    let stable_ledger = pool.asset(&pool.stable_mint)?;
    Ok(find_price(oracles, &stable_ledger.config.oracle, now)?.price)
}

/// What a rebalance execution actually moved, in stable base units.
#[derive(Default)]
pub struct StepSummary {
    pub withdrawn: u128,
    pub deposited: u128,
    pub borrowed: u128,
    pub repaid: u128,
}

/// Apply planned stable-leg steps to the ledger and position. All movement
/// is internal reallocation: custody never leaves the pool, and the running
/// buffer of in-flight stable keeps every intermediate state reconciled.
/// Leftover buffer (plan rounding) lands on `fallback_entry`.
pub fn execute_steps(
    pool: &mut Pool,
    position: &mut Position,
    stable_price: u128,
    steps: &[RebalanceStep],
    fallback_entry: usize,
) -> Result<StepSummary> {
    let stable_mint = pool.stable_mint;
    let mut buffer = 0u128;
    let mut summary = StepSummary::default();

    for step in steps {
        require!(
            step.entry_index < position.entries.len(),
            LedgerError::NotInitialized
        );
        match step.action {
            StepAction::WithdrawStable(vol) => {
                let amount = from_volume(stable_price, vol)?;
                let entitled = {
                    let entry = &position.entries[step.entry_index];
                    pool.asset(&stable_mint)?
                        .normal
                        .share_value(entry.deposited_share)?
                };
                let take = amount.min(entitled);
                if take == 0 {
                    continue;
                }
                let share = pool.withdraw(&stable_mint, take, false)?;
                let entry = &mut position.entries[step.entry_index];
                entry.deposited_share = entry
                    .deposited_share
                    .checked_sub(share)
                    .ok_or(LedgerError::MathUnderflow)?;
                buffer = buffer.checked_add(take).ok_or(LedgerError::MathOverflow)?;
                summary.withdrawn = summary.withdrawn.saturating_add(take);
            }
            StepAction::BorrowStable(vol) => {
                let amount = from_volume(stable_price, vol)?;
                let take = amount.min(pool.available_liquidity());
                if take == 0 {
                    continue;
                }
                let share = pool.apply_borrow(&stable_mint, take)?;
                pool.held_balance = pool
                    .held_balance
                    .checked_sub(take)
                    .ok_or(LedgerError::MathUnderflow)?;
                let entry = &mut position.entries[step.entry_index];
                entry.borrowed_share = entry
                    .borrowed_share
                    .checked_add(share)
                    .ok_or(LedgerError::MathOverflow)?;
                buffer = buffer.checked_add(take).ok_or(LedgerError::MathOverflow)?;
                summary.borrowed = summary.borrowed.saturating_add(take);
            }
            StepAction::DepositStable(vol) => {
                let amount = from_volume(stable_price, vol)?;
                let take = amount.min(buffer);
                if take == 0 {
                    continue;
                }
                let share = pool.deposit(&stable_mint, take, false)?;
                let entry = &mut position.entries[step.entry_index];
                entry.deposited_share = entry
                    .deposited_share
                    .checked_add(share)
                    .ok_or(LedgerError::MathOverflow)?;
                buffer = buffer.checked_sub(take).ok_or(LedgerError::MathUnderflow)?;
                summary.deposited = summary.deposited.saturating_add(take);
            }
            StepAction::RepayStable(vol) => {
                let amount = from_volume(stable_price, vol)?;
                let debt_value = {
                    let entry = &position.entries[step.entry_index];
                    pool.asset(&stable_mint)?
                        .borrowed
                        .share_value(entry.borrowed_share)?
                };
                let take = amount.min(buffer).min(debt_value);
                if take == 0 {
                    continue;
                }
                let share = pool.apply_repay(&stable_mint, take)?;
                pool.held_balance = pool
                    .held_balance
                    .checked_add(take)
                    .ok_or(LedgerError::MathOverflow)?;
                let entry = &mut position.entries[step.entry_index];
                entry.borrowed_share = entry
                    .borrowed_share
                    .checked_sub(share)
                    .ok_or(LedgerError::MathUnderflow)?;
                buffer = buffer.checked_sub(take).ok_or(LedgerError::MathUnderflow)?;
                summary.repaid = summary.repaid.saturating_add(take);
            }
        }
    }

    // Rounding dust left in flight goes back to stable deposits so custody
    // stays fully attributed.
    if buffer > 0 {
        require!(
            fallback_entry < position.entries.len(),
            LedgerError::NotInitialized
        );
        let share = pool.deposit(&stable_mint, buffer, false)?;
        let entry = &mut position.entries[fallback_entry];
        entry.deposited_share = entry
            .deposited_share
            .checked_add(share)
            .ok_or(LedgerError::MathOverflow)?;
        summary.deposited = summary.deposited.saturating_add(buffer);
    }

    Ok(summary)
}
