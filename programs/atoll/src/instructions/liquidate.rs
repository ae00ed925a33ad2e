// =============================================================================
// Liquidate Instruction
// =============================================================================
// Permissionless liquidation of an unsafe entry. The position is first
// flattened: one equilibrium health factor is solved across every
// unprotected coin in both classes (quadratic in the shared stable leg) and
// each coin is pushed toward it by internal reallocation. Only if the entry
// is still unsafe does the terminal step run: the liquidator repays the
// full debt and receives the full deposit minus the liquidation fee.
//
// A safe entry is a reported no-op, never an error. Protected entries are
// exempt entirely.
// =============================================================================

use anchor_lang::prelude::*;
use anchor_spl::token::{self, Mint, Token, TokenAccount, Transfer};

use crate::constants::{BACKSTOP_SEED, BACKSTOP_STATE_SEED, POOL_SEED, POSITION_SEED};
use crate::error::LedgerError;
use crate::events::{PositionLiquidated, PositionsFlattened};
use crate::instructions::common::{build_snapshots, execute_steps, stable_price};
use crate::math::interest::{accrue_interest, SupportFeeMode};
use crate::math::rebalance::{is_safe, plan_flatten};
use crate::math::shares::fee_round_up;
use crate::state::backstop::route_repay;
use crate::state::{BackstopState, Pool, Position, PositionClass};

#[derive(Accounts)]
pub struct Liquidate<'info> {
    #[account(mut)]
    pub liquidator: Signer<'info>,

    /// CHECK: the liquidated user, only used as the position PDA key
    pub user: UncheckedAccount<'info>,

    #[account(
        mut,
        seeds = [POOL_SEED, pool.stable_mint.as_ref()],
        bump = pool.bump,
        constraint = !pool.is_paused @ LedgerError::PoolPaused
    )]
    pub pool: Account<'info, Pool>,

    #[account(
        mut,
        seeds = [BACKSTOP_SEED, pool.stable_mint.as_ref()],
        bump = backstop_pool.bump
    )]
    pub backstop_pool: Account<'info, Pool>,

    #[account(
        mut,
        seeds = [BACKSTOP_STATE_SEED, backstop_pool.key().as_ref()],
        bump = backstop_state.bump
    )]
    pub backstop_state: Account<'info, BackstopState>,

    #[account(
        mut,
        seeds = [POSITION_SEED, pool.key().as_ref(), user.key().as_ref()],
        bump = position.bump
    )]
    pub position: Account<'info, Position>,

    /// The non-stable asset keying the liquidated entry
    pub asset_mint: Account<'info, Mint>,

    /// Primary vault of the entry's debt asset
    #[account(mut)]
    pub debt_vault: Account<'info, TokenAccount>,

    /// Backstop vault of the entry's debt asset
    #[account(mut)]
    pub backstop_debt_vault: Option<Account<'info, TokenAccount>>,

    /// Primary vault of the entry's collateral asset
    #[account(mut)]
    pub collateral_vault: Account<'info, TokenAccount>,

    /// Liquidator's token account for the debt asset (source of repayment)
    #[account(
        mut,
        constraint = liquidator_debt_token.owner == liquidator.key() @ LedgerError::InvalidTokenAccountOwner
    )]
    pub liquidator_debt_token: Account<'info, TokenAccount>,

    /// Liquidator's token account for the collateral asset
    #[account(
        mut,
        constraint = liquidator_collateral_token.owner == liquidator.key() @ LedgerError::InvalidTokenAccountOwner
    )]
    pub liquidator_collateral_token: Account<'info, TokenAccount>,

    pub token_program: Program<'info, Token>,
}

pub fn handler_liquidate(ctx: Context<Liquidate>, class: PositionClass) -> Result<()> {
    let asset_key = ctx.accounts.asset_mint.key();
    let stable_mint = ctx.accounts.pool.stable_mint;
    require!(asset_key != stable_mint, LedgerError::InvalidMint);

    let (debt_mint, collateral_mint) = match class {
        PositionClass::AssetToStable => (stable_mint, asset_key),
        PositionClass::StableToAsset => (asset_key, stable_mint),
    };
    require!(
        ctx.accounts.debt_vault.key() == ctx.accounts.pool.asset(&debt_mint)?.vault,
        LedgerError::InvalidVault
    );
    require!(
        ctx.accounts.collateral_vault.key() == ctx.accounts.pool.asset(&collateral_mint)?.vault,
        LedgerError::InvalidVault
    );
    require!(
        ctx.accounts.liquidator_debt_token.mint == debt_mint,
        LedgerError::InvalidMint
    );
    require!(
        ctx.accounts.liquidator_collateral_token.mint == collateral_mint,
        LedgerError::InvalidMint
    );

    let now = Clock::get()?.unix_timestamp;
    // Both legs accrue in carry mode: no vault pair is bound here, so
    // support fees ride the uncollected counter until the next collection.
    accrue_interest(
        &mut ctx.accounts.pool,
        &asset_key,
        SupportFeeMode::Carry(&mut ctx.accounts.backstop_state),
        now,
    )?;
    accrue_interest(
        &mut ctx.accounts.pool,
        &stable_mint,
        SupportFeeMode::Carry(&mut ctx.accounts.backstop_state),
        now,
    )?;

    let entry_index = ctx
        .accounts
        .position
        .entry_index(&asset_key, class)
        .ok_or(LedgerError::NotInitialized)?;
    if ctx.accounts.position.entries[entry_index].protected {
        msg!("Position entry is protected - skipping liquidation");
        return Ok(());
    }

    let snapshots = build_snapshots(
        &ctx.accounts.pool,
        &ctx.accounts.position,
        ctx.remaining_accounts,
        false,
        now,
    )?;
    let target = snapshots
        .iter()
        .find(|c| c.entry_index == entry_index)
        .ok_or(LedgerError::NotInitialized)?;
    if is_safe(target.collateral_volume, target.threshold, target.debt_volume)? {
        msg!("Position is safe - nothing to liquidate");
        return Ok(());
    }

    // Flatten: push every unprotected coin toward the solved equilibrium
    // factor. A non-positive solution skips flattening; the terminal check
    // below still runs.
    let unprotected: Vec<_> = snapshots
        .iter()
        .filter(|c| !ctx.accounts.position.entries[c.entry_index].protected)
        .copied()
        .collect();
    if let Some(solution) = plan_flatten(&unprotected)? {
        let fallback = unprotected
            .iter()
            .find(|c| c.class == PositionClass::StableToAsset)
            .map(|c| c.entry_index)
            .ok_or(LedgerError::NotInitialized)?;
        let price = stable_price(&ctx.accounts.pool, ctx.remaining_accounts, now)?;
        let summary = execute_steps(
            &mut ctx.accounts.pool,
            &mut ctx.accounts.position,
            price,
            &solution.steps,
            fallback,
        )?;
        emit!(PositionsFlattened {
            user: ctx.accounts.user.key(),
            pool: ctx.accounts.pool.key(),
            solved_factor: solution.factor,
            stable_reallocated: summary.withdrawn,
            stable_borrowed: summary.borrowed,
            timestamp: now,
        });
        msg!("Flattened positions to factor {}", solution.factor);
    }

    // Re-evaluate the entry after flattening.
    let snapshots = build_snapshots(
        &ctx.accounts.pool,
        &ctx.accounts.position,
        ctx.remaining_accounts,
        false,
        now,
    )?;
    let target = snapshots
        .iter()
        .find(|c| c.entry_index == entry_index)
        .ok_or(LedgerError::NotInitialized)?;
    if is_safe(target.collateral_volume, target.threshold, target.debt_volume)? {
        msg!("Flattening restored safety - no terminal liquidation");
        return Ok(());
    }

    // Terminal step: full debt repaid by the liquidator, full deposit
    // seized minus the liquidation fee.
    let entry = ctx.accounts.position.entries[entry_index];
    let debt_amount = ctx
        .accounts
        .pool
        .asset(&debt_mint)?
        .borrowed
        .share_value(entry.borrowed_share)?;

    let mut repaid: u64 = 0;
    if debt_amount > 0 {
        let routing = route_repay(
            &mut ctx.accounts.pool,
            &mut ctx.accounts.backstop_pool,
            &mut ctx.accounts.backstop_state,
            &debt_mint,
            debt_amount,
        )?;
        let entry = &mut ctx.accounts.position.entries[entry_index];
        entry.borrowed_share = entry
            .borrowed_share
            .checked_sub(routing.debt_share)
            .ok_or(LedgerError::MathUnderflow)?;
        // Residual rounding shares on a fully repaid debt are retired.
        if ctx
            .accounts
            .pool
            .asset(&debt_mint)?
            .borrowed
            .share_value(ctx.accounts.position.entries[entry_index].borrowed_share)?
            == 0
        {
            ctx.accounts.position.entries[entry_index].borrowed_share = 0;
        }

        if routing.to_local > 0 {
            token::transfer(
                CpiContext::new(
                    ctx.accounts.token_program.to_account_info(),
                    Transfer {
                        from: ctx.accounts.liquidator_debt_token.to_account_info(),
                        to: ctx.accounts.debt_vault.to_account_info(),
                        authority: ctx.accounts.liquidator.to_account_info(),
                    },
                ),
                routing
                    .to_local
                    .try_into()
                    .map_err(|_| LedgerError::MathOverflow)?,
            )?;
        }
        if routing.to_backstop > 0 {
            let backstop_vault = ctx
                .accounts
                .backstop_debt_vault
                .as_ref()
                .ok_or(LedgerError::InvalidVault)?;
            require!(
                backstop_vault.key() == ctx.accounts.backstop_pool.asset(&debt_mint)?.vault,
                LedgerError::InvalidVault
            );
            token::transfer(
                CpiContext::new(
                    ctx.accounts.token_program.to_account_info(),
                    Transfer {
                        from: ctx.accounts.liquidator_debt_token.to_account_info(),
                        to: backstop_vault.to_account_info(),
                        authority: ctx.accounts.liquidator.to_account_info(),
                    },
                ),
                routing
                    .to_backstop
                    .try_into()
                    .map_err(|_| LedgerError::MathOverflow)?,
            )?;
        }
        repaid = debt_amount
            .try_into()
            .map_err(|_| LedgerError::MathOverflow)?;
    }

    // Seize the deposit: both buckets, fee to the treasury.
    let entry = ctx.accounts.position.entries[entry_index];
    let normal_amount = ctx
        .accounts
        .pool
        .asset(&collateral_mint)?
        .normal
        .share_value(entry.deposited_share)?;
    let collateral_only_amount = ctx
        .accounts
        .pool
        .asset(&collateral_mint)?
        .collateral_only
        .share_value(entry.collateral_only_share)?;
    if normal_amount > 0 {
        ctx.accounts
            .pool
            .withdraw(&collateral_mint, normal_amount, false)?;
    }
    if collateral_only_amount > 0 {
        ctx.accounts
            .pool
            .withdraw(&collateral_mint, collateral_only_amount, true)?;
    }
    {
        let entry = &mut ctx.accounts.position.entries[entry_index];
        entry.deposited_share = 0;
        entry.collateral_only_share = 0;
    }

    let seized_total = normal_amount
        .checked_add(collateral_only_amount)
        .ok_or(LedgerError::MathOverflow)?;
    let fee = fee_round_up(seized_total, ctx.accounts.pool.liquidation_fee_rate)?.min(seized_total);
    let to_liquidator = seized_total
        .checked_sub(fee)
        .ok_or(LedgerError::MathUnderflow)?;

    // The fee's custody never leaves the vault: it converts into treasury
    // claim.
    let pool = &mut ctx.accounts.pool;
    pool.held_balance = pool
        .held_balance
        .checked_add(fee)
        .ok_or(LedgerError::MathOverflow)?;
    pool.protocol_fees_accrued = pool
        .protocol_fees_accrued
        .checked_add(fee)
        .ok_or(LedgerError::MathOverflow)?;

    if to_liquidator > 0 {
        let pool_seeds = &[
            ctx.accounts.pool.seed_prefix(),
            stable_mint.as_ref(),
            &[ctx.accounts.pool.bump],
        ];
        let signer_seeds = &[&pool_seeds[..]];
        token::transfer(
            CpiContext::new_with_signer(
                ctx.accounts.token_program.to_account_info(),
                Transfer {
                    from: ctx.accounts.collateral_vault.to_account_info(),
                    to: ctx.accounts.liquidator_collateral_token.to_account_info(),
                    authority: ctx.accounts.pool.to_account_info(),
                },
                signer_seeds,
            ),
            to_liquidator
                .try_into()
                .map_err(|_| LedgerError::MathOverflow)?,
        )?;
    }

    emit!(PositionLiquidated {
        user: ctx.accounts.user.key(),
        liquidator: ctx.accounts.liquidator.key(),
        pool: ctx.accounts.pool.key(),
        mint: asset_key,
        debt_repaid: repaid,
        collateral_seized: to_liquidator
            .try_into()
            .map_err(|_| LedgerError::MathOverflow)?,
        liquidation_fee: fee.try_into().map_err(|_| LedgerError::MathOverflow)?,
        timestamp: now,
    });
    msg!(
        "Liquidated: {} debt repaid, {} collateral seized, {} fee",
        repaid,
        to_liquidator,
        fee
    );

    Ok(())
}
