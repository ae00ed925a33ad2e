// =============================================================================
// Backstop Supported-Asset Set
// =============================================================================
// Governance of which assets may draw backstop liquidity. An asset must be
// listed on the backstop pool before it can be supported, so support-fee
// credits always find a ledger to land on.
// =============================================================================

use anchor_lang::prelude::*;

use crate::constants::BACKSTOP_STATE_SEED;
use crate::error::LedgerError;
use crate::state::{BackstopState, Pool};

#[derive(Accounts)]
pub struct ConfigureSupport<'info> {
    pub admin: Signer<'info>,

    #[account(
        constraint = backstop_pool.admin == admin.key() @ LedgerError::Unauthorized
    )]
    pub backstop_pool: Account<'info, Pool>,

    #[account(
        mut,
        seeds = [BACKSTOP_STATE_SEED, backstop_pool.key().as_ref()],
        bump = backstop_state.bump
    )]
    pub backstop_state: Account<'info, BackstopState>,
}

pub fn handler_add_support(ctx: Context<ConfigureSupport>, mint: Pubkey) -> Result<()> {
    // The backstop must already carry a ledger for the asset.
    ctx.accounts.backstop_pool.asset(&mint)?;
    ctx.accounts.backstop_state.add_support(mint)?;

    msg!("Asset {} added to backstop supported set", mint);
    Ok(())
}

pub fn handler_remove_support(ctx: Context<ConfigureSupport>, mint: Pubkey) -> Result<()> {
    ctx.accounts.backstop_state.remove_support(&mint)?;

    msg!("Asset {} removed from backstop supported set", mint);
    Ok(())
}
