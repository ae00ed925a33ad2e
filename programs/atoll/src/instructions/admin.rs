// =============================================================================
// Admin Instructions
// =============================================================================
// Pause switch, admin handover and per-asset risk parameter updates. These
// are the governed, read-only-to-everyone-else parameters of the ledger.
// =============================================================================

use anchor_lang::prelude::*;

use crate::error::LedgerError;
use crate::state::{AssetConfig, Pool};

#[derive(Accounts)]
pub struct AdminPool<'info> {
    pub admin: Signer<'info>,

    #[account(
        mut,
        constraint = pool.admin == admin.key() @ LedgerError::Unauthorized
    )]
    pub pool: Account<'info, Pool>,
}

pub fn handler_pause_pool(ctx: Context<AdminPool>, paused: bool) -> Result<()> {
    ctx.accounts.pool.is_paused = paused;
    msg!("Pool paused: {}", paused);
    Ok(())
}

#[derive(Accounts)]
pub struct TransferAdmin<'info> {
    pub admin: Signer<'info>,

    #[account(
        mut,
        constraint = pool.admin == admin.key() @ LedgerError::Unauthorized
    )]
    pub pool: Account<'info, Pool>,

    /// CHECK: the incoming admin, stored as a pubkey only
    pub new_admin: UncheckedAccount<'info>,
}

pub fn handler_transfer_admin(ctx: Context<TransferAdmin>) -> Result<()> {
    ctx.accounts.pool.admin = ctx.accounts.new_admin.key();
    msg!("Admin transferred to {}", ctx.accounts.pool.admin);
    Ok(())
}

pub fn handler_update_asset_config(
    ctx: Context<AdminPool>,
    mint: Pubkey,
    config: AssetConfig,
) -> Result<()> {
    let ledger = ctx.accounts.pool.asset_mut(&mint)?;
    ledger.config = config;
    msg!("Asset {} config updated", mint);
    Ok(())
}
