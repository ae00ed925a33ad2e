// =============================================================================
// List Asset Instruction
// =============================================================================
// Admin lists an asset on a pool (primary or backstop): creates the asset's
// vault token account and the per-asset ledger. Re-listing an existing
// asset is a no-op so the operation is safely retryable.
// =============================================================================

use anchor_lang::prelude::*;
use anchor_spl::token::{Mint, Token, TokenAccount};

use crate::constants::VAULT_SEED;
use crate::error::LedgerError;
use crate::state::{AssetConfig, Pool};

#[derive(Accounts)]
pub struct ListAsset<'info> {
    #[account(mut)]
    pub admin: Signer<'info>,

    /// Primary or backstop pool; both list assets the same way
    #[account(
        mut,
        constraint = pool.admin == admin.key() @ LedgerError::Unauthorized
    )]
    pub pool: Account<'info, Pool>,

    /// The asset being listed
    pub mint: Account<'info, Mint>,

    /// Vault holding this asset's custody for the pool
    #[account(
        init_if_needed,
        payer = admin,
        token::mint = mint,
        token::authority = pool,
        seeds = [VAULT_SEED, pool.key().as_ref(), mint.key().as_ref()],
        bump
    )]
    pub vault: Account<'info, TokenAccount>,

    pub token_program: Program<'info, Token>,
    pub system_program: Program<'info, System>,
}

pub fn handler_list_asset(ctx: Context<ListAsset>, config: AssetConfig) -> Result<()> {
    let pool = &mut ctx.accounts.pool;
    let created = pool.list_asset(ctx.accounts.mint.key(), ctx.accounts.vault.key(), config)?;

    if created {
        msg!("Asset {} listed on pool {}", ctx.accounts.mint.key(), pool.key());
    } else {
        msg!("Asset {} already listed - no-op", ctx.accounts.mint.key());
    }
    Ok(())
}
