use anchor_lang::prelude::*;

use crate::constants::{POOL_SEED, POSITION_SEED};
use crate::error::LedgerError;
use crate::state::{Pool, Position, PositionClass};

/// Toggle the protection flag on one position entry. Protected entries are
/// exempt from rebalancing and liquidation flattening.
#[derive(Accounts)]
pub struct SetProtection<'info> {
    pub user: Signer<'info>,

    #[account(
        seeds = [POOL_SEED, pool.stable_mint.as_ref()],
        bump = pool.bump
    )]
    pub pool: Account<'info, Pool>,

    #[account(
        mut,
        seeds = [POSITION_SEED, pool.key().as_ref(), user.key().as_ref()],
        bump = position.bump,
        constraint = position.owner == user.key() @ LedgerError::Unauthorized
    )]
    pub position: Account<'info, Position>,
}

pub fn handler_set_protection(
    ctx: Context<SetProtection>,
    mint: Pubkey,
    class: PositionClass,
    protected: bool,
) -> Result<()> {
    let position = &mut ctx.accounts.position;
    let idx = position
        .entry_index(&mint, class)
        .ok_or(LedgerError::NotInitialized)?;
    position.entries[idx].protected = protected;

    msg!(
        "Entry {} protection set to {}",
        mint,
        protected
    );
    Ok(())
}
