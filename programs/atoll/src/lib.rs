// =============================================================================
// ATOLL - Multi-Pool Lending Ledger
// =============================================================================
//
// Atoll is a share-accounted lending protocol where a primary pool routes
// borrow liquidity through a secondary backstop pool when its own runs dry:
// - Deposits, loans and fees are tracked as proportional shares per asset
// - Interest accrues lazily per asset and splits between depositors, the
//   protocol treasury and the backstop that subsidizes the asset
// - Liquidations first flatten a user's whole multi-asset position toward
//   one equilibrium health factor before any collateral is seized
//
// This is the main entry point for the Atoll Anchor program.
// =============================================================================

pub mod constants;
pub mod error;
pub mod events;
pub mod instructions;
pub mod math;
pub mod state;

use anchor_lang::prelude::*;

pub use constants::*;
pub use error::*;
pub use instructions::*;
pub use state::*;

declare_id!("C3YqZW1UUK3TRGhcT6SmPGyjRbsiEfy6MAzAKAe4yjfz");

#[program]
pub mod atoll {
    use super::*;

    // =========================================================================
    // Pool Lifecycle
    // =========================================================================

    /// Initialize the primary pool for a stable mint
    pub fn initialize_pool(ctx: Context<InitializePool>, fees: PoolFees) -> Result<()> {
        instructions::initialize_pool::handler_initialize_pool(ctx, fees)
    }

    /// Initialize the backstop pool and its supported-asset registry
    pub fn initialize_backstop(ctx: Context<InitializeBackstop>, fees: PoolFees) -> Result<()> {
        instructions::initialize_pool::handler_initialize_backstop(ctx, fees)
    }

    /// List an asset on a pool (idempotent; admin only)
    pub fn list_asset(ctx: Context<ListAsset>, config: AssetConfig) -> Result<()> {
        instructions::list_asset::handler_list_asset(ctx, config)
    }

    // =========================================================================
    // User Operations
    // =========================================================================

    /// Deposit liquidity against a position entry
    ///
    /// # Arguments
    /// * `amount` - base units of the flowing asset
    /// * `class` - which leg flows: AssetToStable deposits the asset,
    ///   StableToAsset deposits the stable unit
    /// * `collateral_only` - excluded from lendable liquidity when true
    pub fn deposit(
        ctx: Context<DepositLiquidity>,
        amount: u64,
        class: PositionClass,
        collateral_only: bool,
    ) -> Result<()> {
        instructions::deposit::handler_deposit(ctx, amount, class, collateral_only)
    }

    /// Withdraw liquidity from a position entry. Debt-carrying entries must
    /// stay within LTV (oracle accounts via remaining_accounts).
    pub fn withdraw(
        ctx: Context<WithdrawLiquidity>,
        amount: u64,
        class: PositionClass,
        collateral_only: bool,
    ) -> Result<()> {
        instructions::withdraw::handler_withdraw(ctx, amount, class, collateral_only)
    }

    /// Borrow the entry's debt asset, drawing on the backstop when local
    /// liquidity cannot satisfy the request
    pub fn borrow(ctx: Context<BorrowLiquidity>, amount: u64, class: PositionClass) -> Result<()> {
        instructions::borrow::handler_borrow(ctx, amount, class)
    }

    /// Repay the entry's debt asset; backstop debt retires first
    pub fn repay(ctx: Context<RepayLiquidity>, amount: u64, class: PositionClass) -> Result<()> {
        instructions::repay::handler_repay(ctx, amount, class)
    }

    /// Borrow unconditionally, then rebalance the user's StableToAsset
    /// coins (raising stable from AssetToStable headroom if needed) until
    /// the position is safe again
    pub fn borrow_with_rebalance(ctx: Context<BorrowWithRebalance>, amount: u64) -> Result<()> {
        instructions::rebalance::handler_borrow_with_rebalance(ctx, amount)
    }

    /// Toggle rebalance/liquidation protection on one entry
    pub fn set_protection(
        ctx: Context<SetProtection>,
        mint: Pubkey,
        class: PositionClass,
        protected: bool,
    ) -> Result<()> {
        instructions::set_protection::handler_set_protection(ctx, mint, class, protected)
    }

    // =========================================================================
    // Backstop Depositors
    // =========================================================================

    /// Deposit into the backstop pool
    pub fn deposit_backstop(ctx: Context<DepositBackstop>, amount: u64) -> Result<()> {
        instructions::backstop_deposit::handler_deposit_backstop(ctx, amount)
    }

    /// Withdraw from the backstop pool, capped at remaining liquidity
    pub fn withdraw_backstop(ctx: Context<WithdrawBackstop>, amount: u64) -> Result<()> {
        instructions::backstop_deposit::handler_withdraw_backstop(ctx, amount)
    }

    // =========================================================================
    // Liquidation
    // =========================================================================

    /// Liquidate an unsafe entry: flatten the whole position first, seize
    /// collateral only if the entry is still unsafe afterwards
    pub fn liquidate(ctx: Context<Liquidate>, class: PositionClass) -> Result<()> {
        instructions::liquidate::handler_liquidate(ctx, class)
    }

    // =========================================================================
    // Governance
    // =========================================================================

    /// Whitelist an asset for backstop draws (backstop admin only)
    pub fn add_support(ctx: Context<ConfigureSupport>, mint: Pubkey) -> Result<()> {
        instructions::support::handler_add_support(ctx, mint)
    }

    /// Remove an asset from the backstop supported set; removing a
    /// non-member is an error
    pub fn remove_support(ctx: Context<ConfigureSupport>, mint: Pubkey) -> Result<()> {
        instructions::support::handler_remove_support(ctx, mint)
    }

    /// Move accrued protocol fees to the treasury
    pub fn harvest_fees(ctx: Context<HarvestFees>, amount: u64) -> Result<()> {
        instructions::harvest_fees::handler_harvest_fees(ctx, amount)
    }

    /// Pause or unpause a pool (admin only)
    pub fn pause_pool(ctx: Context<AdminPool>, paused: bool) -> Result<()> {
        instructions::admin::handler_pause_pool(ctx, paused)
    }

    /// Update a listed asset's risk parameters (admin only)
    pub fn update_asset_config(
        ctx: Context<AdminPool>,
        mint: Pubkey,
        config: AssetConfig,
    ) -> Result<()> {
        instructions::admin::handler_update_asset_config(ctx, mint, config)
    }

    /// Hand the pool admin role to a new address (admin only)
    pub fn transfer_admin(ctx: Context<TransferAdmin>) -> Result<()> {
        instructions::admin::handler_transfer_admin(ctx)
    }
}
