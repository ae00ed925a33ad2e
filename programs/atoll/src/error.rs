// =============================================================================
// Atoll Error Codes
// =============================================================================
// Every error is fatal to the current instruction; the runtime discards all
// pending account mutations, so no partial ledger update is ever persisted.
// =============================================================================

use anchor_lang::prelude::*;

#[error_code]
pub enum LedgerError {
    // =========================================================================
    // Pool Lifecycle Errors (6000-6009)
    // =========================================================================

    /// The pool has been paused by admin - no user operations allowed
    #[msg("Pool is currently paused")]
    PoolPaused,

    /// Lifecycle misuse: initializing something that already exists
    #[msg("Already initialized")]
    AlreadyInitialized,

    /// Operation on an asset that was never listed on this pool
    #[msg("Asset is not initialized on this pool")]
    NotInitialized,

    // =========================================================================
    // Balance & Amount Errors (6010-6019)
    // =========================================================================

    /// Zero or otherwise nonsensical input amount
    #[msg("Amount must be greater than zero")]
    InvalidAmount,

    /// Withdraw or repay exceeds what the bucket holds
    #[msg("Insufficient balance for operation")]
    InsufficientBalance,

    /// Borrow exceeds combined local and backstop liquidity
    #[msg("Amount exceeds borrowable liquidity")]
    ExceedsBorrowable,

    /// Backstop draw requested for an asset outside the supported set
    #[msg("Asset is not supported by the backstop")]
    AssetNotSupported,

    /// Borrow or withdraw would leave the position undercollateralized
    #[msg("Position would become unsafe")]
    PositionUnsafe,

    /// The rebalance solver exhausted capacity across both position classes
    #[msg("Cannot borrow even with rebalance")]
    CannotBorrowWithRebalance,

    /// The pool cannot list any more assets
    #[msg("Asset capacity reached")]
    TooManyAssets,

    /// The position cannot carry any more entries
    #[msg("Position entry capacity reached")]
    TooManyPositionEntries,

    // =========================================================================
    // Authorization Errors (6030-6039)
    // =========================================================================

    /// Caller does not hold the capability required for this entry point
    #[msg("Unauthorized - signer does not have permission")]
    Unauthorized,

    // =========================================================================
    // Math Errors (6040-6049)
    // =========================================================================

    /// A calculation would overflow 128-bit arithmetic
    #[msg("Math overflow - calculation exceeded maximum value")]
    MathOverflow,

    /// A calculation would underflow - subtracting more than available
    #[msg("Math underflow - result would be negative")]
    MathUnderflow,

    /// Division by zero - a bucket or rate that must be non-zero is empty
    #[msg("Division by zero")]
    DivisionByZero,

    // =========================================================================
    // Oracle Errors (6050-6059)
    // =========================================================================

    /// No account matching the asset's configured oracle was supplied
    #[msg("Oracle account missing from remaining accounts")]
    OracleAccountMissing,

    /// The oracle account exists but its price data failed validation
    #[msg("Oracle price is invalid")]
    OraclePriceInvalid,

    /// The oracle price is older than the staleness limit
    #[msg("Oracle price is stale")]
    OraclePriceStale,

    // =========================================================================
    // Account Validation Errors (6060-6069)
    // =========================================================================

    /// The vault supplied does not match the ledger's configured vault
    #[msg("Invalid vault for this asset")]
    InvalidVault,

    /// The mint supplied does not match the flow required by the operation
    #[msg("Invalid mint for this operation")]
    InvalidMint,

    /// Token account owner doesn't match expected owner
    #[msg("Invalid token account owner")]
    InvalidTokenAccountOwner,
}
