// =============================================================================
// Atoll Protocol Constants
// =============================================================================
// Fixed-point precision, PDA seeds and capacity limits shared across the
// lending-pool program.
// =============================================================================

// =============================================================================
// FIXED-POINT PRECISION
// =============================================================================

/// Precision for all rates (fees, LTV, liquidation thresholds, interest).
/// A rate of 5_000_000 is 0.5%.
pub const RATE_PRECISION: u128 = 1_000_000_000; // 10^9

/// Precision of normalized oracle prices. A price of 1_000_000 means one
/// whole base unit is worth exactly one stable unit.
pub const PRICE_PRECISION: u128 = 1_000_000; // 10^6

/// Seconds per year used by the interest rate model.
pub const SECONDS_PER_YEAR: u128 = 365 * 24 * 3600;

// =============================================================================
// ORACLE
// =============================================================================

/// Maximum age of an oracle price before it is rejected (seconds).
pub const MAX_ORACLE_STALENESS: i64 = 60;

// =============================================================================
// CAPACITY LIMITS
// =============================================================================

/// Maximum number of listed assets per pool.
pub const MAX_ASSETS: usize = 16;

/// Maximum number of backstop-supported assets.
pub const MAX_SUPPORTED_ASSETS: usize = 16;

/// Maximum number of entries in one user position.
pub const MAX_POSITION_ENTRIES: usize = 16;

// =============================================================================
// PDA SEEDS
// =============================================================================

/// Seed for the primary Pool PDA.
/// Full seed: ["pool", stable_mint_pubkey]
pub const POOL_SEED: &[u8] = b"pool";

/// Seed for the backstop Pool PDA.
/// Full seed: ["backstop", stable_mint_pubkey]
pub const BACKSTOP_SEED: &[u8] = b"backstop";

/// Seed for the BackstopState PDA.
/// Full seed: ["backstop_state", backstop_pool_pubkey]
pub const BACKSTOP_STATE_SEED: &[u8] = b"backstop_state";

/// Seed for per-asset vault token accounts.
/// Full seed: ["vault", pool_pubkey, mint_pubkey]
pub const VAULT_SEED: &[u8] = b"vault";

/// Seed for per-user Position accounts.
/// Full seed: ["position", pool_pubkey, owner_pubkey]
pub const POSITION_SEED: &[u8] = b"position";

/// Seed for per-user backstop deposit records.
/// Full seed: ["backstop_deposit", backstop_pool_pubkey, mint_pubkey, owner_pubkey]
pub const BACKSTOP_DEPOSIT_SEED: &[u8] = b"backstop_deposit";
