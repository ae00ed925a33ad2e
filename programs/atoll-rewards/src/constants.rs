// =============================================================================
// Atoll Rewards Constants
// =============================================================================

// PDA Seeds
pub const DISTRIBUTION_SEED: &[u8] = b"distribution";
pub const STAKE_VAULT_SEED: &[u8] = b"stake_vault";
pub const REWARD_VAULT_SEED: &[u8] = b"reward_vault";
pub const USER_REWARD_SEED: &[u8] = b"user_reward";

// Precision for the global reward index (18 decimals)
// Using u128 to handle large numbers without overflow
pub const REWARD_PRECISION: u128 = 1_000_000_000_000_000_000; // 10^18

// Safety limits
pub const MIN_STAKE_AMOUNT: u64 = 1_000; // dust floor
pub const MAX_EMISSION_PER_SEC: u64 = 1_000_000_000; // 1000 units/sec at 6 decimals
