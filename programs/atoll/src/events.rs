use anchor_lang::prelude::*;

// Liquidity events
#[event]
pub struct LiquidityDeposited {
    pub user: Pubkey,
    pub pool: Pubkey,
    pub mint: Pubkey,
    pub amount: u64,
    pub share: u128,
    pub collateral_only: bool,
    pub timestamp: i64,
}

#[event]
pub struct LiquidityWithdrawn {
    pub user: Pubkey,
    pub pool: Pubkey,
    pub mint: Pubkey,
    pub amount: u64,
    pub share: u128,
    pub collateral_only: bool,
    pub timestamp: i64,
}

// Borrow events
#[event]
pub struct LiquidityBorrowed {
    pub user: Pubkey,
    pub pool: Pubkey,
    pub mint: Pubkey,
    pub amount: u64,
    pub from_local: u64,
    pub from_backstop: u64,
    pub total_fee: u64,
    pub timestamp: i64,
}

#[event]
pub struct LiquidityRepaid {
    pub user: Pubkey,
    pub pool: Pubkey,
    pub mint: Pubkey,
    pub amount: u64,
    pub to_backstop: u64,
    pub to_local: u64,
    pub timestamp: i64,
}

// Rebalance / liquidation events
#[event]
pub struct PositionRebalanced {
    pub user: Pubkey,
    pub pool: Pubkey,
    pub stable_reallocated: u128,
    pub stable_borrowed: u128,
    pub timestamp: i64,
}

#[event]
pub struct PositionsFlattened {
    pub user: Pubkey,
    pub pool: Pubkey,
    pub solved_factor: u128,
    pub stable_reallocated: u128,
    pub stable_borrowed: u128,
    pub timestamp: i64,
}

#[event]
pub struct PositionLiquidated {
    pub user: Pubkey,
    pub liquidator: Pubkey,
    pub pool: Pubkey,
    pub mint: Pubkey,
    pub debt_repaid: u64,
    pub collateral_seized: u64,
    pub liquidation_fee: u64,
    pub timestamp: i64,
}

// Fee events
#[event]
pub struct SupportFeeCollected {
    pub pool: Pubkey,
    pub backstop_pool: Pubkey,
    pub mint: Pubkey,
    pub collected: u64,
    pub carried: u128,
    pub timestamp: i64,
}

#[event]
pub struct ProtocolFeesHarvested {
    pub pool: Pubkey,
    pub mint: Pubkey,
    pub amount: u64,
    pub timestamp: i64,
}
