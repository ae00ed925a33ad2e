pub mod admin;
pub mod backstop_deposit;
pub mod borrow;
pub mod common;
pub mod deposit;
pub mod harvest_fees;
pub mod initialize_pool;
pub mod liquidate;
pub mod list_asset;
pub mod rebalance;
pub mod repay;
pub mod set_protection;
pub mod support;
pub mod withdraw;

pub use admin::*;
pub use backstop_deposit::*;
pub use borrow::*;
pub use deposit::*;
pub use harvest_fees::*;
pub use initialize_pool::*;
pub use liquidate::*;
pub use list_asset::*;
pub use rebalance::*;
pub use repay::*;
pub use set_protection::*;
pub use support::*;
pub use withdraw::*;
