use anchor_lang::prelude::*;

use crate::constants::{MAX_ORACLE_STALENESS, PRICE_PRECISION};
use crate::error::LedgerError;

/// Parsed price from an oracle feed, normalized to PRICE_PRECISION (1e6)
/// stable units per whole token.
pub struct OraclePrice {
    pub price: u128,
    pub publish_time: i64,
}

/// Parse a Pyth PriceUpdateV2 account from an AccountInfo.
///
/// Layout after discriminator(8) + write_authority(32) + verification_level(1):
///   feed_id: [u8; 32] at offset 41
///   price: i64 at offset 73
///   conf: u64 at offset 81
///   exponent: i32 at offset 89
///   publish_time: i64 at offset 93
pub fn get_price(oracle_account: &AccountInfo, now: i64) -> Result<OraclePrice> {
    let data = oracle_account.try_borrow_data()?;

    require!(data.len() >= 112, LedgerError::OraclePriceInvalid);

    let price_raw = i64::from_le_bytes(
        data[73..81]
            .try_into()
            .map_err(|_| LedgerError::OraclePriceInvalid)?,
    );
    let exponent = i32::from_le_bytes(
        data[89..93]
            .try_into()
            .map_err(|_| LedgerError::OraclePriceInvalid)?,
    );
    let publish_time = i64::from_le_bytes(
        data[93..101]
            .try_into()
            .map_err(|_| LedgerError::OraclePriceInvalid)?,
    );

    require!(price_raw > 0, LedgerError::OraclePriceInvalid);

    let age = now
        .checked_sub(publish_time)
        .ok_or(LedgerError::MathOverflow)?;
    require!(age <= MAX_ORACLE_STALENESS, LedgerError::OraclePriceStale);

    Ok(OraclePrice {
        price: normalize_price(price_raw as u128, exponent)?,
        publish_time,
    })
}

/// Normalize a raw price with exponent to PRICE_PRECISION (1e6).
fn normalize_price(raw_price: u128, exponent: i32) -> Result<u128> {
    let target_exp: i32 = 6;
    let shift = target_exp + exponent; // e.g. 6 + (-8) = -2

    if shift >= 0 {
        raw_price
            .checked_mul(10u128.pow(shift as u32))
            .ok_or(LedgerError::MathOverflow.into())
    } else {
        let divisor = 10u128.pow((-shift) as u32);
        Ok(raw_price / divisor)
    }
}

/// Value of `amount` base units in stable units: `amount * price / PRICE_PRECISION`.
pub fn volume(price: u128, amount: u128) -> Result<u128> {
    price
        .checked_mul(amount)
        .ok_or(LedgerError::MathOverflow)?
        .checked_div(PRICE_PRECISION)
        .ok_or(LedgerError::DivisionByZero.into())
}

/// Base-unit amount worth `value` stable units: `value * PRICE_PRECISION / price`.
pub fn from_volume(price: u128, value: u128) -> Result<u128> {
    if price == 0 {
        return Err(LedgerError::DivisionByZero.into());
    }
    value
        .checked_mul(PRICE_PRECISION)
        .ok_or(LedgerError::MathOverflow)?
        .checked_div(price)
        .ok_or(LedgerError::DivisionByZero.into())
}

/// Find the account matching `expected` among the supplied oracle accounts
/// and parse its price.
pub fn find_price(oracles: &[AccountInfo], expected: &Pubkey, now: i64) -> Result<OraclePrice> {
    let account = oracles
        .iter()
        .find(|a| a.key == expected)
        .ok_or(LedgerError::OracleAccountMissing)?;
    get_price(account, now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_scales_by_price() {
        // price 2.0 stable per token
        assert_eq!(volume(2_000_000, 500).unwrap(), 1000);
        assert_eq!(from_volume(2_000_000, 1000).unwrap(), 500);
    }

    #[test]
    fn volume_roundtrip_never_gains() {
        let price = 3_333_333u128;
        for amount in [1u128, 99, 1_000_000, 123_456_789] {
            let v = volume(price, amount).unwrap();
            let back = from_volume(price, v).unwrap();
            assert!(back <= amount);
        }
    }

    #[test]
    fn normalize_handles_both_shift_directions() {
        // exponent -8: raw 150_000_000 = 1.5 -> 1_500_000
        assert_eq!(normalize_price(150_000_000, -8).unwrap(), 1_500_000);
        // exponent -4: raw 15_000 = 1.5 -> 1_500_000
        assert_eq!(normalize_price(15_000, -4).unwrap(), 1_500_000);
    }
}
