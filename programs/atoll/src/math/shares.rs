//! Amount <-> share conversion for pool buckets.
//!
//! A share is a proportional claim on a bucket whose exchange rate
//! `bucket_amount / bucket_share` floats as interest and fees accrue.
//!
//! Rounding rules:
//! - amount -> share conversions round DOWN, so a withdrawer can never
//!   extract more value than their share entitles.
//! - fee computations round UP, so the protocol never loses a fractional
//!   unit.

use anchor_lang::prelude::*;

use crate::constants::RATE_PRECISION;
use crate::error::LedgerError;

/// Convert an amount to shares against a bucket.
///
/// Bootstrap: an empty bucket mints 1:1.
/// Otherwise: `floor(amount * bucket_share / bucket_amount)`.
pub fn to_share(amount: u128, bucket_amount: u128, bucket_share: u128) -> Result<u128> {
    if bucket_amount == 0 {
        return Ok(amount);
    }
    amount
        .checked_mul(bucket_share)
        .ok_or(LedgerError::MathOverflow)?
        .checked_div(bucket_amount)
        .ok_or(LedgerError::DivisionByZero.into())
}

/// Convert shares back to an amount: `floor(share * bucket_amount / bucket_share)`.
///
/// An empty bucket values every share at zero.
pub fn to_amount(share: u128, bucket_amount: u128, bucket_share: u128) -> Result<u128> {
    if bucket_share == 0 {
        return Ok(0);
    }
    share
        .checked_mul(bucket_amount)
        .ok_or(LedgerError::MathOverflow)?
        .checked_div(bucket_share)
        .ok_or(LedgerError::DivisionByZero.into())
}

/// Fee on a value at a RATE_PRECISION rate, rounded up:
/// `ceil(value * rate / RATE_PRECISION)`.
pub fn fee_round_up(value: u128, rate: u64) -> Result<u128> {
    let numerator = value
        .checked_mul(rate as u128)
        .ok_or(LedgerError::MathOverflow)?;
    let fee = numerator
        .checked_add(RATE_PRECISION - 1)
        .ok_or(LedgerError::MathOverflow)?
        .checked_div(RATE_PRECISION)
        .ok_or(LedgerError::DivisionByZero)?;
    Ok(fee)
}

/// Integer square root via Newton's method. `isqrt(v)` is the largest `r`
/// with `r * r <= v`.
pub fn isqrt(v: u128) -> u128 {
    if v < 2 {
        return v;
    }
    // Initial guess 2^ceil(bits/2) is always >= sqrt(v), so the iteration
    // descends monotonically and x + v / x cannot overflow.
    let bits = 128 - v.leading_zeros();
    let mut x = 1u128 << ((bits + 1) / 2);
    loop {
        let y = (x + v / x) / 2;
        if y >= x {
            return x;
        }
        x = y;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_mints_one_to_one() {
        assert_eq!(to_share(400_000, 0, 0).unwrap(), 400_000);
    }

    #[test]
    fn share_roundtrip_never_gains() {
        let bucket_amount = 10_000_000u128;
        let bucket_share = 9_999_999u128;
        for x in [1u128, 7, 999, 123_456, 9_999_998] {
            let share = to_share(x, bucket_amount, bucket_share).unwrap();
            let back = to_amount(share, bucket_amount, bucket_share).unwrap();
            assert!(back <= x, "roundtrip of {} produced {}", x, back);
        }
    }

    #[test]
    fn conversion_rounds_down() {
        // 100 * 999 / 1000 = 99.9 -> 99
        assert_eq!(to_share(100, 1000, 999).unwrap(), 99);
        // 99 * 1000 / 999 = 99.09 -> 99
        assert_eq!(to_amount(99, 1000, 999).unwrap(), 99);
    }

    #[test]
    fn empty_share_bucket_values_to_zero() {
        assert_eq!(to_amount(123, 456, 0).unwrap(), 0);
    }

    #[test]
    fn entry_fee_rounds_up_on_remainder_only() {
        // 0.5% at RATE_PRECISION 10^9
        let rate = 5_000_000u64;
        // 1000 * 0.005 = 5 exactly
        assert_eq!(fee_round_up(1000, rate).unwrap(), 5);
        // 99_999 * 0.005 = 499.995 -> 500
        assert_eq!(fee_round_up(99_999, rate).unwrap(), 500);
        // zero value carries no fee
        assert_eq!(fee_round_up(0, rate).unwrap(), 0);
    }

    #[test]
    fn isqrt_exact_and_floor() {
        assert_eq!(isqrt(0), 0);
        assert_eq!(isqrt(1), 1);
        assert_eq!(isqrt(4), 2);
        assert_eq!(isqrt(15), 3);
        assert_eq!(isqrt(16), 4);
        assert_eq!(isqrt(1_000_000_000_000_000_000), 1_000_000_000);
        let big = u128::MAX;
        let r = isqrt(big);
        assert!(r.checked_mul(r).map_or(false, |sq| sq <= big));
        assert!((r + 1).checked_mul(r + 1).map_or(true, |sq| sq > big));
    }
}
