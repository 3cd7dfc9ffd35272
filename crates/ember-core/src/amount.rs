//! Fixed-point amount and fee arithmetic.
//!
//! Every monetary value that reaches coin selection or transaction assembly
//! is an integer number of satoshis. Decimal coin strings are parsed exactly
//! (no floating point), and any amount that would need a fraction of a
//! satoshi is rejected instead of being truncated.

use crate::constants::{COIN, COIN_DECIMALS};
use crate::error::AmountError;

/// Convert a decimal coin amount (e.g. `"1.5"`) to satoshis.
///
/// Fails with [`AmountError::Fractional`] when the amount has non-zero
/// digits beyond the eighth decimal place, and with
/// [`AmountError::Negative`] for negative input.
///
/// # Examples
///
/// ```
/// use ember_core::amount::to_smallest_unit;
/// assert_eq!(to_smallest_unit("1.5").unwrap(), 150_000_000);
/// assert!(to_smallest_unit("0.123456789").is_err());
/// ```
pub fn to_smallest_unit(decimal: &str) -> Result<u64, AmountError> {
    let s = decimal.trim();
    if s.is_empty() {
        return Err(AmountError::Empty);
    }
    if s.starts_with('-') {
        return Err(AmountError::Negative(s.to_string()));
    }

    let (int_part, frac_part) = match s.split_once('.') {
        Some((i, f)) => (i, f),
        None => (s, ""),
    };

    let all_digits = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
    if (int_part.is_empty() && frac_part.is_empty()) || !all_digits(int_part) || !all_digits(frac_part) {
        return Err(AmountError::Malformed(s.to_string()));
    }

    let decimals = COIN_DECIMALS as usize;
    let (kept, excess) = frac_part.split_at(frac_part.len().min(decimals));
    if excess.bytes().any(|b| b != b'0') {
        return Err(AmountError::Fractional(s.to_string()));
    }

    let whole: u64 = if int_part.is_empty() {
        0
    } else {
        int_part
            .parse()
            .map_err(|_| AmountError::Overflow(s.to_string()))?
    };

    let mut frac: u64 = 0;
    for (i, b) in kept.bytes().enumerate() {
        frac += u64::from(b - b'0') * 10u64.pow((decimals - 1 - i) as u32);
    }

    whole
        .checked_mul(COIN)
        .and_then(|v| v.checked_add(frac))
        .ok_or_else(|| AmountError::Overflow(s.to_string()))
}

/// Render a satoshi value as a decimal coin string with eight places.
///
/// Display helper for logs and errors; never parsed back by the wallet.
pub fn format_amount(sats: u64) -> String {
    format!(
        "{}.{:0width$}",
        sats / COIN,
        sats % COIN,
        width = COIN_DECIMALS as usize
    )
}

/// Normalize a caller-supplied fee rate to whole satoshis per byte.
///
/// Non-integer rates are floored so a size-sensitive selection never fails
/// on rounding. A rate that is not finite, or floors to zero, is rejected.
pub fn fee_rate_per_byte(rate: f64) -> Result<u64, AmountError> {
    if !rate.is_finite() || rate < 1.0 {
        return Err(AmountError::InvalidFeeRate(rate.to_string()));
    }
    if rate >= u64::MAX as f64 {
        return Err(AmountError::InvalidFeeRate(rate.to_string()));
    }
    Ok(rate.floor() as u64)
}

/// Total satoshis reserved for contract execution: `gas_limit * gas_price`.
pub fn gas_budget(gas_limit: u64, gas_price: u64) -> Result<u64, AmountError> {
    if gas_limit == 0 {
        return Err(AmountError::Zero("gas limit"));
    }
    if gas_price == 0 {
        return Err(AmountError::Zero("gas price"));
    }
    gas_limit
        .checked_mul(gas_price)
        .ok_or_else(|| AmountError::Overflow(format!("{gas_limit} * {gas_price}")))
}

/// Checked sum of satoshi values.
pub fn checked_sum<I: IntoIterator<Item = u64>>(values: I) -> Result<u64, AmountError> {
    values
        .into_iter()
        .try_fold(0u64, |acc, v| acc.checked_add(v))
        .ok_or_else(|| AmountError::Overflow("sum of values".into()))
}
