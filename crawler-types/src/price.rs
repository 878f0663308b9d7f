use lazy_regex::regex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Parses locale-formatted price text (`1.234,56 €`, `12,00`, `EUR 9,90`).
///
/// Returns `None` for empty or unparsable input so callers can tell
/// "no price" apart from a price of zero. Numbers beyond the range of
/// `Decimal` saturate to `Decimal::MAX`.
pub fn parse_price<S: AsRef<str>>(text: S) -> Option<Decimal> {
    let chars: Vec<char> = text
        .as_ref()
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();
    let mut cleaned = String::with_capacity(chars.len());
    for (i, c) in chars.iter().enumerate() {
        if *c == '.' && is_thousands_separator(&chars[i + 1..]) {
            continue;
        }
        cleaned.push(*c);
    }
    // only the first comma is the decimal separator
    let cleaned = cleaned.replacen(',', ".", 1);
    let number = regex!(r"^(\d+\.?\d*|\.\d+)").find(&cleaned)?;
    let number = number.as_str().trim_end_matches('.');
    match Decimal::from_str(number) {
        Ok(price) => Some(price),
        // integer part wider than 96 bits
        Err(_) if number.split('.').next().is_some_and(|i| i.len() > 28) => Some(Decimal::MAX),
        Err(_) => None,
    }
}

fn is_thousands_separator(rest: &[char]) -> bool {
    rest.len() >= 3
        && rest[..3].iter().all(char::is_ascii_digit)
        && rest.get(3).map_or(true, |c| !c.is_ascii_digit())
}

/// Percentage discount of `current` relative to `original`, rounded half up.
///
/// Zero or missing prices never produce a discount, neither does a current
/// price at or above the original one.
pub fn compute_discount(original: Option<Decimal>, current: Option<Decimal>) -> u32 {
    match (original, current) {
        (Some(original), Some(current))
            if !original.is_zero() && !current.is_zero() && original > current =>
        {
            ((original - current) / original * Decimal::ONE_HUNDRED)
                .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
                .to_u32()
                .unwrap_or_default()
        }
        _ => 0,
    }
}
