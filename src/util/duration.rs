//! Parsing of duration strings such as `1s`, `500ms` or `1m30s`.
//!
//! The accepted syntax is a sequence of decimal numbers, each with an
//! optional fraction and a mandatory unit suffix. Valid units are `ns`,
//! `us` (or `µs`), `ms`, `s`, `m` and `h`. A bare `0` is also accepted.

use std::time::Duration;

use thiserror::Error;

/// Error returned when a duration string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationError {
    #[error("empty duration")]
    Empty,

    #[error("negative duration `{0}`")]
    Negative(String),

    #[error("missing unit in duration `{0}`")]
    MissingUnit(String),

    #[error("unknown unit `{unit}` in duration `{input}`")]
    UnknownUnit { unit: String, input: String },

    #[error("invalid duration `{0}`")]
    Invalid(String),
}

const NANOS_PER_MICRO: u128 = 1_000;
const NANOS_PER_MILLI: u128 = 1_000_000;
const NANOS_PER_SEC: u128 = 1_000_000_000;

fn unit_scale(unit: &str) -> Option<u128> {
    match unit {
        "ns" => Some(1),
        "us" | "µs" | "μs" => Some(NANOS_PER_MICRO),
        "ms" => Some(NANOS_PER_MILLI),
        "s" => Some(NANOS_PER_SEC),
        "m" => Some(60 * NANOS_PER_SEC),
        "h" => Some(3600 * NANOS_PER_SEC),
        _ => None,
    }
}

/// Parse a duration string.
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    if input.is_empty() {
        return Err(DurationError::Empty);
    }
    if input.starts_with('-') {
        return Err(DurationError::Negative(input.to_string()));
    }

    let mut rest = input.strip_prefix('+').unwrap_or(input);
    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err(DurationError::Invalid(input.to_string()));
    }

    let invalid = || DurationError::Invalid(input.to_string());
    let mut total: u128 = 0;

    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let number = &rest[..number_len];
        rest = &rest[number_len..];

        if number.is_empty() || number == "." || number.matches('.').count() > 1 {
            return Err(invalid());
        }

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];

        if unit.is_empty() {
            return Err(DurationError::MissingUnit(input.to_string()));
        }
        let scale = unit_scale(unit).ok_or_else(|| DurationError::UnknownUnit {
            unit: unit.to_string(),
            input: input.to_string(),
        })?;

        let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));

        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };
        let mut nanos = whole.checked_mul(scale).ok_or_else(invalid)?;

        if !fraction.is_empty() {
            // Digits beyond nanosecond precision cannot change the result.
            let digits = &fraction[..fraction.len().min(18)];
            let value: u128 = digits.parse().map_err(|_| invalid())?;
            nanos += value * scale / 10u128.pow(digits.len() as u32);
        }

        total = total.checked_add(nanos).ok_or_else(invalid)?;
    }

    let nanos = u64::try_from(total).map_err(|_| invalid())?;
    Ok(Duration::from_nanos(nanos))
}
