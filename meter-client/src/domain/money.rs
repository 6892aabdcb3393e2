//! Fixed-point currency.
//!
//! `Money` counts hundredths of the currency unit and `Rate` counts
//! ten-thousandths per metered unit. Every rounding step rounds half away
//! from zero to two decimal places, so recomputing a bill from the same
//! inputs always yields the same figures.

use std::{fmt, str::FromStr};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

const MONEY_SCALE: u32 = 2;
const RATE_SCALE: u32 = 4;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountParseError {
    #[error("amount is empty")]
    Empty,
    #[error("invalid amount '{0}'")]
    Invalid(String),
    #[error("amount '{0}' has more than {1} decimal places")]
    TooPrecise(String, u32),
    #[error("amount '{0}' is out of range")]
    OutOfRange(String),
}

/// Divides and rounds half away from zero. `divisor` must be positive.
fn div_round_half_up(numerator: i128, divisor: i128) -> i128 {
    let quotient = numerator / divisor;
    let remainder = numerator % divisor;
    if remainder.abs() * 2 >= divisor {
        quotient + numerator.signum()
    } else {
        quotient
    }
}

fn saturate(v: i128) -> i64 {
    i64::try_from(v).unwrap_or(if v < 0 { i64::MIN } else { i64::MAX })
}

fn parse_fixed(s: &str, scale: u32) -> Result<i64, AmountParseError> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(AmountParseError::Empty);
    }

    let (negative, body) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let (whole, frac) = body.split_once('.').unwrap_or((body, ""));

    let digits_ok = |part: &str| part.chars().all(|c| c.is_ascii_digit());
    if (whole.is_empty() && frac.is_empty()) || !digits_ok(whole) || !digits_ok(frac) {
        return Err(AmountParseError::Invalid(s.to_string()));
    }
    if frac.len() > scale as usize {
        return Err(AmountParseError::TooPrecise(s.to_string(), scale));
    }

    let mut units: i128 = 0;
    for b in whole.bytes().chain(frac.bytes()) {
        units = units * 10 + i128::from(b - b'0');
        if units > i128::from(i64::MAX) {
            return Err(AmountParseError::OutOfRange(s.to_string()));
        }
    }
    for _ in frac.len()..scale as usize {
        units *= 10;
    }

    let units = if negative { -units } else { units };
    i64::try_from(units).map_err(|_| AmountParseError::OutOfRange(s.to_string()))
}

fn write_fixed(f: &mut fmt::Formatter<'_>, units: i64, scale: u32, min_decimals: usize) -> fmt::Result {
    let factor = 10u64.pow(scale);
    let abs = units.unsigned_abs();
    let sign = if units < 0 { "-" } else { "" };
    let mut frac = format!("{:0width$}", abs % factor, width = scale as usize);
    while frac.len() > min_decimals && frac.ends_with('0') {
        frac.pop();
    }
    write!(f, "{sign}{}.{frac}", abs / factor)
}

/// A currency amount in hundredths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn from_minor(hundredths: i64) -> Self {
        Self(hundredths)
    }

    pub fn minor(self) -> i64 {
        self.0
    }

    /// Splits the amount into `parts` equal shares, rounded to currency precision.
    /// Zero parts is treated as one.
    pub fn share(self, parts: u32) -> Money {
        let parts = i128::from(parts.max(1));
        Money(saturate(div_round_half_up(i128::from(self.0), parts)))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_fixed(f, self.0, MONEY_SCALE, MONEY_SCALE as usize)
    }
}

impl FromStr for Money {
    type Err = AmountParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_fixed(s, MONEY_SCALE).map(Money)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Price of one metered unit, in ten-thousandths of the currency unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Rate(i64);

impl Rate {
    pub fn from_ten_thousandths(v: i64) -> Self {
        Self(v)
    }

    pub fn whole(units: i64) -> Self {
        Self(units.saturating_mul(10i64.pow(RATE_SCALE)))
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// `usage * rate`, rounded to currency precision.
    pub fn charge(self, usage: i64) -> Money {
        let raw = i128::from(usage) * i128::from(self.0);
        let per_hundredth = 10i128.pow(RATE_SCALE - MONEY_SCALE);
        Money(saturate(div_round_half_up(raw, per_hundredth)))
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_fixed(f, self.0, RATE_SCALE, MONEY_SCALE as usize)
    }
}

impl FromStr for Rate {
    type Err = AmountParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_fixed(s, RATE_SCALE).map(Rate)
    }
}

impl Serialize for Rate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Rate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RateVisitor;

        impl<'de> de::Visitor<'de> for RateVisitor {
            type Value = Rate;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a decimal number such as 7.25, optionally quoted")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Rate, E> {
                v.parse().map_err(E::custom)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Rate, E> {
                v.checked_mul(10i64.pow(RATE_SCALE))
                    .map(Rate)
                    .ok_or_else(|| E::custom(format!("rate {v} is out of range")))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Rate, E> {
                let v = i64::try_from(v).map_err(|_| E::custom(format!("rate {v} is out of range")))?;
                self.visit_i64(v)
            }

            // `Display` for f64 is the shortest form that round-trips, so
            // 8.5 parses as "8.5" rather than its binary expansion.
            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Rate, E> {
                if !v.is_finite() {
                    return Err(E::custom(format!("rate {v} is not a number")));
                }
                v.to_string().parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(RateVisitor)
    }
}
