use std::{
    fmt,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::EngineError;

/// Signed money amount represented as **integer cents**.
///
/// Use this type for **all** monetary values in the engine (expense amounts,
/// allocations, balances, transfers) to avoid floating-point drift.
///
/// The value is signed:
/// - positive = credit (the group owes the member)
/// - negative = debit (the member owes the group)
///
/// Valid amounts stay within ±(2^53 − 1) cents so every value survives a
/// round-trip through an IEEE-754 double (JSON clients, spreadsheets).
///
/// # Examples
///
/// ```rust
/// use engine::MoneyCents;
///
/// let amount = MoneyCents::new(12_34);
/// assert_eq!(amount.cents(), 1234);
/// assert_eq!(amount.to_string(), "12.34");
/// ```
///
/// Parsing from user input (exact, digit-by-digit; rejects > 2 decimals):
///
/// ```rust
/// use engine::MoneyCents;
///
/// assert_eq!("10".parse::<MoneyCents>().unwrap().cents(), 1000);
/// assert_eq!("10.5".parse::<MoneyCents>().unwrap().cents(), 1050);
/// assert!("10.255".parse::<MoneyCents>().is_err());
/// ```
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[repr(transparent)]
pub struct MoneyCents(i64);

impl MoneyCents {
    pub const ZERO: MoneyCents = MoneyCents(0);

    /// Largest representable magnitude: 2^53 − 1 cents.
    pub const MAX_SAFE: MoneyCents = MoneyCents((1 << 53) - 1);

    /// Smallest representable magnitude: −(2^53 − 1) cents.
    pub const MIN_SAFE: MoneyCents = MoneyCents(-((1 << 53) - 1));

    /// Creates a new amount from integer cents without range validation.
    #[must_use]
    pub const fn new(cents: i64) -> Self {
        Self(cents)
    }

    /// Returns the raw value in cents.
    #[must_use]
    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Returns `true` if `cents` lies within the safe range.
    #[must_use]
    pub const fn is_valid(cents: i64) -> bool {
        cents >= Self::MIN_SAFE.0 && cents <= Self::MAX_SAFE.0
    }

    /// Validates a raw cents value and wraps it.
    ///
    /// Every amount crossing an engine boundary (API input, database load)
    /// goes through here.
    pub fn from_cents(cents: i64) -> Result<Self, EngineError> {
        if Self::is_valid(cents) {
            Ok(Self(cents))
        } else {
            Err(EngineError::InvalidAmount(format!(
                "{cents} is outside the safe cents range"
            )))
        }
    }

    /// Returns `true` if the amount is 0.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if the amount is positive.
    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Returns `true` if the amount is negative.
    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Checked addition (returns `None` on overflow).
    #[must_use]
    pub fn checked_add(self, rhs: MoneyCents) -> Option<MoneyCents> {
        self.0.checked_add(rhs.0).map(MoneyCents)
    }

    /// Checked subtraction (returns `None` on overflow).
    #[must_use]
    pub fn checked_sub(self, rhs: MoneyCents) -> Option<MoneyCents> {
        self.0.checked_sub(rhs.0).map(MoneyCents)
    }
}

/// Conversion from a major-unit float (e.g. `12.34`), rounding half away
/// from zero. Rejects non-finite input and out-of-range results.
impl TryFrom<f64> for MoneyCents {
    type Error = EngineError;

    fn try_from(amount: f64) -> Result<Self, Self::Error> {
        if !amount.is_finite() {
            return Err(EngineError::InvalidAmount(
                "amount must be a finite number".to_string(),
            ));
        }
        // f64::round ties away from zero, matching cash rounding.
        let cents = (amount * 100.0).round();
        if cents < Self::MIN_SAFE.0 as f64 || cents > Self::MAX_SAFE.0 as f64 {
            return Err(EngineError::InvalidAmount(
                "amount is outside the safe cents range".to_string(),
            ));
        }
        Ok(Self(cents as i64))
    }
}

impl fmt::Display for MoneyCents {
    /// Renders with exactly two fractional digits and a sign only when
    /// negative: `0.00`, `4.50`, `-10.05`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let units = abs / 100;
        let cents = abs % 100;
        write!(f, "{sign}{units}.{cents:02}")
    }
}

impl From<i64> for MoneyCents {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<MoneyCents> for i64 {
    fn from(value: MoneyCents) -> Self {
        value.0
    }
}

impl Add for MoneyCents {
    type Output = MoneyCents;

    fn add(self, rhs: MoneyCents) -> Self::Output {
        MoneyCents(self.0 + rhs.0)
    }
}

impl AddAssign for MoneyCents {
    fn add_assign(&mut self, rhs: MoneyCents) {
        self.0 += rhs.0;
    }
}

impl Sub for MoneyCents {
    type Output = MoneyCents;

    fn sub(self, rhs: MoneyCents) -> Self::Output {
        MoneyCents(self.0 - rhs.0)
    }
}

impl SubAssign for MoneyCents {
    fn sub_assign(&mut self, rhs: MoneyCents) {
        self.0 -= rhs.0;
    }
}

impl Neg for MoneyCents {
    type Output = MoneyCents;

    fn neg(self) -> Self::Output {
        MoneyCents(-self.0)
    }
}

impl FromStr for MoneyCents {
    type Err = EngineError;

    /// Parses a decimal string into cents, digit by digit.
    ///
    /// Accepted shape: optional leading `-`, one or more digits, optionally a
    /// `.` followed by exactly one or two digits. Surrounding whitespace is
    /// trimmed. No float intermediate, so `"10.5"` is exactly 1050 and
    /// `"10.255"` is rejected rather than rounded.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || EngineError::InvalidFormat(format!("invalid decimal amount \"{s}\""));
        let overflow = || EngineError::InvalidAmount("amount too large".to_string());

        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(invalid());
        }

        let (sign, rest) = match trimmed.strip_prefix('-') {
            Some(stripped) => (-1i64, stripped),
            None => (1i64, trimmed),
        };

        let (units_str, frac_str) = match rest.split_once('.') {
            Some((units, frac)) => (units, Some(frac)),
            None => (rest, None),
        };

        if units_str.is_empty() || !units_str.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let units: i64 = units_str.parse().map_err(|_| overflow())?;

        let cents: i64 = match frac_str {
            None => 0,
            Some(frac) => {
                if frac.is_empty() || !frac.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(invalid());
                }
                match frac.len() {
                    1 => frac.parse::<i64>().map_err(|_| invalid())? * 10,
                    2 => frac.parse::<i64>().map_err(|_| invalid())?,
                    _ => return Err(invalid()),
                }
            }
        };

        let total = units
            .checked_mul(100)
            .and_then(|v| v.checked_add(cents))
            .ok_or_else(overflow)?;
        let signed = sign * total;
        if !Self::is_valid(signed) {
            return Err(overflow());
        }

        Ok(MoneyCents(signed))
    }
}
