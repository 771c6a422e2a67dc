use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use schemars::gen::SchemaGenerator;
use schemars::schema::Schema;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};

/// Number of minor units (paise, cents) in one major unit.
const MINOR_UNITS: i64 = 100;
const EXPONENT: u32 = 2;

/// A monetary amount held as an integer count of minor units.
///
/// All pipeline arithmetic happens on these integers; rates are applied through
/// [`Amount::apply_rate`], which multiplies exactly in `Decimal` and rounds the
/// product half-up back to a whole minor unit. Externally the amount reads and
/// writes as a two-decimal number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(into = "Decimal", try_from = "Decimal")]
pub struct Amount(i64);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("amount out of range: {0}")]
pub struct AmountOutOfRange(pub Decimal);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// Largest amount accepted from inputs and rule sets: one trillion major
    /// units. Sums of a few thousand such amounts, and their products with
    /// rates up to 100%, stay well inside `i64`.
    pub const MAX: Amount = Amount::major(1_000_000_000_000);

    pub const fn from_minor(minor: i64) -> Self {
        Amount(minor)
    }

    /// Whole major units, e.g. `Amount::major(500_000)` is 500,000.00
    pub const fn major(units: i64) -> Self {
        Amount(units * MINOR_UNITS)
    }

    pub const fn minor(self) -> i64 {
        self.0
    }

    /// Convert from a decimal major-unit value, rounding half-up to the minor unit.
    pub fn from_decimal(value: Decimal) -> Result<Self, AmountOutOfRange> {
        let minor = value
            .checked_mul(Decimal::from(MINOR_UNITS))
            .ok_or(AmountOutOfRange(value))?
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        minor.to_i64().map(Amount).ok_or(AmountOutOfRange(value))
    }

    pub fn to_decimal(self) -> Decimal {
        Decimal::new(self.0, EXPONENT)
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    /// `self - other`, never below zero.
    pub fn saturating_sub(self, other: Amount) -> Amount {
        Amount((self.0 - other.0).max(0))
    }

    /// Multiply by a fractional rate (0.05 = 5%) and round half-up.
    pub fn apply_rate(self, rate: Decimal) -> Amount {
        round_minor(Decimal::from(self.0) * rate)
    }

    /// Multiply by a percentage (12 = 12%) and round half-up.
    pub fn percent(self, percent: Decimal) -> Amount {
        round_minor(Decimal::from(self.0) * percent / Decimal::ONE_HUNDRED)
    }

    /// Divide into `parts` equal shares, rounding half-up. Shares need not sum
    /// back to `self`.
    pub fn split(self, parts: u32) -> Amount {
        round_minor(Decimal::from(self.0) / Decimal::from(parts))
    }
}

/// Round an exact product expressed in minor units to a whole minor unit.
pub(crate) fn round_minor(value: Decimal) -> Amount {
    let rounded = value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    // only reachable past Amount::MAX, which validation rejects first
    Amount(rounded.to_i64().unwrap_or(if rounded.is_sign_negative() {
        i64::MIN
    } else {
        i64::MAX
    }))
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.to_decimal()
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = AmountOutOfRange;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Amount::from_decimal(value)
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0 + rhs.0)
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Amount) {
        self.0 += rhs.0;
    }
}

impl Sub for Amount {
    type Output = Amount;

    fn sub(self, rhs: Amount) -> Amount {
        Amount(self.0 - rhs.0)
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Amount>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.to_decimal())
    }
}

impl JsonSchema for Amount {
    fn schema_name() -> String {
        "Amount".to_string()
    }

    fn json_schema(gen: &mut SchemaGenerator) -> Schema {
        f64::json_schema(gen)
    }
}
