//! Exact money and percentage value objects.
//!
//! Amounts are held in minor units (cents) and percentages in basis points, so
//! every calculation in the engine is integer arithmetic. The only rounding rule
//! in the system is [`Money::percent_of`]: round-half-up to the cent.

use core::fmt;
use core::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// A monetary amount in minor units (cents).
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl ValueObject for Money {}

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Whole currency units (e.g. dollars).
    pub const fn from_major(units: i64) -> Self {
        Self(units * 100)
    }

    pub const fn cents(&self) -> i64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }

    pub fn checked_sub(self, rhs: Money) -> Option<Money> {
        self.0.checked_sub(rhs.0).map(Money)
    }

    /// `self × pct`, rounded half-up (half away from zero) to the cent.
    pub fn percent_of(self, pct: Percent) -> Money {
        let scaled = i128::from(self.0) * i128::from(pct.basis_points());
        let magnitude = (scaled.abs() + 5_000) / 10_000;
        let signed = if scaled < 0 { -magnitude } else { magnitude };
        Money(signed as i64)
    }

    /// Convert a decimal amount received at a transport boundary.
    ///
    /// The value is rounded to the nearest cent; non-finite values are rejected.
    pub fn from_decimal(value: f64) -> DomainResult<Self> {
        if !value.is_finite() {
            return Err(DomainError::validation("amount must be a finite number"));
        }
        let cents = (value * 100.0).round();
        if cents.abs() > i64::MAX as f64 {
            return Err(DomainError::validation("amount out of range"));
        }
        Ok(Self(cents as i64))
    }

    /// Decimal view of the amount (for JSON responses and display only).
    pub fn to_decimal(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// `$1,234.50`
    pub fn format_currency(&self) -> String {
        let (whole, frac) = self.split();
        format!("{}${}.{:02}", self.sign(), group_thousands(whole), frac)
    }

    /// `$1,234` when the amount is whole, otherwise `$1,234.50`.
    pub fn format_compact(&self) -> String {
        let (whole, frac) = self.split();
        if frac == 0 {
            format!("{}${}", self.sign(), group_thousands(whole))
        } else {
            format!("{}${}.{:02}", self.sign(), group_thousands(whole), frac)
        }
    }

    fn split(&self) -> (u64, u64) {
        let abs = self.0.unsigned_abs();
        (abs / 100, abs % 100)
    }

    fn sign(&self) -> &'static str {
        if self.0 < 0 { "-" } else { "" }
    }
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (whole, frac) = self.split();
        write!(f, "{}{}.{:02}", self.sign(), whole, frac)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

/// A percentage in basis points (1% = 100bp).
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Percent(u32);

impl ValueObject for Percent {}

impl Percent {
    pub const ZERO: Percent = Percent(0);
    pub const HUNDRED: Percent = Percent(10_000);

    pub const fn from_basis_points(bp: u32) -> Self {
        Self(bp)
    }

    pub const fn whole(pct: u32) -> Self {
        Self(pct * 100)
    }

    /// Parse a percentage such as `12.5` (rounded to the nearest basis point).
    pub fn from_decimal(value: f64) -> DomainResult<Self> {
        if !value.is_finite() || value < 0.0 {
            return Err(DomainError::validation(
                "percentage must be a non-negative number",
            ));
        }
        let bp = (value * 100.0).round();
        if bp > f64::from(u32::MAX) {
            return Err(DomainError::validation("percentage out of range"));
        }
        Ok(Self(bp as u32))
    }

    pub const fn basis_points(&self) -> u32 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Ensure the value lies in `[0, 100]`.
    pub fn ensure_at_most_hundred(self, what: &str) -> DomainResult<Self> {
        if self > Self::HUNDRED {
            return Err(DomainError::validation(format!(
                "{what} must be between 0 and 100"
            )));
        }
        Ok(self)
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / 100;
        let frac = self.0 % 100;
        if frac == 0 {
            write!(f, "{whole}")
        } else if frac % 10 == 0 {
            write!(f, "{whole}.{}", frac / 10)
        } else {
            write!(f, "{whole}.{frac:02}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn percent_of_rounds_half_up() {
        // 0.125 -> 0.13
        assert_eq!(Money::from_cents(125).percent_of(Percent::whole(10)), Money::from_cents(13));
        // 0.124 -> 0.12
        assert_eq!(Money::from_cents(124).percent_of(Percent::whole(10)), Money::from_cents(12));
        assert_eq!(
            Money::from_major(1000).percent_of(Percent::whole(25)),
            Money::from_major(250)
        );
        assert_eq!(
            Money::from_cents(-125).percent_of(Percent::whole(10)),
            Money::from_cents(-13)
        );
    }

    #[test]
    fn currency_formatting() {
        assert_eq!(Money::from_cents(123_450).format_currency(), "$1,234.50");
        assert_eq!(Money::from_major(1000).format_compact(), "$1,000");
        assert_eq!(Money::from_cents(100_050).format_compact(), "$1,000.50");
        assert_eq!(Money::from_cents(5).to_string(), "0.05");
        assert_eq!(Money::from_cents(-1_000_000_00).format_currency(), "-$1,000,000.00");
    }

    #[test]
    fn decimal_boundaries() {
        assert_eq!(Money::from_decimal(19.99).unwrap(), Money::from_cents(1999));
        assert!(Money::from_decimal(f64::NAN).is_err());
        assert_eq!(Percent::from_decimal(12.5).unwrap(), Percent::from_basis_points(1250));
        assert!(Percent::from_decimal(-1.0).is_err());
        assert!(Percent::whole(101).ensure_at_most_hundred("deposit_percent").is_err());
    }

    #[test]
    fn percent_display_trims_trailing_zeros() {
        assert_eq!(Percent::whole(25).to_string(), "25");
        assert_eq!(Percent::from_basis_points(1250).to_string(), "12.5");
        assert_eq!(Percent::from_basis_points(1205).to_string(), "12.05");
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// A share never exceeds the whole and stays within half a cent of exact.
        #[test]
        fn percent_of_stays_within_half_a_cent(
            cents in 0i64..1_000_000_000i64,
            bps in 0u32..=10_000u32,
        ) {
            let share = Money::from_cents(cents).percent_of(Percent::from_basis_points(bps));
            prop_assert!(share.cents() <= cents);
            let exact = i128::from(cents) * i128::from(bps);
            let error = (i128::from(share.cents()) * 10_000 - exact).abs();
            prop_assert!(error <= 5_000);
        }

        #[test]
        fn percent_of_is_symmetric_around_zero(
            cents in 0i64..1_000_000_000i64,
            bps in 0u32..=10_000u32,
        ) {
            let pct = Percent::from_basis_points(bps);
            prop_assert_eq!(
                Money::from_cents(-cents).percent_of(pct),
                Money::from_cents(-Money::from_cents(cents).percent_of(pct).cents())
            );
        }
    }
}
