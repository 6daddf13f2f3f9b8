//! Money value object.
//!
//! Amounts are stored in minor units (cents, paise, ...) as `i64`. The
//! currency itself is a tenant setting, so it is not repeated on every amount.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    pub const fn minor(self) -> i64 {
        self.0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn checked_add(self, other: Money) -> DomainResult<Money> {
        self.0
            .checked_add(other.0)
            .map(Money)
            .ok_or_else(|| DomainError::validation("amount overflow"))
    }

    pub fn checked_sub(self, other: Money) -> DomainResult<Money> {
        self.0
            .checked_sub(other.0)
            .map(Money)
            .ok_or_else(|| DomainError::validation("amount overflow"))
    }

    /// `self * numerator / denominator`, rounded toward zero.
    pub fn prorate(self, numerator: u32, denominator: u32) -> DomainResult<Money> {
        if denominator == 0 {
            return Err(DomainError::validation("proration denominator must be positive"));
        }
        let scaled = (self.0 as i128) * (numerator as i128) / (denominator as i128);
        i64::try_from(scaled)
            .map(Money)
            .map_err(|_| DomainError::validation("amount overflow"))
    }

    pub fn sum<'a>(amounts: impl IntoIterator<Item = &'a Money>) -> DomainResult<Money> {
        amounts
            .into_iter()
            .try_fold(Money::ZERO, |acc, m| acc.checked_add(*m))
    }
}

impl core::fmt::Display for Money {
    /// Renders with two decimal places (`123456` → `1234.56`).
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn display_two_decimals() {
        assert_eq!(Money::from_minor(123456).to_string(), "1234.56");
        assert_eq!(Money::from_minor(5).to_string(), "0.05");
        assert_eq!(Money::from_minor(-250).to_string(), "-2.50");
    }

    #[test]
    fn prorate_rounds_toward_zero() {
        let m = Money::from_minor(100_000);
        assert_eq!(m.prorate(1, 3).unwrap(), Money::from_minor(33_333));
        assert!(m.prorate(1, 0).is_err());
    }

    #[test]
    fn overflow_is_an_error() {
        assert!(Money::from_minor(i64::MAX).checked_add(Money::from_minor(1)).is_err());
    }

    proptest! {
        #[test]
        fn prorate_never_exceeds_whole(amount in 0i64..10_000_000_000, num in 0u32..31, den in 1u32..31) {
            prop_assume!(num <= den);
            let part = Money::from_minor(amount).prorate(num, den).unwrap();
            prop_assert!(part.minor() <= amount);
            prop_assert!(part.minor() >= 0);
        }

        #[test]
        fn add_then_sub_is_identity(a in -1_000_000_000i64..1_000_000_000, b in -1_000_000_000i64..1_000_000_000) {
            let x = Money::from_minor(a).checked_add(Money::from_minor(b)).unwrap();
            prop_assert_eq!(x.checked_sub(Money::from_minor(b)).unwrap(), Money::from_minor(a));
        }
    }
}
