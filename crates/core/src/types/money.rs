//! Exact monetary amounts in minor currency units.
//!
//! Balances and prices are integers of the smallest currency unit (cents).
//! They never pass through binary floating point: the database stores
//! `NUMERIC(12, 2)` and conversion goes through [`rust_decimal::Decimal`].

use core::fmt;
use core::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// Errors that can occur when converting into [`Money`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    /// The input is not a decimal number.
    #[error("invalid amount: {0}")]
    Invalid(String),
    /// The input has more precision than one minor unit.
    #[error("amount has fractional minor units")]
    FractionalMinorUnits,
    /// The input does not fit in the supported range.
    #[error("amount out of range")]
    OutOfRange,
}

/// An amount of money in minor currency units.
///
/// Signed so that arithmetic can be checked before it is committed; the
/// ledger never persists a negative balance.
///
/// ## Examples
///
/// ```
/// use pennyshop_core::Money;
///
/// let price = Money::from_minor(17_500);
/// let balance = Money::from_minor(20_000);
/// assert_eq!(balance.checked_sub(price), Some(Money::from_minor(2_500)));
///
/// let parsed: Money = "175.00".parse().unwrap();
/// assert_eq!(parsed, price);
/// ```
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Zero minor units.
    pub const ZERO: Self = Self(0);

    /// Largest balance representable by the `NUMERIC(12, 2)` columns.
    pub const MAX_BALANCE: Self = Self(999_999_999_999);

    /// Number of decimal places in the major-unit representation.
    const SCALE: u32 = 2;

    /// Create an amount from minor units (e.g. cents).
    #[must_use]
    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    /// The amount in minor units.
    #[must_use]
    pub const fn minor_units(self) -> i64 {
        self.0
    }

    /// Whether the amount is strictly greater than zero.
    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Whether the amount is below zero.
    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Checked addition. Returns `None` on overflow.
    #[must_use]
    pub const fn checked_add(self, rhs: Self) -> Option<Self> {
        match self.0.checked_add(rhs.0) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Checked subtraction. Returns `None` on overflow.
    #[must_use]
    pub const fn checked_sub(self, rhs: Self) -> Option<Self> {
        match self.0.checked_sub(rhs.0) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// The amount in major units as an exact decimal with two places.
    #[must_use]
    pub fn to_decimal(self) -> Decimal {
        Decimal::new(self.0, Self::SCALE)
    }

    /// Convert an exact decimal in major units into minor units.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::FractionalMinorUnits` if the value has more than
    /// two significant decimal places, and `MoneyError::OutOfRange` if it
    /// does not fit in an `i64` of minor units.
    pub fn from_decimal(value: Decimal) -> Result<Self, MoneyError> {
        let minor = value
            .checked_mul(Decimal::ONE_HUNDRED)
            .ok_or(MoneyError::OutOfRange)?;

        if !minor.fract().is_zero() {
            return Err(MoneyError::FractionalMinorUnits);
        }

        minor.to_i64().map(Self).ok_or(MoneyError::OutOfRange)
    }
}

impl fmt::Display for Money {
    /// Minor units, unformatted. Presentation is left to callers.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    /// Parse an amount written in major units, e.g. `"5"` or `"5.25"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(s.trim()).map_err(|e| MoneyError::Invalid(e.to_string()))?;
        Self::from_decimal(value)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.to_decimal()
    }
}

impl TryFrom<Decimal> for Money {
    type Error = MoneyError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::from_decimal(value)
    }
}

// SQLx support (with postgres feature): stored as NUMERIC(12, 2).
#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Money {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <Decimal as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <Decimal as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Money {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let decimal = <Decimal as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::from_decimal(decimal)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Money {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <Decimal as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.to_decimal(), buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_conversion_is_exact() {
        let money = Money::from_minor(137);
        assert_eq!(money.to_decimal().to_string(), "1.37");
        assert_eq!(Money::from_decimal(money.to_decimal()).unwrap(), money);
    }

    #[test]
    fn test_from_decimal_accepts_trailing_zeros() {
        let value = Decimal::from_str("12.500").unwrap();
        assert_eq!(Money::from_decimal(value).unwrap(), Money::from_minor(1250));
    }

    #[test]
    fn test_from_decimal_rejects_sub_cent_precision() {
        let value = Decimal::from_str("0.001").unwrap();
        assert_eq!(
            Money::from_decimal(value),
            Err(MoneyError::FractionalMinorUnits)
        );
    }

    #[test]
    fn test_parse() {
        assert_eq!("5".parse::<Money>().unwrap(), Money::from_minor(500));
        assert_eq!("-0.01".parse::<Money>().unwrap(), Money::from_minor(-1));
        assert!(matches!(
            "five".parse::<Money>(),
            Err(MoneyError::Invalid(_))
        ));
    }

    #[test]
    fn test_checked_arithmetic() {
        assert_eq!(Money::from_minor(i64::MAX).checked_add(Money::from_minor(1)), None);
        assert_eq!(
            Money::from_minor(100).checked_sub(Money::from_minor(250)),
            Some(Money::from_minor(-150))
        );
        assert!(Money::from_minor(-150).is_negative());
        assert!(!Money::ZERO.is_positive());
    }

    #[test]
    fn test_serde_is_minor_units() {
        let json = serde_json::to_string(&Money::from_minor(2500)).unwrap();
        assert_eq!(json, "2500");
    }
}
