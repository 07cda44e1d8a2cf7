use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const DEFAULT_CURRENCY_CODE: &str = "usd";

/// Basis points in one whole (100%).
const BPS_DENOMINATOR: i64 = 10_000;

//--------------------------------------       Money         ---------------------------------------------------------
/// An amount of money in the smallest unit of its currency (e.g. cents).
///
/// Amounts are always integers. Fractions that appear while applying a rate are floored, so a share computed with
/// [`Money::share_floor`] never exceeds the exact proportional value.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize, Hash)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct Money(i64);

op!(binary Money, Add, add);
op!(binary Money, Sub, sub);
op!(inplace Money, AddAssign, add_assign);
op!(inplace Money, SubAssign, sub_assign);
op!(unary Money, Neg, neg);

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as a money amount: {0}")]
pub struct MoneyConversionError(String);

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for Money {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Money {}

impl TryFrom<u64> for Money {
    type Error = MoneyConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(MoneyConversionError(format!("Value {} is too large to convert to Money", value)))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl Money {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_major(units: i64) -> Self {
        Self(units * 100)
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    /// Multiplies by a quantity. Returns `None` if the result does not fit.
    pub fn checked_mul(self, quantity: i64) -> Option<Self> {
        self.0.checked_mul(quantity).map(Self)
    }

    /// The portion of this amount that remains after removing `bps` basis points, rounded down.
    ///
    /// `Money::from(2000).share_floor(300)` is 1940.
    pub fn share_floor(&self, bps: u32) -> Self {
        let keep = BPS_DENOMINATOR - i64::from(bps).min(BPS_DENOMINATOR);
        // i128 keeps the intermediate product from overflowing for very large amounts
        let value = (i128::from(self.0) * i128::from(keep)).div_euclid(i128::from(BPS_DENOMINATOR));
        #[allow(clippy::cast_possible_truncation)]
        Self(value as i64)
    }

    /// `bps` basis points of this amount, rounded up. This is always `self - self.share_floor(bps)`.
    pub fn fee_ceil(&self, bps: u32) -> Self {
        *self - self.share_floor(bps)
    }
}
