//! Prices

use std::{
    fmt,
    iter::Sum,
    ops::{Add, Deref},
};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A fare amount expressed in the neutral unit of construction.
///
/// Every candidate carries one so that amounts published in different
/// currencies can be ranked against each other without conversion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount {
    value: Decimal,
}

impl Amount {
    /// Zero.
    pub const ZERO: Amount = Amount {
        value: Decimal::ZERO,
    };

    /// Creates a new amount
    pub fn new(value: Decimal) -> Self {
        Amount { value }
    }

    /// Creates an amount from minor units with two decimal places.
    pub fn from_minor(value: i64) -> Self {
        Amount {
            value: Decimal::new(value, 2),
        }
    }

    /// Amount multiplied by a passenger count.
    pub fn times(self, count: u32) -> Self {
        Amount {
            value: self.value * Decimal::from(count),
        }
    }
}

impl Deref for Amount {
    type Target = Decimal;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Amount { value }
    }
}

impl From<u32> for Amount {
    fn from(value: u32) -> Self {
        Amount {
            value: Decimal::from(value),
        }
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Self) -> Self::Output {
        Amount {
            value: self.value + rhs.value,
        }
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
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
        write!(f, "{} NUC", self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_derefs_to_decimal() {
        let amount = Amount::from(100);

        assert_eq!(*amount, Decimal::from(100));
    }

    #[test]
    fn from_minor_keeps_two_places() {
        let amount = Amount::from_minor(12_345);

        assert_eq!(*amount, Decimal::new(12_345, 2));
        assert_eq!(amount.to_string(), "123.45 NUC");
    }

    #[test]
    fn times_multiplies_by_passenger_count() {
        assert_eq!(Amount::from(450).times(3), Amount::from(1350));
        assert_eq!(Amount::from(450).times(0), Amount::ZERO);
    }

    #[test]
    fn sums_and_orders() {
        let total: Amount = [Amount::from(100), Amount::from(150)].iter().sum();

        assert_eq!(total, Amount::from(250));
        assert!(Amount::from(100) < Amount::from(150));
    }
}
