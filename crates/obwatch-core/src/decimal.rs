//! Precision-safe decimal types for order-book prices and quantities.
//!
//! Uses `rust_decimal` so the alert thresholds compare exactly, without
//! floating-point rounding at the 1,000,000 notional boundary.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! decimal_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Decimal);

        impl $name {
            #[inline]
            pub fn new(value: Decimal) -> Self {
                Self(value)
            }

            #[inline]
            pub fn inner(&self) -> Decimal {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = rust_decimal::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Decimal::from_str(s).map(Self)
            }
        }

        impl From<Decimal> for $name {
            fn from(value: Decimal) -> Self {
                Self(value)
            }
        }
    };
}

decimal_newtype!(
    /// Level price in the quote asset (`P`).
    Price
);

decimal_newtype!(
    /// Level quantity in the base asset (`Q`).
    Size
);

impl Size {
    /// Level total, `quantity * price`.
    ///
    /// Saturates at `Decimal::MAX` on overflow so an absurd level still
    /// classifies as `Big`.
    #[inline]
    pub fn notional(&self, price: Price) -> Decimal {
        self.0.checked_mul(price.0).unwrap_or(Decimal::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_level_total() {
        let quantity = Size::new(dec!(20));
        let price = Price::new(dec!(60000));

        assert_eq!(quantity.notional(price), dec!(1200000));
    }

    #[test]
    fn test_total_saturates() {
        let quantity = Size::new(Decimal::MAX);
        assert_eq!(quantity.notional(Price::new(dec!(2))), Decimal::MAX);
    }

    #[test]
    fn test_parse_and_display() {
        let price: Price = "64123.45".parse().unwrap();
        assert_eq!(price.inner(), dec!(64123.45));
        assert_eq!(price.to_string(), "64123.45");

        assert!("not-a-number".parse::<Size>().is_err());
    }
}
