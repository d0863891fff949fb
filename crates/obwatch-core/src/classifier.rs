//! Alert classification.
//!
//! Maps an order-book level (price, quantity) to a severity bucket.
//! Rules are evaluated in priority order and the first match wins:
//!
//! 1. `price * quantity > big_total` -> `Big`
//! 2. `quantity > solid_min_quantity && price * quantity < big_total` -> `Solid`
//! 3. `price < cheap_max_price` -> `Cheap`
//! 4. otherwise -> `None`

use crate::types::Severity;
use crate::{Price, Size};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Classification thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierThresholds {
    /// Notional above which a level is `Big`. Default: 1,000,000.
    #[serde(default = "default_big_total")]
    pub big_total: Decimal,
    /// Quantity above which a level is `Solid`. Default: 10.
    #[serde(default = "default_solid_min_quantity")]
    pub solid_min_quantity: Decimal,
    /// Price below which a level is `Cheap`. Default: 50,000.
    #[serde(default = "default_cheap_max_price")]
    pub cheap_max_price: Decimal,
}

fn default_big_total() -> Decimal {
    Decimal::from(1_000_000)
}

fn default_solid_min_quantity() -> Decimal {
    Decimal::from(10)
}

fn default_cheap_max_price() -> Decimal {
    Decimal::from(50_000)
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        Self {
            big_total: default_big_total(),
            solid_min_quantity: default_solid_min_quantity(),
            cheap_max_price: default_cheap_max_price(),
        }
    }
}

/// Pure severity classifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlertClassifier {
    thresholds: ClassifierThresholds,
}

impl AlertClassifier {
    pub fn new(thresholds: ClassifierThresholds) -> Self {
        Self { thresholds }
    }

    /// Classify a level. Total and deterministic.
    pub fn classify(&self, price: Price, quantity: Size) -> Severity {
        let t = &self.thresholds;
        let total = quantity.notional(price);

        if total > t.big_total {
            Severity::Big
        } else if quantity.inner() > t.solid_min_quantity && total < t.big_total {
            Severity::Solid
        } else if price.inner() < t.cheap_max_price {
            Severity::Cheap
        } else {
            Severity::None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn classify(price: Decimal, quantity: Decimal) -> Severity {
        AlertClassifier::default().classify(Price::new(price), Size::new(quantity))
    }

    #[test]
    fn test_big_takes_priority_over_solid() {
        // 60000 * 20 = 1,200,000 > 1,000,000 even though qty > 10
        assert_eq!(classify(dec!(60000), dec!(20)), Severity::Big);
    }

    #[test]
    fn test_big_takes_priority_over_cheap() {
        // price < 50,000 but notional 1,800,000
        assert_eq!(classify(dec!(45000), dec!(40)), Severity::Big);
    }

    #[test]
    fn test_solid() {
        // 5000 * 11 = 55,000, qty > 10
        assert_eq!(classify(dec!(5000), dec!(11)), Severity::Solid);
    }

    #[test]
    fn test_cheap() {
        assert_eq!(classify(dec!(49999.99), dec!(0.5)), Severity::Cheap);
    }

    #[test]
    fn test_none() {
        assert_eq!(classify(dec!(64000), dec!(1)), Severity::None);
        assert_eq!(classify(dec!(50000), dec!(10)), Severity::None);
    }

    #[test]
    fn test_exact_big_boundary_is_not_big_or_solid() {
        // total == 1,000,000: not > big, not < big
        assert_eq!(classify(dec!(50000), dec!(20)), Severity::None);
        assert_eq!(classify(dec!(40000), dec!(25)), Severity::Cheap);
    }

    #[test]
    fn test_quantity_boundary() {
        // qty == 10 is not > 10
        assert_eq!(classify(dec!(60000), dec!(10)), Severity::None);
    }

    #[test]
    fn test_custom_thresholds() {
        let classifier = AlertClassifier::new(ClassifierThresholds {
            big_total: dec!(1000),
            solid_min_quantity: dec!(1),
            cheap_max_price: dec!(10),
        });

        assert_eq!(
            classifier.classify(Price::new(dec!(100)), Size::new(dec!(11))),
            Severity::Big
        );
        assert_eq!(
            classifier.classify(Price::new(dec!(100)), Size::new(dec!(2))),
            Severity::Solid
        );
        assert_eq!(
            classifier.classify(Price::new(dec!(5)), Size::new(dec!(1))),
            Severity::Cheap
        );
    }

    #[test]
    fn test_thresholds_deserialize_with_defaults() {
        let thresholds: ClassifierThresholds = serde_json::from_str(r#"{"big_total": "500"}"#)
            .expect("parse thresholds");
        assert_eq!(thresholds.big_total, dec!(500));
        assert_eq!(thresholds.solid_min_quantity, dec!(10));
        assert_eq!(thresholds.cheap_max_price, dec!(50000));
    }
}
