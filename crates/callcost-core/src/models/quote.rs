//! Quote returned by the cost dependency

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Cost and currency for one call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub cost: Decimal,
    pub currency: String,
}

impl Quote {
    pub fn new(cost: Decimal, currency: impl Into<String>) -> Self {
        Self {
            cost,
            currency: currency.into(),
        }
    }

    /// A well-formed quote has a non-negative cost and a 3-letter currency code
    pub fn is_well_formed(&self) -> bool {
        !self.cost.is_sign_negative()
            && self.currency.len() == 3
            && self.currency.chars().all(|c| c.is_ascii_alphabetic())
    }
}
