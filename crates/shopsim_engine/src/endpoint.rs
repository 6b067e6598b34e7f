//! The closed set of simulated endpoints.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use shopsim_trace::{AttributeValue, OutcomeCategory};
use std::fmt;
use std::str::FromStr;

/// A logical backend operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    /// Catalog search.
    Search,
    /// Single product lookup.
    ProductDetail,
    /// Recommendation feed.
    Recommendations,
    /// Add an item to the cart.
    CartAdd,
    /// Change a cart line.
    CartUpdate,
    /// Shipping address validation.
    AddressValidation,
    /// Inventory reservation.
    InventoryReserve,
    /// Shipping quote.
    ShippingQuote,
    /// Payment authorization.
    Payment,
    /// Extra payment verification challenge.
    ThreeDsChallenge,
    /// Order placement.
    OrderPlace,
    /// Order notification dispatch.
    Notification,
}

/// Categories a forced payment failure is drawn from.
pub const PAYMENT_FAILURES: [OutcomeCategory; 3] = [
    OutcomeCategory::Provider,
    OutcomeCategory::Fraud,
    OutcomeCategory::InsufficientFunds,
];

impl Endpoint {
    /// Every endpoint, in declaration order.
    pub const ALL: [Self; 12] = [
        Self::Search,
        Self::ProductDetail,
        Self::Recommendations,
        Self::CartAdd,
        Self::CartUpdate,
        Self::AddressValidation,
        Self::InventoryReserve,
        Self::ShippingQuote,
        Self::Payment,
        Self::ThreeDsChallenge,
        Self::OrderPlace,
        Self::Notification,
    ];

    /// Returns the endpoint label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::ProductDetail => "product_detail",
            Self::Recommendations => "recommendations",
            Self::CartAdd => "cart_add",
            Self::CartUpdate => "cart_update",
            Self::AddressValidation => "address_validation",
            Self::InventoryReserve => "inventory_reserve",
            Self::ShippingQuote => "shipping_quote",
            Self::Payment => "payment",
            Self::ThreeDsChallenge => "three_ds_challenge",
            Self::OrderPlace => "order_place",
            Self::Notification => "notification",
        }
    }

    /// Categories an injected failure of this endpoint may take.
    #[must_use]
    pub const fn failure_categories(self) -> &'static [OutcomeCategory] {
        match self {
            Self::Payment => &PAYMENT_FAILURES,
            Self::Search | Self::Recommendations | Self::Notification => &[OutcomeCategory::Network],
            Self::ProductDetail => &[OutcomeCategory::NotFound],
            Self::CartAdd | Self::CartUpdate | Self::AddressValidation | Self::InventoryReserve => {
                &[OutcomeCategory::Validation]
            }
            Self::ShippingQuote | Self::OrderPlace => &[OutcomeCategory::Provider],
            Self::ThreeDsChallenge => &[OutcomeCategory::Fraud],
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Endpoint> for AttributeValue {
    fn from(endpoint: Endpoint) -> Self {
        Self::Label(endpoint.as_str())
    }
}

impl FromStr for Endpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|endpoint| endpoint.as_str() == s)
            .ok_or_else(|| Error::UnknownName {
                kind: "endpoint",
                value: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_round_trip_through_from_str() {
        for endpoint in Endpoint::ALL {
            assert_eq!(endpoint.as_str().parse::<Endpoint>().unwrap(), endpoint);
        }
        assert!("checkout".parse::<Endpoint>().is_err());
    }

    #[test]
    fn attribute_value_is_the_endpoint_label() {
        assert_eq!(
            AttributeValue::from(Endpoint::Payment).as_label(),
            Some(Endpoint::Payment.as_str())
        );
    }

    #[test]
    fn every_endpoint_has_a_failure_category() {
        for endpoint in Endpoint::ALL {
            assert!(!endpoint.failure_categories().is_empty(), "{endpoint}");
        }
        assert_eq!(Endpoint::Payment.failure_categories().len(), 3);
    }
}
