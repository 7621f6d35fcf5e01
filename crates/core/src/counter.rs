//! Optional per-store counters a sync may refresh.

use serde::{Deserialize, Serialize};

/// A cached count the update job can refresh on request.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Counter {
    CustomerCount,
    OrderCount,
    ProductCount,
}

impl Counter {
    pub const ALL: [Counter; 3] = [
        Counter::CustomerCount,
        Counter::OrderCount,
        Counter::ProductCount,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Counter::CustomerCount => "customer_count",
            Counter::OrderCount => "order_count",
            Counter::ProductCount => "product_count",
        }
    }

    /// Remote resource collection the counter is read from.
    pub fn resource(&self) -> &'static str {
        match self {
            Counter::CustomerCount => "customers",
            Counter::OrderCount => "orders",
            Counter::ProductCount => "products",
        }
    }
}

impl core::fmt::Display for Counter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
