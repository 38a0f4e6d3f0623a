//! Provider priority ordering consumed by the multi-provider manager.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A broad asset-class key used to select a provider priority list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    /// Spot/exchange crypto pairs.
    Crypto,
    /// Listed equities.
    Equity,
    /// Futures and other microstructure instruments.
    Futures,
    /// Macro/fundamentals time series.
    Fundamentals,
}

/// Ordered list of provider names to try, highest priority first, for one
/// asset class.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingPolicy {
    providers_by_class: HashMap<AssetClass, Vec<String>>,
}

impl RoutingPolicy {
    /// Create an empty policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the priority-ordered provider list for `class`.
    #[must_use]
    pub fn with_providers(
        mut self,
        class: AssetClass,
        providers: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.providers_by_class
            .insert(class, providers.into_iter().map(Into::into).collect());
        self
    }

    /// The priority-ordered provider list for `class`, or an empty slice if
    /// none is configured.
    #[must_use]
    pub fn providers_for(&self, class: &AssetClass) -> &[String] {
        self.providers_by_class
            .get(class)
            .map_or(&[], Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_registered_priority_order() {
        let policy = RoutingPolicy::new().with_providers(
            AssetClass::Crypto,
            ["binance", "coingecko"],
        );
        assert_eq!(
            policy.providers_for(&AssetClass::Crypto),
            &["binance".to_string(), "coingecko".to_string()]
        );
        assert!(policy.providers_for(&AssetClass::Equity).is_empty());
    }
}
