//! Advisory providers and the registry callers pick a strategy from.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::PredictError;
use crate::models::{Prediction, PredictionInput};

mod remote;
mod rules;

pub use remote::RemoteModelProvider;
pub use rules::{RuleBasedProvider, RuleThresholds};

// ---

/// One prediction strategy.
#[async_trait]
pub trait AdvisoryProvider: Send + Sync {
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    fn description(&self) -> &str;

    async fn predict(&self, input: &PredictionInput) -> Result<Prediction, PredictError>;
}

/// Catalogue entry for a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderInfo {
    pub id: String,
    pub name: String,
    pub description: String,
}

/// Ordered, immutable set of providers. Built once and handed to whoever
/// needs to resolve a strategy id.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn AdvisoryProvider>>,
}

impl ProviderRegistry {
    pub fn new(providers: Vec<Arc<dyn AdvisoryProvider>>) -> Self {
        Self { providers }
    }

    /// Rule-based provider first, then the remote logistic-regression model.
    pub fn standard(thresholds: RuleThresholds, remote: RemoteModelProvider) -> Self {
        Self::new(vec![
            Arc::new(RuleBasedProvider::new(thresholds)),
            Arc::new(remote),
        ])
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn AdvisoryProvider>> {
        self.providers.iter().find(|p| p.id() == id).cloned()
    }

    /// Like [`ProviderRegistry::get`], as an error for callers that propagate.
    pub fn require(&self, id: &str) -> Result<Arc<dyn AdvisoryProvider>, PredictError> {
        self.get(id)
            .ok_or_else(|| PredictError::UnknownProvider(id.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn AdvisoryProvider>> {
        self.providers.iter()
    }

    pub fn infos(&self) -> Vec<ProviderInfo> {
        self.providers
            .iter()
            .map(|p| ProviderInfo {
                id: p.id().to_string(),
                name: p.name().to_string(),
                description: p.description().to_string(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.providers.iter().map(|p| p.id()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_standard_registry_order_and_lookup() {
        // ---
        let registry = ProviderRegistry::standard(
            RuleThresholds::default(),
            RemoteModelProvider::logistic_regression("http://localhost:5000"),
        );

        let ids: Vec<String> = registry.infos().into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["rules", "logreg"]);

        assert_eq!(registry.get("logreg").map(|p| p.name().to_string()), Some("Ai Suggestion".into()));
        assert!(registry.get("oracle").is_none());
        assert!(matches!(
            registry.require("oracle"),
            Err(PredictError::UnknownProvider(id)) if id == "oracle"
        ));
    }

    #[test]
    fn test_registry_is_injectable() {
        // ---
        let registry = ProviderRegistry::new(vec![Arc::new(RuleBasedProvider::default())]);
        assert_eq!(registry.len(), 1);
        assert_eq!(format!("{registry:?}"), r#"["rules"]"#);
    }
}
