// ABOUTME: Provider registry mapping normalized names to plug-in implementations
// ABOUTME: Built once at startup; unknown names fail with UnknownProvider

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    error::{AuthError, AuthResult},
    provider::AuthProvider,
    types::ProviderCapabilities,
};

/// Lowercase and strip all whitespace, so "Google", "GOOGLE" and
/// "Go ogle" resolve to the same entry
pub fn normalize_provider_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Name and capabilities of a registered provider, for front ends
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderInfo {
    pub name: String,
    pub capabilities: ProviderCapabilities,
}

#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn AuthProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider under its normalized name, replacing any
    /// previous registration
    pub fn register(&mut self, provider: Arc<dyn AuthProvider>) {
        let name = normalize_provider_name(provider.name());
        if self.providers.insert(name.clone(), provider).is_some() {
            warn!("Replaced existing registration for provider {}", name);
        } else {
            debug!("Registered provider {}", name);
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn AuthProvider>) -> Self {
        self.register(provider);
        self
    }

    pub fn get(&self, name: &str) -> AuthResult<Arc<dyn AuthProvider>> {
        let key = normalize_provider_name(name);
        self.providers
            .get(&key)
            .cloned()
            .ok_or(AuthError::UnknownProvider(key))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(&normalize_provider_name(name))
    }

    pub fn capabilities(&self, name: &str) -> Option<ProviderCapabilities> {
        self.get(name).ok().map(|p| p.capabilities())
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }

    pub fn list(&self) -> Vec<ProviderInfo> {
        self.providers
            .iter()
            .map(|(name, provider)| ProviderInfo {
                name: name.clone(),
                capabilities: provider.capabilities(),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AuthGrant;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    struct Named(&'static str, ProviderCapabilities);

    #[async_trait]
    impl AuthProvider for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn capabilities(&self) -> ProviderCapabilities {
            self.1
        }

        async fn start_auth(&self) -> AuthResult<AuthGrant> {
            Ok(AuthGrant::new("x"))
        }
    }

    fn refreshable() -> ProviderCapabilities {
        ProviderCapabilities {
            supports_refresh: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_normalize_provider_name() {
        assert_eq!(normalize_provider_name("Google"), "google");
        assert_eq!(normalize_provider_name("GOOGLE"), "google");
        assert_eq!(normalize_provider_name(" Go ogle\t"), "google");
        assert_eq!(normalize_provider_name("Home Assistant"), "homeassistant");
    }

    #[test]
    fn test_lookup_is_normalized() {
        let registry = ProviderRegistry::new()
            .with_provider(Arc::new(Named("Spotify", refreshable())));

        assert_eq!(registry.get("spotify").unwrap().name(), "Spotify");
        assert!(registry.get("SPOTIFY").is_ok());
        assert!(registry.contains("spot ify"));
        assert_eq!(registry.capabilities("spotify"), Some(refreshable()));
    }

    #[test]
    fn test_unknown_provider_is_an_error() {
        let registry = ProviderRegistry::new();
        match registry.get("Not A Provider") {
            Err(AuthError::UnknownProvider(name)) => assert_eq!(name, "notaprovider"),
            Err(other) => panic!("Expected UnknownProvider, got {:?}", other),
            Ok(_) => panic!("Expected UnknownProvider, got a provider"),
        }
        assert_eq!(registry.capabilities("nope"), None);
    }

    #[test]
    fn test_names_and_list_are_sorted() {
        let registry = ProviderRegistry::new()
            .with_provider(Arc::new(Named("slack", ProviderCapabilities::default())))
            .with_provider(Arc::new(Named("discord", refreshable())));

        assert_eq!(registry.names(), vec!["discord", "slack"]);
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.list(),
            vec![
                ProviderInfo {
                    name: "discord".to_string(),
                    capabilities: refreshable(),
                },
                ProviderInfo {
                    name: "slack".to_string(),
                    capabilities: ProviderCapabilities::default(),
                },
            ]
        );
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(Named("github", ProviderCapabilities::default())));
        registry.register(Arc::new(Named("GitHub", refreshable())));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.capabilities("github"), Some(refreshable()));
    }
}
