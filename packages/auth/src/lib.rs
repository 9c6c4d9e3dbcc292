// ABOUTME: Token lifecycle orchestration for every connected third-party provider
// ABOUTME: Token vault, connection profile, provider registry, events, and OAuth plug-ins

pub mod error;
pub mod events;
pub mod hooks;
pub mod oauth;
pub mod orchestrator;
pub mod profile;
pub mod provider;
pub mod refresh;
pub mod registry;
pub mod types;
pub mod vault;

// Re-export main types
pub use error::{AuthError, AuthResult};
pub use events::{AuthEvent, AuthEventKind, EventBus, Listener, SubscriptionId};
pub use hooks::PostLoginHook;
pub use orchestrator::AuthOrchestrator;
pub use profile::{ConnectionProfile, ProfileStore, ProfileUpdate};
pub use provider::AuthProvider;
pub use registry::{normalize_provider_name, ProviderInfo, ProviderRegistry};
pub use types::{AuthGrant, Metadata, ProviderCapabilities, ProviderStatus, TokenRecord};
pub use vault::TokenVault;
