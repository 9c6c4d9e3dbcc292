// ABOUTME: Composition root for the Switchboard command line
// ABOUTME: Opens the secure store and wires vault, profile, registry, and orchestrator from Settings

pub mod hooks;
pub mod telemetry;

use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, info};

use switchboard_auth::{
    oauth::{default_registry, stderr_prompt},
    AuthOrchestrator, PostLoginHook, ProfileStore, ProviderRegistry, TokenVault,
};
use switchboard_config::Settings;
use switchboard_security::KdfParams;
use switchboard_storage::{SecureKeyStore, SqliteKeyStore};

pub use hooks::LoginSummaryHook;
pub use telemetry::init_tracing;

/// A fully wired connection manager
pub struct App {
    pub settings: Settings,
    pub orchestrator: AuthOrchestrator,
}

impl App {
    /// Open the store named by `settings` and build every provider the
    /// environment has credentials for
    pub async fn open(settings: Settings) -> anyhow::Result<Self> {
        let store = open_store(&settings).await?;
        let registry = default_registry(&settings, stderr_prompt())
            .context("Failed to build the provider registry")?;
        Self::assemble(settings, store, registry).await
    }

    /// Wire the orchestrator over an already opened store. Creates the
    /// local profile on first use.
    pub async fn assemble(
        settings: Settings,
        store: Arc<dyn SecureKeyStore>,
        registry: ProviderRegistry,
    ) -> anyhow::Result<Self> {
        let vault = TokenVault::new(store.clone());
        let profiles = ProfileStore::new(store);
        let hooks: Vec<Arc<dyn PostLoginHook>> = vec![Arc::new(LoginSummaryHook)];
        let orchestrator = AuthOrchestrator::with_hooks(vault, profiles, registry, hooks);

        let profile = orchestrator
            .profiles()
            .create_profile(&settings.profile_id)
            .await
            .context("Failed to initialize the connection profile")?;
        debug!(
            "Profile {} has {} connected provider(s)",
            profile.id,
            profile.connected_providers.len()
        );

        Ok(Self {
            settings,
            orchestrator,
        })
    }
}

/// Open the encrypted SQLite store, password-sealed when a store password
/// is configured and machine-sealed otherwise
pub async fn open_store(settings: &Settings) -> anyhow::Result<Arc<dyn SecureKeyStore>> {
    let pool = SqliteKeyStore::connect_file(&settings.database_path)
        .await
        .with_context(|| {
            format!(
                "Failed to open database at {}",
                settings.database_path.display()
            )
        })?;

    let store = match &settings.store_password {
        Some(password) => {
            SqliteKeyStore::open_with_password(pool, password, KdfParams::default()).await?
        }
        None => SqliteKeyStore::open_machine(pool).await?,
    };

    info!(
        "Opened secure store at {} ({} encryption)",
        settings.database_path.display(),
        store.encryption_mode()
    );
    Ok(Arc::new(store))
}
