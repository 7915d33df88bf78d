use std::sync::Arc;

use crate::ability::AbilityEngine;
use crate::audit::AuditRecorder;
use crate::config::StoreSettings;
use crate::errors::DomainError;
use crate::integrity::IntegrityEnforcer;
use crate::stores::{EntityStore, JsonFileAdapter, PersistenceAdapter};

/// Centralized application data following the main-owned stores pattern
///
/// All components are created once in main.rs and shared from there.
///
/// # Architecture
///
/// ```text
/// main.rs
///   ↓
/// AppData::init()
///   ↓ creates once
///   ├─ persistence (Arc<dyn PersistenceAdapter>)
///   ├─ audit (Arc<AuditRecorder>)
///   ├─ entity_store (Arc<EntityStore>)
///   └─ abilities (Arc<AbilityEngine>)
/// ```
pub struct AppData {
    pub settings: StoreSettings,
    pub audit: Arc<AuditRecorder>,
    pub entity_store: Arc<EntityStore>,
    pub abilities: Arc<AbilityEngine>,
}

impl AppData {
    /// Initialize all application data against the on-disk snapshot store
    ///
    /// # Errors
    ///
    /// Returns `DomainError` when the data directory cannot be prepared,
    /// a collection fails to load, or the loaded state violates the
    /// referential rules.
    pub fn init(settings: StoreSettings) -> Result<Self, DomainError> {
        let adapter = JsonFileAdapter::new(&settings.data_dir)?;
        Self::with_adapter(settings, Arc::new(adapter))
    }

    /// Initialize against an explicit adapter (tests, alternate backends)
    pub fn with_adapter(
        settings: StoreSettings,
        persistence: Arc<dyn PersistenceAdapter>,
    ) -> Result<Self, DomainError> {
        tracing::info!(data_dir = %settings.data_dir.display(), "Initializing AppData...");

        // Order matters: the recorder first, the store appends to it
        let audit = Arc::new(AuditRecorder::load(Arc::clone(&persistence))?);
        let entity_store = Arc::new(EntityStore::load(
            persistence,
            Arc::clone(&audit),
            IntegrityEnforcer::new(),
        )?);
        let abilities = Arc::new(AbilityEngine::new(Arc::clone(&entity_store)));

        tracing::info!("AppData initialization complete");
        Ok(Self {
            settings,
            audit,
            entity_store,
            abilities,
        })
    }
}
