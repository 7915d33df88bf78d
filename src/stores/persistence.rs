use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::DomainError;

/// Named collections the core persists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    Roles,
    Permissions,
    RolePermissions,
    AuditLog,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Roles => "roles",
            Self::Permissions => "permissions",
            Self::RolePermissions => "role_permissions",
            Self::AuditLog => "audit_log",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Synchronous whole-collection persistence
///
/// The entity store calls `save` for every collection touched by a committed
/// mutation; `load` is called once at startup. Records cross this boundary
/// as raw JSON values so adapters stay independent of the entity types.
pub trait PersistenceAdapter: Send + Sync {
    fn load(&self, collection: Collection) -> Result<Vec<serde_json::Value>, DomainError>;
    fn save(&self, collection: Collection, records: &[serde_json::Value])
        -> Result<(), DomainError>;
}

/// Load a collection and deserialize each record into `T`
pub fn load_collection<T: DeserializeOwned>(
    adapter: &dyn PersistenceAdapter,
    collection: Collection,
) -> Result<Vec<T>, DomainError> {
    adapter
        .load(collection)?
        .into_iter()
        .map(|value| {
            serde_json::from_value(value).map_err(|e| {
                DomainError::persistence("load", collection.as_str(), e.to_string())
            })
        })
        .collect()
}

/// Serialize records and save them as one collection
pub fn save_collection<T: Serialize>(
    adapter: &dyn PersistenceAdapter,
    collection: Collection,
    records: &[T],
) -> Result<(), DomainError> {
    let values = records
        .iter()
        .map(|record| {
            serde_json::to_value(record)
                .map_err(|e| DomainError::persistence("save", collection.as_str(), e.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    adapter.save(collection, &values)
}

/// File-backed adapter: one pretty-printed JSON file per collection
pub struct JsonFileAdapter {
    dir: PathBuf,
}

impl JsonFileAdapter {
    /// Create the adapter, creating the data directory if needed
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, DomainError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .map_err(|e| DomainError::persistence("save", dir.display().to_string(), e.to_string()))?;
        Ok(Self { dir })
    }

    fn path_for(&self, collection: Collection) -> PathBuf {
        self.dir.join(format!("{}.json", collection.as_str()))
    }
}

impl PersistenceAdapter for JsonFileAdapter {
    fn load(&self, collection: Collection) -> Result<Vec<serde_json::Value>, DomainError> {
        let path = self.path_for(collection);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&path)
            .map_err(|e| DomainError::persistence("load", collection.as_str(), e.to_string()))?;
        serde_json::from_str(&raw)
            .map_err(|e| DomainError::persistence("load", collection.as_str(), e.to_string()))
    }

    fn save(
        &self,
        collection: Collection,
        records: &[serde_json::Value],
    ) -> Result<(), DomainError> {
        let raw = serde_json::to_string_pretty(records)
            .map_err(|e| DomainError::persistence("save", collection.as_str(), e.to_string()))?;
        fs::write(self.path_for(collection), raw)
            .map_err(|e| DomainError::persistence("save", collection.as_str(), e.to_string()))
    }
}

/// In-memory adapter for tests and ephemeral setups
///
/// `set_fail_saves(true)` makes every subsequent `save` fail, which is how
/// the flush-failure rollback path is exercised in tests.
#[derive(Default)]
pub struct MemoryAdapter {
    collections: Mutex<HashMap<Collection, Vec<serde_json::Value>>>,
    fail_saves: AtomicBool,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Number of records currently persisted for a collection
    pub fn saved_len(&self, collection: Collection) -> usize {
        self.collections
            .lock()
            .expect("memory adapter lock poisoned")
            .get(&collection)
            .map_or(0, Vec::len)
    }
}

impl PersistenceAdapter for MemoryAdapter {
    fn load(&self, collection: Collection) -> Result<Vec<serde_json::Value>, DomainError> {
        Ok(self
            .collections
            .lock()
            .expect("memory adapter lock poisoned")
            .get(&collection)
            .cloned()
            .unwrap_or_default())
    }

    fn save(
        &self,
        collection: Collection,
        records: &[serde_json::Value],
    ) -> Result<(), DomainError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(DomainError::persistence(
                "save",
                collection.as_str(),
                "simulated flush failure",
            ));
        }
        self.collections
            .lock()
            .expect("memory adapter lock poisoned")
            .insert(collection, records.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn file_adapter_round_trips_a_collection() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = JsonFileAdapter::new(dir.path()).unwrap();
        let records = vec![json!({"id": "1"}), json!({"id": "2"})];
        adapter.save(Collection::Roles, &records).unwrap();
        assert_eq!(adapter.load(Collection::Roles).unwrap(), records);
    }

    #[test]
    fn file_adapter_loads_empty_for_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = JsonFileAdapter::new(dir.path()).unwrap();
        assert!(adapter.load(Collection::Users).unwrap().is_empty());
    }

    #[test]
    fn memory_adapter_simulates_flush_failure() {
        let adapter = MemoryAdapter::new();
        adapter.save(Collection::Users, &[json!({"id": "1"})]).unwrap();
        adapter.set_fail_saves(true);
        let err = adapter.save(Collection::Users, &[]).unwrap_err();
        assert!(matches!(err, DomainError::Persistence { .. }));
        // Previously saved state is untouched
        assert_eq!(adapter.saved_len(Collection::Users), 1);
    }
}
