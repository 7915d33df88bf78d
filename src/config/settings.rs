use std::env;
use std::path::PathBuf;

/// Storage settings for the entity store and audit log
#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub data_dir: PathBuf,
}

impl StoreSettings {
    /// Load settings from environment variables
    ///
    /// `RBAC_DATA_DIR` points at the directory holding the persisted
    /// collection snapshots; defaults to `./data`.
    pub fn from_env() -> Self {
        let data_dir = env::var("RBAC_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));
        Self { data_dir }
    }

    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }
}
