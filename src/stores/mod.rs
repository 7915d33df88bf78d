// Stores layer - authoritative collections and their persisted mirror

pub mod entity_store;
pub mod persistence;

pub use entity_store::EntityStore;
pub use persistence::{Collection, JsonFileAdapter, MemoryAdapter, PersistenceAdapter};
