// Audit layer - immutable mutation trail, filtering and export

pub mod builder;
pub mod recorder;

pub use builder::AuditEntryBuilder;
pub use recorder::{AuditFilter, AuditRecorder};
