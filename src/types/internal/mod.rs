pub mod audit;
pub mod context;

pub use audit::{AuditAction, AuditEntry, EntityKind};
pub use context::{RequestContext, RequestSource};
