use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where a request entered the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestSource {
    Api,
    Cli,
    System,
}

/// Per-request context describing the acting principal
///
/// Supplied by the external session layer; the core never authenticates,
/// only records who performed each mutation. Every mutating store call takes
/// a context so the audit trail can attribute the change.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub actor_id: String,
    pub actor_name: String,
    pub source: RequestSource,
    pub reason: Option<String>,
}

impl RequestContext {
    /// Create a context for an authenticated API caller
    pub fn new(actor_id: impl Into<String>, actor_name: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            actor_id: actor_id.into(),
            actor_name: actor_name.into(),
            source: RequestSource::Api,
            reason: None,
        }
    }

    /// Context for CLI-invoked operations (actor is the local operator)
    pub fn cli(actor_name: impl Into<String>) -> Self {
        let actor_name = actor_name.into();
        Self {
            request_id: Uuid::new_v4().to_string(),
            actor_id: format!("cli:{actor_name}"),
            actor_name,
            source: RequestSource::Cli,
            reason: None,
        }
    }

    /// Context for internal operations like bootstrap seeding
    pub fn system() -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            actor_id: "system".to_string(),
            actor_name: "system".to_string(),
            source: RequestSource::System,
            reason: None,
        }
    }

    /// Attach a human-supplied reason, recorded with every audit entry
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_source(mut self, source: RequestSource) -> Self {
        self.source = source;
        self
    }
}
