use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::audit::AuditRecorder;
use crate::errors::DomainError;
use crate::types::internal::{AuditAction, AuditEntry, EntityKind, RequestContext};

/// Fluent builder for audit entries
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use rbac_core::audit::AuditRecorder;
/// use rbac_core::types::internal::{AuditAction, EntityKind, RequestContext};
///
/// fn example(recorder: Arc<AuditRecorder>, ctx: &RequestContext) {
///     recorder
///         .builder(AuditAction::Create, EntityKind::Role)
///         .with_context(ctx)
///         .entity("role-001", "editors")
///         .record()
///         .expect("failed to write audit entry");
/// }
/// ```
pub struct AuditEntryBuilder {
    recorder: Arc<AuditRecorder>,
    action: AuditAction,
    entity_kind: EntityKind,
    actor_id: Option<String>,
    actor_name: Option<String>,
    entity_id: Option<String>,
    entity_name: Option<String>,
    before: Option<serde_json::Value>,
    after: Option<serde_json::Value>,
    reason: Option<String>,
}

impl AuditEntryBuilder {
    pub fn new(recorder: Arc<AuditRecorder>, action: AuditAction, entity_kind: EntityKind) -> Self {
        Self {
            recorder,
            action,
            entity_kind,
            actor_id: None,
            actor_name: None,
            entity_id: None,
            entity_name: None,
            before: None,
            after: None,
            reason: None,
        }
    }

    /// Populate the actor and reason from a request context
    pub fn with_context(mut self, ctx: &RequestContext) -> Self {
        self.actor_id = Some(ctx.actor_id.clone());
        self.actor_name = Some(ctx.actor_name.clone());
        if self.reason.is_none() {
            self.reason = ctx.reason.clone();
        }
        self
    }

    /// Set the actor directly (when no request context is available)
    pub fn actor(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.actor_id = Some(id.into());
        self.actor_name = Some(name.into());
        self
    }

    /// Identify the affected entity
    pub fn entity(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.entity_id = Some(id.into());
        self.entity_name = Some(name.into());
        self
    }

    /// Snapshot of the entity before the change
    ///
    /// Serialization failures are ignored, matching the best-effort nature of
    /// change payloads; the entry itself is still written.
    pub fn before(mut self, value: impl Serialize) -> Self {
        if let Ok(value) = serde_json::to_value(value) {
            self.before = Some(value);
        }
        self
    }

    /// Snapshot of the entity after the change
    pub fn after(mut self, value: impl Serialize) -> Self {
        if let Ok(value) = serde_json::to_value(value) {
            self.after = Some(value);
        }
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Build the entry without writing it
    ///
    /// Unset actor/entity fields fall back to "unknown"; id and timestamp
    /// are placeholders until the recorder assigns them on append.
    pub fn build(self) -> AuditEntry {
        AuditEntry {
            id: String::new(),
            timestamp: Utc::now(),
            actor_id: self.actor_id.unwrap_or_else(|| "unknown".to_string()),
            actor_name: self.actor_name.unwrap_or_else(|| "unknown".to_string()),
            action: self.action,
            entity_kind: self.entity_kind,
            entity_id: self.entity_id.unwrap_or_else(|| "unknown".to_string()),
            entity_name: self.entity_name.unwrap_or_else(|| "unknown".to_string()),
            before: self.before,
            after: self.after,
            reason: self.reason,
        }
    }

    /// Build and append the entry
    pub fn record(self) -> Result<AuditEntry, DomainError> {
        let recorder = Arc::clone(&self.recorder);
        let entry = self.build();
        recorder.append(entry)
    }
}
