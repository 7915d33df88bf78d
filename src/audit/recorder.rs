use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::audit::AuditEntryBuilder;
use crate::errors::DomainError;
use crate::stores::persistence::{self, Collection, PersistenceAdapter};
use crate::types::internal::{AuditAction, AuditEntry, EntityKind};

/// Filter over the audit log
///
/// All criteria are optional and combined with AND. Time-window helpers
/// (`last_hours`, `last_days`) are relative to the moment the filter is
/// built.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub action: Option<AuditAction>,
    pub entity_kind: Option<EntityKind>,
    pub actor_id: Option<String>,
}

impl AuditFilter {
    /// Match every entry
    pub fn all() -> Self {
        Self::default()
    }

    /// Entries from the last `hours` hours
    pub fn last_hours(hours: i64) -> Self {
        Self {
            from: Some(Utc::now() - Duration::hours(hours)),
            ..Self::default()
        }
    }

    /// Entries from the last `days` days
    pub fn last_days(days: i64) -> Self {
        Self {
            from: Some(Utc::now() - Duration::days(days)),
            ..Self::default()
        }
    }

    pub fn with_action(mut self, action: AuditAction) -> Self {
        self.action = Some(action);
        self
    }

    pub fn with_entity_kind(mut self, kind: EntityKind) -> Self {
        self.entity_kind = Some(kind);
        self
    }

    pub fn with_actor(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }

    fn matches(&self, entry: &AuditEntry) -> bool {
        if self.from.is_some_and(|from| entry.timestamp < from) {
            return false;
        }
        if self.to.is_some_and(|to| entry.timestamp > to) {
            return false;
        }
        if self.action.as_ref().is_some_and(|a| entry.action != *a) {
            return false;
        }
        if self.entity_kind.is_some_and(|k| entry.entity_kind != k) {
            return false;
        }
        if self
            .actor_id
            .as_deref()
            .is_some_and(|id| entry.actor_id != id)
        {
            return false;
        }
        true
    }
}

/// Append-only recorder for committed mutations
///
/// Every successful entity store mutation appends exactly one entry here.
/// Appends persist the whole log through the adapter; a flush failure undoes
/// the in-memory append and surfaces the error, which aborts the
/// encompassing mutation.
pub struct AuditRecorder {
    entries: RwLock<Vec<AuditEntry>>,
    persistence: Arc<dyn PersistenceAdapter>,
}

impl AuditRecorder {
    /// Load the persisted log (chronological order is the stored order)
    pub fn load(persistence: Arc<dyn PersistenceAdapter>) -> Result<Self, DomainError> {
        let entries: Vec<AuditEntry> =
            persistence::load_collection(persistence.as_ref(), Collection::AuditLog)?;
        tracing::debug!(entries = entries.len(), "audit log loaded");
        Ok(Self {
            entries: RwLock::new(entries),
            persistence,
        })
    }

    /// Start a fluent builder for a new entry
    pub fn builder(self: &Arc<Self>, action: AuditAction, entity_kind: EntityKind) -> AuditEntryBuilder {
        AuditEntryBuilder::new(Arc::clone(self), action, entity_kind)
    }

    /// Append one entry, assigning its id and timestamp
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Persistence` when the flush fails; the log is
    /// left exactly as before the call.
    pub fn append(&self, mut entry: AuditEntry) -> Result<AuditEntry, DomainError> {
        entry.id = Uuid::new_v4().to_string();
        entry.timestamp = Utc::now();

        let mut entries = self.entries.write().expect("audit log lock poisoned");
        entries.push(entry.clone());
        if let Err(err) =
            persistence::save_collection(self.persistence.as_ref(), Collection::AuditLog, &entries)
        {
            entries.pop();
            tracing::error!(error = %err, "audit flush failed, append aborted");
            return Err(err);
        }
        tracing::debug!(
            action = %entry.action,
            entity = %entry.entity_kind,
            entity_id = %entry.entity_id,
            "audit entry appended"
        );
        Ok(entry)
    }

    /// Entries matching the filter, in chronological order
    pub fn query(&self, filter: &AuditFilter) -> Vec<AuditEntry> {
        self.entries
            .read()
            .expect("audit log lock poisoned")
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect()
    }

    /// Count matching entries per action kind
    ///
    /// A read-only projection over `query` results, not a stored structure.
    pub fn counts_by_action(&self, filter: &AuditFilter) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for entry in self.query(filter) {
            *counts.entry(entry.action.as_str().to_string()).or_insert(0) += 1;
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("audit log lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serialize entries to CSV, preserving the given (chronological) order
    ///
    /// Includes every stored field plus the human-readable change summary.
    pub fn export_csv(entries: &[AuditEntry]) -> String {
        let mut out = String::from(
            "id,timestamp,actor_id,actor_name,action,entity_type,entity_id,entity_name,before,after,reason,summary\n",
        );
        for entry in entries {
            let row = [
                entry.id.clone(),
                entry.timestamp.to_rfc3339(),
                entry.actor_id.clone(),
                entry.actor_name.clone(),
                entry.action.as_str().to_string(),
                entry.entity_kind.as_str().to_string(),
                entry.entity_id.clone(),
                entry.entity_name.clone(),
                entry.before.as_ref().map(ToString::to_string).unwrap_or_default(),
                entry.after.as_ref().map(ToString::to_string).unwrap_or_default(),
                entry.reason.clone().unwrap_or_default(),
                entry.summary(),
            ];
            let escaped: Vec<String> = row.iter().map(|f| csv_escape(f)).collect();
            out.push_str(&escaped.join(","));
            out.push('\n');
        }
        out
    }

    /// Export the filtered log to a CSV file, returning the entry count
    pub fn export_to_file(
        &self,
        path: impl AsRef<Path>,
        filter: &AuditFilter,
    ) -> Result<usize, DomainError> {
        let entries = self.query(filter);
        let csv = Self::export_csv(&entries);
        std::fs::write(path.as_ref(), csv).map_err(|e| {
            DomainError::persistence("save", path.as_ref().display().to_string(), e.to_string())
        })?;
        tracing::info!(
            path = %path.as_ref().display(),
            entries = entries.len(),
            "audit log exported"
        );
        Ok(entries.len())
    }
}

/// Quote a CSV field when it contains a delimiter, quote, or newline
fn csv_escape(field: &str) -> String {
    if field.contains(['"', ',', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::MemoryAdapter;
    use serde_json::json;

    fn recorder() -> Arc<AuditRecorder> {
        Arc::new(AuditRecorder::load(Arc::new(MemoryAdapter::new())).unwrap())
    }

    fn draft(action: AuditAction, actor: &str) -> AuditEntry {
        AuditEntry {
            id: String::new(),
            timestamp: Utc::now(),
            actor_id: actor.to_string(),
            actor_name: actor.to_string(),
            action,
            entity_kind: EntityKind::Role,
            entity_id: "r1".to_string(),
            entity_name: "editors".to_string(),
            before: None,
            after: None,
            reason: None,
        }
    }

    #[test]
    fn append_assigns_id_and_timestamp() {
        let recorder = recorder();
        let entry = recorder.append(draft(AuditAction::Create, "u1")).unwrap();
        assert!(!entry.id.is_empty());
        assert_eq!(recorder.len(), 1);
    }

    #[test]
    fn failed_flush_leaves_log_untouched() {
        let adapter = Arc::new(MemoryAdapter::new());
        let recorder = AuditRecorder::load(Arc::clone(&adapter) as Arc<dyn PersistenceAdapter>)
            .map(Arc::new)
            .unwrap();
        recorder.append(draft(AuditAction::Create, "u1")).unwrap();

        adapter.set_fail_saves(true);
        let err = recorder.append(draft(AuditAction::Delete, "u1")).unwrap_err();
        assert!(matches!(err, DomainError::Persistence { .. }));
        assert_eq!(recorder.len(), 1);
        assert_eq!(adapter.saved_len(Collection::AuditLog), 1);
    }

    #[test]
    fn query_filters_by_action_and_actor() {
        let recorder = recorder();
        recorder.append(draft(AuditAction::Create, "u1")).unwrap();
        recorder.append(draft(AuditAction::Delete, "u1")).unwrap();
        recorder.append(draft(AuditAction::Delete, "u2")).unwrap();

        let deletes = recorder.query(&AuditFilter::all().with_action(AuditAction::Delete));
        assert_eq!(deletes.len(), 2);

        let by_u2 = recorder.query(&AuditFilter::all().with_actor("u2"));
        assert_eq!(by_u2.len(), 1);

        let counts = recorder.counts_by_action(&AuditFilter::all());
        assert_eq!(counts.get("create"), Some(&1));
        assert_eq!(counts.get("delete"), Some(&2));
    }

    #[test]
    fn time_window_filters_exclude_old_entries() {
        let recorder = recorder();
        recorder.append(draft(AuditAction::Create, "u1")).unwrap();

        assert_eq!(recorder.query(&AuditFilter::last_hours(1)).len(), 1);
        let future = AuditFilter {
            from: Some(Utc::now() + Duration::hours(1)),
            ..AuditFilter::default()
        };
        assert!(recorder.query(&future).is_empty());
    }

    #[test]
    fn csv_export_preserves_order_and_escapes() {
        let recorder = recorder();
        let mut entry = draft(AuditAction::Create, "u1");
        entry.entity_name = "name, with \"quotes\"".to_string();
        entry.after = Some(json!({"key": "value"}));
        recorder.append(entry).unwrap();
        recorder.append(draft(AuditAction::Delete, "u2")).unwrap();

        let csv = AuditRecorder::export_csv(&recorder.query(&AuditFilter::all()));
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("id,timestamp,actor_id"));
        assert!(lines[1].contains("\"name, with \"\"quotes\"\"\""));
        assert!(lines[1].contains("\"{\"\"key\"\":\"\"value\"\"}\""));
        assert!(lines[2].contains("delete"));
    }
}
