use crate::ability::Ability;
use crate::errors::DomainError;

/// Declarative guard over a set of permission keys
///
/// Built once (e.g. per route or per command) and checked against an
/// ability at call time. `require_all` passes only when every key is
/// granted, `require_any` when at least one is. An empty `require_all`
/// gate always passes; an empty `require_any` gate never does.
#[derive(Debug, Clone)]
pub struct PermissionGate {
    keys: Vec<String>,
    mode: GateMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateMode {
    All,
    Any,
}

impl PermissionGate {
    pub fn require_all<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            mode: GateMode::All,
        }
    }

    pub fn require_any<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            mode: GateMode::Any,
        }
    }

    pub fn allows(&self, ability: &Ability) -> bool {
        match self.mode {
            GateMode::All => ability.can_all(self.keys.iter().map(String::as_str)),
            GateMode::Any => ability.can_any(self.keys.iter().map(String::as_str)),
        }
    }

    /// `allows` as a `Result`, for use at the top of guarded operations
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` naming the required keys when the
    /// ability does not satisfy the gate.
    pub fn check(&self, ability: &Ability) -> Result<(), DomainError> {
        if self.allows(ability) {
            return Ok(());
        }
        let joiner = match self.mode {
            GateMode::All => "all of",
            GateMode::Any => "any of",
        };
        Err(DomainError::validation(format!(
            "permission denied: requires {} [{}]",
            joiner,
            self.keys.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ability(keys: &[&str]) -> Ability {
        use crate::types::entities::Role;
        use chrono::Utc;

        let now = Utc::now();
        Ability::from_role(&Role {
            id: "r1".to_string(),
            name: "Test".to_string(),
            key: "test".to_string(),
            description: String::new(),
            is_admin: false,
            is_active: true,
            is_system: false,
            created_at: now,
            updated_at: now,
            permission_keys: keys.iter().map(ToString::to_string).collect(),
        })
    }

    #[test]
    fn require_all_needs_every_key() {
        let gate = PermissionGate::require_all(["widgets.read", "widgets.update"]);
        assert!(gate.allows(&ability(&["widgets.read", "widgets.update"])));
        assert!(!gate.allows(&ability(&["widgets.read"])));
    }

    #[test]
    fn require_any_needs_one_key() {
        let gate = PermissionGate::require_any(["widgets.read", "widgets.update"]);
        assert!(gate.allows(&ability(&["widgets.update"])));
        assert!(!gate.allows(&ability(&["gadgets.read"])));
    }

    #[test]
    fn empty_gate_semantics() {
        let none = ability(&[]);
        assert!(PermissionGate::require_all(Vec::<String>::new()).allows(&none));
        assert!(!PermissionGate::require_any(Vec::<String>::new()).allows(&none));
    }

    #[test]
    fn check_names_the_missing_keys() {
        let gate = PermissionGate::require_all(["widgets.delete"]);
        let err = gate.check(&ability(&[])).unwrap_err();
        assert!(err.to_string().contains("widgets.delete"));
    }
}
