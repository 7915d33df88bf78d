//! Permission evaluation.
//!
//! An [`Ability`] is a flattened, set-based view of one role's grants,
//! built once from the role's denormalized permission keys and answering
//! `can` checks by hash lookup. The [`AbilityEngine`] caches abilities per
//! role, keyed on the role's `updated_at` stamp, so a role whose grants
//! change gets a fresh ability on the next check without any explicit
//! invalidation call.

pub mod guard;

pub use guard::PermissionGate;

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use crate::errors::DomainError;
use crate::stores::entity_store::EntityStore;
use crate::types::entities::{Action, Role};

/// One role's effective grants, flattened for O(1) checks
///
/// Admin roles bypass key lookups entirely. Wildcards are honored on
/// either axis: `all.<action>` grants the action on every subject and
/// `<subject>.all` grants every action on the subject, unconditionally.
#[derive(Debug, Clone)]
pub struct Ability {
    is_admin: bool,
    keys: HashSet<String>,
}

impl Ability {
    /// Build the ability of a role
    ///
    /// Inactive roles grant nothing, admin flag included.
    pub fn from_role(role: &Role) -> Self {
        if !role.is_active {
            return Self {
                is_admin: false,
                keys: HashSet::new(),
            };
        }
        Self {
            is_admin: role.is_admin,
            keys: role.permission_keys.iter().cloned().collect(),
        }
    }

    /// An ability with no grants at all
    pub fn none() -> Self {
        Self {
            is_admin: false,
            keys: HashSet::new(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.is_admin
    }

    /// Whether the role may perform `action` on `subject`
    pub fn can(&self, action: Action, subject: &str) -> bool {
        if self.is_admin {
            return true;
        }
        self.keys.contains(&format!("{subject}.{action}"))
            || self.keys.contains(&format!("all.{action}"))
            || self.keys.contains(&format!("{subject}.all"))
    }

    /// Check a `<subject>.<action>` key
    ///
    /// The split is on the last dot, so dotted subjects work; a key
    /// without a dot never matches.
    pub fn can_key(&self, key: &str) -> bool {
        if self.is_admin {
            return true;
        }
        let Some((subject, action)) = key.rsplit_once('.') else {
            return false;
        };
        self.keys.contains(key)
            || self.keys.contains(&format!("all.{action}"))
            || self.keys.contains(&format!("{subject}.all"))
    }

    /// True when every key is granted; vacuously true for an empty list
    pub fn can_all<'a>(&self, keys: impl IntoIterator<Item = &'a str>) -> bool {
        keys.into_iter().all(|k| self.can_key(k))
    }

    /// True when at least one key is granted; false for an empty list
    pub fn can_any<'a>(&self, keys: impl IntoIterator<Item = &'a str>) -> bool {
        keys.into_iter().any(|k| self.can_key(k))
    }
}

/// Builds and caches per-role abilities on top of the entity store
pub struct AbilityEngine {
    store: Arc<EntityStore>,
    cache: RwLock<HashMap<String, (DateTime<Utc>, Arc<Ability>)>>,
}

impl AbilityEngine {
    pub fn new(store: Arc<EntityStore>) -> Self {
        Self {
            store,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// The ability of a role, from cache when its stamp still matches
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` for an unknown role id.
    pub fn ability_for_role(&self, role_id: &str) -> Result<Arc<Ability>, DomainError> {
        let role = self.store.get_role(role_id)?;
        {
            let cache = self.cache.read().expect("ability cache lock poisoned");
            if let Some((stamp, ability)) = cache.get(&role.id) {
                if *stamp == role.updated_at {
                    return Ok(Arc::clone(ability));
                }
            }
        }
        let ability = Arc::new(Ability::from_role(&role));
        tracing::debug!(role_id = %role.id, key = %role.key, "ability rebuilt");
        self.cache
            .write()
            .expect("ability cache lock poisoned")
            .insert(role.id, (role.updated_at, Arc::clone(&ability)));
        Ok(ability)
    }

    /// The ability of a user, through the user's (possibly legacy) role id
    pub fn ability_for_user(&self, user_id: &str) -> Result<Arc<Ability>, DomainError> {
        let role = self.store.role_for_user(user_id)?;
        self.ability_for_role(&role.id)
    }

    /// Drop every cached ability
    pub fn clear(&self) {
        self.cache
            .write()
            .expect("ability cache lock poisoned")
            .clear();
    }
}
