//! Current-account abstraction.

use crate::model::book::{UserId, ANONYMOUS_USER_ID};
use std::collections::BTreeSet;

/// Account on whose behalf an operation runs.
pub trait AccountProxy {
    fn id(&self) -> UserId;
    fn has_permission(&self, permission: &str) -> bool;
}

/// In-memory account with a fixed permission set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticAccount {
    id: UserId,
    permissions: BTreeSet<String>,
}

impl StaticAccount {
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            permissions: BTreeSet::new(),
        }
    }

    /// Anonymous account without permissions.
    pub fn anonymous() -> Self {
        Self::new(ANONYMOUS_USER_ID)
    }

    pub fn with_permissions<I, S>(id: UserId, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id,
            permissions: permissions.into_iter().map(Into::into).collect(),
        }
    }

    pub fn grant(&mut self, permission: impl Into<String>) {
        self.permissions.insert(permission.into());
    }

    pub fn revoke(&mut self, permission: &str) {
        self.permissions.remove(permission);
    }
}

impl AccountProxy for StaticAccount {
    fn id(&self) -> UserId {
        self.id
    }

    fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}
