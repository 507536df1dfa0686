//! Permission rules for book entity operations.

use crate::access::account::AccountProxy;
use serde::{Deserialize, Serialize};

/// Permission to view published entities.
pub const PERMISSION_VIEW_PUBLISHED: &str = "view published book entity entities";
/// Permission to view unpublished entities.
pub const PERMISSION_VIEW_UNPUBLISHED: &str = "view unpublished book entity entities";
/// Permission to edit entities.
pub const PERMISSION_EDIT: &str = "edit book entity entities";
/// Permission to delete entities.
pub const PERMISSION_DELETE: &str = "delete book entity entities";
/// Permission to create entities of any bundle.
pub const PERMISSION_ADD: &str = "add book entity entities";
/// Permission to revert any revision.
pub const PERMISSION_REVERT_ALL_REVISIONS: &str = "revert all book entity revisions";
/// Permission to delete any non-default revision.
pub const PERMISSION_DELETE_ALL_REVISIONS: &str = "delete all book entity revisions";
/// Administrative permission; implies revision revert/delete.
pub const PERMISSION_ADMINISTER: &str = "administer book entity entities";

/// Operation string for viewing.
pub const OPERATION_VIEW: &str = "view";
/// Operation string for updating.
pub const OPERATION_UPDATE: &str = "update";
/// Operation string for deleting.
pub const OPERATION_DELETE: &str = "delete";
/// Operation string for creating.
pub const OPERATION_CREATE: &str = "create";
/// Operation string for reverting a revision.
pub const OPERATION_REVERT_REVISION: &str = "revert-revision";
/// Operation string for deleting a revision.
pub const OPERATION_DELETE_REVISION: &str = "delete-revision";

/// Operation an account wants to perform on a book entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    View,
    Update,
    Delete,
    /// Creation is checked against the target bundle.
    Create { bundle: String },
    RevertRevision,
    DeleteRevision,
    /// Any operation this evaluator has no rule for.
    Other(String),
}

impl Operation {
    /// Parses an operation string. Unknown values map to `Other`.
    ///
    /// `create` parses with an empty bundle; use `Operation::Create`
    /// directly when the bundle is known.
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            OPERATION_VIEW => Self::View,
            OPERATION_UPDATE => Self::Update,
            OPERATION_DELETE => Self::Delete,
            OPERATION_CREATE => Self::Create {
                bundle: String::new(),
            },
            OPERATION_REVERT_REVISION => Self::RevertRevision,
            OPERATION_DELETE_REVISION => Self::DeleteRevision,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::View => OPERATION_VIEW,
            Self::Update => OPERATION_UPDATE,
            Self::Delete => OPERATION_DELETE,
            Self::Create { .. } => OPERATION_CREATE,
            Self::RevertRevision => OPERATION_REVERT_REVISION,
            Self::DeleteRevision => OPERATION_DELETE_REVISION,
            Self::Other(value) => value.as_str(),
        }
    }
}

/// Outcome of one access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessResult {
    Allow,
    Deny,
    /// No rule applies; the caller's broader policy decides.
    Neutral,
}

impl AccessResult {
    /// Allows when the account holds `permission`, denies otherwise.
    pub fn allowed_if_has_permission(account: &dyn AccountProxy, permission: &str) -> Self {
        Self::allowed_if_has_any_permission(account, &[permission])
    }

    /// Allows when the account holds at least one of `permissions`.
    pub fn allowed_if_has_any_permission(account: &dyn AccountProxy, permissions: &[&str]) -> Self {
        if permissions
            .iter()
            .any(|permission| account.has_permission(permission))
        {
            Self::Allow
        } else {
            Self::Deny
        }
    }

    pub fn is_allowed(self) -> bool {
        self == Self::Allow
    }

    pub fn is_denied(self) -> bool {
        self == Self::Deny
    }

    pub fn is_neutral(self) -> bool {
        self == Self::Neutral
    }
}

/// Decides whether `account` may perform `operation`.
///
/// `is_published` only matters for `View`.
pub fn decide(
    operation: &Operation,
    is_published: bool,
    account: &dyn AccountProxy,
) -> AccessResult {
    match operation {
        Operation::View if is_published => {
            AccessResult::allowed_if_has_permission(account, PERMISSION_VIEW_PUBLISHED)
        }
        Operation::View => {
            AccessResult::allowed_if_has_permission(account, PERMISSION_VIEW_UNPUBLISHED)
        }
        Operation::Update => AccessResult::allowed_if_has_permission(account, PERMISSION_EDIT),
        Operation::Delete => AccessResult::allowed_if_has_permission(account, PERMISSION_DELETE),
        Operation::Create { .. } => {
            AccessResult::allowed_if_has_permission(account, PERMISSION_ADD)
        }
        Operation::RevertRevision => AccessResult::allowed_if_has_any_permission(
            account,
            &[PERMISSION_REVERT_ALL_REVISIONS, PERMISSION_ADMINISTER],
        ),
        Operation::DeleteRevision => AccessResult::allowed_if_has_any_permission(
            account,
            &[PERMISSION_DELETE_ALL_REVISIONS, PERMISSION_ADMINISTER],
        ),
        Operation::Other(_) => AccessResult::Neutral,
    }
}
