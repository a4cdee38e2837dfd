//! Role checks for the exposed operations. The caller identity and role
//! arrive from the (out-of-scope) transport layer; this module only
//! decides whether a role may perform an operation.

use serde::{Deserialize, Serialize};

use crate::domain::{InventoryOpsError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Finance,
    Ops,
    ReadOnly,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Finance => "finance",
            Role::Ops => "ops",
            Role::ReadOnly => "readonly",
        }
    }
}

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self { id: id.into(), role }
    }
}

/// Pluggable authorization capability. The default matrix covers the
/// core's four operations classes; deployments with richer RBAC supply
/// their own impl.
pub trait AuthZ: Send + Sync {
    fn require_role(&self, actor: &Actor, allowed: &[Role]) -> Result<()>;
}

pub type SharedAuthZ = std::sync::Arc<dyn AuthZ>;

/// Static role matrix.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoleMatrix;

impl AuthZ for RoleMatrix {
    fn require_role(&self, actor: &Actor, allowed: &[Role]) -> Result<()> {
        if allowed.contains(&actor.role) {
            Ok(())
        } else {
            Err(InventoryOpsError::Forbidden(format!(
                "role {} may not perform this operation",
                actor.role.as_str()
            )))
        }
    }
}

/// Roles that may generate forecasts and decide runs.
pub const FORECAST_ROLES: &[Role] = &[Role::Finance, Role::Owner];
/// Roles that may submit feedback.
pub const FEEDBACK_ROLES: &[Role] = &[Role::Finance, Role::Ops, Role::Owner];
/// Roles that may read state, accuracy, and history.
pub const VIEW_ROLES: &[Role] = &[Role::Owner, Role::Finance, Role::Ops, Role::ReadOnly];
