use super::UserId;
use crate::config::UserConfig;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};

/// In-memory authorization database: user -> roles, role -> permissions.
#[derive(Clone)]
pub struct AuthzDb {
    user_roles: HashMap<UserId, HashSet<Role>>,
}

#[derive(Hash, PartialEq, Eq, PartialOrd, Ord, Copy, Clone, Debug)]
pub enum Permission {
    /// create, update or delete jobs
    Apply,
    /// read remote job state
    Refresh,
}

#[derive(Hash, PartialEq, Eq, PartialOrd, Ord, Copy, Clone, Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Operator,
    Auditor,
}

impl Role {
    fn grants(self, permission: Permission) -> bool {
        match self {
            Role::Operator => true,
            Role::Auditor => permission == Permission::Refresh,
        }
    }
}

impl AuthzDb {
    pub fn from_users(users: &[UserConfig]) -> Self {
        let mut user_roles: HashMap<UserId, HashSet<Role>> = HashMap::new();
        for user in users {
            user_roles
                .entry(user.name.clone())
                .or_default()
                .extend(user.roles.iter().copied());
        }
        Self { user_roles }
    }

    pub fn has_permission(&self, user_id: &UserId, permission: Permission) -> bool {
        self.user_roles
            .get(user_id)
            .map(|roles| roles.iter().any(|role| role.grants(permission)))
            .unwrap_or(false)
    }
}
