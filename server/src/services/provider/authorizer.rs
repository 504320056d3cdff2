mod authz_db;

pub use self::authz_db::Role;
use self::authz_db::{AuthzDb, Permission};
use super::UserId;
use crate::config::UserConfig;

/// What a caller is trying to do to a streaming job.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
}

impl Action {
    fn required_permission(self) -> Permission {
        match self {
            Action::Create | Action::Update | Action::Delete => Permission::Apply,
            Action::Read => Permission::Refresh,
        }
    }
}

pub struct Authorizer {
    authz_db: AuthzDb, // immutable, loaded from the server config
}

impl Authorizer {
    pub fn new(users: &[UserConfig]) -> Self {
        Self {
            authz_db: AuthzDb::from_users(users),
        }
    }

    pub fn is_authorized(&self, user_id: &UserId, action: Action) -> bool {
        // unknown users fall through to false; don't distinguish them from denied ones
        self.authz_db
            .has_permission(user_id, action.required_permission())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authorizer() -> Authorizer {
        Authorizer::new(&[
            UserConfig {
                name: "alice".into(),
                roles: vec![Role::Operator],
            },
            UserConfig {
                name: "bob".into(),
                roles: vec![Role::Auditor],
            },
        ])
    }

    #[test]
    fn operator_can_do_everything() {
        let authorizer = authorizer();
        let alice = "alice".to_string();
        for action in [Action::Create, Action::Read, Action::Update, Action::Delete] {
            assert!(authorizer.is_authorized(&alice, action), "{:?}", action);
        }
    }

    #[test]
    fn auditor_can_only_read() {
        let authorizer = authorizer();
        let bob = "bob".to_string();
        assert!(authorizer.is_authorized(&bob, Action::Read));
        assert!(!authorizer.is_authorized(&bob, Action::Create));
        assert!(!authorizer.is_authorized(&bob, Action::Update));
        assert!(!authorizer.is_authorized(&bob, Action::Delete));
    }

    #[test]
    fn unknown_user_is_denied() {
        let authorizer = authorizer();
        assert!(!authorizer.is_authorized(&"eve".to_string(), Action::Read));
    }
}
