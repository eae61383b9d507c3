use std::collections::HashSet;

use thiserror::Error;

use oficina_core::UserId;

use crate::{Permission, Role, role_permissions};

/// An authenticated user with permissions resolved from their roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub roles: Vec<Role>,
    pub permissions: HashSet<Permission>,
}

impl Principal {
    pub fn from_roles(user_id: UserId, roles: Vec<Role>) -> Self {
        let permissions = roles.iter().flat_map(role_permissions).collect();
        Self {
            user_id,
            roles,
            permissions,
        }
    }

    pub fn has_role(&self, role: &Role) -> bool {
        self.roles.contains(role)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Pure policy check: wildcard or the exact permission.
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    if principal.permissions.contains(&Permission::ALL) || principal.permissions.contains(required) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_wildcard_allows_everything() {
        let admin = Principal::from_roles(UserId::new(), vec![Role::admin()]);
        assert!(authorize(&admin, &Permission::USERS_ADMIN).is_ok());
        assert!(authorize(&admin, &Permission::new("qualquer.coisa")).is_ok());
    }

    #[test]
    fn mechanic_is_forbidden_from_catalog_writes() {
        let mechanic = Principal::from_roles(UserId::new(), vec![Role::mechanic()]);
        assert!(authorize(&mechanic, &Permission::STOCK_MOVE).is_ok());
        assert_eq!(
            authorize(&mechanic, &Permission::PARTS_WRITE),
            Err(AuthzError::Forbidden("pecas.write".to_string()))
        );
    }

    #[test]
    fn permissions_union_across_roles() {
        let both = Principal::from_roles(UserId::new(), vec![Role::mechanic(), Role::manager()]);
        assert!(authorize(&both, &Permission::WORK_ORDERS_WRITE).is_ok());
        assert!(authorize(&both, &Permission::USERS_ADMIN).is_err());
    }
}
