use oficina_auth::{Principal, Role};
use oficina_core::UserId;

/// Authenticated identity for a request, taken from the bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    user_id: UserId,
    name: String,
    roles: Vec<Role>,
}

impl PrincipalContext {
    pub fn new(user_id: UserId, name: String, roles: Vec<Role>) -> Self {
        Self { user_id, name, roles }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn principal(&self) -> Principal {
        Principal::from_roles(self.user_id, self.roles.clone())
    }
}
