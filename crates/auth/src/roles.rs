use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::Permission;

/// Role name carried in tokens and stored on users.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub const KNOWN: [&'static str; 3] = ["admin", "gerente", "mecanico"];

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn admin() -> Self {
        Self(Cow::Borrowed("admin"))
    }

    pub fn manager() -> Self {
        Self(Cow::Borrowed("gerente"))
    }

    pub fn mechanic() -> Self {
        Self(Cow::Borrowed("mecanico"))
    }

    /// One of the built-in roles, matched case-insensitively.
    pub fn parse(name: &str) -> Option<Self> {
        let lowered = name.trim().to_lowercase();
        Self::KNOWN
            .iter()
            .find(|known| **known == lowered)
            .map(|known| Self(Cow::Borrowed(*known)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_known(&self) -> bool {
        Self::KNOWN.contains(&self.as_str())
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Built-in role → permission mapping. Unknown roles grant nothing.
pub fn role_permissions(role: &Role) -> Vec<Permission> {
    match role.as_str() {
        "admin" => vec![Permission::ALL],
        "gerente" => vec![
            Permission::PARTS_READ,
            Permission::PARTS_WRITE,
            Permission::STOCK_MOVE,
            Permission::CATEGORIES_READ,
            Permission::CATEGORIES_WRITE,
            Permission::WORK_ORDERS_READ,
            Permission::WORK_ORDERS_WRITE,
        ],
        "mecanico" => vec![
            Permission::PARTS_READ,
            Permission::STOCK_MOVE,
            Permission::CATEGORIES_READ,
            Permission::WORK_ORDERS_READ,
        ],
        _ => Vec::new(),
    }
}
