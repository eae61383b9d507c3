use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission name, e.g. `"estoque.movimentar"`. `"*"` grants everything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const ALL: Permission = Permission(Cow::Borrowed("*"));
    pub const PARTS_READ: Permission = Permission(Cow::Borrowed("pecas.read"));
    pub const PARTS_WRITE: Permission = Permission(Cow::Borrowed("pecas.write"));
    pub const STOCK_MOVE: Permission = Permission(Cow::Borrowed("estoque.movimentar"));
    pub const CATEGORIES_READ: Permission = Permission(Cow::Borrowed("categorias.read"));
    pub const CATEGORIES_WRITE: Permission = Permission(Cow::Borrowed("categorias.write"));
    pub const WORK_ORDERS_READ: Permission = Permission(Cow::Borrowed("os.read"));
    pub const WORK_ORDERS_WRITE: Permission = Permission(Cow::Borrowed("os.write"));
    pub const USERS_ADMIN: Permission = Permission(Cow::Borrowed("usuarios.admin"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
