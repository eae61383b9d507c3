//! Permission checks at the route boundary, before anything is dispatched.

use axum::http::StatusCode;
use axum::response::Response;

use oficina_auth::{Permission, authorize};

use crate::app::errors;
use crate::context::PrincipalContext;

pub fn require(principal: &PrincipalContext, permission: &Permission) -> Result<(), Response> {
    authorize(&principal.principal(), permission)
        .map_err(|e| errors::json_error(StatusCode::FORBIDDEN, "acesso_negado", e.to_string()))
}
