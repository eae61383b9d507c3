use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};

use oficina_auth::{Permission, Role};
use oficina_core::UserId;

use crate::app::services::{AppServices, NewUser};
use crate::app::{dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/:id/suspender", post(suspend_user))
        .route("/:id/ativar", post(activate_user))
}

fn path_user_id(raw: &str) -> Result<UserId, Response> {
    raw.parse().map_err(|_| errors::bad_request("id de usuário inválido"))
}

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Result<Response, Response> {
    authz::require(&principal, &Permission::USERS_ADMIN)?;
    let users: Vec<_> = services.list_users().iter().map(dto::user_to_json).collect();
    Ok(Json(serde_json::json!({ "usuarios": users })).into_response())
}

pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::CreateUserRequest>, JsonRejection>,
) -> Result<Response, Response> {
    authz::require(&principal, &Permission::USERS_ADMIN)?;
    let Json(body) = body.map_err(errors::rejection_to_response)?;
    let role = Role::parse(&body.perfil)
        .ok_or_else(|| errors::bad_request(format!("perfil desconhecido: {}", body.perfil)))?;

    let user = services
        .create_user(NewUser {
            email: body.email,
            display_name: body.nome,
            role,
            password: body.senha,
        })
        .map_err(errors::dispatch_error_to_response)?;

    Ok((
        StatusCode::CREATED,
        Json(dto::success("Usuário cadastrado com sucesso", dto::user_to_json(&user))),
    )
        .into_response())
}

pub async fn suspend_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Option<Json<dto::SuspendUserRequest>>,
) -> Result<Response, Response> {
    authz::require(&principal, &Permission::USERS_ADMIN)?;
    let user_id = path_user_id(&id)?;
    let reason = body.and_then(|Json(b)| b.motivo).unwrap_or_default();

    let user = services
        .suspend_user(principal.user_id(), user_id, reason)
        .map_err(errors::dispatch_error_to_response)?;
    Ok(Json(dto::success("Usuário suspenso", dto::user_to_json(&user))).into_response())
}

pub async fn activate_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Response, Response> {
    authz::require(&principal, &Permission::USERS_ADMIN)?;
    let user_id = path_user_id(&id)?;

    let user = services
        .activate_user(user_id)
        .map_err(errors::dispatch_error_to_response)?;
    Ok(Json(dto::success("Usuário reativado", dto::user_to_json(&user))).into_response())
}
