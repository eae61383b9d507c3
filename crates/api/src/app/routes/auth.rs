use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::app::services::{AppServices, LoginError};
use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::LoginRequest>, JsonRejection>,
) -> Result<Response, Response> {
    let Json(body) = body.map_err(errors::rejection_to_response)?;

    let outcome = services.login(&body.email, &body.senha).map_err(|e| match e {
        LoginError::InvalidCredentials => {
            errors::json_error(StatusCode::UNAUTHORIZED, "credenciais_invalidas", e.to_string())
        }
        LoginError::Suspended => errors::json_error(StatusCode::FORBIDDEN, "usuario_suspenso", e.to_string()),
        LoginError::Token(inner) => {
            error!(error = %inner, "token issue failed");
            errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "erro_interno", "erro interno do servidor")
        }
    })?;

    Ok(Json(dto::success(
        "Login realizado com sucesso",
        serde_json::json!({
            "token": outcome.token,
            "expira_em": outcome.expires_at,
            "usuario": dto::user_to_json(&outcome.user),
        }),
    ))
    .into_response())
}

pub async fn me(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Result<Response, Response> {
    let user = services
        .user(&principal.user_id())
        .ok_or_else(|| errors::json_error(StatusCode::NOT_FOUND, "nao_encontrado", "usuário não encontrado"))?;
    Ok(Json(dto::user_to_json(&user)).into_response())
}

pub async fn change_password(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::ChangePasswordRequest>, JsonRejection>,
) -> Result<Response, Response> {
    let Json(body) = body.map_err(errors::rejection_to_response)?;

    services
        .change_password(principal.user_id(), body.senha_atual.as_deref(), &body.nova_senha)
        .map_err(errors::dispatch_error_to_response)?;

    Ok(Json(serde_json::json!({
        "sucesso": true,
        "mensagem": "Senha alterada com sucesso",
    }))
    .into_response())
}
