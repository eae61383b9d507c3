use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info};

use oficina_auth::JwtValidator;
use oficina_infra::projections::Users;

use crate::app::errors;
use crate::context::PrincipalContext;

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
    pub users: Arc<Users>,
}

/// Validates the bearer token and refuses tokens of unknown or suspended users.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let token = extract_bearer(req.headers()).ok_or_else(|| unauthenticated("token ausente"))?;

    let claims = state.jwt.validate(token, Utc::now()).map_err(|e| {
        debug!(error = %e, "rejected bearer token");
        unauthenticated("sessão inválida ou expirada")
    })?;

    match state.users.get(&claims.sub) {
        Some(user) if user.is_active() => {}
        Some(_) => return Err(unauthenticated("usuário suspenso")),
        None => return Err(unauthenticated("usuário não encontrado")),
    }

    req.extensions_mut()
        .insert(PrincipalContext::new(claims.sub, claims.name, claims.roles));

    Ok(next.run(req).await)
}

/// One log line per request with method, path, status and latency.
pub async fn log_requests(req: axum::http::Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(req).await;

    info!(
        %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request"
    );
    response
}

fn unauthenticated(message: &str) -> Response {
    errors::json_error(StatusCode::UNAUTHORIZED, "nao_autenticado", message)
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}
