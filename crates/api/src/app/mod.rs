//! Axum router and service wiring.
//!
//! - `services.rs`: store, bus, read models, worker and the operations the routes call
//! - `routes/`: one file per resource
//! - `dto.rs`: request bodies and JSON mapping (wire fields are Portuguese)
//! - `errors.rs`: the shared `{sucesso: false, erro, codigo}` error body

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use oficina_auth::Hs256JwtValidator;

use crate::config::ApiConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

use services::{AppServices, ServiceError};

/// Build services from `config` and the full router over them.
pub async fn build_app(config: &ApiConfig) -> Result<Router, ServiceError> {
    let services = Arc::new(services::build_services(config).await?);
    Ok(router(services, config.jwt_secret.as_bytes()))
}

pub fn router(services: Arc<AppServices>, jwt_secret: &[u8]) -> Router {
    let auth_state = middleware::AuthState {
        jwt: Arc::new(Hs256JwtValidator::new(jwt_secret)),
        users: services.read_models().users.clone(),
    };

    let protected = routes::router()
        .layer(Extension(services.clone()))
        .layer(axum::middleware::from_fn_with_state(auth_state, middleware::auth_middleware));

    let public = routes::public_router().layer(Extension(services));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(public)
        .merge(protected)
        .layer(ServiceBuilder::new().layer(axum::middleware::from_fn(middleware::log_requests)))
}
