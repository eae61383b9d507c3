use axum::{
    Router,
    routing::{get, post},
};

pub mod auth;
pub mod categories;
pub mod parts;
pub mod system;
pub mod users;
pub mod work_orders;

/// Routes reachable without a bearer token.
pub fn public_router() -> Router {
    Router::new().route("/auth/login", post(auth::login))
}

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/auth/me", get(auth::me))
        .route("/auth/trocar-senha", post(auth::change_password))
        .nest("/pecas", parts::router())
        .nest("/categorias", categories::router())
        .nest("/os", work_orders::router())
        .nest("/usuarios", users::router())
}
