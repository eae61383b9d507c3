use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};

use oficina_auth::Permission;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new().route("/", get(list_categories).post(create_category))
}

pub async fn list_categories(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Result<Response, Response> {
    authz::require(&principal, &Permission::CATEGORIES_READ)?;
    let categories: Vec<_> = services.list_categories().iter().map(dto::category_to_json).collect();
    Ok(Json(serde_json::json!({ "categorias": categories })).into_response())
}

pub async fn create_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::CreateCategoryRequest>, JsonRejection>,
) -> Result<Response, Response> {
    authz::require(&principal, &Permission::CATEGORIES_WRITE)?;
    let Json(body) = body.map_err(errors::rejection_to_response)?;

    let category = services
        .create_category(body.nome, body.descricao)
        .map_err(errors::dispatch_error_to_response)?;

    Ok((
        StatusCode::CREATED,
        Json(dto::success("Categoria cadastrada com sucesso", dto::category_to_json(&category))),
    )
        .into_response())
}
