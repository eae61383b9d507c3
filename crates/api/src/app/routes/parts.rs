use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};

use oficina_auth::Permission;
use oficina_infra::stock_service::{EntryRequest, ExitRequest, NewPart, PartChanges};
use oficina_inventory::PartId;

use crate::app::services::{AppServices, parse_part_id};
use crate::app::{dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_parts).post(create_part))
        .route("/estoque-baixo", get(low_stock))
        .route("/entrada", post(record_entry))
        .route("/saida", post(record_exit))
        .route("/:id", get(get_part).put(update_part).delete(delete_part))
        .route("/:id/historico", get(history))
}

fn path_part_id(raw: &str) -> Result<PartId, Response> {
    parse_part_id(raw).ok_or_else(|| errors::bad_request("id de peça inválido"))
}

pub async fn list_parts(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::PartsQuery>,
) -> Result<Response, Response> {
    authz::require(&principal, &Permission::PARTS_READ)?;
    let parts = services.list_parts(query.q.as_deref());
    Ok(Json(dto::parts_to_json(&parts)).into_response())
}

pub async fn low_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Result<Response, Response> {
    authz::require(&principal, &Permission::PARTS_READ)?;
    Ok(Json(dto::parts_to_json(&services.low_stock_parts())).into_response())
}

pub async fn create_part(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::CreatePartRequest>, JsonRejection>,
) -> Result<Response, Response> {
    authz::require(&principal, &Permission::PARTS_WRITE)?;
    let Json(body) = body.map_err(errors::rejection_to_response)?;

    let part = services
        .stock()
        .register_part(NewPart {
            name: body.nome,
            part_number: body.codigo,
            description: body.descricao,
            category_id: body.categoria_id,
            cost_price: body.preco_custo,
            sale_price: body.preco_venda,
            initial_quantity: body.quantidade,
            min_stock: body.estoque_minimo,
            location: body.localizacao,
        })
        .map_err(errors::dispatch_error_to_response)?;
    services.refresh(part.id.0);

    Ok((
        StatusCode::CREATED,
        Json(dto::success("Peça cadastrada com sucesso", dto::part_to_json(&part))),
    )
        .into_response())
}

pub async fn get_part(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Response, Response> {
    authz::require(&principal, &Permission::PARTS_READ)?;
    let part_id = path_part_id(&id)?;
    let part = services
        .stock()
        .get_part(part_id)
        .map_err(errors::dispatch_error_to_response)?;
    Ok(Json(dto::part_detail_to_json(&part)).into_response())
}

pub async fn update_part(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<dto::UpdatePartRequest>, JsonRejection>,
) -> Result<Response, Response> {
    authz::require(&principal, &Permission::PARTS_WRITE)?;
    let part_id = path_part_id(&id)?;
    let Json(body) = body.map_err(errors::rejection_to_response)?;

    let part = services
        .stock()
        .update_part(
            part_id,
            PartChanges {
                name: body.nome,
                part_number: body.codigo,
                description: body.descricao,
                category_id: body.categoria_id,
                cost_price: body.preco_custo,
                sale_price: body.preco_venda,
                min_stock: body.estoque_minimo,
                location: body.localizacao,
                quantity: body.quantidade,
            },
        )
        .map_err(errors::dispatch_error_to_response)?;
    services.refresh(part_id.0);

    Ok(Json(dto::success("Peça atualizada com sucesso", dto::part_to_json(&part))).into_response())
}

/// Only parts that never moved stock can be deleted; the rest answer 422.
pub async fn delete_part(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Response, Response> {
    authz::require(&principal, &Permission::PARTS_WRITE)?;
    let part_id = path_part_id(&id)?;

    services
        .stock()
        .delete_part(part_id)
        .map_err(errors::dispatch_error_to_response)?;
    services.refresh(part_id.0);

    Ok(Json(serde_json::json!({
        "sucesso": true,
        "mensagem": "Peça excluída com sucesso",
    }))
    .into_response())
}

pub async fn record_entry(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::StockEntryRequest>, JsonRejection>,
) -> Result<Response, Response> {
    authz::require(&principal, &Permission::STOCK_MOVE)?;
    let Json(body) = body.map_err(errors::rejection_to_response)?;

    let outcome = services
        .stock()
        .record_entry(EntryRequest {
            part_id: body.peca_id,
            quantity: body.quantidade,
            reason: body.motivo,
            cost_price: body.preco_custo,
            sale_price: body.preco_venda,
            work_order_id: body.os_id,
            actor: Some(principal.user_id()),
        })
        .map_err(errors::dispatch_error_to_response)?;
    services.refresh(body.peca_id.0);

    Ok(Json(dto::success(
        "Entrada registrada com sucesso",
        dto::movement_outcome_to_json(&outcome),
    ))
    .into_response())
}

pub async fn record_exit(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::StockExitRequest>, JsonRejection>,
) -> Result<Response, Response> {
    authz::require(&principal, &Permission::STOCK_MOVE)?;
    let Json(body) = body.map_err(errors::rejection_to_response)?;

    let outcome = services
        .stock()
        .record_exit(ExitRequest {
            part_id: body.peca_id,
            quantity: body.quantidade,
            reason: body.motivo,
            work_order_id: body.os_id,
            actor: Some(principal.user_id()),
        })
        .map_err(errors::dispatch_error_to_response)?;
    services.refresh(body.peca_id.0);

    let message = match &outcome.alert {
        Some(alert) => alert.message.as_str(),
        None => "Saída registrada com sucesso",
    };
    Ok(Json(dto::success(message, dto::movement_outcome_to_json(&outcome))).into_response())
}

pub async fn history(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Response, Response> {
    authz::require(&principal, &Permission::PARTS_READ)?;
    let part_id = path_part_id(&id)?;
    let entries = services
        .stock()
        .history(part_id)
        .map_err(errors::dispatch_error_to_response)?;
    Ok(Json(dto::history_to_json(&entries)).into_response())
}
