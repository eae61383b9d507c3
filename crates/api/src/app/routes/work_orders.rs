use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, put},
};

use oficina_auth::Permission;
use oficina_core::WorkOrderId;
use oficina_workorders::WorkOrderStatus;

use crate::app::services::{AppServices, NewWorkOrder};
use crate::app::{dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_work_orders).post(open_work_order))
        .route("/:id", get(get_work_order))
        .route("/:id/status", put(change_status))
}

fn path_work_order_id(raw: &str) -> Result<WorkOrderId, Response> {
    raw.parse().map_err(|_| errors::bad_request("id de OS inválido"))
}

fn parse_status(raw: &str) -> Result<WorkOrderStatus, Response> {
    raw.parse()
        .map_err(|e: oficina_core::DomainError| errors::bad_request(e.to_string()))
}

pub async fn list_work_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Result<Response, Response> {
    authz::require(&principal, &Permission::WORK_ORDERS_READ)?;
    let orders: Vec<_> = services.list_work_orders().iter().map(dto::work_order_to_json).collect();
    Ok(Json(serde_json::json!({ "ordens": orders })).into_response())
}

pub async fn open_work_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::OpenWorkOrderRequest>, JsonRejection>,
) -> Result<Response, Response> {
    authz::require(&principal, &Permission::WORK_ORDERS_WRITE)?;
    let Json(body) = body.map_err(errors::rejection_to_response)?;
    let status = body.status.as_deref().map(parse_status).transpose()?;

    let order = services
        .open_work_order(NewWorkOrder {
            client_id: body.cliente_id,
            vehicle_id: body.veiculo_id,
            mechanic_id: body.mecanico_id,
            status,
            problem_description: body.descricao_problema,
            notes: body.observacoes,
            payment_method: body.forma_pagamento,
            discount: body.desconto,
            services: body.servicos.into_iter().map(dto::ServiceLineRequest::into_line).collect(),
            parts: body.pecas.into_iter().map(dto::PartLineRequest::into_line).collect(),
        })
        .map_err(errors::dispatch_error_to_response)?;

    Ok((
        StatusCode::CREATED,
        Json(dto::success("OS aberta com sucesso", dto::work_order_to_json(&order))),
    )
        .into_response())
}

pub async fn get_work_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Response, Response> {
    authz::require(&principal, &Permission::WORK_ORDERS_READ)?;
    let id = path_work_order_id(&id)?;
    let detail = services
        .work_order_detail(id)
        .map_err(errors::dispatch_error_to_response)?;
    Ok(Json(dto::work_order_detail_to_json(&detail)).into_response())
}

pub async fn change_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<dto::ChangeStatusRequest>, JsonRejection>,
) -> Result<Response, Response> {
    authz::require(&principal, &Permission::WORK_ORDERS_WRITE)?;
    let id = path_work_order_id(&id)?;
    let Json(body) = body.map_err(errors::rejection_to_response)?;
    let status = parse_status(&body.status)?;

    let order = services
        .change_work_order_status(id, status)
        .map_err(errors::dispatch_error_to_response)?;
    Ok(Json(dto::success("Status da OS atualizado", dto::work_order_to_json(&order))).into_response())
}
