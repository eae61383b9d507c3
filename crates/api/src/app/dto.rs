use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};

use oficina_core::{Related, WorkOrderId};
use oficina_infra::projections::{CategoryRecord, PartRecord, UserRecord, WorkOrderDetail, WorkOrderRecord};
use oficina_infra::stock_service::MovementOutcome;
use oficina_inventory::{Actor, CategoryId, HistoryEntry, LowStockAlert, PartId, StockMovement};
use oficina_workorders::{
    ClientId, MechanicId, PartLine, ServiceId, ServiceLine, VehicleId, WorkOrderTotals,
};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub senha: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub senha_atual: Option<String>,
    pub nova_senha: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub nome: String,
    pub perfil: String,
    pub senha: String,
}

#[derive(Debug, Deserialize)]
pub struct SuspendUserRequest {
    #[serde(default)]
    pub motivo: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePartRequest {
    pub nome: String,
    pub codigo: String,
    pub descricao: Option<String>,
    pub categoria_id: Option<CategoryId>,
    pub preco_custo: Decimal,
    pub preco_venda: Decimal,
    #[serde(default)]
    pub quantidade: i64,
    #[serde(default)]
    pub estoque_minimo: i64,
    pub localizacao: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePartRequest {
    pub nome: String,
    pub codigo: String,
    pub descricao: Option<String>,
    pub categoria_id: Option<CategoryId>,
    pub preco_custo: Decimal,
    pub preco_venda: Decimal,
    pub estoque_minimo: i64,
    pub localizacao: Option<String>,
    /// Honoured only while the part has no movements.
    pub quantidade: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct StockEntryRequest {
    pub peca_id: PartId,
    pub quantidade: i64,
    pub motivo: String,
    pub preco_custo: Option<Decimal>,
    pub preco_venda: Option<Decimal>,
    pub os_id: Option<WorkOrderId>,
}

#[derive(Debug, Deserialize)]
pub struct StockExitRequest {
    pub peca_id: PartId,
    pub quantidade: i64,
    pub motivo: String,
    pub os_id: Option<WorkOrderId>,
}

#[derive(Debug, Deserialize)]
pub struct PartsQuery {
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub nome: String,
    pub descricao: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ServiceLineRequest {
    pub servico_id: ServiceId,
    pub valor: Decimal,
    #[serde(default = "one")]
    pub quantidade: i64,
}

#[derive(Debug, Deserialize)]
pub struct PartLineRequest {
    pub peca_id: PartId,
    pub valor: Decimal,
    #[serde(default = "one")]
    pub quantidade: i64,
}

fn one() -> i64 {
    1
}

#[derive(Debug, Deserialize)]
pub struct OpenWorkOrderRequest {
    pub cliente_id: ClientId,
    pub veiculo_id: VehicleId,
    pub mecanico_id: MechanicId,
    pub status: Option<String>,
    pub descricao_problema: Option<String>,
    pub observacoes: Option<String>,
    pub forma_pagamento: Option<String>,
    #[serde(default)]
    pub desconto: Decimal,
    #[serde(default)]
    pub servicos: Vec<ServiceLineRequest>,
    #[serde(default)]
    pub pecas: Vec<PartLineRequest>,
}

impl ServiceLineRequest {
    pub fn into_line(self) -> ServiceLine {
        ServiceLine {
            service_id: self.servico_id,
            unit_price: self.valor,
            quantity: self.quantidade,
        }
    }
}

impl PartLineRequest {
    pub fn into_line(self) -> PartLine {
        PartLine {
            part_id: self.peca_id,
            unit_price: self.valor,
            quantity: self.quantidade,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: String,
}

// -------------------------
// JSON mapping helpers
// -------------------------

/// Success body for mutations: `{sucesso, mensagem, dados}`.
pub fn success(message: &str, data: JsonValue) -> JsonValue {
    json!({
        "sucesso": true,
        "mensagem": message,
        "dados": data,
    })
}

pub fn part_to_json(rm: &PartRecord) -> JsonValue {
    json!({
        "id": rm.id.to_string(),
        "nome": rm.name,
        "codigo": rm.part_number,
        "descricao": rm.description,
        "categoria_id": rm.category_id.map(|c| c.to_string()),
        "preco_custo": rm.cost_price,
        "preco_venda": rm.sale_price,
        "quantidade": rm.quantity,
        "estoque_minimo": rm.min_stock,
        "localizacao": rm.location,
        "estoque_baixo": rm.is_low_stock(),
        "total_movimentacoes": rm.movement_count,
        "ultima_movimentacao": rm.last_movement_at,
    })
}

pub fn parts_to_json(parts: &[PartRecord]) -> JsonValue {
    json!({ "pecas": parts.iter().map(part_to_json).collect::<Vec<_>>() })
}

pub fn part_detail_to_json(part: &PartRecord) -> JsonValue {
    json!({ "peca": part_to_json(part) })
}

pub fn movement_to_json(m: &StockMovement) -> JsonValue {
    json!({
        "id": m.id.to_string(),
        "peca_id": m.part_id.to_string(),
        "os_id": m.work_order_id.map(|id| id.to_string()),
        "usuario_id": m.actor.map(|id| id.to_string()),
        "tipo": m.kind.wire_name(),
        "quantidade": m.quantity(),
        "quantidade_anterior": m.quantity_before,
        "quantidade_atual": m.quantity_after,
        "motivo": m.reason.as_str(),
        "data": m.occurred_at,
        "posicao": m.position,
    })
}

pub fn alert_to_json(alert: &LowStockAlert) -> JsonValue {
    json!({
        "peca_id": alert.part_id.to_string(),
        "peca_nome": alert.part_name,
        "quantidade_atual": alert.quantity,
        "estoque_minimo": alert.threshold,
        "mensagem": alert.message,
    })
}

pub fn movement_outcome_to_json(outcome: &MovementOutcome) -> JsonValue {
    let mut data = json!({
        "movimentacao": movement_to_json(&outcome.movement),
        "quantidade_atual": outcome.quantity,
    });
    if let Some(alert) = &outcome.alert {
        data["alerta"] = alert_to_json(alert);
    }
    data
}

pub fn history_to_json(entries: &[HistoryEntry]) -> JsonValue {
    let movements: Vec<_> = entries
        .iter()
        .map(|entry| {
            let mut m = movement_to_json(&entry.movement);
            m["usuario_nome"] = json!(entry.actor.display_name());
            m["origem"] = json!(match entry.actor {
                Actor::User { .. } => "usuario",
                Actor::System => "sistema",
            });
            m
        })
        .collect();
    json!({ "movimentacoes": movements })
}

pub fn category_to_json(rm: &CategoryRecord) -> JsonValue {
    json!({
        "id": rm.id.to_string(),
        "nome": rm.name,
        "descricao": rm.description,
    })
}

fn totals_to_json(totals: &WorkOrderTotals) -> JsonValue {
    json!({
        "servicos": totals.services,
        "pecas": totals.parts,
        "subtotal": totals.subtotal,
        "desconto": totals.discount,
        "total": totals.total,
    })
}

fn service_line_to_json(line: &ServiceLine) -> JsonValue {
    json!({
        "servico_id": line.service_id.to_string(),
        "valor": line.unit_price,
        "quantidade": line.quantity,
        "total": oficina_workorders::line_total(line.unit_price, line.quantity).ok(),
    })
}

pub fn work_order_to_json(rm: &WorkOrderRecord) -> JsonValue {
    json!({
        "id": rm.id.to_string(),
        "cliente_id": rm.client_id.to_string(),
        "veiculo_id": rm.vehicle_id.to_string(),
        "mecanico_id": rm.mechanic_id.to_string(),
        "status": rm.status.wire_name(),
        "data_abertura": rm.opened_at,
        "data_fechamento": rm.closed_at,
        "descricao_problema": rm.problem_description,
        "observacoes": rm.notes,
        "forma_pagamento": rm.payment_method,
        "servicos": rm.services.iter().map(service_line_to_json).collect::<Vec<_>>(),
        "pecas": rm.parts.iter().map(|line| json!({
            "peca_id": line.part_id.to_string(),
            "valor": line.unit_price,
            "quantidade": line.quantity,
            "total": oficina_workorders::line_total(line.unit_price, line.quantity).ok(),
        })).collect::<Vec<_>>(),
        "totais": totals_to_json(&rm.totals),
    })
}

/// Detail view: part lines carry `peca` when the part could be hydrated.
pub fn work_order_detail_to_json(detail: &WorkOrderDetail) -> JsonValue {
    let mut body = work_order_to_json(&detail.order);
    body["pecas"] = json!(detail
        .part_lines
        .iter()
        .map(|line| {
            let part = match &line.part {
                Related::Hydrated(record) => part_to_json(record),
                Related::Reference(_) => JsonValue::Null,
            };
            json!({
                "peca_id": line.part.id().to_string(),
                "peca": part,
                "valor": line.unit_price,
                "quantidade": line.quantity,
                "total": line.line_total,
            })
        })
        .collect::<Vec<_>>());
    body
}

pub fn user_to_json(rm: &UserRecord) -> JsonValue {
    json!({
        "id": rm.id.to_string(),
        "email": rm.email,
        "nome": rm.display_name,
        "perfil": rm.role.as_str(),
        "status": rm.status.to_string(),
        "precisa_trocar_senha": rm.must_change_password,
        "criado_em": rm.created_at,
    })
}
