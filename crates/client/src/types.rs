//! Typed views of the API's JSON, plus the request bodies the client sends.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use oficina_core::{DomainResult, Entity, Related, UserId, WorkOrderId};
use oficina_inventory::{CategoryId, MovementId, MovementKind, PartId};
use oficina_workorders::{
    ClientId, MechanicId, PartLine, ServiceId, ServiceLine, VehicleId, WorkOrderStatus, WorkOrderTotals,
    work_order_total,
};

/// `{sucesso:true, mensagem, dados}`
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub mensagem: String,
    pub dados: T,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Ack {
    pub mensagem: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Part {
    pub id: PartId,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "codigo")]
    pub part_number: String,
    #[serde(rename = "descricao", default)]
    pub description: Option<String>,
    #[serde(rename = "categoria_id", default)]
    pub category_id: Option<CategoryId>,
    #[serde(rename = "preco_custo")]
    pub cost_price: Decimal,
    #[serde(rename = "preco_venda")]
    pub sale_price: Decimal,
    #[serde(rename = "quantidade")]
    pub quantity: i64,
    #[serde(rename = "estoque_minimo")]
    pub min_stock: i64,
    #[serde(rename = "localizacao", default)]
    pub location: Option<String>,
    #[serde(rename = "estoque_baixo")]
    pub low_stock: bool,
    #[serde(rename = "total_movimentacoes", default)]
    pub movement_count: u64,
    #[serde(rename = "ultima_movimentacao", default)]
    pub last_movement_at: Option<DateTime<Utc>>,
}

impl Entity for Part {
    type Id = PartId;

    fn id(&self) -> &PartId {
        &self.id
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct PartList {
    pub pecas: Vec<Part>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PartDetail {
    pub peca: Part,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Movement {
    pub id: MovementId,
    #[serde(rename = "peca_id")]
    pub part_id: PartId,
    #[serde(rename = "os_id", default)]
    pub work_order_id: Option<WorkOrderId>,
    #[serde(rename = "usuario_id", default)]
    pub user_id: Option<UserId>,
    #[serde(rename = "tipo")]
    pub kind: MovementKind,
    /// Always positive; the direction is in `kind`.
    #[serde(rename = "quantidade")]
    pub quantity: i64,
    #[serde(rename = "quantidade_anterior")]
    pub quantity_before: i64,
    #[serde(rename = "quantidade_atual")]
    pub quantity_after: i64,
    #[serde(rename = "motivo")]
    pub reason: String,
    #[serde(rename = "data")]
    pub occurred_at: DateTime<Utc>,
    #[serde(rename = "posicao")]
    pub position: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum MovementOrigin {
    #[serde(rename = "usuario")]
    User,
    #[serde(rename = "sistema")]
    System,
}

/// A history row: the movement plus who made it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HistoryMovement {
    #[serde(flatten)]
    pub movement: Movement,
    #[serde(rename = "usuario_nome")]
    pub actor_name: String,
    #[serde(rename = "origem")]
    pub origin: MovementOrigin,
}

#[derive(Debug, Deserialize)]
pub(crate) struct History {
    pub movimentacoes: Vec<HistoryMovement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LowStockWarning {
    #[serde(rename = "peca_id")]
    pub part_id: PartId,
    #[serde(rename = "peca_nome")]
    pub part_name: String,
    #[serde(rename = "quantidade_atual")]
    pub quantity: i64,
    #[serde(rename = "estoque_minimo")]
    pub threshold: i64,
    #[serde(rename = "mensagem")]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MovementData {
    pub movimentacao: Movement,
    pub quantidade_atual: i64,
    #[serde(default)]
    pub alerta: Option<LowStockWarning>,
}

/// Result of an entry or exit as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementReceipt {
    pub message: String,
    pub movement: Movement,
    pub quantity: i64,
    pub alert: Option<LowStockWarning>,
}

impl MovementReceipt {
    pub(crate) fn from_envelope(envelope: Envelope<MovementData>) -> Self {
        Self {
            message: envelope.mensagem,
            movement: envelope.dados.movimentacao,
            quantity: envelope.dados.quantidade_atual,
            alert: envelope.dados.alerta,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "descricao", default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CategoryList {
    pub categorias: Vec<Category>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WorkOrderServiceLine {
    #[serde(rename = "servico_id")]
    pub service_id: ServiceId,
    #[serde(rename = "valor")]
    pub unit_price: Decimal,
    #[serde(rename = "quantidade")]
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WorkOrderPartLine {
    #[serde(rename = "peca_id")]
    pub part_id: PartId,
    #[serde(rename = "valor")]
    pub unit_price: Decimal,
    #[serde(rename = "quantidade")]
    pub quantity: i64,
    /// Present only in the detail view.
    #[serde(rename = "peca", default)]
    part: Option<Part>,
}

impl WorkOrderPartLine {
    pub fn part(&self) -> Related<Part> {
        match &self.part {
            Some(part) => Related::hydrated(part.clone()),
            None => Related::reference(self.part_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WorkOrder {
    pub id: WorkOrderId,
    #[serde(rename = "cliente_id")]
    pub client_id: ClientId,
    #[serde(rename = "veiculo_id")]
    pub vehicle_id: VehicleId,
    #[serde(rename = "mecanico_id")]
    pub mechanic_id: MechanicId,
    pub status: WorkOrderStatus,
    #[serde(rename = "data_abertura")]
    pub opened_at: DateTime<Utc>,
    #[serde(rename = "data_fechamento", default)]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(rename = "descricao_problema", default)]
    pub problem_description: Option<String>,
    #[serde(rename = "observacoes", default)]
    pub notes: Option<String>,
    #[serde(rename = "forma_pagamento", default)]
    pub payment_method: Option<String>,
    #[serde(rename = "servicos", default)]
    pub services: Vec<WorkOrderServiceLine>,
    #[serde(rename = "pecas", default)]
    pub parts: Vec<WorkOrderPartLine>,
    #[serde(rename = "totais", deserialize_with = "de_totals")]
    pub totals: WorkOrderTotals,
}

impl WorkOrder {
    /// Totals re-derived from the lines with the same function the server uses.
    pub fn computed_totals(&self) -> DomainResult<WorkOrderTotals> {
        let services: Vec<ServiceLine> = self
            .services
            .iter()
            .map(|l| ServiceLine {
                service_id: l.service_id,
                unit_price: l.unit_price,
                quantity: l.quantity,
            })
            .collect();
        let parts: Vec<PartLine> = self
            .parts
            .iter()
            .map(|l| PartLine {
                part_id: l.part_id,
                unit_price: l.unit_price,
                quantity: l.quantity,
            })
            .collect();
        work_order_total(&services, &parts, self.totals.discount)
    }
}

fn de_totals<'de, D: Deserializer<'de>>(deserializer: D) -> Result<WorkOrderTotals, D::Error> {
    #[derive(Deserialize)]
    struct Wire {
        servicos: Decimal,
        pecas: Decimal,
        subtotal: Decimal,
        desconto: Decimal,
        total: Decimal,
    }

    let wire = Wire::deserialize(deserializer)?;
    Ok(WorkOrderTotals {
        services: wire.servicos,
        parts: wire.pecas,
        subtotal: wire.subtotal,
        discount: wire.desconto,
        total: wire.total,
    })
}

#[derive(Debug, Deserialize)]
pub(crate) struct WorkOrderList {
    pub ordens: Vec<WorkOrder>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginData {
    pub token: String,
    pub expira_em: DateTime<Utc>,
    pub usuario: crate::SessionUser,
}

// -------------------------
// Request bodies
// -------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryForm {
    #[serde(rename = "peca_id")]
    pub part_id: PartId,
    #[serde(rename = "quantidade")]
    pub quantity: i64,
    #[serde(rename = "motivo")]
    pub reason: String,
    #[serde(rename = "preco_custo", skip_serializing_if = "Option::is_none")]
    pub cost_price: Option<Decimal>,
    #[serde(rename = "preco_venda", skip_serializing_if = "Option::is_none")]
    pub sale_price: Option<Decimal>,
    #[serde(rename = "os_id", skip_serializing_if = "Option::is_none")]
    pub work_order_id: Option<WorkOrderId>,
}

impl EntryForm {
    pub fn new(part_id: PartId, quantity: i64, reason: impl Into<String>) -> Self {
        Self {
            part_id,
            quantity,
            reason: reason.into(),
            cost_price: None,
            sale_price: None,
            work_order_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExitForm {
    #[serde(rename = "peca_id")]
    pub part_id: PartId,
    #[serde(rename = "quantidade")]
    pub quantity: i64,
    #[serde(rename = "motivo")]
    pub reason: String,
    #[serde(rename = "os_id", skip_serializing_if = "Option::is_none")]
    pub work_order_id: Option<WorkOrderId>,
}

impl ExitForm {
    pub fn new(part_id: PartId, quantity: i64, reason: impl Into<String>) -> Self {
        Self {
            part_id,
            quantity,
            reason: reason.into(),
            work_order_id: None,
        }
    }

    pub fn for_work_order(mut self, work_order_id: WorkOrderId) -> Self {
        self.work_order_id = Some(work_order_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oficina_core::AggregateId;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn part_json(id: &PartId) -> serde_json::Value {
        json!({
            "id": id.to_string(),
            "nome": "Filtro de óleo",
            "codigo": "FO-1",
            "descricao": null,
            "categoria_id": null,
            "preco_custo": 18.5,
            "preco_venda": 32.5,
            "quantidade": 4,
            "estoque_minimo": 5,
            "localizacao": "A1",
            "estoque_baixo": true,
            "total_movimentacoes": 1,
            "ultima_movimentacao": "2024-03-01T12:00:00Z",
        })
    }

    #[test]
    fn history_rows_flatten_the_movement() {
        let part_id = PartId::new(AggregateId::new());
        let row: HistoryMovement = serde_json::from_value(json!({
            "id": AggregateId::new().to_string(),
            "peca_id": part_id.to_string(),
            "os_id": null,
            "usuario_id": null,
            "tipo": "SAIDA",
            "quantidade": 2,
            "quantidade_anterior": 6,
            "quantidade_atual": 4,
            "motivo": "Reposição automática",
            "data": "2024-03-01T12:00:00Z",
            "posicao": 3,
            "usuario_nome": "Sistema",
            "origem": "sistema",
        }))
        .unwrap();

        assert_eq!(row.movement.kind, MovementKind::Exit);
        assert_eq!(row.movement.part_id, part_id);
        assert_eq!(row.origin, MovementOrigin::System);
        assert_eq!(row.movement.quantity_after, 4);
    }

    #[test]
    fn detail_lines_hydrate_and_list_lines_stay_references() {
        let part_id = PartId::new(AggregateId::new());
        let mut line = json!({ "peca_id": part_id.to_string(), "valor": 32.5, "quantidade": 4 });

        let reference: WorkOrderPartLine = serde_json::from_value(line.clone()).unwrap();
        assert!(!reference.part().is_hydrated());
        assert_eq!(reference.part().id(), &part_id);

        line["peca"] = part_json(&part_id);
        let hydrated: WorkOrderPartLine = serde_json::from_value(line).unwrap();
        let related = hydrated.part();
        assert_eq!(related.record().unwrap().part_number, "FO-1");
        assert_eq!(related.record().unwrap().cost_price, dec!(18.5));
    }

    #[test]
    fn exit_form_omits_absent_work_order() {
        let part_id = PartId::new(AggregateId::new());
        let body = serde_json::to_value(ExitForm::new(part_id, 2, "Troca de filtro")).unwrap();
        assert_eq!(body["quantidade"], 2);
        assert!(body.get("os_id").is_none());

        let os = WorkOrderId::new();
        let body = serde_json::to_value(ExitForm::new(part_id, 2, "Troca de filtro").for_work_order(os)).unwrap();
        assert_eq!(body["os_id"], os.to_string());
    }
}
