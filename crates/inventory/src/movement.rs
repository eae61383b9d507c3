//! Stock movement ledger rows, low-stock alerts and history ordering.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use oficina_core::{DomainError, DomainResult, UserId, ValueObject, WorkOrderId};

use crate::part::PartId;

/// Minimum length of a movement reason, counted in characters after trimming.
pub const MIN_REASON_CHARS: usize = 10;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MovementId(Uuid);

impl MovementId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for MovementId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for MovementId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MovementKind {
    #[serde(rename = "ENTRADA", alias = "ENTRY")]
    Entry,
    #[serde(rename = "SAIDA", alias = "EXIT")]
    Exit,
}

impl MovementKind {
    pub fn wire_name(self) -> &'static str {
        match self {
            MovementKind::Entry => "ENTRADA",
            MovementKind::Exit => "SAIDA",
        }
    }

    /// Label shown in the history table.
    pub fn label(self) -> &'static str {
        match self {
            MovementKind::Entry => "Entrada",
            MovementKind::Exit => "Saída",
        }
    }
}

/// Free-text justification for a movement: trimmed, at least [`MIN_REASON_CHARS`] long.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Reason(String);

impl Reason {
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let trimmed = raw.trim();
        if trimmed.chars().count() < MIN_REASON_CHARS {
            return Err(DomainError::validation(format!(
                "motivo deve ter pelo menos {MIN_REASON_CHARS} caracteres"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ValueObject for Reason {}

impl TryFrom<String> for Reason {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Reason::parse(&value)
    }
}

impl From<Reason> for String {
    fn from(value: Reason) -> Self {
        value.0
    }
}

impl core::fmt::Display for Reason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One immutable row of a part's ledger.
///
/// `quantity_after == quantity_before + delta`, `delta > 0` for entries and
/// `< 0` for exits, `quantity_after >= 0`. `position` is the 1-based append
/// order of the movement within its part's ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: MovementId,
    pub part_id: PartId,
    pub work_order_id: Option<WorkOrderId>,
    pub actor: Option<UserId>,
    pub kind: MovementKind,
    pub delta: i64,
    pub quantity_before: i64,
    pub quantity_after: i64,
    pub reason: Reason,
    pub occurred_at: DateTime<Utc>,
    pub position: u64,
}

impl StockMovement {
    /// Unsigned size of the movement.
    pub fn quantity(&self) -> i64 {
        self.delta.abs()
    }

    pub fn is_consistent(&self) -> bool {
        let sign_ok = match self.kind {
            MovementKind::Entry => self.delta > 0,
            MovementKind::Exit => self.delta < 0,
        };
        sign_ok
            && self.quantity_before + self.delta == self.quantity_after
            && self.quantity_after >= 0
    }
}

/// Returned with an exit that leaves the part at or below its minimum stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowStockAlert {
    pub part_id: PartId,
    pub part_name: String,
    pub quantity: i64,
    pub threshold: i64,
    pub message: String,
}

impl ValueObject for LowStockAlert {}

impl LowStockAlert {
    /// `Some` exactly when `quantity <= threshold`.
    pub fn evaluate(part_id: PartId, part_name: &str, quantity: i64, threshold: i64) -> Option<Self> {
        if quantity > threshold {
            return None;
        }
        Some(Self {
            part_id,
            part_name: part_name.to_string(),
            quantity,
            threshold,
            message: format!(
                "Estoque baixo: {part_name} está com {quantity} unidade(s), mínimo configurado {threshold}"
            ),
        })
    }
}

/// Sort movements for display: newest first, ledger order within the same instant.
///
/// The result does not depend on the order of `movements`.
pub fn order_history(mut movements: Vec<StockMovement>) -> Vec<StockMovement> {
    movements.sort_by(|a, b| {
        b.occurred_at
            .cmp(&a.occurred_at)
            .then_with(|| a.position.cmp(&b.position))
    });
    movements
}

/// Who performed a movement, as shown in the history view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tipo", rename_all = "snake_case")]
pub enum Actor {
    User { id: UserId, display_name: String },
    System,
}

impl Actor {
    pub fn display_name(&self) -> &str {
        match self {
            Actor::User { display_name, .. } => display_name,
            Actor::System => "Sistema",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub movement: StockMovement,
    pub actor: Actor,
}

/// Order `movements` for display and attach the acting user's name.
///
/// Movements without an actor, or whose actor `display_name` cannot resolve,
/// are marked as system-originated.
pub fn annotate_history(
    movements: Vec<StockMovement>,
    display_name: impl Fn(&UserId) -> Option<String>,
) -> Vec<HistoryEntry> {
    order_history(movements)
        .into_iter()
        .map(|movement| {
            let actor = movement
                .actor
                .and_then(|id| display_name(&id).map(|name| Actor::User { id, display_name: name }))
                .unwrap_or(Actor::System);
            HistoryEntry { movement, actor }
        })
        .collect()
}
