use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use oficina_core::{
    Aggregate, AggregateId, AggregateRoot, DomainError, Entity, UserId, WorkOrderId,
};
use oficina_events::Event;

use crate::category::CategoryId;
use crate::movement::{LowStockAlert, MovementId, MovementKind, Reason, StockMovement};

/// Part identifier; one event stream (and so one ledger) per part.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartId(pub AggregateId);

impl PartId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PartId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: a stocked part.
///
/// Quantity starts at the registered initial quantity and afterwards moves
/// only through ledger movements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    id: PartId,
    name: String,
    part_number: String,
    description: Option<String>,
    category_id: Option<CategoryId>,
    cost_price: Decimal,
    sale_price: Decimal,
    quantity: i64,
    min_stock: i64,
    location: Option<String>,
    movement_count: u64,
    version: u64,
    created: bool,
    deleted: bool,
}

impl Part {
    /// Not-yet-registered instance, used as the rehydration seed.
    pub fn empty(id: PartId) -> Self {
        Self {
            id,
            name: String::new(),
            part_number: String::new(),
            description: None,
            category_id: None,
            cost_price: Decimal::ZERO,
            sale_price: Decimal::ZERO,
            quantity: 0,
            min_stock: 0,
            location: None,
            movement_count: 0,
            version: 0,
            created: false,
            deleted: false,
        }
    }

    pub fn id_typed(&self) -> PartId {
        self.id
    }

    /// Registered and not deleted.
    pub fn is_registered(&self) -> bool {
        self.created && !self.deleted
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn part_number(&self) -> &str {
        &self.part_number
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn category_id(&self) -> Option<CategoryId> {
        self.category_id
    }

    pub fn cost_price(&self) -> Decimal {
        self.cost_price
    }

    pub fn sale_price(&self) -> Decimal {
        self.sale_price
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn min_stock(&self) -> i64 {
        self.min_stock
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Number of ledger movements recorded so far.
    pub fn movement_count(&self) -> u64 {
        self.movement_count
    }

    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.min_stock
    }
}

impl AggregateRoot for Part {
    type Id = PartId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl Entity for Part {
    type Id = PartId;

    fn id(&self) -> &PartId {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterPart {
    pub part_id: PartId,
    pub name: String,
    pub part_number: String,
    pub description: Option<String>,
    pub category_id: Option<CategoryId>,
    pub cost_price: Decimal,
    pub sale_price: Decimal,
    pub initial_quantity: i64,
    pub min_stock: i64,
    pub location: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Catalog edit. `quantity` is only honoured while the ledger is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatePartDetails {
    pub part_id: PartId,
    pub name: String,
    pub part_number: String,
    pub description: Option<String>,
    pub category_id: Option<CategoryId>,
    pub cost_price: Decimal,
    pub sale_price: Decimal,
    pub min_stock: i64,
    pub location: Option<String>,
    pub quantity: Option<i64>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordEntry {
    pub part_id: PartId,
    pub movement_id: MovementId,
    pub quantity: i64,
    pub reason: String,
    pub cost_price: Option<Decimal>,
    pub sale_price: Option<Decimal>,
    pub work_order_id: Option<WorkOrderId>,
    pub actor: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordExit {
    pub part_id: PartId,
    pub movement_id: MovementId,
    pub quantity: i64,
    pub reason: String,
    pub work_order_id: Option<WorkOrderId>,
    pub actor: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

/// Removes a part that never moved stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletePart {
    pub part_id: PartId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartCommand {
    RegisterPart(RegisterPart),
    UpdatePartDetails(UpdatePartDetails),
    RecordEntry(RecordEntry),
    RecordExit(RecordExit),
    DeletePart(DeletePart),
}

impl PartCommand {
    pub fn part_id(&self) -> PartId {
        match self {
            PartCommand::RegisterPart(c) => c.part_id,
            PartCommand::UpdatePartDetails(c) => c.part_id,
            PartCommand::RecordEntry(c) => c.part_id,
            PartCommand::RecordExit(c) => c.part_id,
            PartCommand::DeletePart(c) => c.part_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartRegistered {
    pub part_id: PartId,
    pub name: String,
    pub part_number: String,
    pub description: Option<String>,
    pub category_id: Option<CategoryId>,
    pub cost_price: Decimal,
    pub sale_price: Decimal,
    pub initial_quantity: i64,
    pub min_stock: i64,
    pub location: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartDetailsUpdated {
    pub part_id: PartId,
    pub name: String,
    pub part_number: String,
    pub description: Option<String>,
    pub category_id: Option<CategoryId>,
    pub cost_price: Decimal,
    pub sale_price: Decimal,
    pub min_stock: i64,
    pub location: Option<String>,
    /// Direct quantity set; only ever emitted while the ledger is empty.
    pub quantity: Option<i64>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockEntered {
    pub movement: StockMovement,
    pub cost_price: Option<Decimal>,
    pub sale_price: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockExited {
    pub movement: StockMovement,
    pub alert: Option<LowStockAlert>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartDeleted {
    pub part_id: PartId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartEvent {
    PartRegistered(PartRegistered),
    PartDetailsUpdated(PartDetailsUpdated),
    StockEntered(StockEntered),
    StockExited(StockExited),
    PartDeleted(PartDeleted),
}

impl PartEvent {
    /// The ledger row carried by this event, if it is a movement.
    pub fn movement(&self) -> Option<&StockMovement> {
        match self {
            PartEvent::StockEntered(e) => Some(&e.movement),
            PartEvent::StockExited(e) => Some(&e.movement),
            _ => None,
        }
    }
}

impl Event for PartEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PartEvent::PartRegistered(_) => "inventory.part.registered",
            PartEvent::PartDetailsUpdated(_) => "inventory.part.details_updated",
            PartEvent::StockEntered(_) => "inventory.part.stock_entered",
            PartEvent::StockExited(_) => "inventory.part.stock_exited",
            PartEvent::PartDeleted(_) => "inventory.part.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PartEvent::PartRegistered(e) => e.occurred_at,
            PartEvent::PartDetailsUpdated(e) => e.occurred_at,
            PartEvent::StockEntered(e) => e.movement.occurred_at,
            PartEvent::StockExited(e) => e.movement.occurred_at,
            PartEvent::PartDeleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Part {
    type Command = PartCommand;
    type Event = PartEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PartEvent::PartRegistered(e) => {
                self.id = e.part_id;
                self.name = e.name.clone();
                self.part_number = e.part_number.clone();
                self.description = e.description.clone();
                self.category_id = e.category_id;
                self.cost_price = e.cost_price;
                self.sale_price = e.sale_price;
                self.quantity = e.initial_quantity;
                self.min_stock = e.min_stock;
                self.location = e.location.clone();
                self.created = true;
            }
            PartEvent::PartDetailsUpdated(e) => {
                self.name = e.name.clone();
                self.part_number = e.part_number.clone();
                self.description = e.description.clone();
                self.category_id = e.category_id;
                self.cost_price = e.cost_price;
                self.sale_price = e.sale_price;
                self.min_stock = e.min_stock;
                self.location = e.location.clone();
                if let Some(quantity) = e.quantity {
                    self.quantity = quantity;
                }
            }
            PartEvent::StockEntered(e) => {
                self.quantity += e.movement.delta;
                if let Some(cost) = e.cost_price {
                    self.cost_price = cost;
                }
                if let Some(sale) = e.sale_price {
                    self.sale_price = sale;
                }
                self.movement_count += 1;
            }
            PartEvent::StockExited(e) => {
                self.quantity += e.movement.delta;
                self.movement_count += 1;
            }
            PartEvent::PartDeleted(_) => {
                self.deleted = true;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PartCommand::RegisterPart(cmd) => self.handle_register(cmd),
            PartCommand::UpdatePartDetails(cmd) => self.handle_update(cmd),
            PartCommand::RecordEntry(cmd) => self.handle_entry(cmd),
            PartCommand::RecordExit(cmd) => self.handle_exit(cmd),
            PartCommand::DeletePart(cmd) => self.handle_delete(cmd),
        }
    }
}

fn require_text(value: &str, field: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(format!("{field} é obrigatório")));
    }
    Ok(())
}

fn require_positive_price(value: Decimal, field: &str) -> Result<(), DomainError> {
    if value <= Decimal::ZERO {
        return Err(DomainError::validation(format!("{field} deve ser maior que zero")));
    }
    Ok(())
}

fn require_non_negative(value: i64, field: &str) -> Result<(), DomainError> {
    if value < 0 {
        return Err(DomainError::validation(format!("{field} não pode ser negativo")));
    }
    Ok(())
}

fn require_positive_quantity(quantity: i64) -> Result<(), DomainError> {
    if quantity <= 0 {
        return Err(DomainError::validation("quantidade deve ser maior que zero"));
    }
    Ok(())
}

impl Part {
    fn ensure_registered(&self, part_id: PartId) -> Result<(), DomainError> {
        if !self.is_registered() {
            return Err(DomainError::not_found("peça não encontrada"));
        }
        if self.id != part_id {
            return Err(DomainError::invariant("part_id mismatch"));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterPart) -> Result<Vec<PartEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("peça já cadastrada"));
        }
        require_text(&cmd.name, "nome")?;
        require_text(&cmd.part_number, "código")?;
        require_positive_price(cmd.cost_price, "preço de custo")?;
        require_positive_price(cmd.sale_price, "preço de venda")?;
        require_non_negative(cmd.initial_quantity, "quantidade")?;
        require_non_negative(cmd.min_stock, "estoque mínimo")?;

        Ok(vec![PartEvent::PartRegistered(PartRegistered {
            part_id: cmd.part_id,
            name: cmd.name.trim().to_string(),
            part_number: cmd.part_number.trim().to_string(),
            description: cmd.description.clone(),
            category_id: cmd.category_id,
            cost_price: cmd.cost_price,
            sale_price: cmd.sale_price,
            initial_quantity: cmd.initial_quantity,
            min_stock: cmd.min_stock,
            location: cmd.location.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdatePartDetails) -> Result<Vec<PartEvent>, DomainError> {
        self.ensure_registered(cmd.part_id)?;
        require_text(&cmd.name, "nome")?;
        require_text(&cmd.part_number, "código")?;
        require_positive_price(cmd.cost_price, "preço de custo")?;
        require_positive_price(cmd.sale_price, "preço de venda")?;
        require_non_negative(cmd.min_stock, "estoque mínimo")?;

        // Re-sending the current quantity is a no-op, not an edit.
        let quantity = cmd.quantity.filter(|q| *q != self.quantity);
        if let Some(q) = quantity {
            require_non_negative(q, "quantidade")?;
            if self.movement_count > 0 {
                return Err(DomainError::invariant(
                    "quantidade só pode ser alterada por movimentações de estoque",
                ));
            }
        }

        Ok(vec![PartEvent::PartDetailsUpdated(PartDetailsUpdated {
            part_id: cmd.part_id,
            name: cmd.name.trim().to_string(),
            part_number: cmd.part_number.trim().to_string(),
            description: cmd.description.clone(),
            category_id: cmd.category_id,
            cost_price: cmd.cost_price,
            sale_price: cmd.sale_price,
            min_stock: cmd.min_stock,
            location: cmd.location.clone(),
            quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_entry(&self, cmd: &RecordEntry) -> Result<Vec<PartEvent>, DomainError> {
        self.ensure_registered(cmd.part_id)?;
        require_positive_quantity(cmd.quantity)?;
        let reason = Reason::parse(&cmd.reason)?;
        if let Some(cost) = cmd.cost_price {
            require_positive_price(cost, "preço de custo")?;
        }
        if let Some(sale) = cmd.sale_price {
            require_positive_price(sale, "preço de venda")?;
        }

        let quantity_after = self
            .quantity
            .checked_add(cmd.quantity)
            .ok_or_else(|| DomainError::validation("quantidade excede o limite suportado"))?;

        let movement = StockMovement {
            id: cmd.movement_id,
            part_id: self.id,
            work_order_id: cmd.work_order_id,
            actor: cmd.actor,
            kind: MovementKind::Entry,
            delta: cmd.quantity,
            quantity_before: self.quantity,
            quantity_after,
            reason,
            occurred_at: cmd.occurred_at,
            position: self.movement_count + 1,
        };

        Ok(vec![PartEvent::StockEntered(StockEntered {
            movement,
            cost_price: cmd.cost_price,
            sale_price: cmd.sale_price,
        })])
    }

    fn handle_exit(&self, cmd: &RecordExit) -> Result<Vec<PartEvent>, DomainError> {
        self.ensure_registered(cmd.part_id)?;
        require_positive_quantity(cmd.quantity)?;
        let reason = Reason::parse(&cmd.reason)?;
        if cmd.quantity > self.quantity {
            return Err(DomainError::validation(format!(
                "estoque insuficiente: disponível {}, solicitado {}",
                self.quantity, cmd.quantity
            )));
        }

        let quantity_after = self.quantity - cmd.quantity;
        let movement = StockMovement {
            id: cmd.movement_id,
            part_id: self.id,
            work_order_id: cmd.work_order_id,
            actor: cmd.actor,
            kind: MovementKind::Exit,
            delta: -cmd.quantity,
            quantity_before: self.quantity,
            quantity_after,
            reason,
            occurred_at: cmd.occurred_at,
            position: self.movement_count + 1,
        };
        let alert = LowStockAlert::evaluate(self.id, &self.name, quantity_after, self.min_stock);

        Ok(vec![PartEvent::StockExited(StockExited { movement, alert })])
    }

    fn handle_delete(&self, cmd: &DeletePart) -> Result<Vec<PartEvent>, DomainError> {
        self.ensure_registered(cmd.part_id)?;
        if self.movement_count > 0 {
            return Err(DomainError::invariant(
                "peça com movimentações de estoque não pode ser excluída",
            ));
        }

        Ok(vec![PartEvent::PartDeleted(PartDeleted {
            part_id: cmd.part_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn test_part_id() -> PartId {
        PartId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn register(part_id: PartId, quantity: i64, min_stock: i64) -> RegisterPart {
        RegisterPart {
            part_id,
            name: "Filtro de óleo".to_string(),
            part_number: "FO-100".to_string(),
            description: None,
            category_id: None,
            cost_price: dec!(18.50),
            sale_price: dec!(32.90),
            initial_quantity: quantity,
            min_stock,
            location: Some("Prateleira A3".to_string()),
            occurred_at: test_time(),
        }
    }

    fn registered(quantity: i64, min_stock: i64) -> Part {
        let part_id = test_part_id();
        let mut part = Part::empty(part_id);
        let events = part
            .handle(&PartCommand::RegisterPart(register(part_id, quantity, min_stock)))
            .unwrap();
        for e in &events {
            part.apply(e);
        }
        part
    }

    fn entry(part: &Part, quantity: i64, reason: &str) -> PartCommand {
        PartCommand::RecordEntry(RecordEntry {
            part_id: part.id_typed(),
            movement_id: MovementId::new(),
            quantity,
            reason: reason.to_string(),
            cost_price: None,
            sale_price: None,
            work_order_id: None,
            actor: None,
            occurred_at: test_time(),
        })
    }

    fn exit(part: &Part, quantity: i64, reason: &str) -> PartCommand {
        PartCommand::RecordExit(RecordExit {
            part_id: part.id_typed(),
            movement_id: MovementId::new(),
            quantity,
            reason: reason.to_string(),
            work_order_id: None,
            actor: None,
            occurred_at: test_time(),
        })
    }

    fn run(part: &mut Part, cmd: &PartCommand) -> Result<Vec<PartEvent>, DomainError> {
        let events = part.handle(cmd)?;
        for e in &events {
            part.apply(e);
        }
        Ok(events)
    }

    #[test]
    fn register_sets_initial_quantity_without_a_movement() {
        let part = registered(7, 2);
        assert_eq!(part.quantity(), 7);
        assert_eq!(part.movement_count(), 0);
        assert_eq!(part.version(), 1);
        assert_eq!(part.name(), "Filtro de óleo");
    }

    #[test]
    fn register_rejects_blank_fields_and_bad_numbers() {
        let part_id = test_part_id();
        let part = Part::empty(part_id);

        let mut cmd = register(part_id, 1, 1);
        cmd.part_number = "  ".to_string();
        assert!(matches!(
            part.handle(&PartCommand::RegisterPart(cmd)),
            Err(DomainError::Validation(_))
        ));

        let mut cmd = register(part_id, 1, 1);
        cmd.sale_price = dec!(0);
        assert!(matches!(
            part.handle(&PartCommand::RegisterPart(cmd)),
            Err(DomainError::Validation(_))
        ));

        let mut cmd = register(part_id, -1, 1);
        cmd.min_stock = 0;
        assert!(matches!(
            part.handle(&PartCommand::RegisterPart(cmd)),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn register_twice_is_a_conflict() {
        let part = registered(1, 0);
        let err = part
            .handle(&PartCommand::RegisterPart(register(part.id_typed(), 1, 0)))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn commands_on_unregistered_part_are_not_found() {
        let part = Part::empty(test_part_id());
        assert_eq!(
            part.handle(&entry(&part, 1, "Compra do fornecedor X")).unwrap_err(),
            DomainError::not_found("peça não encontrada")
        );
        assert_eq!(
            part.handle(&exit(&part, 1, "Consumo na OS 1234")).unwrap_err(),
            DomainError::not_found("peça não encontrada")
        );
    }

    #[test]
    fn entry_from_zero_records_before_and_after() {
        let mut part = registered(0, 2);
        let cmd = entry(&part, 5, "Compra do fornecedor X");
        let events = run(&mut part, &cmd).unwrap();

        assert_eq!(part.quantity(), 5);
        let movement = events[0].movement().unwrap();
        assert_eq!(movement.kind, MovementKind::Entry);
        assert_eq!((movement.quantity_before, movement.delta, movement.quantity_after), (0, 5, 5));
        assert_eq!(movement.position, 1);
        assert!(movement.is_consistent());
    }

    #[test]
    fn entry_updates_prices_when_given() {
        let mut part = registered(0, 0);
        let cmd = PartCommand::RecordEntry(RecordEntry {
            part_id: part.id_typed(),
            movement_id: MovementId::new(),
            quantity: 3,
            reason: "Compra com reajuste".to_string(),
            cost_price: Some(dec!(20)),
            sale_price: None,
            work_order_id: None,
            actor: None,
            occurred_at: test_time(),
        });
        run(&mut part, &cmd).unwrap();

        assert_eq!(part.cost_price(), dec!(20));
        assert_eq!(part.sale_price(), dec!(32.90));
    }

    #[test]
    fn entry_rejects_non_positive_price() {
        let part = registered(0, 0);
        let cmd = PartCommand::RecordEntry(RecordEntry {
            part_id: part.id_typed(),
            movement_id: MovementId::new(),
            quantity: 3,
            reason: "Compra com reajuste".to_string(),
            cost_price: None,
            sale_price: Some(dec!(-1)),
            work_order_id: None,
            actor: None,
            occurred_at: test_time(),
        });
        assert!(matches!(part.handle(&cmd), Err(DomainError::Validation(_))));
    }

    #[test]
    fn non_positive_quantity_is_rejected() {
        let part = registered(10, 5);
        for q in [0, -3] {
            assert!(matches!(
                part.handle(&entry(&part, q, "Compra do fornecedor X")),
                Err(DomainError::Validation(_))
            ));
            assert!(matches!(
                part.handle(&exit(&part, q, "Consumo na OS 1234")),
                Err(DomainError::Validation(_))
            ));
        }
    }

    #[test]
    fn exit_to_four_with_threshold_five_alerts() {
        let mut part = registered(10, 5);
        let cmd = exit(&part, 6, "Consumo na OS 1234");
        let events = run(&mut part, &cmd).unwrap();

        assert_eq!(part.quantity(), 4);
        match &events[0] {
            PartEvent::StockExited(e) => {
                assert_eq!(e.movement.delta, -6);
                assert_eq!(e.movement.quantity_after, 4);
                let alert = e.alert.as_ref().unwrap();
                assert_eq!((alert.quantity, alert.threshold), (4, 5));
                assert_eq!(alert.part_name, "Filtro de óleo");
            }
            _ => panic!("Expected StockExited event"),
        }
    }

    #[test]
    fn exit_above_stock_is_rejected_and_changes_nothing() {
        let part = registered(10, 5);
        let before = part.clone();
        let err = part.handle(&exit(&part, 11, "Consumo na OS 1234")).unwrap_err();

        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(part, before);
        assert_eq!(part.quantity(), 10);
    }

    #[test]
    fn exit_of_everything_is_allowed() {
        let mut part = registered(3, 0);
        let cmd = exit(&part, 3, "Consumo na OS 1234");
        let events = run(&mut part, &cmd).unwrap();
        assert_eq!(part.quantity(), 0);
        assert!(matches!(&events[0], PartEvent::StockExited(e) if e.alert.is_some()));
    }

    #[test]
    fn reason_boundary_applies_to_entry_and_exit() {
        let part = registered(10, 0);
        assert!(part.handle(&entry(&part, 1, "123456789")).is_err());
        assert!(part.handle(&exit(&part, 1, "123456789")).is_err());
        assert!(part.handle(&entry(&part, 1, "1234567890")).is_ok());
        assert!(part.handle(&exit(&part, 1, "1234567890")).is_ok());
    }

    #[test]
    fn positions_follow_ledger_order_not_stream_order() {
        let mut part = registered(0, 0);
        let update = PartCommand::UpdatePartDetails(UpdatePartDetails {
            part_id: part.id_typed(),
            name: "Filtro de óleo".to_string(),
            part_number: "FO-100".to_string(),
            description: None,
            category_id: None,
            cost_price: dec!(18.50),
            sale_price: dec!(35),
            min_stock: 1,
            location: None,
            quantity: None,
            occurred_at: test_time(),
        });
        run(&mut part, &update).unwrap();
        let cmd = entry(&part, 2, "Compra do fornecedor X");
        let first = run(&mut part, &cmd).unwrap();
        let cmd = exit(&part, 1, "Consumo na OS 1234");
        let second = run(&mut part, &cmd).unwrap();

        assert_eq!(first[0].movement().unwrap().position, 1);
        assert_eq!(second[0].movement().unwrap().position, 2);
        assert_eq!(part.version(), 4);
    }

    #[test]
    fn direct_quantity_edit_only_before_first_movement() {
        let mut part = registered(2, 0);
        let edit = |part: &Part, quantity: i64| {
            PartCommand::UpdatePartDetails(UpdatePartDetails {
                part_id: part.id_typed(),
                name: part.name().to_string(),
                part_number: part.part_number().to_string(),
                description: None,
                category_id: None,
                cost_price: part.cost_price(),
                sale_price: part.sale_price(),
                min_stock: part.min_stock(),
                location: None,
                quantity: Some(quantity),
                occurred_at: test_time(),
            })
        };

        let cmd = edit(&part, 8);
        run(&mut part, &cmd).unwrap();
        assert_eq!(part.quantity(), 8);

        let cmd = entry(&part, 1, "Compra do fornecedor X");
        run(&mut part, &cmd).unwrap();
        let err = part.handle(&edit(&part, 3)).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));

        // Same value is accepted: the form sends the whole record back.
        let events = part.handle(&edit(&part, 9)).unwrap();
        assert!(matches!(&events[0], PartEvent::PartDetailsUpdated(e) if e.quantity.is_none()));
    }

    #[test]
    fn entry_that_would_overflow_quantity_is_rejected() {
        let part = registered(1, 0);
        let before = part.clone();
        let err = part.handle(&entry(&part, i64::MAX, "Compra do fornecedor X")).unwrap_err();

        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(part, before);
    }

    #[test]
    fn part_without_movements_can_be_deleted() {
        let mut part = registered(4, 1);
        let cmd = PartCommand::DeletePart(DeletePart {
            part_id: part.id_typed(),
            occurred_at: test_time(),
        });
        let events = run(&mut part, &cmd).unwrap();

        assert!(matches!(&events[0], PartEvent::PartDeleted(_)));
        assert!(part.is_deleted());
        assert!(!part.is_registered());
        assert_eq!(
            part.handle(&entry(&part, 1, "Compra do fornecedor X")).unwrap_err(),
            DomainError::not_found("peça não encontrada")
        );
        assert_eq!(part.handle(&cmd).unwrap_err(), DomainError::not_found("peça não encontrada"));
    }

    #[test]
    fn part_with_movements_cannot_be_deleted() {
        let mut part = registered(4, 1);
        let cmd = exit(&part, 1, "Consumo na OS 1234");
        run(&mut part, &cmd).unwrap();

        let err = part
            .handle(&PartCommand::DeletePart(DeletePart {
                part_id: part.id_typed(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
        assert!(part.is_registered());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            In(i64),
            Out(i64),
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![(1i64..50).prop_map(Op::In), (1i64..50).prop_map(Op::Out)]
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 500,
                ..ProptestConfig::default()
            })]

            /// Property: quantity == initial + sum of recorded deltas, and every row is consistent.
            #[test]
            fn quantity_is_initial_plus_sum_of_deltas(
                initial in 0i64..100,
                ops in prop::collection::vec(op(), 0..40),
            ) {
                let mut part = registered(initial, 5);
                let mut deltas = 0i64;

                for op in ops {
                    let cmd = match op {
                        Op::In(q) => entry(&part, q, "Compra do fornecedor X"),
                        Op::Out(q) => exit(&part, q, "Consumo na OS 1234"),
                    };
                    let before = part.clone();
                    match run(&mut part, &cmd) {
                        Ok(events) => {
                            let movement = events[0].movement().unwrap();
                            prop_assert!(movement.is_consistent());
                            deltas += movement.delta;
                        }
                        Err(_) => prop_assert_eq!(&part, &before),
                    }
                    prop_assert!(part.quantity() >= 0);
                }

                prop_assert_eq!(part.quantity(), initial + deltas);
            }

            /// Property: an exit above stock never applies.
            #[test]
            fn exit_above_stock_is_always_rejected(stock in 0i64..100, extra in 1i64..100) {
                let part = registered(stock, 0);
                let result = part.handle(&exit(&part, stock + extra, "Consumo na OS 1234"));
                prop_assert!(matches!(result, Err(DomainError::Validation(_))));
            }

            /// Property: an exit alerts exactly when it lands at or below the threshold.
            #[test]
            fn exit_alerts_iff_at_or_below_threshold(
                stock in 1i64..100,
                threshold in 0i64..100,
                take in 1i64..100,
            ) {
                prop_assume!(take <= stock);
                let part = registered(stock, threshold);
                let events = part.handle(&exit(&part, take, "Consumo na OS 1234")).unwrap();
                match &events[0] {
                    PartEvent::StockExited(e) => {
                        prop_assert_eq!(e.alert.is_some(), stock - take <= threshold);
                    }
                    _ => prop_assert!(false, "expected StockExited"),
                }
            }

            /// Property: handle never mutates state.
            #[test]
            fn handle_is_pure(stock in 0i64..50, q in 1i64..60) {
                let part = registered(stock, 3);
                let snapshot = part.clone();
                let a = part.handle(&exit(&part, q, "Consumo na OS 1234")).map(|e| e.len());
                let b = part.handle(&exit(&part, q, "Consumo na OS 1234")).map(|e| e.len());
                prop_assert_eq!(&part, &snapshot);
                prop_assert_eq!(a, b);
            }
        }
    }
}
