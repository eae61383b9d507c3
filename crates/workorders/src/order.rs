use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use oficina_core::{Aggregate, AggregateId, AggregateRoot, DomainError, WorkOrderId};
use oficina_events::Event;

use crate::status::WorkOrderStatus;
use crate::totals::{PartLine, ServiceLine, WorkOrderTotals, work_order_total};

macro_rules! reference_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub AggregateId);

        impl $name {
            pub fn new(id: AggregateId) -> Self {
                Self(id)
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

reference_id!(
    /// Customer record owned by the client registry.
    ClientId
);
reference_id!(VehicleId);
reference_id!(MechanicId);
reference_id!(
    /// Entry in the service price list.
    ServiceId
);

/// Aggregate root: WorkOrder (OS).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkOrder {
    id: WorkOrderId,
    client_id: Option<ClientId>,
    vehicle_id: Option<VehicleId>,
    mechanic_id: Option<MechanicId>,
    status: WorkOrderStatus,
    opened_at: Option<DateTime<Utc>>,
    closed_at: Option<DateTime<Utc>>,
    problem_description: Option<String>,
    notes: Option<String>,
    payment_method: Option<String>,
    discount: Decimal,
    services: Vec<ServiceLine>,
    parts: Vec<PartLine>,
    version: u64,
    created: bool,
}

impl WorkOrder {
    pub fn empty(id: WorkOrderId) -> Self {
        Self {
            id,
            client_id: None,
            vehicle_id: None,
            mechanic_id: None,
            status: WorkOrderStatus::Awaiting,
            opened_at: None,
            closed_at: None,
            problem_description: None,
            notes: None,
            payment_method: None,
            discount: Decimal::ZERO,
            services: Vec::new(),
            parts: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.created
    }

    pub fn status(&self) -> WorkOrderStatus {
        self.status
    }

    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        self.closed_at
    }

    pub fn services(&self) -> &[ServiceLine] {
        &self.services
    }

    pub fn parts(&self) -> &[PartLine] {
        &self.parts
    }

    pub fn discount(&self) -> Decimal {
        self.discount
    }

    /// Recomputed from the stored lines; lines were validated on open.
    pub fn totals(&self) -> Result<WorkOrderTotals, DomainError> {
        work_order_total(&self.services, &self.parts, self.discount)
    }
}

impl AggregateRoot for WorkOrder {
    type Id = WorkOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenWorkOrder {
    pub work_order_id: WorkOrderId,
    pub client_id: ClientId,
    pub vehicle_id: VehicleId,
    pub mechanic_id: MechanicId,
    /// Defaults to `Aguardando`.
    pub status: Option<WorkOrderStatus>,
    pub problem_description: Option<String>,
    pub notes: Option<String>,
    pub payment_method: Option<String>,
    pub discount: Decimal,
    pub services: Vec<ServiceLine>,
    pub parts: Vec<PartLine>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeStatus {
    pub work_order_id: WorkOrderId,
    pub status: WorkOrderStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkOrderCommand {
    OpenWorkOrder(OpenWorkOrder),
    ChangeStatus(ChangeStatus),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkOrderOpened {
    pub work_order_id: WorkOrderId,
    pub client_id: ClientId,
    pub vehicle_id: VehicleId,
    pub mechanic_id: MechanicId,
    pub status: WorkOrderStatus,
    pub problem_description: Option<String>,
    pub notes: Option<String>,
    pub payment_method: Option<String>,
    pub discount: Decimal,
    pub services: Vec<ServiceLine>,
    pub parts: Vec<PartLine>,
    pub total: Decimal,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkOrderStatusChanged {
    pub work_order_id: WorkOrderId,
    pub from: WorkOrderStatus,
    pub to: WorkOrderStatus,
    pub closed_at: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkOrderEvent {
    WorkOrderOpened(WorkOrderOpened),
    WorkOrderStatusChanged(WorkOrderStatusChanged),
}

impl Event for WorkOrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            WorkOrderEvent::WorkOrderOpened(_) => "workorders.order.opened",
            WorkOrderEvent::WorkOrderStatusChanged(_) => "workorders.order.status_changed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            WorkOrderEvent::WorkOrderOpened(e) => e.opened_at,
            WorkOrderEvent::WorkOrderStatusChanged(e) => e.occurred_at,
        }
    }
}

impl Aggregate for WorkOrder {
    type Command = WorkOrderCommand;
    type Event = WorkOrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            WorkOrderEvent::WorkOrderOpened(e) => {
                self.id = e.work_order_id;
                self.client_id = Some(e.client_id);
                self.vehicle_id = Some(e.vehicle_id);
                self.mechanic_id = Some(e.mechanic_id);
                self.status = e.status;
                self.opened_at = Some(e.opened_at);
                self.closed_at = e.closed_at;
                self.problem_description = e.problem_description.clone();
                self.notes = e.notes.clone();
                self.payment_method = e.payment_method.clone();
                self.discount = e.discount;
                self.services = e.services.clone();
                self.parts = e.parts.clone();
                self.created = true;
            }
            WorkOrderEvent::WorkOrderStatusChanged(e) => {
                self.status = e.to;
                if e.closed_at.is_some() {
                    self.closed_at = e.closed_at;
                }
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            WorkOrderCommand::OpenWorkOrder(cmd) => self.handle_open(cmd),
            WorkOrderCommand::ChangeStatus(cmd) => self.handle_change_status(cmd),
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl WorkOrder {
    fn handle_open(&self, cmd: &OpenWorkOrder) -> Result<Vec<WorkOrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("OS já aberta"));
        }
        let totals = work_order_total(&cmd.services, &cmd.parts, cmd.discount)?;
        let status = cmd.status.unwrap_or_default();
        if status.is_terminal() {
            return Err(DomainError::validation("OS não pode ser aberta como paga"));
        }
        let closed_at = status.closes_order().then_some(cmd.occurred_at);

        Ok(vec![WorkOrderEvent::WorkOrderOpened(WorkOrderOpened {
            work_order_id: cmd.work_order_id,
            client_id: cmd.client_id,
            vehicle_id: cmd.vehicle_id,
            mechanic_id: cmd.mechanic_id,
            status,
            problem_description: non_blank(&cmd.problem_description),
            notes: non_blank(&cmd.notes),
            payment_method: non_blank(&cmd.payment_method),
            discount: cmd.discount,
            services: cmd.services.clone(),
            parts: cmd.parts.clone(),
            total: totals.total,
            opened_at: cmd.occurred_at,
            closed_at,
        })])
    }

    fn handle_change_status(&self, cmd: &ChangeStatus) -> Result<Vec<WorkOrderEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found("OS não encontrada"));
        }
        if self.id != cmd.work_order_id {
            return Err(DomainError::invariant("work_order_id mismatch"));
        }
        if self.status == cmd.status {
            return Ok(vec![]);
        }
        if self.status.is_terminal() {
            return Err(DomainError::invariant(format!(
                "OS com status {} não pode ser alterada",
                self.status
            )));
        }

        let closed_at = match self.closed_at {
            None if cmd.status.closes_order() => Some(cmd.occurred_at),
            _ => None,
        };

        Ok(vec![WorkOrderEvent::WorkOrderStatusChanged(WorkOrderStatusChanged {
            work_order_id: cmd.work_order_id,
            from: self.status,
            to: cmd.status,
            closed_at,
            occurred_at: cmd.occurred_at,
        })])
    }
}
