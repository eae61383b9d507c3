//! Work orders (OS, "ordem de serviço"), as far as they touch the parts ledger.
//!
//! Every OS total in the system is produced by [`totals::work_order_total`].

pub mod order;
pub mod status;
pub mod totals;

pub use order::{
    ChangeStatus, ClientId, MechanicId, OpenWorkOrder, ServiceId, VehicleId, WorkOrder,
    WorkOrderCommand, WorkOrderEvent, WorkOrderOpened, WorkOrderStatusChanged,
};
pub use status::WorkOrderStatus;
pub use totals::{PartLine, ServiceLine, WorkOrderTotals, line_total, work_order_total};
