//! The one place an OS total is computed.
//!
//! The aggregate stores what this returns when the order is opened, read
//! models and the client re-derive it from the same lines, so displayed and
//! persisted totals cannot drift.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use oficina_core::{DomainError, DomainResult, ValueObject};
use oficina_inventory::PartId;

use crate::order::ServiceId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceLine {
    pub service_id: ServiceId,
    pub unit_price: Decimal,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartLine {
    pub part_id: PartId,
    pub unit_price: Decimal,
    pub quantity: i64,
}

impl ValueObject for ServiceLine {}
impl ValueObject for PartLine {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkOrderTotals {
    pub services: Decimal,
    pub parts: Decimal,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
}

/// `unit_price × quantity`, rejected when it does not fit in a `Decimal`.
pub fn line_total(unit_price: Decimal, quantity: i64) -> DomainResult<Decimal> {
    unit_price
        .checked_mul(Decimal::from(quantity))
        .ok_or_else(value_too_large)
}

fn value_too_large() -> DomainError {
    DomainError::validation("valor da OS excede o limite suportado")
}

fn add(a: Decimal, b: Decimal) -> DomainResult<Decimal> {
    a.checked_add(b).ok_or_else(value_too_large)
}

fn check_line(unit_price: Decimal, quantity: i64, what: &str) -> DomainResult<()> {
    if quantity <= 0 {
        return Err(DomainError::validation(format!(
            "quantidade do item de {what} deve ser maior que zero"
        )));
    }
    if unit_price < Decimal::ZERO {
        return Err(DomainError::validation(format!(
            "preço do item de {what} não pode ser negativo"
        )));
    }
    Ok(())
}

/// Σ services + Σ parts − discount.
///
/// Rejects non-positive line quantities, negative unit prices, and a discount
/// outside `0..=subtotal`.
pub fn work_order_total(
    services: &[ServiceLine],
    parts: &[PartLine],
    discount: Decimal,
) -> DomainResult<WorkOrderTotals> {
    let mut services_sum = Decimal::ZERO;
    for line in services {
        check_line(line.unit_price, line.quantity, "serviço")?;
        services_sum = add(services_sum, line_total(line.unit_price, line.quantity)?)?;
    }

    let mut parts_sum = Decimal::ZERO;
    for line in parts {
        check_line(line.unit_price, line.quantity, "peça")?;
        parts_sum = add(parts_sum, line_total(line.unit_price, line.quantity)?)?;
    }

    let subtotal = add(services_sum, parts_sum)?;
    if discount < Decimal::ZERO {
        return Err(DomainError::validation("desconto não pode ser negativo"));
    }
    if discount > subtotal {
        return Err(DomainError::validation("desconto não pode exceder o subtotal"));
    }

    Ok(WorkOrderTotals {
        services: services_sum,
        parts: parts_sum,
        subtotal,
        discount,
        total: subtotal - discount,
    })
}
