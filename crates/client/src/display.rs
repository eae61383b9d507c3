//! Presentation formatting: BRL money, local timestamps, movement labels.

use chrono::{DateTime, Local, TimeZone, Utc};
use rust_decimal::Decimal;

use oficina_core::format_currency;
use oficina_inventory::MovementKind;

use crate::types::{HistoryMovement, MovementOrigin};

pub const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M";

/// `R$ 1.234,56`
pub fn money(amount: Decimal) -> String {
    format_currency(amount)
}

/// `dd/MM/yyyy HH:mm` in the machine's local zone.
pub fn timestamp(at: DateTime<Utc>) -> String {
    timestamp_in(at, &Local)
}

pub fn timestamp_in<Tz: TimeZone>(at: DateTime<Utc>, zone: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.with_timezone(zone).format(TIMESTAMP_FORMAT).to_string()
}

pub fn movement_kind(kind: MovementKind) -> &'static str {
    kind.label()
}

/// `+5` for entries, `-3` for exits.
pub fn signed_quantity(kind: MovementKind, quantity: i64) -> String {
    match kind {
        MovementKind::Entry => format!("+{quantity}"),
        MovementKind::Exit => format!("-{quantity}"),
    }
}

/// Who made the movement; system-originated rows read "Sistema".
pub fn movement_author(row: &HistoryMovement) -> &str {
    match row.origin {
        MovementOrigin::System => "Sistema",
        MovementOrigin::User => &row.actor_name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;
    use oficina_core::AggregateId;
    use rust_decimal_macros::dec;

    use crate::types::Movement;

    #[test]
    fn money_is_brazilian_reais_with_two_decimals() {
        assert_eq!(money(dec!(1234.5)), "R$ 1.234,50");
        assert_eq!(money(dec!(0)), "R$ 0,00");
    }

    #[test]
    fn timestamps_render_in_the_given_zone() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 2, 5, 0).unwrap();
        let sao_paulo = FixedOffset::west_opt(3 * 3600).unwrap();
        assert_eq!(timestamp_in(at, &sao_paulo), "29/02/2024 23:05");
        assert_eq!(timestamp_in(at, &Utc), "01/03/2024 02:05");
    }

    #[test]
    fn labels_and_authors() {
        assert_eq!(movement_kind(MovementKind::Entry), "Entrada");
        assert_eq!(movement_kind(MovementKind::Exit), "Saída");
        assert_eq!(signed_quantity(MovementKind::Exit, 3), "-3");

        let mut row = HistoryMovement {
            movement: Movement {
                id: oficina_inventory::MovementId::new(),
                part_id: oficina_inventory::PartId::new(AggregateId::new()),
                work_order_id: None,
                user_id: None,
                kind: MovementKind::Entry,
                quantity: 5,
                quantity_before: 0,
                quantity_after: 5,
                reason: "Compra do fornecedor X".to_string(),
                occurred_at: Utc::now(),
                position: 1,
            },
            actor_name: "Carlos".to_string(),
            origin: MovementOrigin::User,
        };
        assert_eq!(movement_author(&row), "Carlos");

        row.origin = MovementOrigin::System;
        assert_eq!(movement_author(&row), "Sistema");
    }
}
