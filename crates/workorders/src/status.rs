use core::str::FromStr;

use serde::{Deserialize, Serialize};

use oficina_core::DomainError;

/// OS status, using the vocabulary of the shared entity types.
///
/// `Concluído` (accented) is accepted on input and normalised. The older
/// screen-level names (`Agendamento`, `Finalizada`) are not part of the
/// contract and are rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkOrderStatus {
    #[default]
    #[serde(rename = "Aguardando")]
    Awaiting,
    #[serde(rename = "Em Andamento")]
    InProgress,
    #[serde(rename = "Concluido", alias = "Concluído")]
    Completed,
    #[serde(rename = "Pago")]
    Paid,
}

impl WorkOrderStatus {
    pub const ALL: [WorkOrderStatus; 4] = [
        WorkOrderStatus::Awaiting,
        WorkOrderStatus::InProgress,
        WorkOrderStatus::Completed,
        WorkOrderStatus::Paid,
    ];

    pub fn wire_name(self) -> &'static str {
        match self {
            WorkOrderStatus::Awaiting => "Aguardando",
            WorkOrderStatus::InProgress => "Em Andamento",
            WorkOrderStatus::Completed => "Concluido",
            WorkOrderStatus::Paid => "Pago",
        }
    }

    /// Display label.
    pub fn label(self) -> &'static str {
        match self {
            WorkOrderStatus::Completed => "Concluído",
            other => other.wire_name(),
        }
    }

    /// No transition leaves a terminal status.
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkOrderStatus::Paid)
    }

    /// Entering this status stamps the closing date.
    pub fn closes_order(self) -> bool {
        matches!(self, WorkOrderStatus::Completed | WorkOrderStatus::Paid)
    }
}

impl core::fmt::Display for WorkOrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for WorkOrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Aguardando" => Ok(WorkOrderStatus::Awaiting),
            "Em Andamento" => Ok(WorkOrderStatus::InProgress),
            "Concluido" | "Concluído" => Ok(WorkOrderStatus::Completed),
            "Pago" => Ok(WorkOrderStatus::Paid),
            other => Err(DomainError::validation(format!("status de OS desconhecido: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accented_completed_is_normalised() {
        let parsed: WorkOrderStatus = serde_json::from_str("\"Concluído\"").unwrap();
        assert_eq!(parsed, WorkOrderStatus::Completed);
        assert_eq!(serde_json::to_string(&parsed).unwrap(), "\"Concluido\"");
        assert_eq!("Concluído".parse::<WorkOrderStatus>().unwrap(), parsed);
    }

    #[test]
    fn legacy_vocabulary_is_rejected() {
        for legacy in ["Agendamento", "Finalizada"] {
            assert!(legacy.parse::<WorkOrderStatus>().is_err());
            assert!(serde_json::from_str::<WorkOrderStatus>(&format!("\"{legacy}\"")).is_err());
        }
    }

    #[test]
    fn wire_names_round_trip_through_from_str() {
        for status in WorkOrderStatus::ALL {
            assert_eq!(status.wire_name().parse::<WorkOrderStatus>().unwrap(), status);
        }
    }
}
