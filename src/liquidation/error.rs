// liquidation/error.rs
// Error type shared by the settlement generator, reconciler, workflow and ledger.

use chrono::NaiveDate;
use mongodb::bson::oid::ObjectId;
use thiserror::Error;

use super::model::SettlementStatus;

/// What kind of record a lookup was looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Settlement,
    CashTransfer,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Settlement => "liquidación",
            RecordKind::CashTransfer => "traspaso de caja",
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum LiquidationError {
    #[error("{} {id} no encontrada", kind.as_str())]
    NotFound { kind: RecordKind, id: ObjectId },

    #[error("ya existe una liquidación diaria para el profesional {professional_id} en {date}")]
    DuplicateDaily {
        professional_id: ObjectId,
        date: NaiveDate,
    },

    #[error(
        "ya existe una liquidación mensual para el profesional {professional_id} en {month}/{year}"
    )]
    DuplicateMonthly {
        professional_id: ObjectId,
        /// 1-indexed, as shown to operators.
        month: u32,
        year: i32,
    },

    #[error(
        "ya existe un traspaso pendiente para el profesional {professional_id} en {month}/{year}"
    )]
    DuplicatePendingTransfer {
        professional_id: ObjectId,
        month: u32,
        year: i32,
    },

    #[error("no hay turnos atendidos ni ausentes para el profesional {professional_id} en {date}")]
    NoAppointments {
        professional_id: ObjectId,
        date: NaiveDate,
    },

    #[error(
        "no hay liquidaciones diarias para el profesional {professional_id} en {month}/{year}"
    )]
    NoDailySettlements {
        professional_id: ObjectId,
        month: u32,
        year: i32,
    },

    #[error("período inválido: mes {month} (se espera 0-11)")]
    InvalidPeriod { month: u32 },

    #[error("monto inválido: {0}")]
    InvalidAmount(f64),

    #[error("porcentaje del profesional inválido: {0} (se espera 0-1)")]
    InvalidPercentage(f64),

    #[error("la liquidación {0} no es mensual")]
    NotMonthly(ObjectId),

    #[error("transición de estado inválida: {from} -> {to}")]
    InvalidTransition {
        from: SettlementStatus,
        to: SettlementStatus,
    },

    #[error("registro inválido: {0}")]
    InvalidRecord(String),
}

impl LiquidationError {
    pub fn settlement_not_found(id: ObjectId) -> Self {
        LiquidationError::NotFound {
            kind: RecordKind::Settlement,
            id,
        }
    }

    pub fn transfer_not_found(id: ObjectId) -> Self {
        LiquidationError::NotFound {
            kind: RecordKind::CashTransfer,
            id,
        }
    }

    /// Precondition failures: the operation refused to run but nothing is wrong
    /// with the stored data.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            LiquidationError::DuplicateDaily { .. }
                | LiquidationError::DuplicateMonthly { .. }
                | LiquidationError::DuplicatePendingTransfer { .. }
                | LiquidationError::NoAppointments { .. }
                | LiquidationError::NoDailySettlements { .. }
                | LiquidationError::InvalidTransition { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, LiquidationError>;
