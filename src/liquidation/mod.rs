//! Settlement (liquidación) and cash-transfer (traspaso de caja) reconciliation.
//!
//! Everything here is synchronous and free of I/O: the desk holds the
//! collections, each operation validates and mutates them, and the resulting
//! [`Change`]s are persisted by the entity store in `crate::state`.

mod book;
mod desk;
mod error;
mod generator;
mod legacy;
mod model;
mod payments;
mod transfers;
mod workflow;

pub use book::SettlementBook;
pub use desk::{
    Change, DailyBatch, MonthOverview, MonthlyGeneration, OverviewRow, ReconciliationDesk,
    SettlementFilter, StatusUpdate, TransferFilter,
};
pub use error::{LiquidationError, RecordKind, Result};
pub use generator::{
    ProfessionalTerms, RevenueSplit, daily_settlement, monthly_settlement, validate_percentage,
};
pub use legacy::settlement_from_json;
pub use model::*;
pub use payments::{post_payment, validate_payment_amount};
pub use transfers::{TransferBook, TransferUpsert};
pub use workflow::{StatusEffect, Transition, plan_transition};
