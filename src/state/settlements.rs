// Settlement operations of the entity store: each one runs against the cached
// ReconciliationDesk and writes the resulting changes through to MongoDB.

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId};
use serde_json::Value;
use tracing::{error, warn};

use crate::liquidation::{
    self, CashTransfer, CashTransferPatch, Change, DailyBatch, DailySettlement, LiquidationError,
    MonthOverview, MonthlyGeneration, ReconciliationDesk, Settlement, SettlementFilter,
    SettlementPayment, SettlementStatus, StatusUpdate, TransferFilter,
};

use super::{AppState, get_professional_by_id, list_appointments, list_professionals, professional_terms};

/// Reads the settlement side of the store into a fresh desk.
pub async fn load_desk(state: &AppState) -> Result<ReconciliationDesk> {
    let mut settlements = Vec::new();
    let mut cursor = state.settlements.find(doc! {}).await?;
    while let Some(settlement) = cursor.try_next().await? {
        settlements.push(settlement);
    }

    let mut transfers = Vec::new();
    let mut cursor = state.cash_transfers.find(doc! {}).await?;
    while let Some(transfer) = cursor.try_next().await? {
        transfers.push(transfer);
    }

    let mut payments = Vec::new();
    let mut cursor = state.settlement_payments.find(doc! {}).await?;
    while let Some(payment) = cursor.try_next().await? {
        payments.push(payment);
    }

    ReconciliationDesk::from_parts(settlements, transfers, payments).map_err(Into::into)
}

async fn persist(state: &AppState, changes: Vec<Change>) -> Result<()> {
    for change in changes {
        match change {
            Change::SettlementSaved(settlement) => {
                state
                    .settlements
                    .replace_one(doc! { "_id": settlement.id() }, &settlement)
                    .upsert(true)
                    .await?;
            }
            Change::SettlementRemoved(id) => {
                state.settlements.delete_one(doc! { "_id": id }).await?;
            }
            Change::SettlementsReplaced {
                clinic_id,
                settlements,
            } => {
                state
                    .settlements
                    .delete_many(doc! { "clinic_id": clinic_id })
                    .await?;
                if !settlements.is_empty() {
                    state.settlements.insert_many(&settlements).await?;
                }
            }
            Change::TransferSaved(transfer) => {
                state
                    .cash_transfers
                    .replace_one(doc! { "_id": transfer.id }, &transfer)
                    .upsert(true)
                    .await?;
            }
            Change::TransferRemoved(id) => {
                state.cash_transfers.delete_one(doc! { "_id": id }).await?;
            }
            Change::TransfersReplaced {
                clinic_id,
                transfers,
            } => {
                state
                    .cash_transfers
                    .delete_many(doc! { "clinic_id": clinic_id })
                    .await?;
                if !transfers.is_empty() {
                    state.cash_transfers.insert_many(&transfers).await?;
                }
            }
            Change::PaymentRecorded(payment) => {
                state.settlement_payments.insert_one(&payment).await?;
            }
        }
    }
    Ok(())
}

/// Runs `op` on the desk and stores what it changed. If storing fails the desk
/// is reloaded so memory does not drift from MongoDB.
async fn with_desk<T, F>(state: &AppState, op: F) -> Result<T>
where
    F: FnOnce(&mut ReconciliationDesk) -> liquidation::Result<T>,
{
    let mut desk = state.desk.lock().await;
    let outcome = op(&mut desk);
    let changes = desk.take_changes();
    let value = outcome?;

    if let Err(err) = persist(state, changes).await {
        warn!(error = %err, "failed to store settlement changes, reloading desk");
        match load_desk(state).await {
            Ok(fresh) => *desk = fresh,
            Err(reload_err) => error!(error = %reload_err, "desk reload failed"),
        }
        return Err(err.context("failed to store settlement changes"));
    }
    Ok(value)
}

pub async fn list_settlements(state: &AppState, filter: SettlementFilter) -> Vec<Settlement> {
    state.desk.lock().await.settlements(&filter)
}

pub async fn get_settlement(state: &AppState, id: &ObjectId) -> Option<Settlement> {
    state.desk.lock().await.settlement(id).cloned()
}

pub async fn list_cash_transfers(state: &AppState, filter: TransferFilter) -> Vec<CashTransfer> {
    state.desk.lock().await.cash_transfers(&filter)
}

pub async fn get_cash_transfer(state: &AppState, id: &ObjectId) -> Option<CashTransfer> {
    state.desk.lock().await.cash_transfer(id).cloned()
}

pub async fn list_settlement_payments(state: &AppState, id: &ObjectId) -> Vec<SettlementPayment> {
    state.desk.lock().await.payments_for(id)
}

pub async fn month_overview(
    state: &AppState,
    clinic_id: Option<ObjectId>,
    month: u32,
    year: i32,
) -> Result<MonthOverview> {
    state
        .desk
        .lock()
        .await
        .month_overview(clinic_id, month, year)
        .map_err(Into::into)
}

pub async fn generate_daily_settlement(
    state: &AppState,
    professional_id: &ObjectId,
    date: NaiveDate,
) -> Result<DailySettlement> {
    let professional = get_professional_by_id(state, professional_id)
        .await?
        .context("professional not found")?;
    let terms = professional_terms(state, &professional)?;
    let appointments = list_appointments(state, None, Some(professional_id), Some(date)).await?;

    with_desk(state, |desk| {
        desk.generate_daily_settlement(&terms, date, &appointments, Utc::now())
    })
    .await
}

/// Daily generation for every active professional of a clinic.
pub async fn generate_daily_settlements_for_clinic(
    state: &AppState,
    clinic_id: &ObjectId,
    date: NaiveDate,
) -> Result<DailyBatch> {
    let terms = list_professionals(state)
        .await?
        .iter()
        .filter(|p| p.is_active && p.clinic_id == *clinic_id)
        .map(|p| professional_terms(state, p))
        .collect::<Result<Vec<_>>>()?;
    let appointments = list_appointments(state, Some(clinic_id), None, Some(date)).await?;

    with_desk(state, |desk| {
        Ok(desk.generate_daily_batch(&terms, date, &appointments, Utc::now()))
    })
    .await
}

/// `month` is 0-indexed.
pub async fn generate_settlement(
    state: &AppState,
    professional_id: &ObjectId,
    month: u32,
    year: i32,
) -> Result<MonthlyGeneration> {
    with_desk(state, |desk| {
        desk.generate_settlement(*professional_id, month, year, Utc::now())
    })
    .await
}

pub async fn update_settlement_status(
    state: &AppState,
    id: &ObjectId,
    status: SettlementStatus,
) -> Result<StatusUpdate> {
    with_desk(state, |desk| {
        desk.update_settlement_status(id, status, Utc::now())
    })
    .await
}

pub async fn add_settlement_payment(
    state: &AppState,
    id: &ObjectId,
    amount: f64,
    notes: Option<String>,
) -> Result<SettlementPayment> {
    with_desk(state, |desk| {
        desk.add_settlement_payment(id, amount, notes, Utc::now())
    })
    .await
}

pub async fn delete_settlement(state: &AppState, id: &ObjectId) -> Result<Settlement> {
    with_desk(state, |desk| desk.delete_settlement(id)).await
}

pub async fn confirm_cash_transfer(state: &AppState, id: &ObjectId) -> Result<CashTransfer> {
    with_desk(state, |desk| desk.confirm_cash_transfer(id, Utc::now())).await
}

pub async fn update_cash_transfer(
    state: &AppState,
    id: &ObjectId,
    patch: CashTransferPatch,
) -> Result<CashTransfer> {
    with_desk(state, |desk| desk.update_cash_transfer(id, patch)).await
}

pub async fn delete_cash_transfer(state: &AppState, id: &ObjectId) -> Result<CashTransfer> {
    with_desk(state, |desk| desk.delete_cash_transfer(id)).await
}

/// Replaces the settlements of one clinic; other clinics' rows are kept.
/// Rows may use the current format or the legacy one.
pub async fn set_settlements(
    state: &AppState,
    clinic_id: &ObjectId,
    rows: Vec<Value>,
) -> Result<usize> {
    let incoming = rows
        .into_iter()
        .map(|row| liquidation::settlement_from_json(row, *clinic_id))
        .collect::<std::result::Result<Vec<_>, LiquidationError>>()?;
    let count = incoming.len();
    with_desk(state, |desk| desk.set_settlements(*clinic_id, incoming)).await?;
    Ok(count)
}

/// Replaces the cash transfers of one clinic; other clinics' rows are kept.
pub async fn set_cash_transfers(
    state: &AppState,
    clinic_id: &ObjectId,
    incoming: Vec<CashTransfer>,
) -> Result<usize> {
    let count = incoming.len();
    with_desk(state, |desk| desk.set_cash_transfers(*clinic_id, incoming)).await?;
    Ok(count)
}
