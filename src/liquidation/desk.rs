// liquidation/desk.rs
// ReconciliationDesk: owns the settlement and transfer collections, runs every
// operation against them and records what changed for the store to persist.

use chrono::{DateTime, NaiveDate, Utc};
use mongodb::bson::oid::ObjectId;
use serde::Serialize;
use tracing::info;

use super::book::SettlementBook;
use super::error::{LiquidationError, Result};
use super::generator::{self, ProfessionalTerms};
use super::model::{
    Appointment, CashTransfer, CashTransferPatch, DailySettlement, MonthlySettlement, Settlement,
    SettlementKind, SettlementPayment, SettlementPeriod, SettlementStatus, TransferStatus,
    round_money,
};
use super::payments;
use super::transfers::{TransferBook, TransferUpsert};
use super::workflow::{self, StatusEffect};

/// A mutation the persistent store has to mirror.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    SettlementSaved(Settlement),
    SettlementRemoved(ObjectId),
    /// Every settlement of `clinic_id` is replaced by `settlements`.
    SettlementsReplaced {
        clinic_id: ObjectId,
        settlements: Vec<Settlement>,
    },
    TransferSaved(CashTransfer),
    TransferRemoved(ObjectId),
    TransfersReplaced {
        clinic_id: ObjectId,
        transfers: Vec<CashTransfer>,
    },
    PaymentRecorded(SettlementPayment),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyGeneration {
    pub settlement: MonthlySettlement,
    pub transfer: TransferUpsert,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub settlement: Settlement,
    pub transfer: Option<TransferUpsert>,
}

/// Outcome of generating the dailies of every professional for one date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailyBatch {
    pub generated: Vec<DailySettlement>,
    pub skipped: Vec<(ObjectId, LiquidationError)>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SettlementFilter {
    pub clinic_id: Option<ObjectId>,
    pub professional_id: Option<ObjectId>,
    pub kind: Option<SettlementKind>,
    /// 0-indexed.
    pub month: Option<u32>,
    pub year: Option<i32>,
}

impl SettlementFilter {
    pub fn matches(&self, settlement: &Settlement) -> bool {
        let period = settlement.period();
        self.clinic_id.is_none_or(|id| settlement.clinic_id() == id)
            && self
                .professional_id
                .is_none_or(|id| settlement.professional_id() == id)
            && self.kind.is_none_or(|kind| settlement.kind() == kind)
            && self.month.is_none_or(|month| period.month == month)
            && self.year.is_none_or(|year| period.year == year)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TransferFilter {
    pub clinic_id: Option<ObjectId>,
    pub professional_id: Option<ObjectId>,
    pub status: Option<TransferStatus>,
}

impl TransferFilter {
    pub fn matches(&self, transfer: &CashTransfer) -> bool {
        self.clinic_id.is_none_or(|id| transfer.clinic_id == id)
            && self
                .professional_id
                .is_none_or(|id| transfer.professional_id == id)
            && self.status.is_none_or(|status| transfer.status == status)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OverviewRow {
    pub professional_id: ObjectId,
    pub monthly_settlement_id: Option<ObjectId>,
    pub status: Option<SettlementStatus>,
    pub daily_settlements: usize,
    pub attended_appointments: u32,
    pub no_show_appointments: u32,
    pub total_tense_commission: f64,
    pub total_paid: f64,
    pub outstanding_balance: f64,
    pub pending_transfer_amount: Option<f64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MonthOverview {
    pub month: u32,
    pub year: i32,
    pub rows: Vec<OverviewRow>,
    pub total_tense_commission: f64,
    pub total_paid: f64,
    pub total_outstanding: f64,
}

#[derive(Debug, Clone, Default)]
pub struct ReconciliationDesk {
    settlements: SettlementBook,
    transfers: TransferBook,
    payments: Vec<SettlementPayment>,
    changes: Vec<Change>,
}

impl ReconciliationDesk {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads stored collections; fails if they break the uniqueness rules.
    pub fn from_parts(
        settlements: Vec<Settlement>,
        transfers: Vec<CashTransfer>,
        payments: Vec<SettlementPayment>,
    ) -> Result<Self> {
        Ok(ReconciliationDesk {
            settlements: SettlementBook::from_settlements(settlements)?,
            transfers: TransferBook::from_transfers(transfers)?,
            payments,
            changes: Vec::new(),
        })
    }

    /// Drains the changes recorded since the last call.
    pub fn take_changes(&mut self) -> Vec<Change> {
        std::mem::take(&mut self.changes)
    }

    pub fn settlement(&self, id: &ObjectId) -> Option<&Settlement> {
        self.settlements.get(id)
    }

    pub fn cash_transfer(&self, id: &ObjectId) -> Option<&CashTransfer> {
        self.transfers.get(id)
    }

    pub fn settlement_count(&self) -> usize {
        self.settlements.len()
    }

    pub fn transfer_count(&self) -> usize {
        self.transfers.len()
    }

    pub fn settlements(&self, filter: &SettlementFilter) -> Vec<Settlement> {
        self.settlements
            .iter()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect()
    }

    pub fn cash_transfers(&self, filter: &TransferFilter) -> Vec<CashTransfer> {
        self.transfers
            .iter()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect()
    }

    pub fn payments_for(&self, settlement_id: &ObjectId) -> Vec<SettlementPayment> {
        self.payments
            .iter()
            .filter(|p| p.settlement_id == *settlement_id)
            .cloned()
            .collect()
    }

    pub fn generate_daily_settlement(
        &mut self,
        terms: &ProfessionalTerms,
        date: NaiveDate,
        appointments: &[Appointment],
        now: DateTime<Utc>,
    ) -> Result<DailySettlement> {
        if self.settlements.daily_for(&terms.professional_id, date).is_some() {
            return Err(LiquidationError::DuplicateDaily {
                professional_id: terms.professional_id,
                date,
            });
        }
        let daily = generator::daily_settlement(terms, date, appointments, now)?;
        self.settlements.insert(Settlement::Daily(daily.clone()))?;
        self.changes
            .push(Change::SettlementSaved(Settlement::Daily(daily.clone())));
        info!(
            settlement = %daily.id,
            professional = %daily.professional_id,
            %date,
            commission = daily.total_tense_commission,
            "daily settlement generated"
        );
        Ok(daily)
    }

    /// Generates the dailies of several professionals; failures are collected
    /// instead of aborting the batch.
    pub fn generate_daily_batch(
        &mut self,
        terms: &[ProfessionalTerms],
        date: NaiveDate,
        appointments: &[Appointment],
        now: DateTime<Utc>,
    ) -> DailyBatch {
        let mut batch = DailyBatch::default();
        for t in terms {
            match self.generate_daily_settlement(t, date, appointments, now) {
                Ok(daily) => batch.generated.push(daily),
                Err(err) => batch.skipped.push((t.professional_id, err)),
            }
        }
        batch
    }

    /// Aggregates a professional's month and reconciles its cash transfer.
    /// `month` is 0-indexed.
    pub fn generate_settlement(
        &mut self,
        professional_id: ObjectId,
        month: u32,
        year: i32,
        now: DateTime<Utc>,
    ) -> Result<MonthlyGeneration> {
        let period = SettlementPeriod::new(month, year)?;
        if self.settlements.monthly_for(&professional_id, period).is_some() {
            return Err(LiquidationError::DuplicateMonthly {
                professional_id,
                month: month + 1,
                year,
            });
        }

        let monthly = generator::monthly_settlement(
            professional_id,
            period,
            self.settlements.dailies_in(&professional_id, period),
            now,
        )?;
        let transfer = self.transfers.upsert_pending(
            monthly.clinic_id,
            professional_id,
            period,
            monthly.total_tense_commission,
            now,
        )?;
        self.settlements
            .insert(Settlement::Monthly(monthly.clone()))?;

        self.changes
            .push(Change::SettlementSaved(Settlement::Monthly(monthly.clone())));
        self.changes
            .push(Change::TransferSaved(transfer.transfer.clone()));
        info!(
            settlement = %monthly.id,
            professional = %professional_id,
            month = month + 1,
            year,
            commission = monthly.total_tense_commission,
            transfer = %transfer.transfer.id,
            "monthly settlement generated"
        );
        Ok(MonthlyGeneration {
            settlement: monthly,
            transfer,
        })
    }

    pub fn update_settlement_status(
        &mut self,
        id: &ObjectId,
        status: SettlementStatus,
        now: DateTime<Utc>,
    ) -> Result<StatusUpdate> {
        let settlement = self
            .settlements
            .get(id)
            .ok_or_else(|| LiquidationError::settlement_not_found(*id))?;
        let transition = workflow::plan_transition(settlement, status)?;
        if transition.is_noop() {
            return Ok(StatusUpdate {
                settlement: settlement.clone(),
                transfer: None,
            });
        }

        let transfer = match transition.effect {
            StatusEffect::None => None,
            StatusEffect::ReconcileTransfer {
                clinic_id,
                professional_id,
                period,
                amount,
            } => Some(
                self.transfers
                    .upsert_pending(clinic_id, professional_id, period, amount, now)?,
            ),
        };

        let settlement = self
            .settlements
            .get_mut(id)
            .ok_or_else(|| LiquidationError::settlement_not_found(*id))?;
        settlement.set_status(status);
        let settlement = settlement.clone();

        self.changes.push(Change::SettlementSaved(settlement.clone()));
        if let Some(upsert) = &transfer {
            self.changes
                .push(Change::TransferSaved(upsert.transfer.clone()));
        }
        info!(
            settlement = %id,
            from = %transition.from,
            to = %transition.to,
            "settlement status updated"
        );
        Ok(StatusUpdate {
            settlement,
            transfer,
        })
    }

    pub fn add_settlement_payment(
        &mut self,
        id: &ObjectId,
        amount: f64,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<SettlementPayment> {
        let settlement = self
            .settlements
            .get_mut(id)
            .ok_or_else(|| LiquidationError::settlement_not_found(*id))?;
        let payment = payments::post_payment(settlement, amount, notes, now)?;
        let saved = settlement.clone();

        self.payments.push(payment.clone());
        self.changes.push(Change::SettlementSaved(saved));
        self.changes.push(Change::PaymentRecorded(payment.clone()));
        info!(
            settlement = %id,
            amount,
            total_paid = payment.total_paid_after,
            "settlement payment recorded"
        );
        Ok(payment)
    }

    pub fn delete_settlement(&mut self, id: &ObjectId) -> Result<Settlement> {
        let removed = self.settlements.remove(id)?;
        self.changes.push(Change::SettlementRemoved(*id));
        info!(settlement = %id, kind = ?removed.kind(), "settlement deleted");
        Ok(removed)
    }

    pub fn confirm_cash_transfer(
        &mut self,
        id: &ObjectId,
        now: DateTime<Utc>,
    ) -> Result<CashTransfer> {
        let transfer = self.transfers.confirm(id, now)?.clone();
        self.changes.push(Change::TransferSaved(transfer.clone()));
        info!(transfer = %id, amount = transfer.amount, "cash transfer confirmed");
        Ok(transfer)
    }

    pub fn update_cash_transfer(
        &mut self,
        id: &ObjectId,
        patch: CashTransferPatch,
    ) -> Result<CashTransfer> {
        let transfer = self.transfers.update(id, patch)?.clone();
        self.changes.push(Change::TransferSaved(transfer.clone()));
        Ok(transfer)
    }

    pub fn delete_cash_transfer(&mut self, id: &ObjectId) -> Result<CashTransfer> {
        let removed = self.transfers.remove(id)?;
        self.changes.push(Change::TransferRemoved(*id));
        info!(transfer = %id, status = removed.status.as_str(), "cash transfer deleted");
        Ok(removed)
    }

    /// Replaces the settlements of one clinic, keeping every other clinic's
    /// rows. Nothing changes if the incoming rows belong to another clinic,
    /// reuse an id held elsewhere or break the uniqueness rules.
    pub fn set_settlements(
        &mut self,
        clinic_id: ObjectId,
        incoming: Vec<Settlement>,
    ) -> Result<()> {
        for settlement in &incoming {
            let id = settlement.id();
            let foreign = settlement.clinic_id() != clinic_id
                || self
                    .settlements
                    .get(&id)
                    .is_some_and(|held| held.clinic_id() != clinic_id);
            if foreign {
                return Err(LiquidationError::InvalidRecord(format!(
                    "la liquidación {id} pertenece a otra clínica"
                )));
            }
        }

        let kept = self
            .settlements
            .iter()
            .filter(|s| s.clinic_id() != clinic_id)
            .cloned();
        let book = SettlementBook::from_settlements(kept.chain(incoming))?;
        let settlements: Vec<Settlement> = book
            .iter()
            .filter(|s| s.clinic_id() == clinic_id)
            .cloned()
            .collect();
        info!(clinic = %clinic_id, count = settlements.len(), "settlements replaced");
        self.settlements = book;
        self.changes.push(Change::SettlementsReplaced {
            clinic_id,
            settlements,
        });
        Ok(())
    }

    /// Same contract as [`Self::set_settlements`] for cash transfers.
    pub fn set_cash_transfers(
        &mut self,
        clinic_id: ObjectId,
        incoming: Vec<CashTransfer>,
    ) -> Result<()> {
        for transfer in &incoming {
            let foreign = transfer.clinic_id != clinic_id
                || self
                    .transfers
                    .get(&transfer.id)
                    .is_some_and(|held| held.clinic_id != clinic_id);
            if foreign {
                return Err(LiquidationError::InvalidRecord(format!(
                    "el traspaso {} pertenece a otra clínica",
                    transfer.id
                )));
            }
        }

        let kept = self
            .transfers
            .iter()
            .filter(|t| t.clinic_id != clinic_id)
            .cloned();
        let book = TransferBook::from_transfers(kept.chain(incoming))?;
        let transfers: Vec<CashTransfer> = book
            .iter()
            .filter(|t| t.clinic_id == clinic_id)
            .cloned()
            .collect();
        info!(clinic = %clinic_id, count = transfers.len(), "cash transfers replaced");
        self.transfers = book;
        self.changes.push(Change::TransfersReplaced {
            clinic_id,
            transfers,
        });
        Ok(())
    }

    /// One row per professional with activity in the month, restricted to
    /// `clinic_id` when given. Months without a monthly settlement report the
    /// sum of their dailies.
    pub fn month_overview(
        &self,
        clinic_id: Option<ObjectId>,
        month: u32,
        year: i32,
    ) -> Result<MonthOverview> {
        let period = SettlementPeriod::new(month, year)?;
        let filter = SettlementFilter {
            clinic_id,
            month: Some(month),
            year: Some(year),
            ..SettlementFilter::default()
        };

        let mut professionals: Vec<ObjectId> = self
            .settlements
            .iter()
            .filter(|s| filter.matches(s))
            .map(Settlement::professional_id)
            .collect();
        professionals.sort();
        professionals.dedup();

        let transfer_period = period.transfer_period();
        let rows: Vec<OverviewRow> = professionals
            .into_iter()
            .map(|professional_id| {
                let dailies: Vec<&DailySettlement> = self
                    .settlements
                    .dailies_in(&professional_id, period)
                    .collect();
                let pending_transfer_amount = self
                    .transfers
                    .pending_for(&professional_id, transfer_period)
                    .map(|t| t.amount);

                match self.settlements.monthly_for(&professional_id, period) {
                    Some(monthly) => OverviewRow {
                        professional_id,
                        monthly_settlement_id: Some(monthly.id),
                        status: Some(monthly.status),
                        daily_settlements: dailies.len(),
                        attended_appointments: monthly.attended_appointments,
                        no_show_appointments: monthly.no_show_appointments,
                        total_tense_commission: monthly.total_tense_commission,
                        total_paid: monthly.total_paid,
                        outstanding_balance: monthly.outstanding_balance(),
                        pending_transfer_amount,
                    },
                    None => {
                        let commission = round_money(
                            dailies.iter().map(|d| d.total_tense_commission).sum(),
                        );
                        OverviewRow {
                            professional_id,
                            monthly_settlement_id: None,
                            status: None,
                            daily_settlements: dailies.len(),
                            attended_appointments: dailies
                                .iter()
                                .map(|d| d.attended_appointments)
                                .sum(),
                            no_show_appointments: dailies
                                .iter()
                                .map(|d| d.no_show_appointments)
                                .sum(),
                            total_tense_commission: commission,
                            total_paid: 0.0,
                            outstanding_balance: commission,
                            pending_transfer_amount,
                        }
                    }
                }
            })
            .collect();

        Ok(MonthOverview {
            month,
            year,
            total_tense_commission: round_money(
                rows.iter().map(|r| r.total_tense_commission).sum(),
            ),
            total_paid: round_money(rows.iter().map(|r| r.total_paid).sum()),
            total_outstanding: round_money(rows.iter().map(|r| r.outstanding_balance).sum()),
            rows,
        })
    }
}
