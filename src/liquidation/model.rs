// liquidation/model.rs
// Settlement, cash transfer and payment records handled by the reconciliation core.

use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use super::error::{LiquidationError, Result};

/// Share of attended revenue that goes to the professional when neither the
/// professional nor the configuration says otherwise.
pub const DEFAULT_PROFESSIONAL_PERCENTAGE: f64 = 0.65;

/// Rounds a money amount to cents.
pub fn round_money(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Guards money fields against NaN/inf leaking in from loose input.
pub(crate) fn money_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SettlementStatus {
    Pending,
    Reviewed,
    Paid,
}

impl SettlementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettlementStatus::Pending => "pending",
            SettlementStatus::Reviewed => "reviewed",
            SettlementStatus::Paid => "paid",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "pending" => Some(SettlementStatus::Pending),
            "reviewed" => Some(SettlementStatus::Reviewed),
            "paid" => Some(SettlementStatus::Paid),
            _ => None,
        }
    }
}

impl Default for SettlementStatus {
    fn default() -> Self {
        SettlementStatus::Pending
    }
}

impl fmt::Display for SettlementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Month of a settlement. `month` is 0-indexed (January = 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SettlementPeriod {
    pub month: u32,
    pub year: i32,
}

impl SettlementPeriod {
    pub fn new(month: u32, year: i32) -> Result<Self> {
        if month > 11 {
            return Err(LiquidationError::InvalidPeriod { month });
        }
        Ok(SettlementPeriod { month, year })
    }

    pub fn of_date(date: NaiveDate) -> Self {
        SettlementPeriod {
            month: date.month0(),
            year: date.year(),
        }
    }

    /// The period a cash transfer for this settlement month is filed under.
    pub fn transfer_period(&self) -> TransferPeriod {
        TransferPeriod {
            month: self.month + 1,
            year: self.year,
        }
    }
}

/// Month of a cash transfer. `month` is 1-indexed (January = 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransferPeriod {
    pub month: u32,
    pub year: i32,
}

impl TransferPeriod {
    pub fn new(month: u32, year: i32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(LiquidationError::InvalidPeriod { month });
        }
        Ok(TransferPeriod { month, year })
    }
}

/// Settlement of one professional for one calendar day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailySettlement {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub clinic_id: ObjectId,
    pub professional_id: ObjectId,
    pub date: NaiveDate,
    /// 0-indexed month of `date`, kept for monthly aggregation.
    pub month: u32,
    pub year: i32,
    pub attended_appointments: u32,
    pub no_show_appointments: u32,
    pub base_revenue: f64,
    pub discount_amount: f64,
    pub attended_revenue: f64,
    pub professional_earnings_attended: f64,
    pub tense_commission_attended: f64,
    pub total_tense_commission: f64,
    pub status: SettlementStatus,
    pub created_at: DateTime<Utc>,
}

impl DailySettlement {
    pub fn period(&self) -> SettlementPeriod {
        SettlementPeriod {
            month: self.month,
            year: self.year,
        }
    }
}

/// Settlement of one professional for one month, aggregated from daily rows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonthlySettlement {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub clinic_id: ObjectId,
    pub professional_id: ObjectId,
    pub month: u32,
    pub year: i32,
    pub attended_appointments: u32,
    pub no_show_appointments: u32,
    pub base_revenue: f64,
    pub discount_amount: f64,
    pub attended_revenue: f64,
    pub professional_earnings_attended: f64,
    pub total_tense_commission: f64,
    pub total_paid: f64,
    pub status: SettlementStatus,
    #[serde(default)]
    pub daily_settlement_ids: Vec<ObjectId>,
    pub created_at: DateTime<Utc>,
}

impl MonthlySettlement {
    pub fn period(&self) -> SettlementPeriod {
        SettlementPeriod {
            month: self.month,
            year: self.year,
        }
    }

    /// What the professional still owes the clinic; never negative even when
    /// payments were posted beyond the commission.
    pub fn outstanding_balance(&self) -> f64 {
        round_money((self.total_tense_commission - self.total_paid).max(0.0))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SettlementKind {
    Daily,
    Monthly,
}

impl SettlementKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "daily" => Some(SettlementKind::Daily),
            "monthly" => Some(SettlementKind::Monthly),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Settlement {
    Daily(DailySettlement),
    Monthly(MonthlySettlement),
}

impl Settlement {
    pub fn id(&self) -> ObjectId {
        match self {
            Settlement::Daily(s) => s.id,
            Settlement::Monthly(s) => s.id,
        }
    }

    pub fn kind(&self) -> SettlementKind {
        match self {
            Settlement::Daily(_) => SettlementKind::Daily,
            Settlement::Monthly(_) => SettlementKind::Monthly,
        }
    }

    pub fn clinic_id(&self) -> ObjectId {
        match self {
            Settlement::Daily(s) => s.clinic_id,
            Settlement::Monthly(s) => s.clinic_id,
        }
    }

    pub fn professional_id(&self) -> ObjectId {
        match self {
            Settlement::Daily(s) => s.professional_id,
            Settlement::Monthly(s) => s.professional_id,
        }
    }

    pub fn period(&self) -> SettlementPeriod {
        match self {
            Settlement::Daily(s) => s.period(),
            Settlement::Monthly(s) => s.period(),
        }
    }

    pub fn status(&self) -> SettlementStatus {
        match self {
            Settlement::Daily(s) => s.status,
            Settlement::Monthly(s) => s.status,
        }
    }

    pub fn attended_revenue(&self) -> f64 {
        match self {
            Settlement::Daily(s) => s.attended_revenue,
            Settlement::Monthly(s) => s.attended_revenue,
        }
    }

    pub fn discount_amount(&self) -> f64 {
        match self {
            Settlement::Daily(s) => s.discount_amount,
            Settlement::Monthly(s) => s.discount_amount,
        }
    }

    pub fn professional_earnings_attended(&self) -> f64 {
        match self {
            Settlement::Daily(s) => s.professional_earnings_attended,
            Settlement::Monthly(s) => s.professional_earnings_attended,
        }
    }

    pub fn total_tense_commission(&self) -> f64 {
        match self {
            Settlement::Daily(s) => s.total_tense_commission,
            Settlement::Monthly(s) => s.total_tense_commission,
        }
    }

    pub fn as_daily(&self) -> Option<&DailySettlement> {
        match self {
            Settlement::Daily(s) => Some(s),
            Settlement::Monthly(_) => None,
        }
    }

    pub fn as_monthly(&self) -> Option<&MonthlySettlement> {
        match self {
            Settlement::Monthly(s) => Some(s),
            Settlement::Daily(_) => None,
        }
    }

    pub(crate) fn set_status(&mut self, status: SettlementStatus) {
        match self {
            Settlement::Daily(s) => s.status = status,
            Settlement::Monthly(s) => s.status = status,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Pendiente,
    Confirmada,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pendiente => "pendiente",
            TransferStatus::Confirmada => "confirmada",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "pendiente" => Some(TransferStatus::Pendiente),
            "confirmada" => Some(TransferStatus::Confirmada),
            _ => None,
        }
    }
}

/// Money owed from a professional's cash drawer to the administrative drawer
/// for one month of commission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CashTransfer {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub clinic_id: ObjectId,
    pub professional_id: ObjectId,
    /// 1-indexed.
    pub month: u32,
    pub year: i32,
    pub amount: f64,
    pub status: TransferStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl CashTransfer {
    pub fn period(&self) -> TransferPeriod {
        TransferPeriod {
            month: self.month,
            year: self.year,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.status, TransferStatus::Pendiente)
    }
}

/// Partial changes accepted by `update_cash_transfer`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CashTransferPatch {
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Audit entry of a partial payment against a monthly settlement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SettlementPayment {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub settlement_id: ObjectId,
    pub professional_id: ObjectId,
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub total_paid_after: f64,
    pub recorded_at: DateTime<Utc>,
}

/// Appointment outcome as seen by the generator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Attended,
    NoShow,
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Attended => "attended",
            AppointmentStatus::NoShow => "no_show",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "scheduled" => Some(AppointmentStatus::Scheduled),
            "attended" => Some(AppointmentStatus::Attended),
            "no_show" => Some(AppointmentStatus::NoShow),
            "cancelled" => Some(AppointmentStatus::Cancelled),
            _ => None,
        }
    }
}

/// Billed appointment feeding daily generation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub clinic_id: ObjectId,
    pub professional_id: ObjectId,
    pub client_name: String,
    pub date: NaiveDate,
    pub price: f64,
    #[serde(default)]
    pub discount_amount: f64,
    pub status: AppointmentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_period_is_one_indexed() {
        let period = SettlementPeriod::new(2, 2025).unwrap();
        assert_eq!(period.transfer_period(), TransferPeriod { month: 3, year: 2025 });

        let december = SettlementPeriod::new(11, 2025).unwrap();
        assert_eq!(december.transfer_period().month, 12);
    }

    #[test]
    fn rejects_out_of_range_months() {
        assert_eq!(
            SettlementPeriod::new(12, 2025),
            Err(LiquidationError::InvalidPeriod { month: 12 })
        );
        assert!(TransferPeriod::new(0, 2025).is_err());
        assert!(TransferPeriod::new(12, 2025).is_ok());
    }

    #[test]
    fn period_of_date_uses_zero_indexed_month() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 5).unwrap();
        assert_eq!(SettlementPeriod::of_date(date), SettlementPeriod { month: 2, year: 2025 });
    }

    #[test]
    fn settlement_serializes_with_kind_tag() {
        let settlement = Settlement::Monthly(MonthlySettlement {
            id: ObjectId::new(),
            clinic_id: ObjectId::new(),
            professional_id: ObjectId::new(),
            month: 2,
            year: 2025,
            attended_appointments: 1,
            no_show_appointments: 0,
            base_revenue: 100.0,
            discount_amount: 0.0,
            attended_revenue: 100.0,
            professional_earnings_attended: 65.0,
            total_tense_commission: 35.0,
            total_paid: 0.0,
            status: SettlementStatus::Pending,
            daily_settlement_ids: Vec::new(),
            created_at: Utc::now(),
        });
        let value = serde_json::to_value(&settlement).unwrap();
        assert_eq!(value["kind"], "monthly");
        assert_eq!(value["status"], "pending");
    }

    #[test]
    fn outstanding_balance_is_floored_at_zero() {
        let mut monthly = MonthlySettlement {
            id: ObjectId::new(),
            clinic_id: ObjectId::new(),
            professional_id: ObjectId::new(),
            month: 0,
            year: 2025,
            attended_appointments: 0,
            no_show_appointments: 0,
            base_revenue: 0.0,
            discount_amount: 0.0,
            attended_revenue: 0.0,
            professional_earnings_attended: 0.0,
            total_tense_commission: 500.0,
            total_paid: 200.0,
            status: SettlementStatus::Pending,
            daily_settlement_ids: Vec::new(),
            created_at: Utc::now(),
        };
        assert_eq!(monthly.outstanding_balance(), 300.0);
        monthly.total_paid = 800.0;
        assert_eq!(monthly.outstanding_balance(), 0.0);
    }
}
