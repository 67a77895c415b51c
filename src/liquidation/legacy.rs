// liquidation/legacy.rs
// Import of settlement records kept by the previous front-end cache, where the
// row type was inferred from which fields were present.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use mongodb::bson::oid::ObjectId;
use serde::Deserialize;
use serde_json::Value;

use super::error::{LiquidationError, Result};
use super::model::{
    DailySettlement, MonthlySettlement, Settlement, SettlementPeriod, SettlementStatus,
    money_or_zero, round_money,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacySettlement {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    professional_id: String,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    month: Option<u32>,
    #[serde(default)]
    year: Option<i32>,
    #[serde(default)]
    attended_appointments: Option<u32>,
    #[serde(default)]
    no_show_appointments: Option<u32>,
    #[serde(default)]
    base_revenue: Option<f64>,
    #[serde(default)]
    discount_amount: Option<f64>,
    #[serde(default)]
    attended_revenue: Option<f64>,
    #[serde(default)]
    professional_earnings_attended: Option<f64>,
    #[serde(default)]
    tense_commission_attended: Option<f64>,
    #[serde(default)]
    total_tense_commission: Option<f64>,
    #[serde(default)]
    total_paid: Option<f64>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
}

/// Reads one settlement from JSON. Records carrying `kind` use the current
/// format; anything else goes through the legacy rules.
pub fn settlement_from_json(value: Value, clinic_id: ObjectId) -> Result<Settlement> {
    if value.get("kind").is_some() {
        return serde_json::from_value::<Settlement>(value)
            .map_err(|e| LiquidationError::InvalidRecord(e.to_string()));
    }
    let legacy = serde_json::from_value::<LegacySettlement>(value)
        .map_err(|e| LiquidationError::InvalidRecord(e.to_string()))?;
    legacy.into_settlement(clinic_id)
}

fn parse_legacy_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.with_timezone(&Utc).date_naive())
        })
}

fn parse_legacy_id(raw: Option<&Value>) -> ObjectId {
    raw.and_then(Value::as_str)
        .and_then(|s| ObjectId::from_str(s).ok())
        .unwrap_or_else(ObjectId::new)
}

impl LegacySettlement {
    fn into_settlement(self, clinic_id: ObjectId) -> Result<Settlement> {
        let professional_id = ObjectId::from_str(self.professional_id.trim()).map_err(|_| {
            LiquidationError::InvalidRecord(format!(
                "professionalId inválido: {}",
                self.professional_id
            ))
        })?;
        let id = parse_legacy_id(self.id.as_ref());
        let created_at = self
            .created_at
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);
        let status = self
            .status
            .as_deref()
            .and_then(SettlementStatus::parse)
            .unwrap_or_default();

        let base_revenue = round_money(money_or_zero(self.base_revenue.unwrap_or(0.0)));
        let discount_amount = round_money(money_or_zero(self.discount_amount.unwrap_or(0.0)));
        let attended_revenue = self
            .attended_revenue
            .map(|v| round_money(money_or_zero(v)))
            .unwrap_or_else(|| round_money(base_revenue - discount_amount));
        let professional_earnings =
            round_money(money_or_zero(self.professional_earnings_attended.unwrap_or(0.0)));
        let derived_commission = (attended_revenue - professional_earnings) + discount_amount;

        let kind = self.kind.as_deref().map(str::trim);
        let is_daily = match kind {
            Some("daily") => true,
            Some("monthly") => false,
            Some(other) => {
                return Err(LiquidationError::InvalidRecord(format!(
                    "tipo de liquidación desconocido: {other}"
                )));
            }
            None => self.date.is_some(),
        };

        if is_daily {
            let date = self
                .date
                .as_deref()
                .and_then(parse_legacy_date)
                .ok_or_else(|| {
                    LiquidationError::InvalidRecord("liquidación diaria sin fecha válida".into())
                })?;
            let period = SettlementPeriod::of_date(date);
            let commission = self
                .total_tense_commission
                .or(self.tense_commission_attended)
                .map(|v| round_money(money_or_zero(v)))
                .unwrap_or_else(|| round_money(derived_commission));
            return Ok(Settlement::Daily(DailySettlement {
                id,
                clinic_id,
                professional_id,
                date,
                month: period.month,
                year: period.year,
                attended_appointments: self.attended_appointments.unwrap_or(0),
                no_show_appointments: self.no_show_appointments.unwrap_or(0),
                base_revenue,
                discount_amount,
                attended_revenue,
                professional_earnings_attended: professional_earnings,
                tense_commission_attended: commission,
                total_tense_commission: commission,
                status,
                created_at,
            }));
        }

        let (month, year) = match (self.month, self.year) {
            (Some(month), Some(year)) => (month, year),
            _ => {
                return Err(LiquidationError::InvalidRecord(
                    "liquidación mensual sin mes/año".into(),
                ));
            }
        };
        let period = SettlementPeriod::new(month, year)?;
        let commission = self
            .total_tense_commission
            .map(|v| round_money(money_or_zero(v)))
            .unwrap_or_else(|| round_money(derived_commission));

        Ok(Settlement::Monthly(MonthlySettlement {
            id,
            clinic_id,
            professional_id,
            month: period.month,
            year: period.year,
            attended_appointments: self.attended_appointments.unwrap_or(0),
            no_show_appointments: self.no_show_appointments.unwrap_or(0),
            base_revenue,
            discount_amount,
            attended_revenue,
            professional_earnings_attended: professional_earnings,
            total_tense_commission: commission,
            total_paid: round_money(money_or_zero(self.total_paid.unwrap_or(0.0))),
            status,
            daily_settlement_ids: Vec::new(),
            created_at,
        }))
    }
}
