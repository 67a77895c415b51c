// liquidation/payments.rs
// Partial payments against a monthly settlement's commission.

use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;

use super::error::{LiquidationError, Result};
use super::model::{Settlement, SettlementPayment, round_money};

pub fn validate_payment_amount(amount: f64) -> Result<f64> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(LiquidationError::InvalidAmount(amount));
    }
    Ok(amount)
}

/// Adds `amount` to the settlement's `total_paid`. No upper bound is applied
/// and the status is left alone: closing the month is a separate action.
pub fn post_payment(
    settlement: &mut Settlement,
    amount: f64,
    notes: Option<String>,
    now: DateTime<Utc>,
) -> Result<SettlementPayment> {
    let amount = validate_payment_amount(amount)?;
    let monthly = match settlement {
        Settlement::Monthly(monthly) => monthly,
        Settlement::Daily(daily) => return Err(LiquidationError::NotMonthly(daily.id)),
    };

    monthly.total_paid = round_money(monthly.total_paid + amount);

    Ok(SettlementPayment {
        id: ObjectId::new(),
        settlement_id: monthly.id,
        professional_id: monthly.professional_id,
        amount,
        notes: notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty()),
        total_paid_after: monthly.total_paid,
        recorded_at: now,
    })
}
