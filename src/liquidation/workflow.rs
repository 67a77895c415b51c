// liquidation/workflow.rs
// Settlement status transitions and the side effect each one requires.

use mongodb::bson::oid::ObjectId;

use super::error::{LiquidationError, Result};
use super::model::{Settlement, SettlementPeriod, SettlementStatus};

/// Work the caller must do after applying a transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatusEffect {
    None,
    /// Monthly confirmation: reconcile the month's pending cash transfer.
    ReconcileTransfer {
        clinic_id: ObjectId,
        professional_id: ObjectId,
        period: SettlementPeriod,
        amount: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub from: SettlementStatus,
    pub to: SettlementStatus,
    pub effect: StatusEffect,
}

impl Transition {
    pub fn is_noop(&self) -> bool {
        self.from == self.to
    }
}

/// Decides whether `settlement` may move to `to`.
///
/// Dailies toggle freely. Monthlies go pending <-> reviewed and then to paid,
/// which is terminal; reaching paid reconciles the cash transfer with the full
/// commission total, whatever was already paid through the ledger.
pub fn plan_transition(settlement: &Settlement, to: SettlementStatus) -> Result<Transition> {
    let from = settlement.status();
    if from == to {
        return Ok(Transition {
            from,
            to,
            effect: StatusEffect::None,
        });
    }

    match settlement {
        Settlement::Daily(_) => Ok(Transition {
            from,
            to,
            effect: StatusEffect::None,
        }),
        Settlement::Monthly(monthly) => match (from, to) {
            (SettlementStatus::Paid, _) => Err(LiquidationError::InvalidTransition { from, to }),
            (_, SettlementStatus::Paid) => Ok(Transition {
                from,
                to,
                effect: StatusEffect::ReconcileTransfer {
                    clinic_id: monthly.clinic_id,
                    professional_id: monthly.professional_id,
                    period: monthly.period(),
                    amount: monthly.total_tense_commission,
                },
            }),
            _ => Ok(Transition {
                from,
                to,
                effect: StatusEffect::None,
            }),
        },
    }
}
