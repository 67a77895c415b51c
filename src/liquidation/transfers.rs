// liquidation/transfers.rs
// Cash transfers keyed so that a (professional, month, year) has at most one
// pending row.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use tracing::{debug, warn};

use super::error::{LiquidationError, Result};
use super::model::{
    CashTransfer, CashTransferPatch, SettlementPeriod, TransferPeriod, TransferStatus, round_money,
};

type PendingKey = (ObjectId, TransferPeriod);

#[derive(Debug, Clone, Default)]
pub struct TransferBook {
    transfers: BTreeMap<ObjectId, CashTransfer>,
    pending: HashMap<PendingKey, ObjectId>,
}

/// Result of reconciling a settlement total into the transfer book.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferUpsert {
    pub transfer: CashTransfer,
    pub created: bool,
}

fn validate_transfer_amount(amount: f64) -> Result<f64> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(LiquidationError::InvalidAmount(amount));
    }
    Ok(round_money(amount))
}

impl TransferBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a book from stored rows, refusing repeated ids and two pending
    /// rows for the same period.
    pub fn from_transfers<I>(transfers: I) -> Result<Self>
    where
        I: IntoIterator<Item = CashTransfer>,
    {
        let mut book = TransferBook::new();
        for transfer in transfers {
            TransferPeriod::new(transfer.month, transfer.year)?;
            if book.transfers.contains_key(&transfer.id) {
                return Err(LiquidationError::InvalidRecord(format!(
                    "traspaso {} repetido",
                    transfer.id
                )));
            }
            if transfer.is_pending() {
                let key = (transfer.professional_id, transfer.period());
                if book.pending.insert(key, transfer.id).is_some() {
                    return Err(LiquidationError::DuplicatePendingTransfer {
                        professional_id: transfer.professional_id,
                        month: transfer.month,
                        year: transfer.year,
                    });
                }
            }
            book.transfers.insert(transfer.id, transfer);
        }
        Ok(book)
    }

    pub fn len(&self) -> usize {
        self.transfers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transfers.is_empty()
    }

    pub fn get(&self, id: &ObjectId) -> Option<&CashTransfer> {
        self.transfers.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CashTransfer> {
        self.transfers.values()
    }

    pub fn pending_for(
        &self,
        professional_id: &ObjectId,
        period: TransferPeriod,
    ) -> Option<&CashTransfer> {
        self.pending
            .get(&(*professional_id, period))
            .and_then(|id| self.transfers.get(id))
    }

    /// Makes the pending transfer of the settlement's month carry `amount`.
    /// The amount replaces the previous one; it is not accumulated.
    pub fn upsert_pending(
        &mut self,
        clinic_id: ObjectId,
        professional_id: ObjectId,
        period: SettlementPeriod,
        amount: f64,
        now: DateTime<Utc>,
    ) -> Result<TransferUpsert> {
        let amount = validate_transfer_amount(amount)?;
        let transfer_period = period.transfer_period();
        let key = (professional_id, transfer_period);

        if let Some(existing) = self
            .pending
            .get(&key)
            .and_then(|id| self.transfers.get_mut(id))
        {
            existing.amount = amount;
            existing.created_at = now;
            debug!(transfer = %existing.id, amount, "pending cash transfer refreshed");
            return Ok(TransferUpsert {
                transfer: existing.clone(),
                created: false,
            });
        }

        let transfer = CashTransfer {
            id: ObjectId::new(),
            clinic_id,
            professional_id,
            month: transfer_period.month,
            year: transfer_period.year,
            amount,
            status: TransferStatus::Pendiente,
            created_at: now,
            confirmed_at: None,
            notes: None,
        };
        self.pending.insert(key, transfer.id);
        self.transfers.insert(transfer.id, transfer.clone());
        debug!(transfer = %transfer.id, amount, "pending cash transfer created");
        Ok(TransferUpsert {
            transfer,
            created: true,
        })
    }

    /// Marks a transfer as received in the administrative drawer. Amount is
    /// untouched; confirming twice keeps the first confirmation.
    pub fn confirm(&mut self, id: &ObjectId, now: DateTime<Utc>) -> Result<&CashTransfer> {
        let transfer = self
            .transfers
            .get_mut(id)
            .ok_or_else(|| LiquidationError::transfer_not_found(*id))?;
        if transfer.is_pending() {
            self.pending
                .remove(&(transfer.professional_id, transfer.period()));
            transfer.status = TransferStatus::Confirmada;
            transfer.confirmed_at = Some(now);
        }
        Ok(transfer)
    }

    pub fn update(&mut self, id: &ObjectId, patch: CashTransferPatch) -> Result<&CashTransfer> {
        let amount = patch.amount.map(validate_transfer_amount).transpose()?;
        let transfer = self
            .transfers
            .get_mut(id)
            .ok_or_else(|| LiquidationError::transfer_not_found(*id))?;
        if let Some(amount) = amount {
            transfer.amount = amount;
        }
        if let Some(notes) = patch.notes {
            let notes = notes.trim();
            transfer.notes = if notes.is_empty() {
                None
            } else {
                Some(notes.to_string())
            };
        }
        Ok(transfer)
    }

    /// Removes a transfer. A confirmed transfer's movement is not reverted.
    pub fn remove(&mut self, id: &ObjectId) -> Result<CashTransfer> {
        let transfer = self
            .transfers
            .remove(id)
            .ok_or_else(|| LiquidationError::transfer_not_found(*id))?;
        if transfer.is_pending() {
            self.pending
                .remove(&(transfer.professional_id, transfer.period()));
        } else {
            warn!(
                transfer = %transfer.id,
                amount = transfer.amount,
                "confirmed cash transfer deleted; the drawer movement is not reverted"
            );
        }
        Ok(transfer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn march() -> SettlementPeriod {
        SettlementPeriod::new(2, 2025).unwrap()
    }

    #[test]
    fn upsert_overwrites_the_pending_amount() {
        let mut book = TransferBook::new();
        let clinic = ObjectId::new();
        let pro = ObjectId::new();

        let first = book
            .upsert_pending(clinic, pro, march(), 1000.0, Utc::now())
            .unwrap();
        assert!(first.created);
        assert_eq!(first.transfer.month, 3);

        let second = book
            .upsert_pending(clinic, pro, march(), 1500.0, Utc::now())
            .unwrap();
        assert!(!second.created);
        assert_eq!(second.transfer.id, first.transfer.id);
        assert_eq!(second.transfer.amount, 1500.0);
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn confirmed_transfer_frees_the_period() {
        let mut book = TransferBook::new();
        let clinic = ObjectId::new();
        let pro = ObjectId::new();
        let first = book
            .upsert_pending(clinic, pro, march(), 1000.0, Utc::now())
            .unwrap();

        book.confirm(&first.transfer.id, Utc::now()).unwrap();
        assert!(book.pending_for(&pro, march().transfer_period()).is_none());

        let again = book
            .upsert_pending(clinic, pro, march(), 1000.0, Utc::now())
            .unwrap();
        assert!(again.created);
        assert_eq!(book.len(), 2);
    }

    #[test]
    fn confirm_twice_keeps_first_timestamp() {
        let mut book = TransferBook::new();
        let upsert = book
            .upsert_pending(ObjectId::new(), ObjectId::new(), march(), 10.0, Utc::now())
            .unwrap();
        let first = book
            .confirm(&upsert.transfer.id, Utc::now())
            .unwrap()
            .confirmed_at;
        let second = book
            .confirm(&upsert.transfer.id, Utc::now())
            .unwrap()
            .confirmed_at;
        assert_eq!(first, second);
    }

    #[test]
    fn missing_transfer_is_reported() {
        let mut book = TransferBook::new();
        let id = ObjectId::new();
        assert_eq!(
            book.remove(&id).unwrap_err(),
            LiquidationError::transfer_not_found(id)
        );
    }

    #[test]
    fn loading_two_pending_rows_for_one_period_fails() {
        let pro = ObjectId::new();
        let row = |amount| CashTransfer {
            id: ObjectId::new(),
            clinic_id: ObjectId::new(),
            professional_id: pro,
            month: 4,
            year: 2025,
            amount,
            status: TransferStatus::Pendiente,
            created_at: Utc::now(),
            confirmed_at: None,
            notes: None,
        };
        let err = TransferBook::from_transfers(vec![row(1.0), row(2.0)]).unwrap_err();
        assert!(matches!(err, LiquidationError::DuplicatePendingTransfer { month: 4, .. }));
    }

    #[test]
    fn loading_a_repeated_id_fails() {
        let row = CashTransfer {
            id: ObjectId::new(),
            clinic_id: ObjectId::new(),
            professional_id: ObjectId::new(),
            month: 4,
            year: 2025,
            amount: 10.0,
            status: TransferStatus::Confirmada,
            created_at: Utc::now(),
            confirmed_at: Some(Utc::now()),
            notes: None,
        };
        let pending = CashTransfer {
            status: TransferStatus::Pendiente,
            confirmed_at: None,
            ..row.clone()
        };
        let err = TransferBook::from_transfers(vec![row, pending]).unwrap_err();
        assert!(matches!(err, LiquidationError::InvalidRecord(_)));
    }

    #[test]
    fn update_rejects_negative_amounts() {
        let mut book = TransferBook::new();
        let upsert = book
            .upsert_pending(ObjectId::new(), ObjectId::new(), march(), 10.0, Utc::now())
            .unwrap();
        let patch = CashTransferPatch {
            amount: Some(-1.0),
            notes: None,
        };
        assert!(book.update(&upsert.transfer.id, patch).is_err());
        assert_eq!(book.get(&upsert.transfer.id).unwrap().amount, 10.0);
    }
}
