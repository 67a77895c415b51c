// liquidation/book.rs
// In-memory settlement collection with the uniqueness indices for daily and
// monthly rows.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use mongodb::bson::oid::ObjectId;

use super::error::{LiquidationError, Result};
use super::model::{DailySettlement, MonthlySettlement, Settlement, SettlementPeriod};

#[derive(Debug, Clone, Default)]
pub struct SettlementBook {
    settlements: BTreeMap<ObjectId, Settlement>,
    daily_index: HashMap<(ObjectId, NaiveDate), ObjectId>,
    monthly_index: HashMap<(ObjectId, SettlementPeriod), ObjectId>,
}

impl SettlementBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a book from stored rows. Repeated ids, two dailies for the same
    /// day, two monthlies for the same month of a professional and dailies
    /// whose month does not match their date are rejected.
    pub fn from_settlements<I>(settlements: I) -> Result<Self>
    where
        I: IntoIterator<Item = Settlement>,
    {
        let mut book = SettlementBook::new();
        for settlement in settlements {
            SettlementPeriod::new(settlement.period().month, settlement.period().year)?;
            if let Settlement::Daily(daily) = &settlement {
                if daily.period() != SettlementPeriod::of_date(daily.date) {
                    return Err(LiquidationError::InvalidRecord(format!(
                        "la liquidación diaria {} tiene mes {}/{} distinto de su fecha {}",
                        daily.id,
                        daily.month + 1,
                        daily.year,
                        daily.date
                    )));
                }
            }
            book.insert(settlement)?;
        }
        Ok(book)
    }

    pub fn len(&self) -> usize {
        self.settlements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settlements.is_empty()
    }

    pub fn get(&self, id: &ObjectId) -> Option<&Settlement> {
        self.settlements.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &ObjectId) -> Option<&mut Settlement> {
        self.settlements.get_mut(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Settlement> {
        self.settlements.values()
    }

    pub fn daily_for(&self, professional_id: &ObjectId, date: NaiveDate) -> Option<&DailySettlement> {
        self.daily_index
            .get(&(*professional_id, date))
            .and_then(|id| self.settlements.get(id))
            .and_then(Settlement::as_daily)
    }

    pub fn monthly_for(
        &self,
        professional_id: &ObjectId,
        period: SettlementPeriod,
    ) -> Option<&MonthlySettlement> {
        self.monthly_index
            .get(&(*professional_id, period))
            .and_then(|id| self.settlements.get(id))
            .and_then(Settlement::as_monthly)
    }

    pub fn dailies_in<'a>(
        &'a self,
        professional_id: &'a ObjectId,
        period: SettlementPeriod,
    ) -> impl Iterator<Item = &'a DailySettlement> + 'a {
        self.settlements
            .values()
            .filter_map(Settlement::as_daily)
            .filter(move |d| d.professional_id == *professional_id && d.period() == period)
    }

    pub fn insert(&mut self, settlement: Settlement) -> Result<()> {
        if self.settlements.contains_key(&settlement.id()) {
            return Err(LiquidationError::InvalidRecord(format!(
                "liquidación {} repetida",
                settlement.id()
            )));
        }
        match &settlement {
            Settlement::Daily(daily) => {
                let key = (daily.professional_id, daily.date);
                if self.daily_index.contains_key(&key) {
                    return Err(LiquidationError::DuplicateDaily {
                        professional_id: daily.professional_id,
                        date: daily.date,
                    });
                }
                self.daily_index.insert(key, daily.id);
            }
            Settlement::Monthly(monthly) => {
                let key = (monthly.professional_id, monthly.period());
                if self.monthly_index.contains_key(&key) {
                    return Err(LiquidationError::DuplicateMonthly {
                        professional_id: monthly.professional_id,
                        month: monthly.month + 1,
                        year: monthly.year,
                    });
                }
                self.monthly_index.insert(key, monthly.id);
            }
        }
        self.settlements.insert(settlement.id(), settlement);
        Ok(())
    }

    pub fn remove(&mut self, id: &ObjectId) -> Result<Settlement> {
        let settlement = self
            .settlements
            .remove(id)
            .ok_or_else(|| LiquidationError::settlement_not_found(*id))?;
        self.unindex(&settlement);
        Ok(settlement)
    }

    fn unindex(&mut self, settlement: &Settlement) {
        match settlement {
            Settlement::Daily(daily) => {
                let key = (daily.professional_id, daily.date);
                if self.daily_index.get(&key) == Some(&daily.id) {
                    self.daily_index.remove(&key);
                }
            }
            Settlement::Monthly(monthly) => {
                let key = (monthly.professional_id, monthly.period());
                if self.monthly_index.get(&key) == Some(&monthly.id) {
                    self.monthly_index.remove(&key);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::liquidation::model::SettlementStatus;

    fn daily(professional_id: ObjectId, day: u32) -> Settlement {
        let date = NaiveDate::from_ymd_opt(2025, 3, day).unwrap();
        Settlement::Daily(DailySettlement {
            id: ObjectId::new(),
            clinic_id: ObjectId::new(),
            professional_id,
            date,
            month: 2,
            year: 2025,
            attended_appointments: 1,
            no_show_appointments: 0,
            base_revenue: 100.0,
            discount_amount: 0.0,
            attended_revenue: 100.0,
            professional_earnings_attended: 65.0,
            tense_commission_attended: 35.0,
            total_tense_commission: 35.0,
            status: SettlementStatus::Pending,
            created_at: Utc::now(),
        })
    }

    #[test]
    fn second_daily_for_same_day_is_rejected() {
        let pro = ObjectId::new();
        let mut book = SettlementBook::new();
        book.insert(daily(pro, 5)).unwrap();

        let err = book.insert(daily(pro, 5)).unwrap_err();
        assert!(matches!(err, LiquidationError::DuplicateDaily { .. }));
        assert_eq!(book.len(), 1);

        book.insert(daily(ObjectId::new(), 5)).unwrap();
        assert_eq!(book.len(), 2);
    }

    #[test]
    fn removing_frees_the_day() {
        let pro = ObjectId::new();
        let first = daily(pro, 6);
        let id = first.id();
        let mut book = SettlementBook::from_settlements([first, daily(pro, 7)]).unwrap();

        book.remove(&id).unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 3, 6).unwrap();
        assert!(book.daily_for(&pro, date).is_none());
        book.insert(daily(pro, 6)).unwrap();

        let march = SettlementPeriod::new(2, 2025).unwrap();
        assert_eq!(book.dailies_in(&pro, march).count(), 2);
        assert!(matches!(
            book.remove(&id),
            Err(LiquidationError::NotFound { .. })
        ));
    }

    #[test]
    fn repeated_id_keeps_the_first_row() {
        let pro = ObjectId::new();
        let first = daily(pro, 5);
        let mut again = daily(pro, 9);
        if let Settlement::Daily(d) = &mut again {
            d.id = first.id();
        }
        let mut book = SettlementBook::new();
        book.insert(first.clone()).unwrap();

        let err = book.insert(again).unwrap_err();
        assert!(matches!(err, LiquidationError::InvalidRecord(_)));
        assert_eq!(book.get(&first.id()), Some(&first));
        let day = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
        assert!(book.daily_for(&pro, day).is_none());
    }

    #[test]
    fn daily_with_a_month_off_its_date_is_rejected() {
        let mut row = daily(ObjectId::new(), 5);
        if let Settlement::Daily(d) = &mut row {
            d.month = 6;
        }
        let err = SettlementBook::from_settlements([row]).unwrap_err();
        assert!(matches!(err, LiquidationError::InvalidRecord(_)));
    }
}
