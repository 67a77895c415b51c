// liquidation/generator.rs
// Daily and monthly settlement computation. Pure: callers check uniqueness and
// store the result.

use chrono::{DateTime, NaiveDate, Utc};
use mongodb::bson::oid::ObjectId;

use super::error::{LiquidationError, Result};
use super::model::{
    Appointment, AppointmentStatus, DailySettlement, MonthlySettlement, SettlementPeriod,
    SettlementStatus, money_or_zero, round_money,
};

/// Who a daily settlement is generated for and at what split.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfessionalTerms {
    pub clinic_id: ObjectId,
    pub professional_id: ObjectId,
    /// Professional's share of attended revenue, in `[0, 1]`.
    pub percentage: f64,
}

impl ProfessionalTerms {
    pub fn new(clinic_id: ObjectId, professional_id: ObjectId, percentage: f64) -> Result<Self> {
        validate_percentage(percentage)?;
        Ok(ProfessionalTerms {
            clinic_id,
            professional_id,
            percentage,
        })
    }
}

pub fn validate_percentage(percentage: f64) -> Result<()> {
    if !percentage.is_finite() || !(0.0..=1.0).contains(&percentage) {
        return Err(LiquidationError::InvalidPercentage(percentage));
    }
    Ok(())
}

/// Money split of a set of attended appointments.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RevenueSplit {
    pub base_revenue: f64,
    pub discount_amount: f64,
    pub attended_revenue: f64,
    pub professional_earnings: f64,
    /// Clinic margin plus the whole discount.
    pub tense_commission: f64,
}

impl RevenueSplit {
    /// The professional is paid on net revenue; the clinic absorbs the discount.
    pub fn compute(base_revenue: f64, discount_amount: f64, percentage: f64) -> Self {
        let base_revenue = round_money(money_or_zero(base_revenue));
        let discount_amount = round_money(money_or_zero(discount_amount));
        let attended_revenue = round_money(base_revenue - discount_amount);
        let professional_earnings = round_money(attended_revenue * percentage);
        let tense_commission =
            round_money((attended_revenue - professional_earnings) + discount_amount);
        RevenueSplit {
            base_revenue,
            discount_amount,
            attended_revenue,
            professional_earnings,
            tense_commission,
        }
    }
}

/// Builds the daily settlement of `terms.professional_id` for `date` out of
/// every appointment in `appointments` that belongs to that professional and day.
pub fn daily_settlement(
    terms: &ProfessionalTerms,
    date: NaiveDate,
    appointments: &[Appointment],
    now: DateTime<Utc>,
) -> Result<DailySettlement> {
    validate_percentage(terms.percentage)?;

    let mut attended = 0u32;
    let mut no_show = 0u32;
    let mut base_revenue = 0.0;
    let mut discount_amount = 0.0;

    for appointment in appointments
        .iter()
        .filter(|a| a.professional_id == terms.professional_id && a.date == date)
    {
        match appointment.status {
            AppointmentStatus::Attended => {
                let price = money_or_zero(appointment.price).max(0.0);
                let discount = money_or_zero(appointment.discount_amount).clamp(0.0, price);
                attended += 1;
                base_revenue += price;
                discount_amount += discount;
            }
            AppointmentStatus::NoShow => no_show += 1,
            AppointmentStatus::Scheduled | AppointmentStatus::Cancelled => {}
        }
    }

    if attended == 0 && no_show == 0 {
        return Err(LiquidationError::NoAppointments {
            professional_id: terms.professional_id,
            date,
        });
    }

    let split = RevenueSplit::compute(base_revenue, discount_amount, terms.percentage);
    let period = SettlementPeriod::of_date(date);

    Ok(DailySettlement {
        id: ObjectId::new(),
        clinic_id: terms.clinic_id,
        professional_id: terms.professional_id,
        date,
        month: period.month,
        year: period.year,
        attended_appointments: attended,
        no_show_appointments: no_show,
        base_revenue: split.base_revenue,
        discount_amount: split.discount_amount,
        attended_revenue: split.attended_revenue,
        professional_earnings_attended: split.professional_earnings,
        tense_commission_attended: split.tense_commission,
        total_tense_commission: split.tense_commission,
        status: SettlementStatus::Pending,
        created_at: now,
    })
}

/// Aggregates the daily settlements of one professional and month.
/// Rows of other professionals or periods are ignored.
pub fn monthly_settlement<'a, I>(
    professional_id: ObjectId,
    period: SettlementPeriod,
    dailies: I,
    now: DateTime<Utc>,
) -> Result<MonthlySettlement>
where
    I: IntoIterator<Item = &'a DailySettlement>,
{
    let mut monthly = MonthlySettlement {
        id: ObjectId::new(),
        clinic_id: ObjectId::from_bytes([0; 12]),
        professional_id,
        month: period.month,
        year: period.year,
        attended_appointments: 0,
        no_show_appointments: 0,
        base_revenue: 0.0,
        discount_amount: 0.0,
        attended_revenue: 0.0,
        professional_earnings_attended: 0.0,
        total_tense_commission: 0.0,
        total_paid: 0.0,
        status: SettlementStatus::Pending,
        daily_settlement_ids: Vec::new(),
        created_at: now,
    };

    for daily in dailies
        .into_iter()
        .filter(|d| d.professional_id == professional_id && d.period() == period)
    {
        if monthly.daily_settlement_ids.is_empty() {
            monthly.clinic_id = daily.clinic_id;
        }
        monthly.daily_settlement_ids.push(daily.id);
        monthly.attended_appointments += daily.attended_appointments;
        monthly.no_show_appointments += daily.no_show_appointments;
        monthly.base_revenue += money_or_zero(daily.base_revenue);
        monthly.discount_amount += money_or_zero(daily.discount_amount);
        monthly.attended_revenue += money_or_zero(daily.attended_revenue);
        monthly.professional_earnings_attended +=
            money_or_zero(daily.professional_earnings_attended);
        monthly.total_tense_commission += money_or_zero(daily.total_tense_commission);
    }

    if monthly.daily_settlement_ids.is_empty() {
        return Err(LiquidationError::NoDailySettlements {
            professional_id,
            month: period.month + 1,
            year: period.year,
        });
    }

    monthly.base_revenue = round_money(monthly.base_revenue);
    monthly.discount_amount = round_money(monthly.discount_amount);
    monthly.attended_revenue = round_money(monthly.attended_revenue);
    monthly.professional_earnings_attended = round_money(monthly.professional_earnings_attended);
    monthly.total_tense_commission = round_money(monthly.total_tense_commission);

    Ok(monthly)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn appointment(
        professional_id: ObjectId,
        date: NaiveDate,
        price: f64,
        discount: f64,
        status: AppointmentStatus,
    ) -> Appointment {
        Appointment {
            id: Some(ObjectId::new()),
            clinic_id: ObjectId::new(),
            professional_id,
            client_name: "Cliente".into(),
            date,
            price,
            discount_amount: discount,
            status,
            notes: None,
        }
    }

    fn march_5() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 5).unwrap()
    }

    #[test]
    fn clinic_absorbs_the_whole_discount() {
        let split = RevenueSplit::compute(30000.0, 3000.0, 0.65);
        assert_eq!(split.attended_revenue, 27000.0);
        assert_eq!(split.professional_earnings, 17550.0);
        assert_eq!(split.tense_commission, 12450.0);
    }

    #[test]
    fn daily_counts_no_shows_without_revenue() {
        let pro = ObjectId::new();
        let terms = ProfessionalTerms::new(ObjectId::new(), pro, 0.65).unwrap();
        let appointments = vec![
            appointment(pro, march_5(), 10000.0, 0.0, AppointmentStatus::Attended),
            appointment(pro, march_5(), 10000.0, 0.0, AppointmentStatus::NoShow),
            appointment(pro, march_5(), 10000.0, 0.0, AppointmentStatus::Cancelled),
            appointment(pro, march_5().succ_opt().unwrap(), 5000.0, 0.0, AppointmentStatus::Attended),
            appointment(ObjectId::new(), march_5(), 5000.0, 0.0, AppointmentStatus::Attended),
        ];

        let daily = daily_settlement(&terms, march_5(), &appointments, Utc::now()).unwrap();
        assert_eq!(daily.attended_appointments, 1);
        assert_eq!(daily.no_show_appointments, 1);
        assert_eq!(daily.base_revenue, 10000.0);
        assert_eq!(daily.month, 2);
        assert_eq!(daily.status, SettlementStatus::Pending);
    }

    #[test]
    fn daily_without_relevant_appointments_fails() {
        let pro = ObjectId::new();
        let terms = ProfessionalTerms::new(ObjectId::new(), pro, 0.65).unwrap();
        let appointments = vec![appointment(
            pro,
            march_5(),
            10000.0,
            0.0,
            AppointmentStatus::Scheduled,
        )];
        let err = daily_settlement(&terms, march_5(), &appointments, Utc::now()).unwrap_err();
        assert!(matches!(err, LiquidationError::NoAppointments { .. }));
    }

    #[test]
    fn discount_never_exceeds_price() {
        let pro = ObjectId::new();
        let terms = ProfessionalTerms::new(ObjectId::new(), pro, 0.5).unwrap();
        let appointments = vec![appointment(
            pro,
            march_5(),
            1000.0,
            5000.0,
            AppointmentStatus::Attended,
        )];
        let daily = daily_settlement(&terms, march_5(), &appointments, Utc::now()).unwrap();
        assert_eq!(daily.discount_amount, 1000.0);
        assert_eq!(daily.attended_revenue, 0.0);
        assert_eq!(daily.total_tense_commission, 1000.0);
    }

    #[test]
    fn rejects_percentages_outside_unit_range() {
        assert!(ProfessionalTerms::new(ObjectId::new(), ObjectId::new(), 1.2).is_err());
        assert!(ProfessionalTerms::new(ObjectId::new(), ObjectId::new(), f64::NAN).is_err());
    }

    #[test]
    fn monthly_requires_matching_dailies() {
        let pro = ObjectId::new();
        let period = SettlementPeriod::new(2, 2025).unwrap();
        let err = monthly_settlement(pro, period, std::iter::empty(), Utc::now()).unwrap_err();
        assert_eq!(
            err,
            LiquidationError::NoDailySettlements {
                professional_id: pro,
                month: 3,
                year: 2025
            }
        );
    }
}
