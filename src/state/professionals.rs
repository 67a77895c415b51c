use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use futures::stream::TryStreamExt;
use mongodb::bson::{DateTime, Document, doc, oid::ObjectId};
use std::time::SystemTime;

use crate::liquidation::{ProfessionalTerms, validate_percentage};
use crate::models::{Appointment, AppointmentStatus, Professional};

use super::AppState;

pub async fn list_professionals(state: &AppState) -> Result<Vec<Professional>> {
    let mut cursor = state.professionals.find(doc! {}).await?;
    let mut items = Vec::new();
    while let Some(professional) = cursor.try_next().await? {
        items.push(professional);
    }
    Ok(items)
}

pub async fn get_professional_by_id(
    state: &AppState,
    id: &ObjectId,
) -> Result<Option<Professional>> {
    state
        .professionals
        .find_one(doc! { "_id": id })
        .await
        .map_err(Into::into)
}

pub async fn create_professional(
    state: &AppState,
    clinic_id: &ObjectId,
    name: &str,
    specialty: Option<String>,
    earnings_percentage: Option<f64>,
) -> Result<ObjectId> {
    if let Some(pct) = earnings_percentage {
        validate_percentage(pct)?;
    }

    let res = state
        .professionals
        .insert_one(Professional {
            id: None,
            clinic_id: *clinic_id,
            name: name.to_string(),
            specialty,
            earnings_percentage,
            is_active: true,
            created_at: Some(DateTime::from_system_time(SystemTime::now())),
        })
        .await?;
    res.inserted_id
        .as_object_id()
        .context("professional insert missing _id")
}

/// Split used when generating this professional's dailies: their own rate
/// if set, else the configured default.
pub fn professional_terms(state: &AppState, professional: &Professional) -> Result<ProfessionalTerms> {
    let id = professional.id.context("professional missing _id")?;
    let percentage = professional
        .earnings_percentage
        .unwrap_or(state.config.professional_percentage);
    ProfessionalTerms::new(professional.clinic_id, id, percentage).map_err(Into::into)
}

pub async fn list_appointments(
    state: &AppState,
    clinic_id: Option<&ObjectId>,
    professional_id: Option<&ObjectId>,
    date: Option<NaiveDate>,
) -> Result<Vec<Appointment>> {
    let mut filter = Document::new();
    if let Some(cid) = clinic_id {
        filter.insert("clinic_id", *cid);
    }
    if let Some(pid) = professional_id {
        filter.insert("professional_id", *pid);
    }
    if let Some(date) = date {
        filter.insert("date", date.to_string());
    }

    let mut cursor = state.appointments.find(filter).await?;
    let mut items = Vec::new();
    while let Some(appointment) = cursor.try_next().await? {
        items.push(appointment);
    }
    Ok(items)
}

pub async fn get_appointment_by_id(state: &AppState, id: &ObjectId) -> Result<Option<Appointment>> {
    state
        .appointments
        .find_one(doc! { "_id": id })
        .await
        .map_err(Into::into)
}

pub async fn create_appointment(
    state: &AppState,
    professional_id: &ObjectId,
    client_name: &str,
    date: NaiveDate,
    price: f64,
    discount_amount: f64,
    status: AppointmentStatus,
    notes: Option<String>,
) -> Result<ObjectId> {
    if !price.is_finite() || price < 0.0 {
        bail!("appointment price must be a non-negative number");
    }
    if !discount_amount.is_finite() || discount_amount < 0.0 || discount_amount > price {
        bail!("appointment discount must be between 0 and the price");
    }

    let professional = get_professional_by_id(state, professional_id)
        .await?
        .context("professional not found")?;

    let res = state
        .appointments
        .insert_one(Appointment {
            id: None,
            clinic_id: professional.clinic_id,
            professional_id: *professional_id,
            client_name: client_name.to_string(),
            date,
            price,
            discount_amount,
            status,
            notes,
        })
        .await?;
    res.inserted_id
        .as_object_id()
        .context("appointment insert missing _id")
}

pub async fn update_appointment_status(
    state: &AppState,
    id: &ObjectId,
    status: AppointmentStatus,
) -> Result<()> {
    let res = state
        .appointments
        .update_one(
            doc! { "_id": id },
            doc! { "$set": { "status": status.as_str() } },
        )
        .await?;
    if res.matched_count == 0 {
        bail!("appointment not found");
    }
    Ok(())
}
