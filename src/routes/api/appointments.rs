use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use mongodb::bson::oid::ObjectId;
use serde::Deserialize;

use crate::{
    models::{Appointment, AppointmentStatus, Professional},
    session::SessionUser,
    state::{
        AppState, create_appointment, get_appointment_by_id, get_professional_by_id,
        list_appointments, update_appointment_status,
    },
};

use super::helpers::*;

#[derive(Deserialize, Default)]
pub struct AppointmentQuery {
    #[serde(default)]
    professional_id: Option<String>,
    #[serde(default)]
    date: Option<String>,
}

#[derive(Deserialize)]
pub struct AppointmentPayload {
    professional_id: String,
    client_name: String,
    date: String,
    price: f64,
    #[serde(default)]
    discount_amount: Option<f64>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    notes: Option<String>,
}

#[derive(Deserialize)]
pub struct AppointmentStatusPayload {
    status: String,
}

fn parse_appointment_status(value: &str) -> ApiResult<AppointmentStatus> {
    AppointmentStatus::parse(value).ok_or_else(|| ApiError::bad_request("Estado de turno inválido"))
}

/// Loads a professional of the active clinic.
pub(super) async fn clinic_professional(
    state: &AppState,
    professional_id: &ObjectId,
    active_clinic: &ObjectId,
) -> ApiResult<Professional> {
    let professional = get_professional_by_id(state, professional_id)
        .await
        .map_err(map_state_error)?
        .ok_or_else(|| ApiError::not_found("profesional no encontrado"))?;
    ensure_same_clinic(&professional.clinic_id, active_clinic)?;
    Ok(professional)
}

pub async fn appointments_index(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<AppointmentQuery>,
) -> ApiResult<Json<Vec<Appointment>>> {
    let active_clinic = *session_user.clinic_id();
    let professional_id = parse_optional_object_id(query.professional_id, "professional_id")?;
    let date = parse_optional_date_field(query.date, "date")?;

    let appointments = list_appointments(
        &state,
        Some(&active_clinic),
        professional_id.as_ref(),
        date,
    )
    .await
    .map_err(map_state_error)?;
    Ok(Json(appointments))
}

// Reception books appointments, so any clinic member may create them.
pub async fn appointments_create(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AppointmentPayload>,
) -> ApiResult<(StatusCode, Json<Appointment>)> {
    let active_clinic = *session_user.clinic_id();
    let professional_id = parse_object_id(&payload.professional_id, "professional_id")?;
    clinic_professional(&state, &professional_id, &active_clinic).await?;

    let client_name = payload.client_name.trim();
    if client_name.is_empty() {
        return Err(ApiError::bad_request("El nombre del cliente es obligatorio"));
    }
    let date = parse_date_field(&payload.date, "date")?;
    let price = require_money_field(payload.price, "price")?;
    let discount = require_money_field(payload.discount_amount.unwrap_or(0.0), "discount_amount")?;
    if discount > price {
        return Err(ApiError::bad_request(
            "discount_amount no puede superar el precio",
        ));
    }
    let status = match clean_opt(payload.status) {
        Some(s) => parse_appointment_status(&s)?,
        None => AppointmentStatus::Scheduled,
    };

    let id = create_appointment(
        &state,
        &professional_id,
        client_name,
        date,
        price,
        discount,
        status,
        clean_opt(payload.notes),
    )
    .await
    .map_err(map_state_error)?;

    let appointment = get_appointment_by_id(&state, &id)
        .await
        .map_err(map_state_error)?
        .ok_or_else(|| ApiError::not_found("turno no encontrado"))?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

pub async fn appointments_update_status(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<AppointmentStatusPayload>,
) -> ApiResult<Json<Appointment>> {
    let active_clinic = *session_user.clinic_id();
    let id = parse_object_id(&id, "id")?;
    let status = parse_appointment_status(&payload.status)?;

    let appointment = get_appointment_by_id(&state, &id)
        .await
        .map_err(map_state_error)?
        .ok_or_else(|| ApiError::not_found("turno no encontrado"))?;
    ensure_same_clinic(&appointment.clinic_id, &active_clinic)?;

    update_appointment_status(&state, &id, status)
        .await
        .map_err(map_state_error)?;
    Ok(Json(Appointment {
        status,
        ..appointment
    }))
}
