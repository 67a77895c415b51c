use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use serde::Deserialize;

use crate::{
    liquidation::validate_percentage,
    models::Professional,
    session::SessionUser,
    state::{AppState, create_professional, get_professional_by_id, list_professionals},
};

use super::helpers::*;

#[derive(Deserialize)]
pub struct ProfessionalPayload {
    name: String,
    #[serde(default)]
    specialty: Option<String>,
    #[serde(default)]
    earnings_percentage: Option<f64>,
}

pub async fn professionals_index(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<Professional>>> {
    let active_clinic = *session_user.clinic_id();
    let professionals = list_professionals(&state)
        .await
        .map_err(map_state_error)?
        .into_iter()
        .filter(|p| p.clinic_id == active_clinic)
        .collect();
    Ok(Json(professionals))
}

pub async fn professionals_create(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ProfessionalPayload>,
) -> ApiResult<(StatusCode, Json<Professional>)> {
    let clinic_id = require_admin_active(&session_user)?;

    let name = payload.name.trim();
    if name.is_empty() {
        return Err(ApiError::bad_request("El nombre es obligatorio"));
    }
    if let Some(pct) = payload.earnings_percentage {
        validate_percentage(pct)?;
    }

    let id = create_professional(
        &state,
        &clinic_id,
        name,
        clean_opt(payload.specialty),
        payload.earnings_percentage,
    )
    .await
    .map_err(map_state_error)?;

    let professional = get_professional_by_id(&state, &id)
        .await
        .map_err(map_state_error)?
        .ok_or_else(|| ApiError::not_found("profesional no encontrado"))?;
    Ok((StatusCode::CREATED, Json(professional)))
}
