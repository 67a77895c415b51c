use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use mongodb::bson::oid::ObjectId;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    liquidation::{
        LiquidationError, MonthOverview, Settlement, SettlementFilter, SettlementKind,
        SettlementPayment, SettlementStatus,
    },
    session::SessionUser,
    state::{
        AppState, add_settlement_payment, delete_settlement, generate_daily_settlement,
        generate_daily_settlements_for_clinic, generate_settlement, get_settlement,
        list_settlement_payments, list_settlements, month_overview, set_settlements,
        update_settlement_status,
    },
};

use super::appointments::clinic_professional;
use super::helpers::*;

#[derive(Deserialize, Default)]
pub struct SettlementQuery {
    #[serde(default)]
    professional_id: Option<String>,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    month: Option<String>,
    #[serde(default)]
    year: Option<String>,
}

#[derive(Deserialize)]
pub struct OverviewQuery {
    month: String,
    year: String,
}

#[derive(Deserialize)]
pub struct DailyPayload {
    professional_id: String,
    date: String,
}

#[derive(Deserialize)]
pub struct DailyAllPayload {
    date: String,
}

/// `month` is 0-indexed, like the stored settlements.
#[derive(Deserialize)]
pub struct MonthlyPayload {
    professional_id: String,
    month: u32,
    year: i32,
}

#[derive(Deserialize)]
pub struct StatusPayload {
    status: String,
}

#[derive(Deserialize)]
pub struct PaymentPayload {
    #[serde(default)]
    amount: Value,
    #[serde(default)]
    notes: Option<String>,
}

async fn clinic_settlement(
    state: &AppState,
    id: &ObjectId,
    active_clinic: &ObjectId,
) -> ApiResult<Settlement> {
    let settlement = get_settlement(state, id)
        .await
        .ok_or_else(|| LiquidationError::settlement_not_found(*id))?;
    ensure_same_clinic(&settlement.clinic_id(), active_clinic)?;
    Ok(settlement)
}

pub async fn settlements_index(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<SettlementQuery>,
) -> ApiResult<Json<Vec<Settlement>>> {
    let kind = match clean_opt(query.kind) {
        Some(k) => Some(
            SettlementKind::parse(&k)
                .ok_or_else(|| ApiError::bad_request("Tipo de liquidación inválido"))?,
        ),
        None => None,
    };
    let filter = SettlementFilter {
        clinic_id: Some(*session_user.clinic_id()),
        professional_id: parse_optional_object_id(query.professional_id, "professional_id")?,
        kind,
        month: parse_optional_u32_field(query.month, "month")?,
        year: parse_optional_i32_field(query.year, "year")?,
    };
    Ok(Json(list_settlements(&state, filter).await))
}

/// Bulk replacement of the clinic's settlements; accepts legacy rows.
pub async fn settlements_replace(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Json(rows): Json<Vec<Value>>,
) -> ApiResult<Json<Value>> {
    let clinic_id = require_admin_active(&session_user)?;
    let count = set_settlements(&state, &clinic_id, rows)
        .await
        .map_err(map_state_error)?;
    Ok(Json(json!({ "count": count })))
}

pub async fn settlements_generate_daily(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<DailyPayload>,
) -> ApiResult<(StatusCode, Json<Settlement>)> {
    let clinic_id = require_admin_active(&session_user)?;
    let professional_id = parse_object_id(&payload.professional_id, "professional_id")?;
    let date = parse_date_field(&payload.date, "date")?;
    clinic_professional(&state, &professional_id, &clinic_id).await?;

    let daily = generate_daily_settlement(&state, &professional_id, date)
        .await
        .map_err(map_state_error)?;
    Ok((StatusCode::CREATED, Json(Settlement::Daily(daily))))
}

pub async fn settlements_generate_daily_all(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<DailyAllPayload>,
) -> ApiResult<Json<Value>> {
    let clinic_id = require_admin_active(&session_user)?;
    let date = parse_date_field(&payload.date, "date")?;

    let batch = generate_daily_settlements_for_clinic(&state, &clinic_id, date)
        .await
        .map_err(map_state_error)?;
    let generated: Vec<Settlement> = batch.generated.into_iter().map(Settlement::Daily).collect();
    let skipped: Vec<Value> = batch
        .skipped
        .into_iter()
        .map(|(professional_id, err)| {
            json!({ "professional_id": professional_id.to_hex(), "error": err.to_string() })
        })
        .collect();
    Ok(Json(json!({ "generated": generated, "skipped": skipped })))
}

pub async fn settlements_generate_monthly(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<MonthlyPayload>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let clinic_id = require_admin_active(&session_user)?;
    let professional_id = parse_object_id(&payload.professional_id, "professional_id")?;
    clinic_professional(&state, &professional_id, &clinic_id).await?;

    let generation = generate_settlement(&state, &professional_id, payload.month, payload.year)
        .await
        .map_err(map_state_error)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "settlement": Settlement::Monthly(generation.settlement),
            "transfer": generation.transfer.transfer,
            "transfer_created": generation.transfer.created,
        })),
    ))
}

pub async fn settlements_overview(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<OverviewQuery>,
) -> ApiResult<Json<MonthOverview>> {
    let month = parse_u32_field(&query.month, "month")?;
    let year = parse_i32_field(&query.year, "year")?;
    let overview = month_overview(&state, Some(*session_user.clinic_id()), month, year)
        .await
        .map_err(map_state_error)?;
    Ok(Json(overview))
}

pub async fn settlements_update_status(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<StatusPayload>,
) -> ApiResult<Json<Value>> {
    let clinic_id = require_admin_active(&session_user)?;
    let id = parse_object_id(&id, "id")?;
    let status = SettlementStatus::parse(&payload.status)
        .ok_or_else(|| ApiError::bad_request("Estado de liquidación inválido"))?;
    clinic_settlement(&state, &id, &clinic_id).await?;

    let update = update_settlement_status(&state, &id, status)
        .await
        .map_err(map_state_error)?;
    Ok(Json(json!({
        "settlement": update.settlement,
        "transfer": update.transfer.map(|t| t.transfer),
    })))
}

pub async fn settlements_payments_index(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<SettlementPayment>>> {
    let id = parse_object_id(&id, "id")?;
    clinic_settlement(&state, &id, session_user.clinic_id()).await?;
    Ok(Json(list_settlement_payments(&state, &id).await))
}

pub async fn settlements_add_payment(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<PaymentPayload>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let clinic_id = require_admin_active(&session_user)?;
    let id = parse_object_id(&id, "id")?;
    let amount = parse_amount_value(&payload.amount, "amount")?;
    let amount = require_positive_amount(amount, "amount")?;
    clinic_settlement(&state, &id, &clinic_id).await?;

    let payment = add_settlement_payment(&state, &id, amount, clean_opt(payload.notes))
        .await
        .map_err(map_state_error)?;
    let settlement = clinic_settlement(&state, &id, &clinic_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "payment": payment, "settlement": settlement })),
    ))
}

pub async fn settlements_delete(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Settlement>> {
    let clinic_id = require_admin_active(&session_user)?;
    let id = parse_object_id(&id, "id")?;
    clinic_settlement(&state, &id, &clinic_id).await?;

    let removed = delete_settlement(&state, &id)
        .await
        .map_err(map_state_error)?;
    Ok(Json(removed))
}
