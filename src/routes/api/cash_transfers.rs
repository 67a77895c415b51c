use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
};
use mongodb::bson::oid::ObjectId;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    liquidation::{CashTransfer, CashTransferPatch, LiquidationError, TransferFilter, TransferStatus},
    session::SessionUser,
    state::{
        AppState, confirm_cash_transfer, delete_cash_transfer, get_cash_transfer,
        list_cash_transfers, set_cash_transfers, update_cash_transfer,
    },
};

use super::helpers::*;

#[derive(Deserialize, Default)]
pub struct TransferQuery {
    #[serde(default)]
    professional_id: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

async fn clinic_transfer(
    state: &AppState,
    id: &ObjectId,
    active_clinic: &ObjectId,
) -> ApiResult<CashTransfer> {
    let transfer = get_cash_transfer(state, id)
        .await
        .ok_or_else(|| LiquidationError::transfer_not_found(*id))?;
    ensure_same_clinic(&transfer.clinic_id, active_clinic)?;
    Ok(transfer)
}

pub async fn cash_transfers_index(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<TransferQuery>,
) -> ApiResult<Json<Vec<CashTransfer>>> {
    let status = match clean_opt(query.status) {
        Some(s) => Some(
            TransferStatus::parse(&s)
                .ok_or_else(|| ApiError::bad_request("Estado de traspaso inválido"))?,
        ),
        None => None,
    };
    let filter = TransferFilter {
        clinic_id: Some(*session_user.clinic_id()),
        professional_id: parse_optional_object_id(query.professional_id, "professional_id")?,
        status,
    };
    Ok(Json(list_cash_transfers(&state, filter).await))
}

pub async fn cash_transfers_replace(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Json(transfers): Json<Vec<CashTransfer>>,
) -> ApiResult<Json<Value>> {
    let clinic_id = require_admin_active(&session_user)?;
    let count = set_cash_transfers(&state, &clinic_id, transfers)
        .await
        .map_err(map_state_error)?;
    Ok(Json(json!({ "count": count })))
}

pub async fn cash_transfers_confirm(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<CashTransfer>> {
    let clinic_id = require_admin_active(&session_user)?;
    let id = parse_object_id(&id, "id")?;
    clinic_transfer(&state, &id, &clinic_id).await?;

    let transfer = confirm_cash_transfer(&state, &id)
        .await
        .map_err(map_state_error)?;
    Ok(Json(transfer))
}

pub async fn cash_transfers_update(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(patch): Json<CashTransferPatch>,
) -> ApiResult<Json<CashTransfer>> {
    let clinic_id = require_admin_active(&session_user)?;
    let id = parse_object_id(&id, "id")?;
    clinic_transfer(&state, &id, &clinic_id).await?;

    let transfer = update_cash_transfer(&state, &id, patch)
        .await
        .map_err(map_state_error)?;
    Ok(Json(transfer))
}

pub async fn cash_transfers_delete(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<CashTransfer>> {
    let clinic_id = require_admin_active(&session_user)?;
    let id = parse_object_id(&id, "id")?;
    clinic_transfer(&state, &id, &clinic_id).await?;

    let removed = delete_cash_transfer(&state, &id)
        .await
        .map_err(map_state_error)?;
    Ok(Json(removed))
}
