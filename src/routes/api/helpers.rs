use std::str::FromStr;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::NaiveDate;
use mongodb::bson::oid::ObjectId;
use serde_json::{Value, json};
use tracing::error;

use crate::{liquidation::LiquidationError, session::SessionUser};

/// JSON error body `{ "error": "<mensaje>" }` with its status code.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        ApiError {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl From<LiquidationError> for ApiError {
    fn from(err: LiquidationError) -> Self {
        let status = match &err {
            LiquidationError::NotFound { .. } => StatusCode::NOT_FOUND,
            e if e.is_precondition() => StatusCode::CONFLICT,
            _ => StatusCode::UNPROCESSABLE_ENTITY,
        };
        ApiError::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Maps an entity-store error: settlement errors keep their meaning, anything
/// else is a server error.
pub fn map_state_error(err: anyhow::Error) -> ApiError {
    match err.downcast::<LiquidationError>() {
        Ok(liquidation) => liquidation.into(),
        Err(other) => {
            error!(error = %other, "entity store operation failed");
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "error interno")
        }
    }
}

pub fn require_admin_active(session_user: &SessionUser) -> ApiResult<ObjectId> {
    if !session_user.is_admin() {
        return Err(ApiError::new(
            StatusCode::FORBIDDEN,
            "se requiere rol de administrador",
        ));
    }
    Ok(*session_user.clinic_id())
}

pub fn ensure_same_clinic(entity_clinic: &ObjectId, active_clinic: &ObjectId) -> ApiResult<()> {
    if entity_clinic != active_clinic {
        Err(ApiError::new(
            StatusCode::FORBIDDEN,
            "el registro pertenece a otra clínica",
        ))
    } else {
        Ok(())
    }
}

pub fn clean_opt(input: Option<String>) -> Option<String> {
    input.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

pub fn parse_object_id(value: &str, label: &str) -> ApiResult<ObjectId> {
    ObjectId::from_str(value.trim())
        .map_err(|_| ApiError::bad_request(format!("{} inválido", label)))
}

pub fn parse_optional_object_id(value: Option<String>, label: &str) -> ApiResult<Option<ObjectId>> {
    clean_opt(value)
        .map(|v| parse_object_id(&v, label))
        .transpose()
}

pub fn parse_date_field(value: &str, label: &str) -> ApiResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        ApiError::bad_request(format!("{} debe tener formato AAAA-MM-DD", label))
    })
}

pub fn parse_optional_date_field(value: Option<String>, label: &str) -> ApiResult<Option<NaiveDate>> {
    clean_opt(value)
        .map(|v| parse_date_field(&v, label))
        .transpose()
}

pub fn parse_u32_field(value: &str, label: &str) -> ApiResult<u32> {
    value
        .trim()
        .parse::<u32>()
        .map_err(|_| ApiError::bad_request(format!("{} debe ser numérico", label)))
}

pub fn parse_i32_field(value: &str, label: &str) -> ApiResult<i32> {
    value
        .trim()
        .parse::<i32>()
        .map_err(|_| ApiError::bad_request(format!("{} debe ser numérico", label)))
}

pub fn parse_optional_u32_field(value: Option<String>, label: &str) -> ApiResult<Option<u32>> {
    clean_opt(value)
        .map(|v| parse_u32_field(&v, label))
        .transpose()
}

pub fn parse_optional_i32_field(value: Option<String>, label: &str) -> ApiResult<Option<i32>> {
    clean_opt(value)
        .map(|v| parse_i32_field(&v, label))
        .transpose()
}

pub fn parse_f64_field(value: &str, label: &str) -> ApiResult<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ApiError::bad_request(format!("{} debe ser numérico", label)))
}

/// Accepts a JSON number or a numeric string.
pub fn parse_amount_value(value: &Value, label: &str) -> ApiResult<f64> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| ApiError::bad_request(format!("{} debe ser numérico", label))),
        Value::String(raw) => parse_f64_field(raw, label),
        Value::Null => Err(ApiError::bad_request(format!("{} es obligatorio", label))),
        _ => Err(ApiError::bad_request(format!("{} debe ser numérico", label))),
    }
}

pub fn require_positive_amount(value: f64, label: &str) -> ApiResult<f64> {
    if value <= 0.0 {
        return Err(ApiError::bad_request(format!(
            "{} debe ser mayor a cero",
            label
        )));
    }
    Ok(value)
}

pub fn require_money_field(value: f64, label: &str) -> ApiResult<f64> {
    if !value.is_finite() || value < 0.0 {
        return Err(ApiError::bad_request(format!(
            "{} debe ser un número mayor o igual a cero",
            label
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn liquidation_errors_pick_status() {
        let id = ObjectId::new();
        let not_found: ApiError = LiquidationError::settlement_not_found(id).into();
        assert_eq!(not_found.status, StatusCode::NOT_FOUND);

        let duplicate: ApiError = LiquidationError::DuplicateMonthly {
            professional_id: id,
            month: 3,
            year: 2025,
        }
        .into();
        assert_eq!(duplicate.status, StatusCode::CONFLICT);

        let invalid: ApiError = LiquidationError::InvalidAmount(-1.0).into();
        assert_eq!(invalid.status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn state_errors_downcast_to_liquidation() {
        let err = anyhow::Error::from(LiquidationError::NotMonthly(ObjectId::new()));
        assert_eq!(map_state_error(err).status, StatusCode::UNPROCESSABLE_ENTITY);

        let other = anyhow::anyhow!("connection reset");
        assert_eq!(
            map_state_error(other).status,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn field_parsers_report_label() {
        let err = parse_u32_field("marzo", "month").unwrap_err();
        assert_eq!(err.message, "month debe ser numérico");
        assert_eq!(parse_optional_i32_field(Some("  ".into()), "year").unwrap(), None);
        assert!(parse_date_field("2025-02-30", "date").is_err());
        assert!(require_money_field(-5.0, "price").is_err());
    }

    #[test]
    fn amounts_must_be_positive_numbers() {
        assert_eq!(parse_amount_value(&json!(1500.5), "amount").unwrap(), 1500.5);
        assert_eq!(parse_amount_value(&json!(" 200 "), "amount").unwrap(), 200.0);

        let err = parse_amount_value(&json!("abc"), "amount").unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "amount debe ser numérico");
        assert!(parse_amount_value(&json!("NaN"), "amount").is_err());
        assert!(parse_amount_value(&Value::Null, "amount").is_err());

        for bad in [0.0, -5.0] {
            let err = require_positive_amount(bad, "amount").unwrap_err();
            assert_eq!(err.message, "amount debe ser mayor a cero");
        }
    }
}
