// models.rs
// Entity-store documents: clinics (tenants), users, sessions and professionals.
// Settlement-side records live in `liquidation::model`.

use mongodb::bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};

pub use crate::liquidation::{Appointment, AppointmentStatus};

/// User roles for authorization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Staff,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Staff => "staff",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }
}

impl Default for UserRole {
    fn default() -> Self {
        UserRole::Staff
    }
}

/// Clinic (tenant) document stored in MongoDB.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clinic {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    pub slug: String,
    pub currency: String,
    #[serde(default)]
    pub created_at: Option<DateTime>,
}

/// User document stored in MongoDB referencing its clinic by ObjectId.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub email: String,
    pub name: String,
    pub clinic_id: ObjectId,
    #[serde(default)]
    pub role: UserRole,
}

/// Session document stored in MongoDB linking a token to a user and expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub token: String,
    pub user_email: String,
    pub expires_at: DateTime,
}

/// Physiotherapist, trainer or nutritionist working for a clinic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Professional {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub clinic_id: ObjectId,
    pub name: String,
    #[serde(default)]
    pub specialty: Option<String>,
    /// Overrides the configured share of attended revenue, in `[0, 1]`.
    #[serde(default)]
    pub earnings_percentage: Option<f64>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<DateTime>,
}

fn default_true() -> bool {
    true
}

/// Seed file layout (`SEED_FILE`), applied only to an empty database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedClinic {
    pub name: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub users: Vec<SeedUser>,
    #[serde(default)]
    pub professionals: Vec<SeedProfessional>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedUser {
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub role: UserRole,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedProfessional {
    pub name: String,
    #[serde(default)]
    pub specialty: Option<String>,
    #[serde(default)]
    pub earnings_percentage: Option<f64>,
}

pub fn default_currency() -> String {
    "ARS".to_string()
}
