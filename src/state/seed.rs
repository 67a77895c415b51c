use anyhow::{Context, Result};
use mongodb::{
    Database,
    bson::{DateTime, doc},
};
use slug::slugify;
use std::{fs, time::SystemTime};
use tracing::{debug, warn};

use crate::models::{
    Clinic, Professional, SeedClinic, SeedProfessional, SeedUser, User, UserRole,
    default_currency,
};

const COLLECTIONS: &[&str] = &[
    "clinics",
    "users",
    "sessions",
    "professionals",
    "appointments",
    "settlements",
    "cash_transfers",
    "settlement_payments",
];

pub(super) async fn is_database_empty(db: &Database) -> Result<bool> {
    let users_coll = db.collection::<User>("users");
    let count = users_coll.estimated_document_count().await?;
    Ok(count == 0)
}

pub(super) async fn ensure_collections(db: &Database) -> Result<()> {
    let existing = db.list_collection_names().await?;
    for name in COLLECTIONS {
        if !existing.iter().any(|e| e == name) {
            db.create_collection(*name).await?;
            debug!(collection = *name, "collection created");
        }
    }
    Ok(())
}

/// Clinics from `path`, or a single demo clinic when the file is missing.
pub(super) fn load_seed_clinics(path: &str) -> Result<Vec<SeedClinic>> {
    match fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str::<Vec<SeedClinic>>(&contents)
            .with_context(|| format!("invalid seed file {path}")),
        Err(_) => {
            warn!(path, "seed file not found, using demo clinic");
            Ok(vec![default_seed_clinic()])
        }
    }
}

fn default_seed_clinic() -> SeedClinic {
    SeedClinic {
        name: "TENSE Centro".to_string(),
        currency: default_currency(),
        users: vec![
            SeedUser {
                email: "admin@tense.local".to_string(),
                name: "Administración".to_string(),
                role: UserRole::Admin,
            },
            SeedUser {
                email: "recepcion@tense.local".to_string(),
                name: "Recepción".to_string(),
                role: UserRole::Staff,
            },
        ],
        professionals: vec![
            SeedProfessional {
                name: "Lucía Fernández".to_string(),
                specialty: Some("Kinesiología".to_string()),
                earnings_percentage: None,
            },
            SeedProfessional {
                name: "Martín Ruiz".to_string(),
                specialty: Some("Entrenamiento".to_string()),
                earnings_percentage: Some(0.7),
            },
        ],
    }
}

pub(super) async fn seed_clinics(db: &Database, clinics: &[SeedClinic]) -> Result<()> {
    let clinics_coll = db.collection::<Clinic>("clinics");
    let users_coll = db.collection::<User>("users");
    let professionals_coll = db.collection::<Professional>("professionals");
    let now = DateTime::from_system_time(SystemTime::now());

    for seed in clinics {
        let slug = slugify(&seed.name);
        // Insert if not exists
        let existing = clinics_coll
            .find_one(doc! { "slug": slug.clone() })
            .await?
            .and_then(|c| c.id);
        let clinic_id = match existing {
            Some(id) => id,
            None => clinics_coll
                .insert_one(Clinic {
                    id: None,
                    name: seed.name.clone(),
                    slug,
                    currency: seed.currency.clone(),
                    created_at: Some(now),
                })
                .await?
                .inserted_id
                .as_object_id()
                .context("clinic insert missing _id")?,
        };

        for user in &seed.users {
            users_coll
                .update_one(
                    doc! { "email": user.email.as_str() },
                    doc! { "$set": {
                        "email": user.email.as_str(),
                        "name": user.name.as_str(),
                        "clinic_id": clinic_id,
                        "role": user.role.as_str(),
                    } },
                )
                .upsert(true)
                .await?;
        }

        for professional in &seed.professionals {
            professionals_coll
                .insert_one(Professional {
                    id: None,
                    clinic_id,
                    name: professional.name.clone(),
                    specialty: professional.specialty.clone(),
                    earnings_percentage: professional.earnings_percentage,
                    is_active: true,
                    created_at: Some(now),
                })
                .await?;
        }
    }
    Ok(())
}
