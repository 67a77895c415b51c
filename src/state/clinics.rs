use anyhow::{Context, Result};
use futures::stream::TryStreamExt;
use mongodb::bson::{DateTime, doc, oid::ObjectId};
use slug::slugify;
use std::time::SystemTime;

use crate::models::{Clinic, default_currency};

use super::AppState;

pub async fn list_clinics(state: &AppState) -> Result<Vec<Clinic>> {
    let mut cursor = state.clinics.find(doc! {}).await?;
    let mut clinics = Vec::new();
    while let Some(clinic) = cursor.try_next().await? {
        clinics.push(clinic);
    }
    Ok(clinics)
}

pub async fn get_clinic_by_id(state: &AppState, id: &ObjectId) -> Result<Option<Clinic>> {
    state
        .clinics
        .find_one(doc! { "_id": id })
        .await
        .map_err(Into::into)
}

pub async fn create_clinic(state: &AppState, name: &str, currency: &str) -> Result<ObjectId> {
    let currency = if currency.trim().is_empty() {
        default_currency()
    } else {
        currency.trim().to_string()
    };

    let res = state
        .clinics
        .insert_one(Clinic {
            id: None,
            name: name.to_string(),
            slug: slugify(name),
            currency,
            created_at: Some(DateTime::from_system_time(SystemTime::now())),
        })
        .await?;

    res.inserted_id
        .as_object_id()
        .context("clinic insert missing _id")
}
