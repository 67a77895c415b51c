use anyhow::{Context, Result};
use data_encoding::BASE32_NOPAD;
use futures::stream::TryStreamExt;
use mongodb::bson::{DateTime, doc, oid::ObjectId};
use rand::RngCore;
use std::time::{Duration, SystemTime};
use tracing::warn;

use crate::models::{Session, User, UserRole};

use super::AppState;

#[derive(Clone)]
pub struct UserWithClinic {
    pub id: ObjectId,
    pub email: String,
    pub name: String,
    pub clinic_id: ObjectId,
    pub clinic_name: String,
    pub role: UserRole,
}

pub async fn find_user(state: &AppState, email: &str) -> Result<Option<UserWithClinic>> {
    if let Some(user) = state.users.find_one(doc! { "email": email }).await? {
        build_user_with_clinic(state, user).await.map(Some)
    } else {
        Ok(None)
    }
}

pub async fn list_users(state: &AppState) -> Result<Vec<UserWithClinic>> {
    let mut cursor = state.users.find(doc! {}).await?;
    let mut users = Vec::new();
    while let Some(user) = cursor.try_next().await? {
        users.push(build_user_with_clinic(state, user).await?);
    }
    Ok(users)
}

pub async fn create_user(
    state: &AppState,
    clinic_id: &ObjectId,
    email: &str,
    name: &str,
    role: UserRole,
) -> Result<ObjectId> {
    let res = state
        .users
        .insert_one(User {
            id: None,
            email: email.to_string(),
            name: name.to_string(),
            clinic_id: *clinic_id,
            role,
        })
        .await?;
    res.inserted_id
        .as_object_id()
        .context("user insert missing _id")
}

/// Issues a session token for `email`, replacing any previous session of that user.
pub async fn create_session(state: &AppState, email: &str) -> Result<String> {
    if let Err(err) = state
        .sessions
        .delete_many(doc! { "user_email": email })
        .await
    {
        warn!(error = %err, user = email, "failed to clear previous sessions");
    }

    let mut token_bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut token_bytes);
    let token = BASE32_NOPAD.encode(&token_bytes);

    let expires_at = DateTime::from_system_time(
        SystemTime::now() + Duration::from_secs(state.config.session_ttl_seconds),
    );

    state
        .sessions
        .insert_one(Session {
            id: None,
            token: token.clone(),
            user_email: email.to_string(),
            expires_at,
        })
        .await?;

    Ok(token)
}

pub async fn find_user_by_session(
    state: &AppState,
    token: &str,
) -> Result<Option<UserWithClinic>> {
    if let Some(session) = state.sessions.find_one(doc! { "token": token }).await? {
        let expires_at = session.expires_at.to_system_time();
        if expires_at <= SystemTime::now() {
            if let Err(err) = state.sessions.delete_one(doc! { "token": token }).await {
                warn!(error = %err, "failed to remove expired session");
            }
            return Ok(None);
        }
        find_user(state, &session.user_email).await
    } else {
        Ok(None)
    }
}

async fn build_user_with_clinic(state: &AppState, user: User) -> Result<UserWithClinic> {
    let id = user.id.context("user missing _id")?;
    let clinic = state
        .clinics
        .find_one(doc! { "_id": &user.clinic_id })
        .await?
        .context("user references missing clinic")?;

    Ok(UserWithClinic {
        id,
        email: user.email,
        name: user.name,
        clinic_id: user.clinic_id,
        clinic_name: clinic.name,
        role: user.role,
    })
}
