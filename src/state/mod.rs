// state module: AppState (the entity store), initialization, and re-exports of submodules.

use std::sync::Arc;

use anyhow::{Context, Result};
use mongodb::{Client, Collection, Database};
use tokio::sync::Mutex;
use tracing::info;

use crate::config::AppConfig;
use crate::liquidation::{CashTransfer, ReconciliationDesk, Settlement, SettlementPayment};
use crate::models::{Appointment, Clinic, Professional, Session, User};

mod clinics;
mod professionals;
mod seed;
mod settlements;
mod users;

pub use clinics::*;
pub use professionals::*;
pub use settlements::*;
pub use users::*;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub clinics: Collection<Clinic>,
    pub users: Collection<User>,
    pub sessions: Collection<Session>,
    pub professionals: Collection<Professional>,
    pub appointments: Collection<Appointment>,
    pub settlements: Collection<Settlement>,
    pub cash_transfers: Collection<CashTransfer>,
    pub settlement_payments: Collection<SettlementPayment>,
    /// In-memory copy of the settlement side; every mutation holds this lock
    /// until its changes are stored.
    pub desk: Arc<Mutex<ReconciliationDesk>>,
}

pub async fn init_state() -> Result<AppState> {
    init_state_with(AppConfig::from_env()?).await
}

pub async fn init_state_with(config: AppConfig) -> Result<AppState> {
    let client = Client::with_uri_str(&config.mongodb_uri).await?;
    let db = client.database(&config.mongodb_db);

    seed::ensure_collections(&db).await?;

    // Only seed when the database is effectively empty (no users).
    if seed::is_database_empty(&db).await? {
        let clinics = seed::load_seed_clinics(&config.seed_file)?;
        seed::seed_clinics(&db, &clinics).await?;
        info!(clinics = clinics.len(), "database seeded");
    }

    let mut state = collections(config, &db);
    let desk = load_desk(&state)
        .await
        .context("failed to load settlements into memory")?;
    info!(
        settlements = desk.settlement_count(),
        transfers = desk.transfer_count(),
        "reconciliation desk loaded"
    );
    state.desk = Arc::new(Mutex::new(desk));
    Ok(state)
}

fn collections(config: AppConfig, db: &Database) -> AppState {
    AppState {
        config,
        clinics: db.collection::<Clinic>("clinics"),
        users: db.collection::<User>("users"),
        sessions: db.collection::<Session>("sessions"),
        professionals: db.collection::<Professional>("professionals"),
        appointments: db.collection::<Appointment>("appointments"),
        settlements: db.collection::<Settlement>("settlements"),
        cash_transfers: db.collection::<CashTransfer>("cash_transfers"),
        settlement_payments: db.collection::<SettlementPayment>("settlement_payments"),
        desk: Arc::new(Mutex::new(ReconciliationDesk::new())),
    }
}
