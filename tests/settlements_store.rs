use chrono::NaiveDate;
use mongodb::bson::{doc, oid::ObjectId};
use serde_json::json;

use tenseclinic::liquidation::{
    LiquidationError, Settlement, SettlementFilter, SettlementKind, SettlementStatus,
    TransferFilter, TransferStatus,
};
use tenseclinic::models::AppointmentStatus;
use tenseclinic::state::{
    AppState, add_settlement_payment, confirm_cash_transfer, create_appointment, create_clinic,
    generate_daily_settlement, generate_daily_settlements_for_clinic, generate_settlement,
    list_cash_transfers, list_clinics, list_professionals, list_settlement_payments,
    list_settlements, load_desk, set_settlements, update_settlement_status,
};

#[path = "common/mod.rs"]
mod common;

/// Seeded professional paid at the configured default rate.
async fn default_rate_professional(state: &AppState) -> (ObjectId, ObjectId) {
    let professional = list_professionals(state)
        .await
        .unwrap()
        .into_iter()
        .find(|p| p.earnings_percentage.is_none())
        .expect("seeded professional without own rate");
    (professional.clinic_id, professional.id.unwrap())
}

async fn book_busy_day(state: &AppState, professional_id: &ObjectId, date: NaiveDate) {
    for discount in [3000.0, 0.0, 0.0] {
        create_appointment(
            state,
            professional_id,
            "Paciente",
            date,
            10000.0,
            discount,
            AppointmentStatus::Attended,
            None,
        )
        .await
        .unwrap();
    }
}

#[tokio::test]
async fn daily_generation_is_stored_and_reloaded() {
    let ctx = match common::setup_state().await {
        Some(s) => s,
        None => return,
    };
    let state = ctx.state.clone();
    let (_, professional_id) = default_rate_professional(&state).await;
    let date = NaiveDate::from_ymd_opt(2025, 3, 5).unwrap();
    book_busy_day(&state, &professional_id, date).await;

    let daily = generate_daily_settlement(&state, &professional_id, date)
        .await
        .unwrap();
    assert_eq!(daily.total_tense_commission, 12450.0);
    assert_eq!(state.settlements.count_documents(doc! {}).await.unwrap(), 1);

    let err = generate_daily_settlement(&state, &professional_id, date)
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<LiquidationError>(),
        Some(LiquidationError::DuplicateDaily { .. })
    ));
    assert_eq!(state.settlements.count_documents(doc! {}).await.unwrap(), 1);

    let reloaded = load_desk(&state).await.unwrap();
    let stored = reloaded.settlement(&daily.id).unwrap();
    assert_eq!(stored, &Settlement::Daily(daily));

    common::teardown(Some(ctx)).await;
}

#[tokio::test]
async fn monthly_cycle_persists_transfer_and_payments() {
    let ctx = match common::setup_state().await {
        Some(s) => s,
        None => return,
    };
    let state = ctx.state.clone();
    let (clinic_id, professional_id) = default_rate_professional(&state).await;
    for day in [3, 4] {
        let date = NaiveDate::from_ymd_opt(2025, 3, day).unwrap();
        book_busy_day(&state, &professional_id, date).await;
        generate_daily_settlement(&state, &professional_id, date)
            .await
            .unwrap();
    }

    let generation = generate_settlement(&state, &professional_id, 2, 2025)
        .await
        .unwrap();
    let monthly_id = generation.settlement.id;
    assert_eq!(generation.settlement.total_tense_commission, 24900.0);
    assert!(generation.transfer.created);
    assert_eq!(generation.transfer.transfer.month, 4);

    add_settlement_payment(&state, &monthly_id, 10000.0, Some("efectivo".into()))
        .await
        .unwrap();
    let update = update_settlement_status(&state, &monthly_id, SettlementStatus::Paid)
        .await
        .unwrap();
    let transfer = update.transfer.unwrap().transfer;
    assert_eq!(transfer.amount, 24900.0);

    confirm_cash_transfer(&state, &transfer.id).await.unwrap();

    // Everything the desk holds must come back from MongoDB.
    let reloaded = load_desk(&state).await.unwrap();
    let monthly = reloaded
        .settlement(&monthly_id)
        .and_then(Settlement::as_monthly)
        .unwrap();
    assert_eq!(monthly.status, SettlementStatus::Paid);
    assert_eq!(monthly.total_paid, 10000.0);
    assert_eq!(
        reloaded.cash_transfer(&transfer.id).unwrap().status,
        TransferStatus::Confirmada
    );
    assert_eq!(list_settlement_payments(&state, &monthly_id).await.len(), 1);
    assert_eq!(
        state.settlement_payments.count_documents(doc! {}).await.unwrap(),
        1
    );

    let transfers = list_cash_transfers(
        &state,
        TransferFilter {
            clinic_id: Some(clinic_id),
            ..TransferFilter::default()
        },
    )
    .await;
    assert_eq!(transfers.len(), 1);

    common::teardown(Some(ctx)).await;
}

#[tokio::test]
async fn clinic_batch_skips_idle_professionals() {
    let ctx = match common::setup_state().await {
        Some(s) => s,
        None => return,
    };
    let state = ctx.state.clone();
    let (clinic_id, professional_id) = default_rate_professional(&state).await;
    let date = NaiveDate::from_ymd_opt(2025, 5, 12).unwrap();
    book_busy_day(&state, &professional_id, date).await;

    let batch = generate_daily_settlements_for_clinic(&state, &clinic_id, date)
        .await
        .unwrap();
    assert_eq!(batch.generated.len(), 1);
    assert_eq!(batch.generated[0].professional_id, professional_id);
    assert!(!batch.skipped.is_empty());

    common::teardown(Some(ctx)).await;
}

#[tokio::test]
async fn bulk_set_accepts_legacy_rows_and_keeps_other_clinics() {
    let ctx = match common::setup_state().await {
        Some(s) => s,
        None => return,
    };
    let state = ctx.state.clone();
    let clinic_id = list_clinics(&state).await.unwrap()[0].id.unwrap();
    let professional_id = ObjectId::new();

    let rows = vec![
        json!({
            "id": "legacy-1",
            "type": "daily",
            "professionalId": professional_id.to_hex(),
            "date": "2025-02-10",
            "baseRevenue": 20000,
            "discountAmount": 1000,
            "professionalEarningsAttended": 12350,
            "status": "reviewed"
        }),
        json!({
            "type": "monthly",
            "professionalId": professional_id.to_hex(),
            "month": 1,
            "year": 2025,
            "baseRevenue": 20000,
            "discountAmount": 1000,
            "professionalEarningsAttended": 12350,
            "totalPaid": 500
        }),
    ];
    let count = set_settlements(&state, &clinic_id, rows).await.unwrap();
    assert_eq!(count, 2);

    let stored = list_settlements(
        &state,
        SettlementFilter {
            clinic_id: Some(clinic_id),
            ..SettlementFilter::default()
        },
    )
    .await;
    assert_eq!(stored.len(), 2);
    let monthly = stored
        .iter()
        .find(|s| s.kind() == SettlementKind::Monthly)
        .and_then(Settlement::as_monthly)
        .unwrap();
    assert_eq!(monthly.total_tense_commission, 7650.0);
    assert_eq!(monthly.outstanding_balance(), 7150.0);
    assert_eq!(state.settlements.count_documents(doc! {}).await.unwrap(), 2);

    // Replacing again with nothing clears this clinic only.
    set_settlements(&state, &clinic_id, Vec::new()).await.unwrap();
    assert_eq!(state.settlements.count_documents(doc! {}).await.unwrap(), 0);

    common::teardown(Some(ctx)).await;
}

#[tokio::test]
async fn bulk_set_with_repeated_ids_keeps_stored_rows() {
    let ctx = match common::setup_state().await {
        Some(s) => s,
        None => return,
    };
    let state = ctx.state.clone();
    let clinic_id = list_clinics(&state).await.unwrap()[0].id.unwrap();
    let other_clinic = create_clinic(&state, "Otra Sede", "ARS").await.unwrap();
    let (_, professional_id) = default_rate_professional(&state).await;
    let date = NaiveDate::from_ymd_opt(2025, 3, 5).unwrap();
    book_busy_day(&state, &professional_id, date).await;
    let daily = generate_daily_settlement(&state, &professional_id, date)
        .await
        .unwrap();

    let foreign = json!({
        "type": "daily",
        "professionalId": ObjectId::new().to_hex(),
        "date": "2025-02-10",
        "baseRevenue": 20000,
        "discountAmount": 0,
        "professionalEarningsAttended": 13000
    });
    set_settlements(&state, &other_clinic, vec![foreign])
        .await
        .unwrap();
    assert_eq!(state.settlements.count_documents(doc! {}).await.unwrap(), 2);

    // Two rows sharing one id are refused before anything is written.
    let row = serde_json::to_value(Settlement::Daily(daily)).unwrap();
    let mut twin = row.clone();
    twin["date"] = json!("2025-03-06");
    let err = set_settlements(&state, &clinic_id, vec![row, twin])
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<LiquidationError>(),
        Some(LiquidationError::InvalidRecord(_))
    ));
    assert_eq!(state.settlements.count_documents(doc! {}).await.unwrap(), 2);

    // Clearing one clinic leaves the other clinic's rows in MongoDB.
    set_settlements(&state, &clinic_id, Vec::new()).await.unwrap();
    assert_eq!(
        state
            .settlements
            .count_documents(doc! { "clinic_id": other_clinic })
            .await
            .unwrap(),
        1
    );
    assert_eq!(state.settlements.count_documents(doc! {}).await.unwrap(), 1);
    let reloaded = load_desk(&state).await.unwrap();
    assert_eq!(reloaded.settlement_count(), 1);

    common::teardown(Some(ctx)).await;
}
