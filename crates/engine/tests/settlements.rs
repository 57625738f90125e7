use chrono::Utc;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbBackend, Statement};

use engine::{
    CreateExpenseCmd, CreateSettlementCmd, Currency, Engine, EngineError, GroupRole, MoneyCents,
    SettlementStatus, SettlementType,
};
use migration::MigratorTrait;
use uuid::Uuid;

fn eur() -> Currency {
    Currency::try_from("EUR").unwrap()
}

/// Engine with a group where alice is admin and bob a member.
async fn engine_with_group() -> (Engine, Uuid) {
    let (engine, group_id, _) = engine_with_group_and_db().await;
    (engine, group_id)
}

/// Same as [`engine_with_group`], also handing back the raw connection.
async fn engine_with_group_and_db() -> (Engine, Uuid, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder().database(db.clone()).build().await.unwrap();
    for user in ["alice", "bob", "carol", "bot"] {
        engine.create_user(user, user).await.unwrap();
    }
    let group = engine.create_group("Trip", eur(), "alice").await.unwrap();
    engine
        .add_member(group.id, "bob", GroupRole::Member, "alice")
        .await
        .unwrap();
    engine
        .add_member(group.id, "bot", GroupRole::Assistant, "alice")
        .await
        .unwrap();
    (engine, group.id, db)
}

async fn payment(engine: &Engine, group_id: Uuid, cents: i64) -> Uuid {
    engine
        .create_settlement(
            CreateSettlementCmd::new(
                group_id,
                "alice",
                "bob",
                MoneyCents::new(cents),
                eur(),
                SettlementType::Payment,
                Utc::now(),
            )
            .description("cash"),
        )
        .await
        .unwrap()
        .id
}

async fn alice_vs_bob(engine: &Engine, group_id: Uuid) -> MoneyCents {
    engine.group_balances(group_id, "alice").await.unwrap()[0].balance_with("bob")
}

#[tokio::test]
async fn confirmed_payment_moves_balance_once() {
    let (engine, group_id) = engine_with_group().await;
    engine
        .create_expense(CreateExpenseCmd::new(
            group_id,
            "bob",
            MoneyCents::new(4_000),
            eur(),
            Utc::now(),
        ))
        .await
        .unwrap();
    let before = alice_vs_bob(&engine, group_id).await;

    let settlement_id = payment(&engine, group_id, 2_000).await;
    // Pending settlements do not touch balances.
    assert_eq!(alice_vs_bob(&engine, group_id).await, before);

    engine
        .transition_settlement(
            group_id,
            settlement_id,
            SettlementStatus::PendingConfirmation,
            "alice",
        )
        .await
        .unwrap();
    let outcome = engine
        .transition_settlement(group_id, settlement_id, SettlementStatus::Confirmed, "bob")
        .await
        .unwrap();
    let expense = outcome.compensating_expense.unwrap();
    assert_eq!(expense.settlement_id, Some(settlement_id));
    assert_eq!(expense.description.as_deref(), Some("Settlement: cash"));

    let after = alice_vs_bob(&engine, group_id).await;
    assert_eq!(before - after, MoneyCents::new(2_000));

    let err = engine
        .transition_settlement(group_id, settlement_id, SettlementStatus::Confirmed, "bob")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition(_)));
    assert_eq!(alice_vs_bob(&engine, group_id).await, after);

    // Completing does not add a second compensating entry.
    engine
        .transition_settlement(group_id, settlement_id, SettlementStatus::Completed, "bob")
        .await
        .unwrap();
    assert_eq!(alice_vs_bob(&engine, group_id).await, after);

    let expenses = engine.list_expenses(group_id, "alice").await.unwrap();
    assert_eq!(expenses.iter().filter(|e| e.is_settlement).count(), 1);
}

#[tokio::test]
async fn initiator_cannot_confirm_own_payment() {
    let (engine, group_id) = engine_with_group().await;
    let settlement_id = payment(&engine, group_id, 1_500).await;
    engine
        .transition_settlement(
            group_id,
            settlement_id,
            SettlementStatus::PendingConfirmation,
            "alice",
        )
        .await
        .unwrap();

    let err = engine
        .transition_settlement(group_id, settlement_id, SettlementStatus::Confirmed, "alice")
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::ForbiddenTransition(
            "only the counterparty can confirm this settlement".to_string()
        )
    );

    // Nothing changed.
    let settlements = engine.list_settlements(group_id, "alice").await.unwrap();
    assert_eq!(settlements[0].status, SettlementStatus::PendingConfirmation);
    let expenses = engine.list_expenses(group_id, "alice").await.unwrap();
    assert!(expenses.is_empty());
}

#[tokio::test]
async fn cancelled_settlement_is_final() {
    let (engine, group_id) = engine_with_group().await;
    let settlement_id = payment(&engine, group_id, 700).await;

    engine
        .transition_settlement(group_id, settlement_id, SettlementStatus::Cancelled, "alice")
        .await
        .unwrap();
    let err = engine
        .transition_settlement(
            group_id,
            settlement_id,
            SettlementStatus::PendingConfirmation,
            "alice",
        )
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::InvalidTransition("settlement is already cancelled".to_string())
    );
}

#[tokio::test]
async fn settlement_parties_must_be_financial_members() {
    let (engine, group_id) = engine_with_group().await;

    for counterparty in ["bot", "carol", "alice"] {
        let err = engine
            .create_settlement(CreateSettlementCmd::new(
                group_id,
                "alice",
                counterparty,
                MoneyCents::new(100),
                eur(),
                SettlementType::Payment,
                Utc::now(),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)), "{counterparty}");
    }

    let err = engine
        .create_settlement(
            CreateSettlementCmd::new(
                group_id,
                "alice",
                "bob",
                MoneyCents::new(100),
                eur(),
                SettlementType::Receipt,
                Utc::now(),
            )
            .status(SettlementStatus::Completed),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));
}

#[tokio::test]
async fn settlement_expenses_are_read_only() {
    let (engine, group_id) = engine_with_group().await;
    let settlement = engine
        .create_settlement(
            CreateSettlementCmd::new(
                group_id,
                "alice",
                "bob",
                MoneyCents::new(900),
                eur(),
                SettlementType::Receipt,
                Utc::now(),
            )
            .status(SettlementStatus::PendingConfirmation),
        )
        .await
        .unwrap();
    let outcome = engine
        .transition_settlement(group_id, settlement.id, SettlementStatus::Confirmed, "bob")
        .await
        .unwrap();
    let expense = outcome.compensating_expense.unwrap();
    assert_eq!(expense.paid_by, "bob");

    let err = engine
        .delete_expense(group_id, expense.id, "alice")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
}

#[tokio::test]
async fn settlements_between_finds_both_directions() {
    let (engine, group_id) = engine_with_group().await;
    engine
        .add_member(group_id, "carol", GroupRole::Guest, "alice")
        .await
        .unwrap();

    payment(&engine, group_id, 100).await;
    engine
        .create_settlement(CreateSettlementCmd::new(
            group_id,
            "bob",
            "alice",
            MoneyCents::new(200),
            eur(),
            SettlementType::Payment,
            Utc::now(),
        ))
        .await
        .unwrap();
    engine
        .create_settlement(CreateSettlementCmd::new(
            group_id,
            "carol",
            "alice",
            MoneyCents::new(300),
            eur(),
            SettlementType::Payment,
            Utc::now(),
        ))
        .await
        .unwrap();

    let between = engine
        .settlements_between(group_id, "alice", "bob", "carol")
        .await
        .unwrap();
    assert_eq!(between.len(), 2);
    assert!(between.iter().all(|s| s.involves("alice") && s.involves("bob")));
    assert_eq!(engine.list_settlements(group_id, "bob").await.unwrap().len(), 3);
}

async fn expenses_for_settlement(db: &DatabaseConnection, settlement_id: Uuid) -> i64 {
    let row = db
        .query_one(Statement::from_sql_and_values(
            DbBackend::Sqlite,
            "SELECT COUNT(*) AS n FROM expenses WHERE settlement_id = ?",
            [settlement_id.to_string().into()],
        ))
        .await
        .unwrap()
        .unwrap();
    row.try_get::<i64>("", "n").unwrap()
}

async fn awaiting_confirmation(engine: &Engine, group_id: Uuid) -> Uuid {
    let settlement_id = payment(engine, group_id, 2_000).await;
    engine
        .transition_settlement(
            group_id,
            settlement_id,
            SettlementStatus::PendingConfirmation,
            "alice",
        )
        .await
        .unwrap();
    settlement_id
}

#[tokio::test]
async fn failed_compensating_insert_rolls_back_confirmation() {
    let (engine, group_id, db) = engine_with_group_and_db().await;
    let settlement_id = awaiting_confirmation(&engine, group_id).await;

    // Occupies the one compensating slot the settlement is allowed.
    db.execute(Statement::from_sql_and_values(
        DbBackend::Sqlite,
        "INSERT INTO expenses (id, group_id, description, amount_minor, currency, \
         occurred_at, paid_by, created_by, is_settlement, settlement_id) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        [
            Uuid::new_v4().to_string().into(),
            group_id.to_string().into(),
            "stray".into(),
            2_000i64.into(),
            "EUR".into(),
            Utc::now().into(),
            "alice".into(),
            "alice".into(),
            true.into(),
            settlement_id.to_string().into(),
        ],
    ))
    .await
    .unwrap();

    let err = engine
        .transition_settlement(group_id, settlement_id, SettlementStatus::Confirmed, "bob")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Database(_)), "{err:?}");

    let settlements = engine.list_settlements(group_id, "bob").await.unwrap();
    assert_eq!(settlements[0].status, SettlementStatus::PendingConfirmation);
    assert_eq!(expenses_for_settlement(&db, settlement_id).await, 1);
}

#[tokio::test]
async fn lost_status_race_is_rejected_without_side_effects() {
    let (engine, group_id, db) = engine_with_group_and_db().await;
    let settlement_id = awaiting_confirmation(&engine, group_id).await;

    // Every status write now matches no row, as if another writer got there first.
    db.execute(Statement::from_string(
        DbBackend::Sqlite,
        "CREATE TRIGGER hold_settlement BEFORE UPDATE OF status ON settlements \
         BEGIN SELECT RAISE(IGNORE); END",
    ))
    .await
    .unwrap();

    let err = engine
        .transition_settlement(group_id, settlement_id, SettlementStatus::Confirmed, "bob")
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::InvalidTransition(
            "settlement was changed by someone else; reload it and try again".to_string()
        )
    );

    let settlements = engine.list_settlements(group_id, "bob").await.unwrap();
    assert_eq!(settlements[0].status, SettlementStatus::PendingConfirmation);
    assert_eq!(expenses_for_settlement(&db, settlement_id).await, 0);
    assert_eq!(alice_vs_bob(&engine, group_id).await, MoneyCents::ZERO);
}
