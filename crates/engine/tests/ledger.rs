use chrono::{Duration, TimeZone, Utc};
use sea_orm::Database;

use engine::{
    CreateExpenseCmd, Currency, Engine, EngineError, GroupRole, MoneyCents, ShareType,
    SplitRule, UpdateExpenseCmd,
};
use migration::MigratorTrait;
use uuid::Uuid;

async fn engine_with_users(users: &[&str]) -> Engine {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder().database(db).build().await.unwrap();
    for user in users {
        engine.create_user(user, &user.to_uppercase()).await.unwrap();
    }
    engine
}

fn eur() -> Currency {
    Currency::try_from("EUR").unwrap()
}

/// Group owned by alice with bob as member and a bot assistant.
async fn group_with_bot(engine: &Engine) -> Uuid {
    let group = engine.create_group("Trip", eur(), "alice").await.unwrap();
    engine
        .add_member(group.id, "bob", GroupRole::Member, "alice")
        .await
        .unwrap();
    engine
        .add_member(group.id, "bot", GroupRole::Assistant, "alice")
        .await
        .unwrap();
    group.id
}

#[tokio::test]
async fn duplicate_user_is_rejected() {
    let engine = engine_with_users(&["alice"]).await;
    let err = engine.create_user("alice", "Again").await.unwrap_err();
    assert!(matches!(err, EngineError::ExistingKey(_)));
}

#[tokio::test]
async fn creator_is_the_only_admin() {
    let engine = engine_with_users(&["alice", "bob"]).await;
    let group = engine.create_group("Flat", eur(), "alice").await.unwrap();
    assert_eq!(group.members.len(), 1);
    assert_eq!(group.members[0].role, GroupRole::Admin);

    let err = engine
        .add_member(group.id, "bob", GroupRole::Admin, "alice")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));

    let groups = engine.list_groups("alice").await.unwrap();
    assert_eq!(groups.len(), 1);
    assert!(engine.list_groups("bob").await.unwrap().is_empty());
}

#[tokio::test]
async fn admin_cannot_leave_or_be_removed() {
    let engine = engine_with_users(&["alice", "bob"]).await;
    let group = engine.create_group("Flat", eur(), "alice").await.unwrap();
    engine
        .add_member(group.id, "bob", GroupRole::Member, "alice")
        .await
        .unwrap();

    let err = engine.leave_group(group.id, "alice").await.unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
    let err = engine
        .remove_member(group.id, "alice", "alice")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    // Only the admin manages members.
    let err = engine
        .remove_member(group.id, "alice", "bob")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    engine.transfer_admin(group.id, "bob", "alice").await.unwrap();
    engine.leave_group(group.id, "alice").await.unwrap();

    let members = engine.list_members(group.id, "bob").await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].user_id, "bob");
    assert_eq!(members[0].role, GroupRole::Admin);
}

#[tokio::test]
async fn admin_role_cannot_be_changed_directly() {
    let engine = engine_with_users(&["alice", "bob"]).await;
    let group = engine.create_group("Flat", eur(), "alice").await.unwrap();
    engine
        .add_member(group.id, "bob", GroupRole::Guest, "alice")
        .await
        .unwrap();

    let err = engine
        .update_member_role(group.id, "alice", GroupRole::Member, "alice")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    let member = engine
        .update_member_role(group.id, "bob", GroupRole::Member, "alice")
        .await
        .unwrap();
    assert_eq!(member.role, GroupRole::Member);
}

#[tokio::test]
async fn non_member_is_forbidden() {
    let engine = engine_with_users(&["alice", "bob", "bot", "mallory"]).await;
    let group_id = group_with_bot(&engine).await;

    let err = engine.group_balances(group_id, "mallory").await.unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
    let err = engine.list_expenses(group_id, "mallory").await.unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    let err = engine
        .group_balances(Uuid::new_v4(), "alice")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));
}

#[tokio::test]
async fn default_participants_skip_assistants() {
    let engine = engine_with_users(&["alice", "bob", "bot"]).await;
    let group_id = group_with_bot(&engine).await;

    let expense = engine
        .create_expense(
            CreateExpenseCmd::new(group_id, "alice", MoneyCents::new(1_000), eur(), Utc::now())
                .description("Dinner"),
        )
        .await
        .unwrap();
    assert_eq!(expense.shares.len(), 2);
    assert!(expense.shares.iter().all(|s| s.user_id != "bot"));
    assert_eq!(expense.share_total().unwrap(), MoneyCents::new(1_000));

    let balances = engine.group_balances(group_id, "alice").await.unwrap();
    assert_eq!(balances.len(), 1);
    assert_eq!(balances[0].balance_with("bob"), MoneyCents::new(500));
    assert!(balances[0].balances.iter().all(|b| b.user_id != "bot"));
}

#[tokio::test]
async fn assistant_cannot_pay_or_participate() {
    let engine = engine_with_users(&["alice", "bob", "bot"]).await;
    let group_id = group_with_bot(&engine).await;

    let err = engine
        .create_expense(
            CreateExpenseCmd::new(group_id, "alice", MoneyCents::new(1_000), eur(), Utc::now())
                .paid_by("bot"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));

    let err = engine
        .create_expense(
            CreateExpenseCmd::new(group_id, "alice", MoneyCents::new(1_000), eur(), Utc::now())
                .participants(["alice", "bot"]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));
}

#[tokio::test]
async fn currencies_are_kept_apart() {
    let engine = engine_with_users(&["alice", "bob", "bot"]).await;
    let group_id = group_with_bot(&engine).await;
    let usd = Currency::try_from("USD").unwrap();

    engine
        .create_expense(CreateExpenseCmd::new(
            group_id,
            "alice",
            MoneyCents::new(10_000),
            eur(),
            Utc::now(),
        ))
        .await
        .unwrap();
    engine
        .create_expense(CreateExpenseCmd::new(
            group_id,
            "bob",
            MoneyCents::new(5_000),
            usd,
            Utc::now(),
        ))
        .await
        .unwrap();

    let balances = engine.group_balances(group_id, "alice").await.unwrap();
    assert_eq!(balances.len(), 2);
    assert_eq!(balances[0].currency, eur());
    assert_eq!(balances[0].balance_with("bob"), MoneyCents::new(5_000));
    assert_eq!(balances[1].currency, usd);
    assert_eq!(balances[1].balance_with("bob"), MoneyCents::new(-2_500));

    let from_bob = engine.group_balances(group_id, "bob").await.unwrap();
    assert_eq!(from_bob[0].balance_with("alice"), MoneyCents::new(-5_000));
    assert_eq!(from_bob[1].balance_with("alice"), MoneyCents::new(2_500));
}

#[tokio::test]
async fn new_group_has_zero_balances_in_base_currency() {
    let engine = engine_with_users(&["alice", "bob", "bot"]).await;
    let group_id = group_with_bot(&engine).await;

    let balances = engine.group_balances(group_id, "alice").await.unwrap();
    assert_eq!(balances.len(), 1);
    assert_eq!(balances[0].currency, eur());
    assert_eq!(balances[0].net_balance, MoneyCents::ZERO);
    assert_eq!(balances[0].balances.len(), 1);
}

#[tokio::test]
async fn update_reallocates_and_checks_permissions() {
    let engine = engine_with_users(&["alice", "bob", "carol"]).await;
    let group = engine.create_group("Flat", eur(), "alice").await.unwrap();
    for user in ["bob", "carol"] {
        engine
            .add_member(group.id, user, GroupRole::Member, "alice")
            .await
            .unwrap();
    }

    let at = Utc.with_ymd_and_hms(2026, 3, 1, 20, 0, 0).unwrap();
    let expense = engine
        .create_expense(
            CreateExpenseCmd::new(group.id, "bob", MoneyCents::new(900), eur(), at)
                .participants(["bob", "carol"]),
        )
        .await
        .unwrap();

    // carol neither paid nor created it and is not the admin.
    let err = engine
        .update_expense(
            UpdateExpenseCmd::new(group.id, expense.id, "carol").amount(MoneyCents::new(100)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    let updated = engine
        .update_expense(
            UpdateExpenseCmd::new(group.id, expense.id, "alice")
                .amount(MoneyCents::new(1_000))
                .split(SplitRule::AssignAll("carol".to_string())),
        )
        .await
        .unwrap();
    assert_eq!(updated.amount, MoneyCents::new(1_000));
    let carol = updated.shares.iter().find(|s| s.user_id == "carol").unwrap();
    assert_eq!(carol.amount, MoneyCents::new(1_000));
    assert_eq!(carol.share_type, ShareType::Fixed);

    let listed = engine.list_expenses(group.id, "bob").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0], updated);

    engine
        .delete_expense(group.id, expense.id, "bob")
        .await
        .unwrap();
    assert!(engine.list_expenses(group.id, "bob").await.unwrap().is_empty());
}

#[tokio::test]
async fn expense_pages_walk_newest_first() {
    let engine = engine_with_users(&["alice", "bob", "bot"]).await;
    let group_id = group_with_bot(&engine).await;
    let start = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();

    for day in 0..5 {
        engine
            .create_expense(CreateExpenseCmd::new(
                group_id,
                "alice",
                MoneyCents::new(100 + day),
                eur(),
                start + Duration::days(day),
            ))
            .await
            .unwrap();
    }

    let (first, cursor) = engine
        .list_expenses_page(group_id, "bob", 2, None)
        .await
        .unwrap();
    assert_eq!(
        first.iter().map(|e| e.amount.cents()).collect::<Vec<_>>(),
        vec![104, 103]
    );
    let cursor = cursor.unwrap();

    let (second, cursor) = engine
        .list_expenses_page(group_id, "bob", 2, Some(&cursor))
        .await
        .unwrap();
    assert_eq!(
        second.iter().map(|e| e.amount.cents()).collect::<Vec<_>>(),
        vec![102, 101]
    );

    let (last, cursor) = engine
        .list_expenses_page(group_id, "bob", 2, cursor.as_deref())
        .await
        .unwrap();
    assert_eq!(last.len(), 1);
    assert!(cursor.is_none());

    let err = engine
        .list_expenses_page(group_id, "bob", 2, Some("not-a-cursor"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));
}

#[tokio::test]
async fn user_balances_merge_groups() {
    let engine = engine_with_users(&["alice", "bob"]).await;
    let mut groups = Vec::new();
    for name in ["Flat", "Trip"] {
        let group = engine.create_group(name, eur(), "alice").await.unwrap();
        engine
            .add_member(group.id, "bob", GroupRole::Member, "alice")
            .await
            .unwrap();
        groups.push(group.id);
    }

    engine
        .create_expense(CreateExpenseCmd::new(
            groups[0],
            "alice",
            MoneyCents::new(2_000),
            eur(),
            Utc::now(),
        ))
        .await
        .unwrap();
    engine
        .create_expense(
            CreateExpenseCmd::new(groups[1], "bob", MoneyCents::new(600), eur(), Utc::now())
                .split(SplitRule::AssignAll("alice".to_string())),
        )
        .await
        .unwrap();

    let merged = engine.user_balances("alice").await.unwrap();
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].balance_with("bob"), MoneyCents::new(400));
    assert_eq!(merged[0].net_balance, MoneyCents::new(400));
}
