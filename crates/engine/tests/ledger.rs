use std::collections::HashMap;

use chrono::{Duration, Utc};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};

use engine::{
    CreateExpenseCmd, Engine, EngineError, ExpenseListFilter, ExpenseStatus, FinalizeExpenseCmd,
    MemberRemoval, MoneyCents, PercentShare, SplitSpec, UpdateExpenseCmd,
};
use migration::MigratorTrait;

async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let backend = db.get_database_backend();
    db.execute(Statement::from_sql_and_values(
        backend,
        "INSERT INTO users (username, password) VALUES (?, ?)",
        vec!["alice".into(), "password".into()],
    ))
    .await
    .unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    (engine, db)
}

async fn group_with_members(engine: &Engine, names: &[&str]) -> (String, Vec<String>) {
    let group_id = engine.new_group("Trip", "alice").await.unwrap();
    let mut member_ids = Vec::new();
    for name in names {
        let member = engine.add_member(&group_id, name, "alice").await.unwrap();
        member_ids.push(member.id);
    }
    (group_id, member_ids)
}

fn equal_split(member_ids: &[String]) -> SplitSpec {
    SplitSpec::Equal {
        participant_ids: member_ids.to_vec(),
    }
}

fn balances_by_member(engine_balances: &[engine::Balance]) -> HashMap<String, i64> {
    engine_balances
        .iter()
        .map(|b| (b.member_id.clone(), b.balance_cents.cents()))
        .collect()
}

#[tokio::test]
async fn group_names_are_unique_per_owner() {
    let (engine, _db) = engine_with_db().await;

    let group_id = engine.new_group("Ski Week", "alice").await.unwrap();
    let err = engine.new_group("  ski week ", "alice").await.unwrap_err();
    assert!(matches!(err, EngineError::ExistingKey(_)));

    let renamed = engine
        .rename_group(&group_id, "Ski Week 2026", "alice")
        .await
        .unwrap();
    assert_eq!(renamed.name, "Ski Week 2026");

    let groups = engine.list_groups("alice").await.unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].name, "Ski Week 2026");
}

#[tokio::test]
async fn member_names_collide_on_the_normalized_key() {
    let (engine, _db) = engine_with_db().await;
    let group_id = engine.new_group("Trip", "alice").await.unwrap();

    engine.add_member(&group_id, "José", "alice").await.unwrap();
    let err = engine
        .add_member(&group_id, " jose ", "alice")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ExistingKey(_)));

    // The display name keeps its original spelling.
    let (_, members) = engine.group_snapshot(&group_id, "alice").await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].name, "José");
}

#[tokio::test]
async fn removal_deactivates_members_with_history_and_deletes_the_rest() {
    let (engine, _db) = engine_with_db().await;
    let (group_id, member_ids) = group_with_members(&engine, &["Ana", "Ben"]).await;

    engine
        .create_expense(
            CreateExpenseCmd::new(&group_id, "alice", &member_ids[0], equal_split(&member_ids[..1]))
                .amount(MoneyCents::new(500)),
        )
        .await
        .unwrap();

    let removal = engine
        .remove_member(&group_id, &member_ids[0], "alice")
        .await
        .unwrap();
    let MemberRemoval::Deactivated(member) = removal else {
        panic!("payer with history must be deactivated, not deleted");
    };
    assert!(!member.active);

    let removal = engine
        .remove_member(&group_id, &member_ids[1], "alice")
        .await
        .unwrap();
    assert_eq!(
        removal,
        MemberRemoval::Deleted {
            member_id: member_ids[1].clone()
        }
    );

    // The deactivated member still shows up in snapshots and balances.
    let (_, members) = engine.group_snapshot(&group_id, "alice").await.unwrap();
    assert_eq!(members.len(), 1);
    assert!(!members[0].active);

    let (balances, _) = engine.group_balances(&group_id, "alice").await.unwrap();
    assert_eq!(balances.len(), 1);
    assert_eq!(balances[0].member_id, member_ids[0]);
}

#[tokio::test]
async fn drafts_join_balances_only_once_finalized() {
    let (engine, _db) = engine_with_db().await;
    let (group_id, member_ids) = group_with_members(&engine, &["Ana", "Ben"]).await;

    let draft = engine
        .create_expense(CreateExpenseCmd::new(
            &group_id,
            "alice",
            &member_ids[0],
            equal_split(&member_ids),
        ))
        .await
        .unwrap();
    assert!(!draft.state.is_final());
    assert_eq!(draft.version, 1);

    let (balances, transfers) = engine.group_balances(&group_id, "alice").await.unwrap();
    assert!(balances.iter().all(|b| b.balance_cents.cents() == 0));
    assert!(transfers.is_empty());

    let committed = engine
        .finalize_expense(
            FinalizeExpenseCmd::new(&group_id, &draft.id, "alice", Some(1))
                .amount(MoneyCents::new(1000)),
        )
        .await
        .unwrap();
    assert!(committed.state.is_final());
    assert_eq!(committed.version, 2);

    let (balances, transfers) = engine.group_balances(&group_id, "alice").await.unwrap();
    let by_member = balances_by_member(&balances);
    assert_eq!(by_member[&member_ids[0]], 500);
    assert_eq!(by_member[&member_ids[1]], -500);
    assert_eq!(transfers.len(), 1);
    assert_eq!(transfers[0].from_member_id, member_ids[1]);
    assert_eq!(transfers[0].to_member_id, member_ids[0]);
    assert_eq!(transfers[0].cents.cents(), 500);
}

#[tokio::test]
async fn balances_net_across_expenses_and_settle_to_zero() {
    let (engine, _db) = engine_with_db().await;
    let (group_id, member_ids) = group_with_members(&engine, &["Ana", "Ben", "Cleo"]).await;
    let (ana, ben, cleo) = (&member_ids[0], &member_ids[1], &member_ids[2]);

    engine
        .create_expense(
            CreateExpenseCmd::new(&group_id, "alice", ana, equal_split(&member_ids))
                .amount(MoneyCents::new(900)),
        )
        .await
        .unwrap();
    engine
        .create_expense(
            CreateExpenseCmd::new(
                &group_id,
                "alice",
                ben,
                equal_split(&[ben.clone(), cleo.clone()]),
            )
            .amount(MoneyCents::new(300)),
        )
        .await
        .unwrap();

    let (balances, transfers) = engine.group_balances(&group_id, "alice").await.unwrap();
    let by_member = balances_by_member(&balances);
    assert_eq!(by_member[ana], 600);
    assert_eq!(by_member[ben], -150);
    assert_eq!(by_member[cleo], -450);

    // Replaying the plan clears every balance.
    let mut remaining = by_member;
    for transfer in &transfers {
        *remaining.get_mut(&transfer.from_member_id).unwrap() += transfer.cents.cents();
        *remaining.get_mut(&transfer.to_member_id).unwrap() -= transfer.cents.cents();
        assert!(transfer.cents.cents() > 0);
        assert_eq!(transfer.to_member_id, *ana);
    }
    assert!(remaining.values().all(|cents| *cents == 0));
}

#[tokio::test]
async fn percent_splits_allocate_the_remainder_deterministically() {
    let (engine, _db) = engine_with_db().await;
    let (group_id, member_ids) = group_with_members(&engine, &["Ana", "Ben"]).await;
    let (ana, ben) = (&member_ids[0], &member_ids[1]);

    engine
        .create_expense(
            CreateExpenseCmd::new(
                &group_id,
                "alice",
                ana,
                SplitSpec::Percent {
                    shares: vec![
                        PercentShare {
                            member_id: ana.clone(),
                            percent: 33.33,
                        },
                        PercentShare {
                            member_id: ben.clone(),
                            percent: 66.67,
                        },
                    ],
                },
            )
            .amount(MoneyCents::new(1000)),
        )
        .await
        .unwrap();

    // 333 + 667 = 1000; the bigger remainder takes the leftover cent.
    let (balances, _) = engine.group_balances(&group_id, "alice").await.unwrap();
    let by_member = balances_by_member(&balances);
    assert_eq!(by_member[ana], 667);
    assert_eq!(by_member[ben], -667);
}

#[tokio::test]
async fn concurrent_updates_conflict_on_the_stored_version() {
    let (engine, _db) = engine_with_db().await;
    let (group_id, member_ids) = group_with_members(&engine, &["Ana", "Ben"]).await;

    let expense = engine
        .create_expense(
            CreateExpenseCmd::new(&group_id, "alice", &member_ids[0], equal_split(&member_ids))
                .amount(MoneyCents::new(800)),
        )
        .await
        .unwrap();
    assert_eq!(expense.version, 1);

    // Two writers read version 1; only the first one lands.
    let updated = engine
        .update_expense(
            UpdateExpenseCmd::new(&group_id, &expense.id, "alice", Some(1)).note("taxi"),
        )
        .await
        .unwrap();
    assert_eq!(updated.version, 2);

    let err = engine
        .update_expense(
            UpdateExpenseCmd::new(&group_id, &expense.id, "alice", Some(1)).note("tram"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::VersionConflict(_)));

    let err = engine
        .update_expense(UpdateExpenseCmd::new(&group_id, &expense.id, "alice", None).note("bus"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::InvalidInput("version is required for update".to_string())
    );

    let err = engine
        .finalize_expense(FinalizeExpenseCmd::new(&group_id, &expense.id, "alice", Some(1)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::VersionConflict(_)));
}

#[tokio::test]
async fn note_updates_set_and_clear() {
    let (engine, _db) = engine_with_db().await;
    let (group_id, member_ids) = group_with_members(&engine, &["Ana"]).await;

    let expense = engine
        .create_expense(
            CreateExpenseCmd::new(&group_id, "alice", &member_ids[0], equal_split(&member_ids))
                .amount(MoneyCents::new(400))
                .note("  dinner  "),
        )
        .await
        .unwrap();
    assert_eq!(expense.note.as_deref(), Some("dinner"));

    let cleared = engine
        .update_expense(
            UpdateExpenseCmd::new(&group_id, &expense.id, "alice", Some(1)).note("   "),
        )
        .await
        .unwrap();
    assert_eq!(cleared.note, None);
}

#[tokio::test]
async fn expenses_page_newest_first_without_overlap() {
    let (engine, _db) = engine_with_db().await;
    let (group_id, member_ids) = group_with_members(&engine, &["Ana"]).await;
    let base = Utc::now();

    for day in 0..5 {
        engine
            .create_expense(
                CreateExpenseCmd::new(
                    &group_id,
                    "alice",
                    &member_ids[0],
                    equal_split(&member_ids),
                )
                .amount(MoneyCents::new(100 + day))
                .occurred_at(base + Duration::days(day)),
            )
            .await
            .unwrap();
    }

    let filter = ExpenseListFilter::default();
    let mut seen = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let (page, next) = engine
            .list_expenses(&group_id, "alice", 2, cursor.as_deref(), &filter)
            .await
            .unwrap();
        assert!(page.len() <= 2);
        for expense in &page {
            seen.push((expense.occurred_at, expense.id.clone()));
        }
        match next {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    assert_eq!(seen.len(), 5);
    let mut sorted = seen.clone();
    sorted.sort_by(|a, b| b.cmp(a));
    assert_eq!(seen, sorted, "pages must run newest to older");
    let unique: std::collections::BTreeSet<_> = seen.iter().map(|(_, id)| id.clone()).collect();
    assert_eq!(unique.len(), 5, "pages must not overlap");

    let err = engine
        .list_expenses(&group_id, "alice", 2, Some("not-a-cursor"), &filter)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidCursor(_)));

    let bad_range = ExpenseListFilter::default()
        .from(base + Duration::days(3))
        .to(base);
    let err = engine
        .list_expenses(&group_id, "alice", 2, None, &bad_range)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));
}

#[tokio::test]
async fn status_and_time_filters_narrow_the_list() {
    let (engine, _db) = engine_with_db().await;
    let (group_id, member_ids) = group_with_members(&engine, &["Ana"]).await;
    let base = Utc::now();

    engine
        .create_expense(
            CreateExpenseCmd::new(&group_id, "alice", &member_ids[0], equal_split(&member_ids))
                .amount(MoneyCents::new(100))
                .occurred_at(base),
        )
        .await
        .unwrap();
    engine
        .create_expense(
            CreateExpenseCmd::new(&group_id, "alice", &member_ids[0], equal_split(&member_ids))
                .occurred_at(base + Duration::days(1)),
        )
        .await
        .unwrap();

    let drafts = ExpenseListFilter::default().status(ExpenseStatus::Draft);
    let (page, _) = engine
        .list_expenses(&group_id, "alice", 10, None, &drafts)
        .await
        .unwrap();
    assert_eq!(page.len(), 1);
    assert!(!page[0].state.is_final());

    // `from` is inclusive, `to` exclusive.
    let window = ExpenseListFilter::default()
        .from(base)
        .to(base + Duration::days(1));
    let (page, _) = engine
        .list_expenses(&group_id, "alice", 10, None, &window)
        .await
        .unwrap();
    assert_eq!(page.len(), 1);
    assert!(page[0].state.is_final());
}

#[tokio::test]
async fn participants_must_belong_to_the_group() {
    let (engine, _db) = engine_with_db().await;
    let (group_id, member_ids) = group_with_members(&engine, &["Ana"]).await;

    let other_group = engine.new_group("Other", "alice").await.unwrap();
    let outsider = engine
        .add_member(&other_group, "Zoe", "alice")
        .await
        .unwrap();

    let err = engine
        .create_expense(
            CreateExpenseCmd::new(
                &group_id,
                "alice",
                &member_ids[0],
                equal_split(&[member_ids[0].clone(), outsider.id.clone()]),
            )
            .amount(MoneyCents::new(200)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::UnknownMember(_)));

    let err = engine
        .create_expense(
            CreateExpenseCmd::new(&group_id, "alice", &outsider.id, equal_split(&member_ids))
                .amount(MoneyCents::new(200)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::UnknownMember(_)));
}

#[tokio::test]
async fn deleting_a_group_cascades_to_expense_rows() {
    let (engine, db) = engine_with_db().await;
    let (group_id, member_ids) = group_with_members(&engine, &["Ana", "Ben"]).await;
    engine
        .create_expense(
            CreateExpenseCmd::new(&group_id, "alice", &member_ids[0], equal_split(&member_ids))
                .amount(MoneyCents::new(700)),
        )
        .await
        .unwrap();

    engine.delete_group(&group_id, "alice").await.unwrap();

    assert!(engine.list_groups("alice").await.unwrap().is_empty());
    let err = engine.group_snapshot(&group_id, "alice").await.unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));

    let backend = db.get_database_backend();
    for table in ["expenses", "expense_participants", "members"] {
        let row = db
            .query_one(Statement::from_string(
                backend,
                format!("SELECT COUNT(*) AS n FROM {table}"),
            ))
            .await
            .unwrap()
            .unwrap();
        let count: i64 = row.try_get("", "n").unwrap();
        assert_eq!(count, 0, "{table} must be empty after group deletion");
    }
}

#[tokio::test]
async fn expenses_are_invisible_to_other_users() {
    let (engine, db) = engine_with_db().await;
    let backend = db.get_database_backend();
    db.execute(Statement::from_sql_and_values(
        backend,
        "INSERT INTO users (username, password) VALUES (?, ?)",
        vec!["mallory".into(), "password".into()],
    ))
    .await
    .unwrap();

    let (group_id, member_ids) = group_with_members(&engine, &["Ana"]).await;
    let expense = engine
        .create_expense(
            CreateExpenseCmd::new(&group_id, "alice", &member_ids[0], equal_split(&member_ids))
                .amount(MoneyCents::new(100)),
        )
        .await
        .unwrap();

    let err = engine
        .list_expenses(
            &group_id,
            "mallory",
            10,
            None,
            &ExpenseListFilter::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));

    let err = engine
        .delete_expense(&group_id, &expense.id, "mallory")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));
}
