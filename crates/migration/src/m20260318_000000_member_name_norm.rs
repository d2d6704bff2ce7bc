//! Adds the normalized member-name key used for duplicate detection.
//!
//! `members.name_norm` stores the name after NFKD decomposition, accent
//! stripping, lowercasing and whitespace collapsing, so "José " and "jose"
//! land on the same key. Existing rows are backfilled and the key becomes
//! unique per group.

use std::collections::HashSet;

use sea_orm::{ConnectionTrait, Statement};
use sea_orm_migration::prelude::*;
use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum Members {
    Table,
    GroupId,
    NameNorm,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .alter_table(
                Table::alter()
                    .table(Members::Table)
                    .add_column(
                        ColumnDef::new(Members::NameNorm)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .to_owned(),
            )
            .await?;

        backfill_name_norm(manager).await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-members-group_id-name_norm-unique")
                    .table(Members::Table)
                    .col(Members::GroupId)
                    .col(Members::NameNorm)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx-members-group_id-name_norm-unique")
                    .table(Members::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .alter_table(
                Table::alter()
                    .table(Members::Table)
                    .drop_column(Members::NameNorm)
                    .to_owned(),
            )
            .await?;
        Ok(())
    }
}

async fn backfill_name_norm(manager: &SchemaManager<'_>) -> Result<(), DbErr> {
    let db = manager.get_connection();
    let backend = db.get_database_backend();

    let rows = db
        .query_all(Statement::from_string(
            backend,
            "SELECT id, group_id, name FROM members;",
        ))
        .await?;

    // Names that collide after normalization predate the uniqueness rule.
    // The first row keeps the plain key; later ones get the member id
    // appended so the unique index can still be built.
    let mut used: HashSet<(String, String)> = HashSet::new();
    for row in rows {
        let id: String = row.try_get("", "id")?;
        let group_id: String = row.try_get("", "group_id")?;
        let name: String = row.try_get("", "name")?;

        let mut key = normalize_key(&name);
        if key.is_empty() || !used.insert((group_id.clone(), key.clone())) {
            key = format!("{key}:{id}");
        }

        db.execute(Statement::from_sql_and_values(
            backend,
            "UPDATE members SET name_norm = ? WHERE id = ?;",
            vec![key.into(), id.into()],
        ))
        .await?;
    }

    Ok(())
}

// Mirrors the engine's member-key normalization at the time this migration
// shipped; the copy stays frozen even if the engine's rule evolves.
fn normalize_key(input: &str) -> String {
    let decomposed: String = input
        .trim()
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect();
    let lowered = decomposed.to_lowercase();

    let mut key = String::with_capacity(lowered.len());
    let mut last_was_space = false;
    for ch in lowered.chars() {
        if ch.is_whitespace() {
            if !last_was_space && !key.is_empty() {
                key.push(' ');
            }
            last_was_space = true;
        } else {
            key.push(ch);
            last_was_space = false;
        }
    }
    key.trim_end().to_string()
}
