use chrono::Utc;
use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, Statement, TransactionTrait,
    prelude::*, sea_query::Expr,
};

use crate::{EngineError, Group, Member, ResultEngine, groups, members};

use super::{Engine, normalize_required_name, with_tx};

impl Engine {
    /// Add a new group owned by `user_id`.
    pub async fn new_group(&self, name: &str, user_id: &str) -> ResultEngine<String> {
        let name = normalize_required_name(name, "group")?;

        let new_group = Group::new(name.clone(), user_id, Utc::now());
        let new_group_id = new_group.id.clone();
        let group_entry: groups::ActiveModel = (&new_group).into();
        with_tx!(self, |db_tx| {
            // Enforce unique group names per owner (case-insensitive) to avoid
            // ambiguous name lookups.
            let exists = groups::Entity::find()
                .filter(groups::Column::OwnerId.eq(user_id.to_string()))
                .filter(Expr::cust("LOWER(name)").eq(name.to_lowercase()))
                .one(&db_tx)
                .await?
                .is_some();
            if exists {
                return Err(EngineError::ExistingKey(name));
            }

            group_entry.insert(&db_tx).await?;
            Ok(new_group_id)
        })
    }

    /// Rename a group, refreshing its update timestamp.
    pub async fn rename_group(
        &self,
        group_id: &str,
        name: &str,
        user_id: &str,
    ) -> ResultEngine<Group> {
        let name = normalize_required_name(name, "group")?;

        with_tx!(self, |db_tx| {
            let model = self.require_group(&db_tx, group_id, user_id).await?;

            let clash = groups::Entity::find()
                .filter(groups::Column::OwnerId.eq(user_id.to_string()))
                .filter(Expr::cust("LOWER(name)").eq(name.to_lowercase()))
                .filter(groups::Column::Id.ne(model.id.clone()))
                .one(&db_tx)
                .await?
                .is_some();
            if clash {
                return Err(EngineError::ExistingKey(name));
            }

            let mut group = Group::from(model);
            group.rename(name, Utc::now());

            let entry = groups::ActiveModel {
                id: ActiveValue::Set(group.id.clone()),
                name: ActiveValue::Set(group.name.clone()),
                updated_at: ActiveValue::Set(group.updated_at),
                ..Default::default()
            };
            entry.update(&db_tx).await?;
            Ok(group)
        })
    }

    /// Return a group with its members (active and inactive), members
    /// ordered by name.
    pub async fn group_snapshot(
        &self,
        group_id: &str,
        user_id: &str,
    ) -> ResultEngine<(Group, Vec<Member>)> {
        with_tx!(self, |db_tx| {
            let model = self.require_group(&db_tx, group_id, user_id).await?;

            let member_models = members::Entity::find()
                .filter(members::Column::GroupId.eq(model.id.clone()))
                .order_by_asc(members::Column::Name)
                .all(&db_tx)
                .await?;

            Ok((
                Group::from(model),
                member_models.into_iter().map(Member::from).collect(),
            ))
        })
    }

    /// List the caller's groups, ordered by name.
    pub async fn list_groups(&self, user_id: &str) -> ResultEngine<Vec<Group>> {
        let models = groups::Entity::find()
            .filter(groups::Column::OwnerId.eq(user_id.to_string()))
            .order_by_asc(groups::Column::Name)
            .all(&self.database)
            .await?;
        Ok(models.into_iter().map(Group::from).collect())
    }

    /// Delete a group and everything under it.
    pub async fn delete_group(&self, group_id: &str, user_id: &str) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let model = self.require_group(&db_tx, group_id, user_id).await?;
            let group_db_id = model.id;

            // Explicit cascade within one DB transaction; the FKs do not
            // declare ON DELETE CASCADE.
            let backend = self.database.get_database_backend();

            db_tx
                .execute(Statement::from_sql_and_values(
                    backend,
                    "DELETE FROM expense_participants WHERE expense_id IN \
                     (SELECT id FROM expenses WHERE group_id = ?);",
                    vec![group_db_id.clone().into()],
                ))
                .await?;
            db_tx
                .execute(Statement::from_sql_and_values(
                    backend,
                    "DELETE FROM expenses WHERE group_id = ?;",
                    vec![group_db_id.clone().into()],
                ))
                .await?;
            db_tx
                .execute(Statement::from_sql_and_values(
                    backend,
                    "DELETE FROM members WHERE group_id = ?;",
                    vec![group_db_id.clone().into()],
                ))
                .await?;
            db_tx
                .execute(Statement::from_sql_and_values(
                    backend,
                    "DELETE FROM groups WHERE id = ?;",
                    vec![group_db_id.into()],
                ))
                .await?;

            Ok(())
        })
    }

    /// Load a group by id, failing with `KeyNotFound` when it does not exist
    /// or belongs to somebody else. Not owning a group and the group not
    /// existing are indistinguishable to the caller.
    pub(super) async fn require_group(
        &self,
        db: &DatabaseTransaction,
        group_id: &str,
        user_id: &str,
    ) -> ResultEngine<groups::Model> {
        let model = groups::Entity::find_by_id(group_id.to_string())
            .one(db)
            .await?;
        match model {
            Some(model) if model.owner_id == user_id => Ok(model),
            _ => Err(EngineError::KeyNotFound("group not exists".to_string())),
        }
    }
}
