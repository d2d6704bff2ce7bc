use std::collections::{BTreeSet, HashMap};

use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sea_orm::{
    ActiveValue, Condition, DatabaseTransaction, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait, prelude::*,
};

use crate::{
    CreateExpenseCmd, EngineError, Expense, ExpenseListFilter, ExpensePatch, ExpenseState,
    FinalizeExpenseCmd, MoneyCents, ResultEngine, UpdateExpenseCmd, expenses, participants,
};

use super::{Engine, normalize_optional_text, with_tx};

fn validate_list_filter(filter: &ExpenseListFilter) -> ResultEngine<()> {
    if let (Some(from), Some(to)) = (filter.from, filter.to)
        && from >= to
    {
        return Err(EngineError::InvalidInput(
            "invalid range: from must be < to".to_string(),
        ));
    }
    Ok(())
}

fn ensure_group_members(known: &BTreeSet<String>, expense: &Expense) -> ResultEngine<()> {
    let mut candidates = vec![expense.payer_member_id.as_str()];
    candidates.extend(expense.split.participant_ids());
    for member_id in candidates {
        if !known.contains(member_id) {
            return Err(EngineError::UnknownMember(format!(
                "member {member_id} does not belong to the group"
            )));
        }
    }
    Ok(())
}

trait ApplyExpenseFilters: QueryFilter + Sized {
    fn apply_expense_filters(self, filter: &ExpenseListFilter) -> Self;
}

impl<T> ApplyExpenseFilters for T
where
    T: QueryFilter + Sized,
{
    fn apply_expense_filters(mut self, filter: &ExpenseListFilter) -> Self {
        if let Some(from) = filter.from {
            self = self.filter(expenses::Column::OccurredAt.gte(from));
        }
        if let Some(to) = filter.to {
            self = self.filter(expenses::Column::OccurredAt.lt(to));
        }
        if let Some(status) = filter.status {
            self = self.filter(expenses::Column::Status.eq(status.as_str()));
        }
        self
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct ExpensesCursor {
    occurred_at: DateTime<Utc>,
    expense_id: String,
}

impl ExpensesCursor {
    fn encode(&self) -> ResultEngine<String> {
        let bytes = serde_json::to_vec(self)
            .map_err(|_| EngineError::InvalidCursor("invalid expenses cursor".to_string()))?;
        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }

    fn decode(input: &str) -> ResultEngine<Self> {
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(input.as_bytes())
            .map_err(|_| EngineError::InvalidCursor("invalid expenses cursor".to_string()))?;
        serde_json::from_slice::<Self>(&bytes)
            .map_err(|_| EngineError::InvalidCursor("invalid expenses cursor".to_string()))
    }
}

impl Engine {
    /// Record an expense.
    ///
    /// With an amount the expense is committed as `final` right away;
    /// without one it stays a `draft` until [`Engine::finalize_expense`].
    pub async fn create_expense(&self, cmd: CreateExpenseCmd) -> ResultEngine<Expense> {
        with_tx!(self, |db_tx| {
            self.require_group(&db_tx, &cmd.group_id, &cmd.user_id)
                .await?;

            let now = Utc::now();
            let state = match cmd.amount_cents {
                Some(amount_cents) => ExpenseState::Final { amount_cents },
                None => ExpenseState::Draft { amount_cents: None },
            };
            let expense = Expense::new(
                cmd.group_id.clone(),
                cmd.payer_member_id,
                state,
                cmd.split,
                normalize_optional_text(cmd.note.as_deref()),
                cmd.occurred_at.unwrap_or(now),
                now,
            )?;

            let known = self.group_member_ids(&db_tx, &cmd.group_id).await?;
            ensure_group_members(&known, &expense)?;

            expenses::ActiveModel::from(&expense).insert(&db_tx).await?;
            participants::Entity::insert_many(expense.participant_models()?)
                .exec(&db_tx)
                .await?;

            Ok(expense)
        })
    }

    /// Patch an expense under the version guard.
    ///
    /// The supplied version must match the stored one; the check re-runs
    /// inside the UPDATE so two writers racing past the in-memory check
    /// cannot both land.
    pub async fn update_expense(&self, cmd: UpdateExpenseCmd) -> ResultEngine<Expense> {
        with_tx!(self, |db_tx| {
            self.require_group(&db_tx, &cmd.group_id, &cmd.user_id)
                .await?;

            let stored = self
                .load_expense(&db_tx, &cmd.group_id, &cmd.expense_id)
                .await?;
            let observed_version = stored.version;

            let patch = ExpensePatch {
                payer_member_id: cmd.payer_member_id,
                split: cmd.split,
                amount_cents: cmd.amount_cents,
                note: cmd.note.map(|note| normalize_optional_text(Some(&note))),
                occurred_at: cmd.occurred_at,
            };
            let updated = stored.guarded_apply(cmd.version, patch, Utc::now())?;

            let known = self.group_member_ids(&db_tx, &cmd.group_id).await?;
            ensure_group_members(&known, &updated)?;

            self.persist_guarded(&db_tx, &updated, observed_version)
                .await?;

            participants::Entity::delete_many()
                .filter(participants::Column::ExpenseId.eq(updated.id.clone()))
                .exec(&db_tx)
                .await?;
            participants::Entity::insert_many(updated.participant_models()?)
                .exec(&db_tx)
                .await?;

            Ok(updated)
        })
    }

    /// Commit a draft as `final` under the version guard. The transition is
    /// one-way.
    pub async fn finalize_expense(&self, cmd: FinalizeExpenseCmd) -> ResultEngine<Expense> {
        with_tx!(self, |db_tx| {
            self.require_group(&db_tx, &cmd.group_id, &cmd.user_id)
                .await?;

            let stored = self
                .load_expense(&db_tx, &cmd.group_id, &cmd.expense_id)
                .await?;
            let observed_version = stored.version;

            let committed = stored.finalized(cmd.version, cmd.amount_cents, Utc::now())?;
            self.persist_guarded(&db_tx, &committed, observed_version)
                .await?;

            Ok(committed)
        })
    }

    /// Delete an expense and its participant rows.
    pub async fn delete_expense(
        &self,
        group_id: &str,
        expense_id: &str,
        user_id: &str,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            self.require_group(&db_tx, group_id, user_id).await?;

            let model = expenses::Entity::find_by_id(expense_id.to_string())
                .filter(expenses::Column::GroupId.eq(group_id.to_string()))
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("expense not exists".to_string()))?;

            participants::Entity::delete_many()
                .filter(participants::Column::ExpenseId.eq(model.id.clone()))
                .exec(&db_tx)
                .await?;
            expenses::Entity::delete_by_id(model.id).exec(&db_tx).await?;

            Ok(())
        })
    }

    /// List a group's expenses, with cursor-based pagination.
    ///
    /// Pagination is newest → older by `(occurred_at DESC, expense_id DESC)`.
    pub async fn list_expenses(
        &self,
        group_id: &str,
        user_id: &str,
        limit: u64,
        cursor: Option<&str>,
        filter: &ExpenseListFilter,
    ) -> ResultEngine<(Vec<Expense>, Option<String>)> {
        with_tx!(self, |db_tx| {
            self.require_group(&db_tx, group_id, user_id).await?;
            validate_list_filter(filter)?;

            let limit_plus_one = limit.saturating_add(1);
            let mut query = expenses::Entity::find()
                .filter(expenses::Column::GroupId.eq(group_id.to_string()))
                .order_by_desc(expenses::Column::OccurredAt)
                .order_by_desc(expenses::Column::Id)
                .limit(limit_plus_one);

            if let Some(cursor) = cursor {
                let cursor = ExpensesCursor::decode(cursor)?;
                query = query.filter(
                    Condition::any()
                        .add(expenses::Column::OccurredAt.lt(cursor.occurred_at))
                        .add(
                            Condition::all()
                                .add(expenses::Column::OccurredAt.eq(cursor.occurred_at))
                                .add(expenses::Column::Id.lt(cursor.expense_id)),
                        ),
                );
            }
            query = query.apply_expense_filters(filter);

            let models: Vec<expenses::Model> = query.all(&db_tx).await?;
            let has_more = models.len() > limit as usize;
            let models: Vec<expenses::Model> =
                models.into_iter().take(limit as usize).collect();

            let mut rows_by_expense = self.participant_rows(&db_tx, &models).await?;
            let mut out = Vec::with_capacity(models.len());
            for model in models {
                let rows = rows_by_expense.remove(&model.id).unwrap_or_default();
                out.push(Expense::try_from_parts(model, rows)?);
            }

            let next_cursor = out.last().map(|expense| ExpensesCursor {
                occurred_at: expense.occurred_at,
                expense_id: expense.id.clone(),
            });
            let next_cursor = if has_more {
                next_cursor.map(|c| c.encode()).transpose()?
            } else {
                None
            };

            Ok((out, next_cursor))
        })
    }

    /// Load one expense with its participant rows.
    pub(super) async fn load_expense(
        &self,
        db: &DatabaseTransaction,
        group_id: &str,
        expense_id: &str,
    ) -> ResultEngine<Expense> {
        let model = expenses::Entity::find_by_id(expense_id.to_string())
            .filter(expenses::Column::GroupId.eq(group_id.to_string()))
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("expense not exists".to_string()))?;
        let rows = participants::Entity::find()
            .filter(participants::Column::ExpenseId.eq(model.id.clone()))
            .all(db)
            .await?;
        Expense::try_from_parts(model, rows)
    }

    /// Participant rows for a batch of expenses, grouped by expense id.
    pub(super) async fn participant_rows(
        &self,
        db: &DatabaseTransaction,
        models: &[expenses::Model],
    ) -> ResultEngine<HashMap<String, Vec<participants::Model>>> {
        if models.is_empty() {
            return Ok(HashMap::new());
        }
        let ids: Vec<String> = models.iter().map(|model| model.id.clone()).collect();
        let rows = participants::Entity::find()
            .filter(participants::Column::ExpenseId.is_in(ids))
            .all(db)
            .await?;

        let mut by_expense: HashMap<String, Vec<participants::Model>> = HashMap::new();
        for row in rows {
            by_expense
                .entry(row.expense_id.clone())
                .or_default()
                .push(row);
        }
        Ok(by_expense)
    }

    async fn persist_guarded(
        &self,
        db: &DatabaseTransaction,
        updated: &Expense,
        observed_version: i64,
    ) -> ResultEngine<()> {
        let entry = expenses::ActiveModel {
            payer_member_id: ActiveValue::Set(updated.payer_member_id.clone()),
            amount_cents: ActiveValue::Set(updated.state.amount_cents().map(MoneyCents::cents)),
            split_method: ActiveValue::Set(updated.split.method().as_str().to_string()),
            status: ActiveValue::Set(updated.state.status().as_str().to_string()),
            note: ActiveValue::Set(updated.note.clone()),
            occurred_at: ActiveValue::Set(updated.occurred_at),
            version: ActiveValue::Set(updated.version),
            updated_at: ActiveValue::Set(updated.updated_at),
            ..Default::default()
        };
        let result = expenses::Entity::update_many()
            .set(entry)
            .filter(expenses::Column::Id.eq(updated.id.clone()))
            .filter(expenses::Column::Version.eq(observed_version))
            .exec(db)
            .await?;
        if result.rows_affected == 0 {
            return Err(EngineError::VersionConflict(format!(
                "expense {} was updated concurrently",
                updated.id
            )));
        }
        Ok(())
    }
}
