//! Shared expenses and their edit lifecycle.
//!
//! An expense is either a `draft` (captured, amount not committed) or
//! `final` (amount committed, counted in balances). Finalizing is the only
//! transition and it is one-way; deletion is terminal from either state.
//!
//! Concurrent edits are detected with a version counter: every expense
//! starts at version 1, every accepted write supplies the version it
//! observed and bumps it by exactly one. See [`Expense::guarded_apply`].

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    AllocatedExpense, EngineError, MoneyCents, PercentShare, ResultEngine, SplitMethod, SplitSpec,
    participants,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseStatus {
    Draft,
    Final,
}

impl ExpenseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Final => "final",
        }
    }
}

impl TryFrom<&str> for ExpenseStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "draft" => Ok(Self::Draft),
            "final" => Ok(Self::Final),
            other => Err(EngineError::InvalidInput(format!(
                "invalid expense status: {other}"
            ))),
        }
    }
}

/// Status with the amount presence tied to the tag: a final expense always
/// carries a committed amount, a draft may or may not.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExpenseState {
    Draft { amount_cents: Option<MoneyCents> },
    Final { amount_cents: MoneyCents },
}

impl ExpenseState {
    pub fn status(self) -> ExpenseStatus {
        match self {
            Self::Draft { .. } => ExpenseStatus::Draft,
            Self::Final { .. } => ExpenseStatus::Final,
        }
    }

    pub fn amount_cents(self) -> Option<MoneyCents> {
        match self {
            Self::Draft { amount_cents } => amount_cents,
            Self::Final { amount_cents } => Some(amount_cents),
        }
    }

    pub fn is_final(self) -> bool {
        matches!(self, Self::Final { .. })
    }
}

/// Fields a guarded update may change. `note` uses the inner option to
/// distinguish "set" from "clear".
#[derive(Clone, Debug, Default)]
pub struct ExpensePatch {
    pub payer_member_id: Option<String>,
    pub split: Option<SplitSpec>,
    pub amount_cents: Option<MoneyCents>,
    pub note: Option<Option<String>>,
    pub occurred_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: String,
    pub group_id: String,
    pub payer_member_id: String,
    pub state: ExpenseState,
    pub split: SplitSpec,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Expense {
    pub fn new(
        group_id: String,
        payer_member_id: String,
        state: ExpenseState,
        split: SplitSpec,
        note: Option<String>,
        occurred_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> ResultEngine<Self> {
        let expense = Self {
            id: Uuid::new_v4().to_string(),
            group_id,
            payer_member_id,
            state,
            split: split.validated()?,
            note,
            occurred_at,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        expense.validate()?;
        Ok(expense)
    }

    /// Applies `patch` if `supplied_version` matches the stored version.
    ///
    /// A missing version is a caller mistake (`InvalidInput`); a mismatched
    /// one means the expense changed since the caller read it
    /// (`VersionConflict`) and the caller must reload and retry. On success
    /// the version is bumped by exactly one and `updated_at` refreshed.
    ///
    /// An amount in the patch keeps the current status: patching a draft
    /// does not finalize it, patching a final expense re-validates it.
    pub fn guarded_apply(
        mut self,
        supplied_version: Option<i64>,
        patch: ExpensePatch,
        now: DateTime<Utc>,
    ) -> ResultEngine<Self> {
        self.check_version(supplied_version)?;

        if let Some(payer) = patch.payer_member_id {
            self.payer_member_id = payer;
        }
        if let Some(split) = patch.split {
            self.split = split.validated()?;
        }
        if let Some(amount) = patch.amount_cents {
            self.state = match self.state {
                ExpenseState::Draft { .. } => ExpenseState::Draft {
                    amount_cents: Some(amount),
                },
                ExpenseState::Final { .. } => ExpenseState::Final {
                    amount_cents: amount,
                },
            };
        }
        if let Some(note) = patch.note {
            self.note = note;
        }
        if let Some(occurred_at) = patch.occurred_at {
            self.occurred_at = occurred_at;
        }

        self.validate()?;
        self.version += 1;
        self.updated_at = now;
        Ok(self)
    }

    /// Commits the expense: `draft -> final`, version-guarded.
    ///
    /// The amount comes from the caller or, failing that, from the draft's
    /// stored amount. Finalizing an already final expense just re-commits
    /// the amount (and still bumps the version).
    pub fn finalized(
        mut self,
        supplied_version: Option<i64>,
        amount: Option<MoneyCents>,
        now: DateTime<Utc>,
    ) -> ResultEngine<Self> {
        self.check_version(supplied_version)?;

        let amount = amount.or_else(|| self.state.amount_cents()).ok_or_else(|| {
            EngineError::InvalidInput("amount is required to finalize an expense".to_string())
        })?;
        self.state = ExpenseState::Final {
            amount_cents: amount,
        };

        self.validate()?;
        self.version += 1;
        self.updated_at = now;
        Ok(self)
    }

    /// Reduces a final expense to its ledger effect.
    pub fn allocated(&self) -> ResultEngine<AllocatedExpense> {
        let ExpenseState::Final { amount_cents } = self.state else {
            return Err(EngineError::InvalidInput(format!(
                "expense {} is a draft and has no allocations",
                self.id
            )));
        };
        Ok(AllocatedExpense {
            payer_id: self.payer_member_id.clone(),
            allocations: self.split.allocate(amount_cents)?,
        })
    }

    fn check_version(&self, supplied_version: Option<i64>) -> ResultEngine<()> {
        match supplied_version {
            None => Err(EngineError::InvalidInput(
                "version is required for update".to_string(),
            )),
            Some(supplied) if supplied != self.version => {
                Err(EngineError::VersionConflict(format!(
                    "expense {} is at version {}, update supplied {supplied}",
                    self.id, self.version
                )))
            }
            Some(_) => Ok(()),
        }
    }

    fn validate(&self) -> ResultEngine<()> {
        if let Some(amount) = self.state.amount_cents() {
            let amount = MoneyCents::from_cents(amount.cents())?;
            if !amount.is_positive() {
                return Err(EngineError::InvalidAmount(
                    "expense amount must be positive".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "expenses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub group_id: String,
    pub payer_member_id: String,
    pub amount_cents: Option<i64>,
    pub split_method: String,
    pub status: String,
    pub note: Option<String>,
    pub occurred_at: DateTimeUtc,
    pub version: i64,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::groups::Entity",
        from = "Column::GroupId",
        to = "super::groups::Column::Id"
    )]
    Groups,
    #[sea_orm(
        belongs_to = "super::members::Entity",
        from = "Column::PayerMemberId",
        to = "super::members::Column::Id"
    )]
    Members,
    #[sea_orm(has_many = "super::participants::Entity")]
    Participants,
}

impl Related<super::groups::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Groups.def()
    }
}

impl Related<super::participants::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Participants.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Expense> for ActiveModel {
    fn from(expense: &Expense) -> Self {
        Self {
            id: ActiveValue::Set(expense.id.clone()),
            group_id: ActiveValue::Set(expense.group_id.clone()),
            payer_member_id: ActiveValue::Set(expense.payer_member_id.clone()),
            amount_cents: ActiveValue::Set(expense.state.amount_cents().map(MoneyCents::cents)),
            split_method: ActiveValue::Set(expense.split.method().as_str().to_string()),
            status: ActiveValue::Set(expense.state.status().as_str().to_string()),
            note: ActiveValue::Set(expense.note.clone()),
            occurred_at: ActiveValue::Set(expense.occurred_at),
            version: ActiveValue::Set(expense.version),
            created_at: ActiveValue::Set(expense.created_at),
            updated_at: ActiveValue::Set(expense.updated_at),
        }
    }
}

impl Expense {
    /// Rebuilds the domain expense from its stored row plus participant
    /// rows. Rows that cannot form a coherent expense (final without an
    /// amount, percent share without basis points, weights that no longer
    /// sum to 100) indicate corruption, not caller error.
    pub(crate) fn try_from_parts(
        model: Model,
        mut rows: Vec<participants::Model>,
    ) -> ResultEngine<Self> {
        rows.sort_by(|a, b| a.member_id.cmp(&b.member_id));

        let corrupted = |id: &str, detail: String| {
            EngineError::UnbalancedLedger(format!("stored expense {id} is corrupted: {detail}"))
        };

        let split = match SplitMethod::try_from(model.split_method.as_str())? {
            SplitMethod::Equal => SplitSpec::Equal {
                participant_ids: rows.iter().map(|row| row.member_id.clone()).collect(),
            },
            SplitMethod::Percent => SplitSpec::Percent {
                shares: rows
                    .iter()
                    .map(|row| {
                        let bp = row.percent_bp.ok_or_else(|| {
                            corrupted(&model.id, "percent share without basis points".to_string())
                        })?;
                        Ok(PercentShare {
                            member_id: row.member_id.clone(),
                            percent: bp as f64 / 100.0,
                        })
                    })
                    .collect::<ResultEngine<Vec<_>>>()?,
            },
        };
        let split = split
            .validated()
            .map_err(|err| corrupted(&model.id, err.to_string()))?;

        let amount = model
            .amount_cents
            .map(MoneyCents::from_cents)
            .transpose()
            .map_err(|err| corrupted(&model.id, err.to_string()))?;
        let state = match (ExpenseStatus::try_from(model.status.as_str())?, amount) {
            (ExpenseStatus::Final, Some(amount_cents)) => ExpenseState::Final { amount_cents },
            (ExpenseStatus::Final, None) => {
                return Err(corrupted(&model.id, "final expense without amount".to_string()));
            }
            (ExpenseStatus::Draft, amount_cents) => ExpenseState::Draft { amount_cents },
        };

        Ok(Self {
            id: model.id,
            group_id: model.group_id,
            payer_member_id: model.payer_member_id,
            state,
            split,
            note: model.note,
            occurred_at: model.occurred_at,
            version: model.version,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }

    /// Storage rows for the current split specification.
    pub(crate) fn participant_models(&self) -> ResultEngine<Vec<participants::ActiveModel>> {
        Ok(self
            .split
            .basis_points()?
            .into_iter()
            .map(|(member_id, percent_bp)| participants::ActiveModel {
                expense_id: ActiveValue::Set(self.id.clone()),
                member_id: ActiveValue::Set(member_id),
                percent_bp: ActiveValue::Set(percent_bp),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn equal_split(ids: &[&str]) -> SplitSpec {
        SplitSpec::Equal {
            participant_ids: ids.iter().map(ToString::to_string).collect(),
        }
    }

    fn final_expense(version: i64) -> Expense {
        let now = Utc::now();
        let mut expense = Expense::new(
            "group-1".to_string(),
            "alice".to_string(),
            ExpenseState::Final {
                amount_cents: MoneyCents::new(900),
            },
            equal_split(&["alice", "bob", "cara"]),
            Some("dinner".to_string()),
            now,
            now,
        )
        .unwrap();
        expense.version = version;
        expense
    }

    #[test]
    fn new_expenses_start_at_version_one() {
        let now = Utc::now();
        let expense = Expense::new(
            "group-1".to_string(),
            "alice".to_string(),
            ExpenseState::Draft { amount_cents: None },
            equal_split(&["alice", "bob"]),
            None,
            now,
            now,
        )
        .unwrap();
        assert_eq!(expense.version, 1);
        assert!(!expense.state.is_final());
    }

    #[test]
    fn matching_version_applies_and_bumps_once() {
        let expense = final_expense(3);
        let updated = expense
            .guarded_apply(
                Some(3),
                ExpensePatch {
                    note: Some(Some("brunch".to_string())),
                    ..ExpensePatch::default()
                },
                Utc::now(),
            )
            .unwrap();
        assert_eq!(updated.version, 4);
        assert_eq!(updated.note.as_deref(), Some("brunch"));
    }

    #[test]
    #[should_panic(expected = "VersionConflict")]
    fn stale_version_conflicts() {
        final_expense(3)
            .guarded_apply(Some(2), ExpensePatch::default(), Utc::now())
            .unwrap();
    }

    #[test]
    fn missing_version_is_invalid_input() {
        let err = final_expense(1)
            .guarded_apply(None, ExpensePatch::default(), Utc::now())
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::InvalidInput("version is required for update".to_string())
        );
    }

    #[test]
    fn guarded_apply_refreshes_updated_at() {
        let expense = final_expense(1);
        let later = expense.updated_at + chrono::Duration::seconds(90);
        let updated = expense
            .guarded_apply(Some(1), ExpensePatch::default(), later)
            .unwrap();
        assert_eq!(updated.updated_at, later);
    }

    #[test]
    fn patching_an_amount_keeps_the_draft_a_draft() {
        let now = Utc::now();
        let draft = Expense::new(
            "group-1".to_string(),
            "alice".to_string(),
            ExpenseState::Draft { amount_cents: None },
            equal_split(&["alice", "bob"]),
            None,
            now,
            now,
        )
        .unwrap();
        let patched = draft
            .guarded_apply(
                Some(1),
                ExpensePatch {
                    amount_cents: Some(MoneyCents::new(500)),
                    ..ExpensePatch::default()
                },
                now,
            )
            .unwrap();
        assert!(!patched.state.is_final());
        assert_eq!(patched.state.amount_cents(), Some(MoneyCents::new(500)));
    }

    #[test]
    fn finalize_uses_the_stored_draft_amount() {
        let now = Utc::now();
        let draft = Expense::new(
            "group-1".to_string(),
            "alice".to_string(),
            ExpenseState::Draft {
                amount_cents: Some(MoneyCents::new(1200)),
            },
            equal_split(&["alice", "bob"]),
            None,
            now,
            now,
        )
        .unwrap();
        let committed = draft.finalized(Some(1), None, now).unwrap();
        assert_eq!(
            committed.state,
            ExpenseState::Final {
                amount_cents: MoneyCents::new(1200)
            }
        );
        assert_eq!(committed.version, 2);
    }

    #[test]
    #[should_panic(expected = "amount is required to finalize")]
    fn finalize_without_any_amount_fails() {
        let now = Utc::now();
        let draft = Expense::new(
            "group-1".to_string(),
            "alice".to_string(),
            ExpenseState::Draft { amount_cents: None },
            equal_split(&["alice", "bob"]),
            None,
            now,
            now,
        )
        .unwrap();
        draft.finalized(Some(1), None, now).unwrap();
    }

    #[test]
    fn non_positive_amounts_are_rejected() {
        let now = Utc::now();
        let err = Expense::new(
            "group-1".to_string(),
            "alice".to_string(),
            ExpenseState::Final {
                amount_cents: MoneyCents::ZERO,
            },
            equal_split(&["alice"]),
            None,
            now,
            now,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidAmount(_)));
    }

    #[test]
    fn stored_final_expense_without_amount_is_corruption() {
        let now = Utc::now();
        let model = Model {
            id: "exp-1".to_string(),
            group_id: "group-1".to_string(),
            payer_member_id: "alice".to_string(),
            amount_cents: None,
            split_method: "equal".to_string(),
            status: "final".to_string(),
            note: None,
            occurred_at: now,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        let rows = vec![participants::Model {
            expense_id: "exp-1".to_string(),
            member_id: "alice".to_string(),
            percent_bp: None,
        }];
        let err = Expense::try_from_parts(model, rows).unwrap_err();
        assert!(matches!(err, EngineError::UnbalancedLedger(_)));
    }

    #[test]
    fn stored_percent_share_without_basis_points_is_corruption() {
        let now = Utc::now();
        let model = Model {
            id: "exp-2".to_string(),
            group_id: "group-1".to_string(),
            payer_member_id: "alice".to_string(),
            amount_cents: Some(1000),
            split_method: "percent".to_string(),
            status: "final".to_string(),
            note: None,
            occurred_at: now,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        let rows = vec![participants::Model {
            expense_id: "exp-2".to_string(),
            member_id: "alice".to_string(),
            percent_bp: None,
        }];
        let err = Expense::try_from_parts(model, rows).unwrap_err();
        assert!(matches!(err, EngineError::UnbalancedLedger(_)));
    }

    #[test]
    fn stored_percent_shares_round_trip() {
        let now = Utc::now();
        let expense = Expense::new(
            "group-1".to_string(),
            "alice".to_string(),
            ExpenseState::Final {
                amount_cents: MoneyCents::new(1000),
            },
            SplitSpec::Percent {
                shares: vec![
                    PercentShare {
                        member_id: "alice".to_string(),
                        percent: 33.33,
                    },
                    PercentShare {
                        member_id: "bob".to_string(),
                        percent: 66.67,
                    },
                ],
            },
            None,
            now,
            now,
        )
        .unwrap();
        let rows: Vec<participants::Model> = expense
            .participant_models()
            .unwrap()
            .into_iter()
            .map(|row| participants::Model {
                expense_id: match row.expense_id {
                    ActiveValue::Set(v) => v,
                    _ => unreachable!(),
                },
                member_id: match row.member_id {
                    ActiveValue::Set(v) => v,
                    _ => unreachable!(),
                },
                percent_bp: match row.percent_bp {
                    ActiveValue::Set(v) => v,
                    _ => unreachable!(),
                },
            })
            .collect();
        let model = Model {
            id: expense.id.clone(),
            group_id: expense.group_id.clone(),
            payer_member_id: expense.payer_member_id.clone(),
            amount_cents: Some(1000),
            split_method: "percent".to_string(),
            status: "final".to_string(),
            note: None,
            occurred_at: now,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        let reloaded = Expense::try_from_parts(model, rows).unwrap();
        assert_eq!(reloaded.split, expense.split);
    }
}
