//! Command structs for engine operations.
//!
//! These types group parameters for expense write operations
//! (create/update/finalize) and list filtering, keeping call sites readable
//! and avoiding long argument lists.

use chrono::{DateTime, Utc};

use crate::{ExpenseStatus, MoneyCents, SplitSpec};

/// Create an expense. Without an amount it is captured as a draft; with one
/// it is committed as final immediately.
#[derive(Clone, Debug)]
pub struct CreateExpenseCmd {
    pub group_id: String,
    pub user_id: String,
    pub payer_member_id: String,
    pub split: SplitSpec,
    pub amount_cents: Option<MoneyCents>,
    pub note: Option<String>,
    pub occurred_at: Option<DateTime<Utc>>,
}

impl CreateExpenseCmd {
    #[must_use]
    pub fn new(
        group_id: impl Into<String>,
        user_id: impl Into<String>,
        payer_member_id: impl Into<String>,
        split: SplitSpec,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            user_id: user_id.into(),
            payer_member_id: payer_member_id.into(),
            split,
            amount_cents: None,
            note: None,
            occurred_at: None,
        }
    }

    #[must_use]
    pub fn amount(mut self, amount: MoneyCents) -> Self {
        self.amount_cents = Some(amount);
        self
    }

    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    #[must_use]
    pub fn occurred_at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = Some(occurred_at);
        self
    }
}

/// Update an existing expense under the version guard.
#[derive(Clone, Debug)]
pub struct UpdateExpenseCmd {
    pub group_id: String,
    pub expense_id: String,
    pub user_id: String,
    /// Version the caller observed. Required; stale values are rejected.
    pub version: Option<i64>,

    pub payer_member_id: Option<String>,
    pub split: Option<SplitSpec>,
    pub amount_cents: Option<MoneyCents>,
    pub note: Option<String>,
    pub occurred_at: Option<DateTime<Utc>>,
}

impl UpdateExpenseCmd {
    #[must_use]
    pub fn new(
        group_id: impl Into<String>,
        expense_id: impl Into<String>,
        user_id: impl Into<String>,
        version: Option<i64>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            expense_id: expense_id.into(),
            user_id: user_id.into(),
            version,
            payer_member_id: None,
            split: None,
            amount_cents: None,
            note: None,
            occurred_at: None,
        }
    }

    #[must_use]
    pub fn payer(mut self, payer_member_id: impl Into<String>) -> Self {
        self.payer_member_id = Some(payer_member_id.into());
        self
    }

    #[must_use]
    pub fn split(mut self, split: SplitSpec) -> Self {
        self.split = Some(split);
        self
    }

    #[must_use]
    pub fn amount(mut self, amount: MoneyCents) -> Self {
        self.amount_cents = Some(amount);
        self
    }

    /// Sets the note; an empty or whitespace-only string clears it.
    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    #[must_use]
    pub fn occurred_at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = Some(occurred_at);
        self
    }
}

/// Commit an expense as final under the version guard.
#[derive(Clone, Debug)]
pub struct FinalizeExpenseCmd {
    pub group_id: String,
    pub expense_id: String,
    pub user_id: String,
    pub version: Option<i64>,
    /// Amount to commit; falls back to the draft's stored amount.
    pub amount_cents: Option<MoneyCents>,
}

impl FinalizeExpenseCmd {
    #[must_use]
    pub fn new(
        group_id: impl Into<String>,
        expense_id: impl Into<String>,
        user_id: impl Into<String>,
        version: Option<i64>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            expense_id: expense_id.into(),
            user_id: user_id.into(),
            version,
            amount_cents: None,
        }
    }

    #[must_use]
    pub fn amount(mut self, amount: MoneyCents) -> Self {
        self.amount_cents = Some(amount);
        self
    }
}

/// Optional constraints for expense listing and export.
#[derive(Clone, Debug, Default)]
pub struct ExpenseListFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub status: Option<ExpenseStatus>,
}

impl ExpenseListFilter {
    #[must_use]
    pub fn from(mut self, from: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self
    }

    #[must_use]
    pub fn to(mut self, to: DateTime<Utc>) -> Self {
        self.to = Some(to);
        self
    }

    #[must_use]
    pub fn status(mut self, status: ExpenseStatus) -> Self {
        self.status = Some(status);
        self
    }
}
