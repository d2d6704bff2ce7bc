use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wire form of a money amount: an exact decimal string ("12.30", up to two
/// fraction digits) or a plain JSON number.
///
/// Strings parse exactly; numbers are taken as whole currency units and
/// rounded half away from zero to cents.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Amount {
    Decimal(String),
    Number(f64),
}

pub mod group {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct GroupNew {
        pub name: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct GroupRename {
        pub name: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct GroupView {
        pub id: String,
        pub name: String,
        pub created_at: DateTime<Utc>,
        pub updated_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct GroupsResponse {
        pub groups: Vec<GroupView>,
    }

    /// A group with its full member list, active and inactive.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct GroupDetail {
        pub group: GroupView,
        pub members: Vec<super::member::MemberView>,
    }
}

pub mod member {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct MemberNew {
        pub name: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct MemberView {
        pub id: String,
        pub name: String,
        /// Inactive members stay listed so historical expenses resolve.
        pub active: bool,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum RemovalMode {
        /// Member had expense history and was deactivated.
        Deactivated,
        /// Member had no history and was deleted outright.
        Deleted,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct MemberRemoved {
        pub member_id: String,
        pub mode: RemovalMode,
    }
}

pub mod expense {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum ExpenseStatus {
        Draft,
        Final,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct SplitShare {
        pub member_id: String,
        /// Percent weight with at most two fraction digits; all shares must
        /// sum to exactly 100.
        pub percent: f64,
    }

    /// How the amount is divided among members.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    #[serde(tag = "method", rename_all = "snake_case")]
    pub enum Split {
        Equal { participant_ids: Vec<String> },
        Percent { shares: Vec<SplitShare> },
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseNew {
        pub payer_member_id: String,
        pub split: Split,
        /// Present → committed as `final` right away; absent → `draft`.
        pub amount: Option<Amount>,
        pub note: Option<String>,
        /// RFC3339; defaults to the server clock.
        pub occurred_at: Option<DateTime<Utc>>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseUpdate {
        /// Version the caller observed. Required; a stale value is rejected
        /// with 409.
        pub version: Option<i64>,
        pub payer_member_id: Option<String>,
        pub split: Option<Split>,
        pub amount: Option<Amount>,
        /// An empty or whitespace-only string clears the note.
        pub note: Option<String>,
        pub occurred_at: Option<DateTime<Utc>>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseFinalize {
        /// Version the caller observed. Required.
        pub version: Option<i64>,
        /// Amount to commit; falls back to the draft's stored amount.
        pub amount: Option<Amount>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseView {
        pub id: String,
        pub payer_member_id: String,
        pub status: ExpenseStatus,
        pub amount_cents: Option<i64>,
        /// Formatted decimal string of `amount_cents`, when set.
        pub amount: Option<String>,
        pub split: Split,
        pub note: Option<String>,
        pub occurred_at: DateTime<Utc>,
        pub version: i64,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct ExpenseListQuery {
        pub limit: Option<u64>,
        /// Opaque pagination cursor (base64), from `next_cursor`.
        ///
        /// Newest → older pagination.
        pub cursor: Option<String>,
        pub status: Option<ExpenseStatus>,
        /// Inclusive lower bound on `occurred_at` (RFC3339).
        pub from: Option<DateTime<Utc>>,
        /// Exclusive upper bound on `occurred_at` (RFC3339).
        pub to: Option<DateTime<Utc>>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpensesResponse {
        pub expenses: Vec<ExpenseView>,
        /// Opaque cursor for fetching the next page (older items).
        pub next_cursor: Option<String>,
    }
}

pub mod balance {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BalanceView {
        pub member_id: String,
        /// Positive: the group owes this member. Negative: they owe the
        /// group.
        pub balance_cents: i64,
        /// Formatted decimal string of `balance_cents`.
        pub balance: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransferView {
        pub from_member_id: String,
        pub to_member_id: String,
        pub cents: i64,
        /// Formatted decimal string of `cents`.
        pub amount: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BalancesResponse {
        pub group_id: String,
        pub generated_at: DateTime<Utc>,
        pub balances: Vec<BalanceView>,
        /// Transfers that settle every balance to zero when executed.
        pub settlement: Vec<TransferView>,
    }
}
