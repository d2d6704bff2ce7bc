//! Net balance aggregation over finalized expenses.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Allocation, EngineError, MoneyCents, ResultEngine};

/// An expense reduced to its ledger effect: who paid, and how the amount is
/// allocated across members. Drafts never reach this form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllocatedExpense {
    pub payer_id: String,
    pub allocations: Vec<Allocation>,
}

/// Net position of one member. Positive means the group owes the member.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub member_id: String,
    pub balance_cents: MoneyCents,
}

/// Folds expenses into one net balance per member.
///
/// Every id in `member_ids` starts at zero, so members without any expense
/// history still appear in the output. Each expense credits its payer with
/// the sum of its allocations and debits every allocated member. Output is
/// ordered by member id ascending and always sums to exactly zero.
pub fn compute_balances(
    member_ids: &[String],
    expenses: &[AllocatedExpense],
) -> ResultEngine<Vec<Balance>> {
    let mut balances: BTreeMap<&str, i64> =
        member_ids.iter().map(|id| (id.as_str(), 0i64)).collect();

    for expense in expenses {
        if !balances.contains_key(expense.payer_id.as_str()) {
            return Err(EngineError::UnknownMember(format!(
                "unknown payer \"{}\"",
                expense.payer_id
            )));
        }

        let mut paid: i64 = 0;
        for allocation in &expense.allocations {
            let cents = MoneyCents::from_cents(allocation.cents.cents())?.cents();
            let debited = balances
                .get_mut(allocation.member_id.as_str())
                .ok_or_else(|| {
                    EngineError::UnknownMember(format!(
                        "unknown allocation member \"{}\"",
                        allocation.member_id
                    ))
                })?;
            *debited = debited.checked_sub(cents).ok_or_else(out_of_range)?;
            paid = paid.checked_add(cents).ok_or_else(out_of_range)?;
        }

        let credited = balances
            .get_mut(expense.payer_id.as_str())
            .ok_or_else(out_of_range)?;
        *credited = credited.checked_add(paid).ok_or_else(out_of_range)?;
    }

    balances
        .into_iter()
        .map(|(member_id, cents)| {
            Ok(Balance {
                member_id: member_id.to_string(),
                balance_cents: MoneyCents::from_cents(cents)?,
            })
        })
        .collect()
}

fn out_of_range() -> EngineError {
    EngineError::InvalidAmount("balance outside the safe cents range".to_string())
}
