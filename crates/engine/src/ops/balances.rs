use sea_orm::{QueryFilter, TransactionTrait, prelude::*};

use crate::{
    Balance, Expense, ExpenseStatus, ResultEngine, Transfer, compute_balances,
    compute_settlements, expenses,
};

use super::{Engine, with_tx};

impl Engine {
    /// Current balances for a group, with a settlement plan that clears them.
    ///
    /// Only `final` expenses count; drafts have no ledger effect. Inactive
    /// members keep appearing as long as they exist, so their debts stay
    /// visible.
    pub async fn group_balances(
        &self,
        group_id: &str,
        user_id: &str,
    ) -> ResultEngine<(Vec<Balance>, Vec<Transfer>)> {
        with_tx!(self, |db_tx| {
            self.require_group(&db_tx, group_id, user_id).await?;

            let member_ids: Vec<String> = self
                .group_member_ids(&db_tx, group_id)
                .await?
                .into_iter()
                .collect();

            let models = expenses::Entity::find()
                .filter(expenses::Column::GroupId.eq(group_id.to_string()))
                .filter(expenses::Column::Status.eq(ExpenseStatus::Final.as_str()))
                .all(&db_tx)
                .await?;

            let mut rows_by_expense = self.participant_rows(&db_tx, &models).await?;
            let mut allocated = Vec::with_capacity(models.len());
            for model in models {
                let rows = rows_by_expense.remove(&model.id).unwrap_or_default();
                let expense = Expense::try_from_parts(model, rows)?;
                allocated.push(expense.allocated()?);
            }

            let balances = compute_balances(&member_ids, &allocated)?;
            let settlement = compute_settlements(&balances)?;
            Ok((balances, settlement))
        })
    }
}
