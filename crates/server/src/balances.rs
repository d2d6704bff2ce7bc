//! Balance and settlement API endpoints.

use api_types::balance::{BalanceView, BalancesResponse, TransferView};
use axum::{
    Extension, Json,
    extract::{Path, State},
};
use chrono::Utc;

use crate::{ServerError, server::ServerState, user};

/// Handle requests for a group's net balances and settlement plan.
///
/// Computed from finalized expenses only; drafts have no ledger effect.
pub async fn get(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(group_id): Path<String>,
) -> Result<Json<BalancesResponse>, ServerError> {
    let (balances, settlement) = state
        .engine
        .group_balances(&group_id, &user.username)
        .await?;

    Ok(Json(BalancesResponse {
        group_id,
        generated_at: Utc::now(),
        balances: balances
            .into_iter()
            .map(|balance| BalanceView {
                member_id: balance.member_id,
                balance_cents: balance.balance_cents.cents(),
                balance: balance.balance_cents.to_string(),
            })
            .collect(),
        settlement: settlement
            .into_iter()
            .map(|transfer| TransferView {
                from_member_id: transfer.from_member_id,
                to_member_id: transfer.to_member_id,
                cents: transfer.cents.cents(),
                amount: transfer.cents.to_string(),
            })
            .collect(),
    }))
}
