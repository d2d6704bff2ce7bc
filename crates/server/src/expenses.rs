//! Expense API endpoints.

use api_types::Amount;
use api_types::expense::{
    ExpenseFinalize, ExpenseListQuery, ExpenseNew, ExpenseStatus as ApiStatus, ExpenseUpdate,
    ExpenseView, ExpensesResponse, Split, SplitShare,
};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use serde::Serialize;

use crate::{ServerError, server::ServerState, user};

/// Page size used internally when streaming an export.
const EXPORT_PAGE: u64 = 200;

fn parse_amount(amount: Amount) -> Result<engine::MoneyCents, ServerError> {
    let cents = match amount {
        Amount::Decimal(text) => text.parse()?,
        Amount::Number(value) => engine::MoneyCents::try_from(value)?,
    };

    Ok(cents)
}

fn map_split(split: Split) -> engine::SplitSpec {
    match split {
        Split::Equal { participant_ids } => engine::SplitSpec::Equal { participant_ids },
        Split::Percent { shares } => engine::SplitSpec::Percent {
            shares: shares
                .into_iter()
                .map(|share| engine::PercentShare {
                    member_id: share.member_id,
                    percent: share.percent,
                })
                .collect(),
        },
    }
}

fn split_view(split: engine::SplitSpec) -> Split {
    match split {
        engine::SplitSpec::Equal { participant_ids } => Split::Equal { participant_ids },
        engine::SplitSpec::Percent { shares } => Split::Percent {
            shares: shares
                .into_iter()
                .map(|share| SplitShare {
                    member_id: share.member_id,
                    percent: share.percent,
                })
                .collect(),
        },
    }
}

fn map_status(status: ApiStatus) -> engine::ExpenseStatus {
    match status {
        ApiStatus::Draft => engine::ExpenseStatus::Draft,
        ApiStatus::Final => engine::ExpenseStatus::Final,
    }
}

fn status_view(status: engine::ExpenseStatus) -> ApiStatus {
    match status {
        engine::ExpenseStatus::Draft => ApiStatus::Draft,
        engine::ExpenseStatus::Final => ApiStatus::Final,
    }
}

fn expense_view(expense: engine::Expense) -> ExpenseView {
    let amount_cents = expense.state.amount_cents();

    ExpenseView {
        id: expense.id,
        payer_member_id: expense.payer_member_id,
        status: status_view(expense.state.status()),
        amount_cents: amount_cents.map(engine::MoneyCents::cents),
        amount: amount_cents.map(|cents| cents.to_string()),
        split: split_view(expense.split),
        note: expense.note,
        occurred_at: expense.occurred_at,
        version: expense.version,
    }
}

fn list_filter(query: &ExpenseListQuery) -> engine::ExpenseListFilter {
    let mut filter = engine::ExpenseListFilter::default();
    if let Some(from) = query.from {
        filter = filter.from(from);
    }
    if let Some(to) = query.to {
        filter = filter.to(to);
    }
    if let Some(status) = query.status {
        filter = filter.status(map_status(status));
    }

    filter
}

/// Handle requests for recording a new expense.
///
/// With an amount the expense is committed as `final` right away; without
/// one it is captured as a `draft`.
pub async fn create(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(group_id): Path<String>,
    Json(payload): Json<ExpenseNew>,
) -> Result<(StatusCode, Json<ExpenseView>), ServerError> {
    let mut cmd = engine::CreateExpenseCmd::new(
        group_id,
        &user.username,
        payload.payer_member_id,
        map_split(payload.split),
    );
    if let Some(amount) = payload.amount {
        cmd = cmd.amount(parse_amount(amount)?);
    }
    if let Some(note) = payload.note {
        cmd = cmd.note(note);
    }
    if let Some(occurred_at) = payload.occurred_at {
        cmd = cmd.occurred_at(occurred_at);
    }

    let expense = state.engine.create_expense(cmd).await?;

    Ok((StatusCode::CREATED, Json(expense_view(expense))))
}

/// Handle requests for listing expenses, newest first.
pub async fn list(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(group_id): Path<String>,
    Query(query): Query<ExpenseListQuery>,
) -> Result<Json<ExpensesResponse>, ServerError> {
    let limit = query.limit.unwrap_or(50);
    let filter = list_filter(&query);

    let (expenses, next_cursor) = state
        .engine
        .list_expenses(
            &group_id,
            &user.username,
            limit,
            query.cursor.as_deref(),
            &filter,
        )
        .await?;

    Ok(Json(ExpensesResponse {
        expenses: expenses.into_iter().map(expense_view).collect(),
        next_cursor,
    }))
}

/// Handle requests for editing an expense.
///
/// The payload must carry the version the caller last saw; a stale one is
/// rejected with 409.
pub async fn update(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path((group_id, expense_id)): Path<(String, String)>,
    Json(payload): Json<ExpenseUpdate>,
) -> Result<Json<ExpenseView>, ServerError> {
    let mut cmd =
        engine::UpdateExpenseCmd::new(group_id, expense_id, &user.username, payload.version);
    if let Some(payer_member_id) = payload.payer_member_id {
        cmd = cmd.payer(payer_member_id);
    }
    if let Some(split) = payload.split {
        cmd = cmd.split(map_split(split));
    }
    if let Some(amount) = payload.amount {
        cmd = cmd.amount(parse_amount(amount)?);
    }
    if let Some(note) = payload.note {
        cmd = cmd.note(note);
    }
    if let Some(occurred_at) = payload.occurred_at {
        cmd = cmd.occurred_at(occurred_at);
    }

    let expense = state.engine.update_expense(cmd).await?;

    Ok(Json(expense_view(expense)))
}

/// Handle requests for committing a draft as `final`.
pub async fn finalize(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path((group_id, expense_id)): Path<(String, String)>,
    Json(payload): Json<ExpenseFinalize>,
) -> Result<Json<ExpenseView>, ServerError> {
    let mut cmd =
        engine::FinalizeExpenseCmd::new(group_id, expense_id, &user.username, payload.version);
    if let Some(amount) = payload.amount {
        cmd = cmd.amount(parse_amount(amount)?);
    }

    let expense = state.engine.finalize_expense(cmd).await?;

    Ok(Json(expense_view(expense)))
}

/// Handle requests for deleting an expense.
pub async fn delete(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path((group_id, expense_id)): Path<(String, String)>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .delete_expense(&group_id, &expense_id, &user.username)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
struct ExportRow {
    id: String,
    occurred_at: String,
    status: &'static str,
    payer_member_id: String,
    amount_cents: Option<i64>,
    amount: Option<String>,
    split_method: &'static str,
    participants: String,
    note: Option<String>,
    version: i64,
}

fn export_row(expense: engine::Expense) -> ExportRow {
    let amount_cents = expense.state.amount_cents();

    ExportRow {
        id: expense.id,
        occurred_at: expense.occurred_at.to_rfc3339(),
        status: expense.state.status().as_str(),
        payer_member_id: expense.payer_member_id,
        amount_cents: amount_cents.map(engine::MoneyCents::cents),
        amount: amount_cents.map(|cents| cents.to_string()),
        split_method: expense.split.method().as_str(),
        participants: expense.split.participant_ids().join(";"),
        note: expense.note,
        version: expense.version,
    }
}

/// Handle requests for exporting expenses as CSV.
///
/// Honors the same `status`/`from`/`to` filters as the list endpoint and
/// walks every page, so the download covers the whole history.
pub async fn export(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(group_id): Path<String>,
    Query(query): Query<ExpenseListQuery>,
) -> Result<impl IntoResponse, ServerError> {
    let filter = list_filter(&query);

    let mut writer = csv::Writer::from_writer(vec![]);
    let mut cursor: Option<String> = None;
    loop {
        let (page, next_cursor) = state
            .engine
            .list_expenses(
                &group_id,
                &user.username,
                EXPORT_PAGE,
                cursor.as_deref(),
                &filter,
            )
            .await?;
        for expense in page {
            writer
                .serialize(export_row(expense))
                .map_err(|err| ServerError::Generic(err.to_string()))?;
        }
        match next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    let data = writer
        .into_inner()
        .map_err(|err| ServerError::Generic(err.to_string()))?;

    Ok(([(header::CONTENT_TYPE, "text/csv")], data))
}
