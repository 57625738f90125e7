//! Expense endpoints and the stateless split preview.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use uuid::Uuid;

use api_types::expense::{
    AllocateRequest, AllocateResponse, AllocationView, ExpenseList, ExpenseListResponse,
    ExpenseNew, ExpenseUpdate, ExpenseView, ShareType, ShareView, SplitRule,
};
use engine::{CreateExpenseCmd, Currency, Expense, MoneyCents, UpdateExpenseCmd};

use crate::{
    ServerError,
    server::{CurrentUser, ServerState},
};

const DEFAULT_PAGE_SIZE: u64 = 50;
const MAX_PAGE_SIZE: u64 = 200;

fn share_type_to_api(share_type: engine::ShareType) -> ShareType {
    match share_type {
        engine::ShareType::Equal => ShareType::Equal,
        engine::ShareType::Percentage => ShareType::Percentage,
        engine::ShareType::Fixed => ShareType::Fixed,
    }
}

fn split_to_engine(split: SplitRule) -> engine::SplitRule {
    match split {
        SplitRule::Equal => engine::SplitRule::Equal,
        SplitRule::Custom(values) => engine::SplitRule::Custom(
            values
                .into_iter()
                .map(|(user_id, minor)| (user_id, MoneyCents::new(minor)))
                .collect(),
        ),
        SplitRule::Percentage(bps) => engine::SplitRule::Percentage(bps),
        SplitRule::AssignAll(user_id) => engine::SplitRule::AssignAll(user_id),
    }
}

pub(crate) fn expense_view(expense: Expense) -> ExpenseView {
    ExpenseView {
        id: expense.id,
        description: expense.description,
        amount_minor: expense.amount.cents(),
        currency: expense.currency.code().to_string(),
        occurred_at: expense.occurred_at,
        paid_by: expense.paid_by,
        created_by: expense.created_by,
        is_settlement: expense.is_settlement,
        settlement_id: expense.settlement_id,
        shares: expense
            .shares
            .into_iter()
            .map(|share| ShareView {
                user_id: share.user_id,
                amount_minor: share.amount.cents(),
                share_type: share_type_to_api(share.share_type),
            })
            .collect(),
    }
}

pub async fn list(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Path(group_id): Path<Uuid>,
    Query(query): Query<ExpenseList>,
) -> Result<Json<ExpenseListResponse>, ServerError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let (expenses, next_cursor) = state
        .engine
        .list_expenses_page(group_id, &user_id, limit, query.cursor.as_deref())
        .await?;

    Ok(Json(ExpenseListResponse {
        expenses: expenses.into_iter().map(expense_view).collect(),
        next_cursor,
    }))
}

pub async fn create(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Path(group_id): Path<Uuid>,
    Json(payload): Json<ExpenseNew>,
) -> Result<(StatusCode, Json<ExpenseView>), ServerError> {
    let mut cmd = CreateExpenseCmd::new(
        group_id,
        user_id,
        MoneyCents::new(payload.amount_minor),
        Currency::try_from(payload.currency.as_str())?,
        payload.occurred_at.with_timezone(&Utc),
    );
    cmd.paid_by = payload.paid_by;
    cmd.participants = payload.participants;
    cmd.description = payload.description;
    if let Some(split) = payload.split {
        cmd = cmd.split(split_to_engine(split));
    }

    let expense = state.engine.create_expense(cmd).await?;
    Ok((StatusCode::CREATED, Json(expense_view(expense))))
}

pub async fn update(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Path((group_id, expense_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<ExpenseUpdate>,
) -> Result<Json<ExpenseView>, ServerError> {
    let currency = payload
        .currency
        .as_deref()
        .map(Currency::try_from)
        .transpose()?;

    let cmd = UpdateExpenseCmd {
        amount: payload.amount_minor.map(MoneyCents::new),
        currency,
        occurred_at: payload.occurred_at.map(|at| at.with_timezone(&Utc)),
        paid_by: payload.paid_by,
        participants: payload.participants,
        split: payload.split.map(split_to_engine),
        description: payload.description,
        ..UpdateExpenseCmd::new(group_id, expense_id, user_id)
    };

    let expense = state.engine.update_expense(cmd).await?;
    Ok(Json(expense_view(expense)))
}

pub async fn delete(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Path((group_id, expense_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .delete_expense(group_id, expense_id, &user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Previews how an amount would be split, without touching the ledger.
pub async fn allocate(
    Json(payload): Json<AllocateRequest>,
) -> Result<Json<AllocateResponse>, ServerError> {
    let currency = Currency::try_from(payload.currency.as_str())?;
    let rule = payload
        .split
        .map(split_to_engine)
        .unwrap_or(engine::SplitRule::Equal);
    let shares = engine::allocate_shares(
        MoneyCents::new(payload.amount_minor),
        currency,
        &payload.members,
        &rule,
    )?
    .into_iter()
    .map(|share| AllocationView {
        user_id: share.user_id,
        amount_minor: share.amount.cents(),
        share_type: share_type_to_api(share.share_type),
    })
    .collect();

    Ok(Json(AllocateResponse { shares }))
}
