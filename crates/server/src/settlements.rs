//! Settlement endpoints.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use uuid::Uuid;

use api_types::settlement::{
    SettlementListResponse, SettlementNew, SettlementStatus, SettlementTransition,
    SettlementTransitionResponse, SettlementType, SettlementView,
};
use engine::{CreateSettlementCmd, Currency, MoneyCents, Settlement};

use crate::{
    ServerError,
    expenses::expense_view,
    server::{CurrentUser, ServerState},
};

fn type_to_engine(settlement_type: SettlementType) -> engine::SettlementType {
    match settlement_type {
        SettlementType::Payment => engine::SettlementType::Payment,
        SettlementType::Receipt => engine::SettlementType::Receipt,
    }
}

fn type_to_api(settlement_type: engine::SettlementType) -> SettlementType {
    match settlement_type {
        engine::SettlementType::Payment => SettlementType::Payment,
        engine::SettlementType::Receipt => SettlementType::Receipt,
    }
}

fn status_to_engine(status: SettlementStatus) -> engine::SettlementStatus {
    match status {
        SettlementStatus::Pending => engine::SettlementStatus::Pending,
        SettlementStatus::PendingConfirmation => engine::SettlementStatus::PendingConfirmation,
        SettlementStatus::Confirmed => engine::SettlementStatus::Confirmed,
        SettlementStatus::Completed => engine::SettlementStatus::Completed,
        SettlementStatus::Cancelled => engine::SettlementStatus::Cancelled,
    }
}

fn status_to_api(status: engine::SettlementStatus) -> SettlementStatus {
    match status {
        engine::SettlementStatus::Pending => SettlementStatus::Pending,
        engine::SettlementStatus::PendingConfirmation => SettlementStatus::PendingConfirmation,
        engine::SettlementStatus::Confirmed => SettlementStatus::Confirmed,
        engine::SettlementStatus::Completed => SettlementStatus::Completed,
        engine::SettlementStatus::Cancelled => SettlementStatus::Cancelled,
    }
}

fn settlement_view(settlement: Settlement) -> SettlementView {
    SettlementView {
        id: settlement.id,
        group_id: settlement.group_id,
        amount_minor: settlement.amount.cents(),
        currency: settlement.currency.code().to_string(),
        occurred_at: settlement.occurred_at,
        description: settlement.description,
        initiated_by: settlement.initiated_by,
        settled_with: settlement.settled_with,
        settlement_type: type_to_api(settlement.settlement_type),
        status: status_to_api(settlement.status),
        updated_at: settlement.updated_at,
    }
}

fn list_view(settlements: Vec<Settlement>) -> Json<SettlementListResponse> {
    Json(SettlementListResponse {
        settlements: settlements.into_iter().map(settlement_view).collect(),
    })
}

pub async fn list(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Path(group_id): Path<Uuid>,
) -> Result<Json<SettlementListResponse>, ServerError> {
    let settlements = state.engine.list_settlements(group_id, &user_id).await?;
    Ok(list_view(settlements))
}

pub async fn between(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Path((group_id, other)): Path<(Uuid, String)>,
) -> Result<Json<SettlementListResponse>, ServerError> {
    let settlements = state
        .engine
        .settlements_between(group_id, &user_id, &other, &user_id)
        .await?;
    Ok(list_view(settlements))
}

pub async fn create(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Path(group_id): Path<Uuid>,
    Json(payload): Json<SettlementNew>,
) -> Result<(StatusCode, Json<SettlementView>), ServerError> {
    let mut cmd = CreateSettlementCmd::new(
        group_id,
        user_id,
        payload.settled_with,
        MoneyCents::new(payload.amount_minor),
        Currency::try_from(payload.currency.as_str())?,
        type_to_engine(payload.settlement_type),
        payload.occurred_at.with_timezone(&Utc),
    );
    if let Some(status) = payload.status {
        cmd = cmd.status(status_to_engine(status));
    }
    cmd.description = payload.description;

    let settlement = state.engine.create_settlement(cmd).await?;
    Ok((StatusCode::CREATED, Json(settlement_view(settlement))))
}

pub async fn transition(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Path((group_id, settlement_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<SettlementTransition>,
) -> Result<Json<SettlementTransitionResponse>, ServerError> {
    let outcome = state
        .engine
        .transition_settlement(
            group_id,
            settlement_id,
            status_to_engine(payload.status),
            &user_id,
        )
        .await?;

    Ok(Json(SettlementTransitionResponse {
        settlement: settlement_view(outcome.settlement),
        compensating_expense: outcome.compensating_expense.map(expense_view),
    }))
}
