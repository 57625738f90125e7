//! Balance endpoints.

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use uuid::Uuid;

use api_types::balance::{BalanceSummaryView, BalancesResponse, MemberBalanceView};
use engine::BalanceSummary;

use crate::{
    ServerError,
    server::{CurrentUser, ServerState},
};

fn summary_view(summary: BalanceSummary) -> BalanceSummaryView {
    BalanceSummaryView {
        currency: summary.currency.code().to_string(),
        total_owed_minor: summary.total_owed.cents(),
        total_owing_minor: summary.total_owing.cents(),
        net_balance_minor: summary.net_balance.cents(),
        balances: summary
            .balances
            .into_iter()
            .map(|balance| MemberBalanceView {
                user_id: balance.user_id,
                amount_minor: balance.amount.cents(),
            })
            .collect(),
    }
}

fn response(summaries: Vec<BalanceSummary>) -> Json<BalancesResponse> {
    Json(BalancesResponse {
        balances: summaries.into_iter().map(summary_view).collect(),
    })
}

pub async fn group(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Path(group_id): Path<Uuid>,
) -> Result<Json<BalancesResponse>, ServerError> {
    let summaries = state.engine.group_balances(group_id, &user_id).await?;
    Ok(response(summaries))
}

pub async fn user(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
) -> Result<Json<BalancesResponse>, ServerError> {
    let summaries = state.engine.user_balances(&user_id).await?;
    Ok(response(summaries))
}
