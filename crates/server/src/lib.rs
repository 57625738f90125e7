use axum::{Json, http::StatusCode, response::IntoResponse};
use engine::EngineError;

use api_types::ErrorResponse;
pub use server::{router, run, run_with_listener, spawn_with_listener};

mod balances;
mod expenses;
mod groups;
mod server;
mod settlements;
mod users;

pub mod types {
    pub mod user {
        pub use api_types::user::{UserCreated, UserNew};
    }

    pub mod group {
        pub use api_types::group::{
            AdminTransfer, GroupListResponse, GroupNew, GroupRole, GroupView, MemberNew,
            MemberRoleUpdate, MemberView, MembersResponse,
        };
    }

    pub mod expense {
        pub use api_types::expense::{
            AllocateRequest, AllocateResponse, AllocationView, ExpenseList, ExpenseListResponse,
            ExpenseNew, ExpenseUpdate, ExpenseView, ShareType, ShareView, SplitRule,
        };
    }

    pub mod settlement {
        pub use api_types::settlement::{
            SettlementListResponse, SettlementNew, SettlementStatus, SettlementTransition,
            SettlementTransitionResponse, SettlementType, SettlementView,
        };
    }

    pub mod balance {
        pub use api_types::balance::{BalanceSummaryView, BalancesResponse, MemberBalanceView};
    }
}

pub enum ServerError {
    Engine(EngineError),
}

fn status_for_engine_error(err: &EngineError) -> StatusCode {
    match err {
        EngineError::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::Forbidden(_) | EngineError::ForbiddenTransition(_) => StatusCode::FORBIDDEN,
        EngineError::InvalidTransition(_) | EngineError::ExistingKey(_) => StatusCode::CONFLICT,
        EngineError::KeyNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::Consistency(_) | EngineError::Database(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn message_for_engine_error(err: EngineError) -> String {
    match err {
        EngineError::Database(db_err) => {
            tracing::error!("database error: {db_err}");
            "internal server error".to_string()
        }
        EngineError::Consistency(msg) => {
            tracing::error!("ledger inconsistency: {msg}");
            format!("ledger inconsistency: {msg}")
        }
        other => other.to_string(),
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, error) = match self {
            ServerError::Engine(err) => {
                (status_for_engine_error(&err), message_for_engine_error(err))
            }
        };

        (status, Json(ErrorResponse { error })).into_response()
    }
}

impl From<EngineError> for ServerError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(err: EngineError) -> StatusCode {
        ServerError::from(err).into_response().status()
    }

    #[test]
    fn invalid_input_maps_to_422() {
        assert_eq!(
            status(EngineError::InvalidInput("x".to_string())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn authorization_errors_map_to_403() {
        assert_eq!(
            status(EngineError::Forbidden("x".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status(EngineError::ForbiddenTransition("x".to_string())),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn conflicts_map_to_409() {
        assert_eq!(
            status(EngineError::InvalidTransition("x".to_string())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status(EngineError::ExistingKey("x".to_string())),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn engine_not_found_maps_to_404() {
        assert_eq!(
            status(EngineError::KeyNotFound("x".to_string())),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn inconsistency_maps_to_500() {
        assert_eq!(
            status(EngineError::Consistency("x".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
