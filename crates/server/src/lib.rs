use axum::{Json, http::StatusCode, response::IntoResponse};
use engine::EngineError;

use serde::Serialize;
pub use server::{app, run, run_with_listener, spawn_with_listener};

mod balances;
mod expenses;
mod groups;
mod members;
mod server;
mod user;

pub mod types {
    pub use api_types::Amount;

    pub mod group {
        pub use api_types::group::{GroupDetail, GroupNew, GroupRename, GroupView, GroupsResponse};
    }

    pub mod member {
        pub use api_types::member::{MemberNew, MemberRemoved, MemberView, RemovalMode};
    }

    pub mod expense {
        pub use api_types::expense::{
            ExpenseFinalize, ExpenseListQuery, ExpenseNew, ExpenseStatus, ExpenseUpdate,
            ExpenseView, ExpensesResponse, Split, SplitShare,
        };
    }

    pub mod balance {
        pub use api_types::balance::{BalanceView, BalancesResponse, TransferView};
    }
}

pub enum ServerError {
    Engine(EngineError),
    Generic(String),
}

#[derive(Serialize)]
struct Error {
    error: String,
}

fn status_for_engine_error(err: &EngineError) -> StatusCode {
    match err {
        EngineError::KeyNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::ExistingKey(_) | EngineError::VersionConflict(_) => StatusCode::CONFLICT,
        EngineError::Database(_) | EngineError::UnbalancedLedger(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        EngineError::InvalidAmount(_)
        | EngineError::InvalidFormat(_)
        | EngineError::InvalidPercent(_)
        | EngineError::InvalidInput(_)
        | EngineError::InvalidCursor(_)
        | EngineError::UnknownMember(_) => StatusCode::BAD_REQUEST,
    }
}

fn message_for_engine_error(err: EngineError) -> String {
    match err {
        EngineError::Database(db_err) => {
            tracing::error!("database error: {db_err}");
            "internal server error".to_string()
        }
        EngineError::UnbalancedLedger(detail) => {
            tracing::error!("ledger integrity violation: {detail}");
            "internal server error".to_string()
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
            ServerError::Generic(err) => (StatusCode::BAD_REQUEST, err),
        };

        (status, Json(Error { error })).into_response()
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

    #[test]
    fn engine_not_found_maps_to_404() {
        let res = ServerError::from(EngineError::KeyNotFound("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn version_conflict_maps_to_409() {
        let res =
            ServerError::from(EngineError::VersionConflict("stale".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn existing_key_maps_to_409() {
        let res = ServerError::from(EngineError::ExistingKey("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn engine_validation_maps_to_400() {
        for err in [
            EngineError::InvalidAmount("x".to_string()),
            EngineError::InvalidFormat("x".to_string()),
            EngineError::InvalidPercent("x".to_string()),
            EngineError::InvalidInput("x".to_string()),
            EngineError::InvalidCursor("x".to_string()),
            EngineError::UnknownMember("x".to_string()),
        ] {
            let res = ServerError::from(err).into_response();
            assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn ledger_corruption_maps_to_500() {
        let res =
            ServerError::from(EngineError::UnbalancedLedger("drift".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn generic_maps_to_400() {
        let res = ServerError::Generic("bad".to_string()).into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
