//! Defines the endpoint for converting an existing transaction into a
//! transfer.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Path, State},
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{AppState, Error, database_id::DatabaseID, transfer::convert_to_transfer};

/// The state needed for the transfer endpoints.
#[derive(Debug, Clone)]
pub struct TransferState {
    /// The database connection for managing transfers.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for TransferState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The request body for converting a transaction into a transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvertTransferRequest {
    /// The account the other half of the transfer lives in.
    pub transfer_to_account_id: DatabaseID,
}

/// A route handler that turns an existing transaction into one side of a
/// transfer pair, creating the mirrored half in the target account.
pub async fn convert_transfer_endpoint(
    State(state): State<TransferState>,
    Path(transaction_id): Path<DatabaseID>,
    Json(request): Json<ConvertTransferRequest>,
) -> Result<Response, Error> {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Err(Error::DatabaseLockError);
        }
    };

    let transaction = connection.unchecked_transaction()?;
    let (converted, _) =
        convert_to_transfer(transaction_id, request.transfer_to_account_id, &transaction)?;
    transaction.commit()?;

    tracing::info!(
        "converted transaction {} into a transfer to account {}",
        converted.id,
        request.transfer_to_account_id
    );

    Ok(Json(converted).into_response())
}

#[cfg(test)]
mod endpoint_tests {
    use axum::{
        Json,
        body::to_bytes,
        extract::{FromRef, Path, State},
        http::StatusCode,
        response::{IntoResponse, Response},
    };
    use chrono::NaiveDate;
    use rusqlite::Connection;

    use crate::{
        AppState,
        account::{AccountData, create_account},
        transaction::{Transaction, TransactionKind, create_transaction},
        transfer::{ConvertTransferRequest, TransferState, convert_transfer_endpoint},
    };

    fn get_test_state() -> (TransferState, AppState) {
        let connection = Connection::open_in_memory().unwrap();
        let app_state = AppState::new(connection, ":memory:").unwrap();
        (TransferState::from_ref(&app_state), app_state)
    }

    async fn parse_body<T: serde::de::DeserializeOwned>(response: Response) -> T {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).expect("Could not parse response body")
    }

    fn create_test_account(name: &str, state: &AppState) -> i64 {
        let connection = state.db_connection.lock().unwrap();
        create_account(
            AccountData {
                name: name.to_owned(),
                kind: "checking".to_owned(),
                institution: None,
                display_order: 0,
            },
            &connection,
        )
        .expect("Could not create account")
        .id
    }

    #[tokio::test]
    async fn convert_returns_transfer_half() {
        let (state, app_state) = get_test_state();
        let checking = create_test_account("Checking", &app_state);
        let savings = create_test_account("Savings", &app_state);
        let existing = {
            let connection = app_state.db_connection.lock().unwrap();
            create_transaction(
                Transaction::build(
                    checking,
                    NaiveDate::from_ymd_opt(2025, 3, 5).unwrap(),
                    -7500,
                ),
                &connection,
            )
            .expect("Could not create transaction")
        };

        let response = convert_transfer_endpoint(
            State(state),
            Path(existing.id),
            Json(ConvertTransferRequest {
                transfer_to_account_id: savings,
            }),
        )
        .await
        .into_response();

        assert_eq!(StatusCode::OK, response.status());
        let converted: Transaction = parse_body(response).await;
        assert_eq!(converted.id, existing.id);
        assert_eq!(converted.kind, TransactionKind::Transfer);
        assert!(converted.transfer_link_id.is_some());
    }

    #[tokio::test]
    async fn convert_missing_transaction_returns_not_found() {
        let (state, app_state) = get_test_state();
        let savings = create_test_account("Savings", &app_state);

        let response = convert_transfer_endpoint(
            State(state),
            Path(999),
            Json(ConvertTransferRequest {
                transfer_to_account_id: savings,
            }),
        )
        .await
        .into_response();

        assert_eq!(StatusCode::NOT_FOUND, response.status());
    }

    #[tokio::test]
    async fn convert_twice_returns_bad_request() {
        let (state, app_state) = get_test_state();
        let checking = create_test_account("Checking", &app_state);
        let savings = create_test_account("Savings", &app_state);
        let brokerage = create_test_account("Brokerage", &app_state);
        let existing = {
            let connection = app_state.db_connection.lock().unwrap();
            create_transaction(
                Transaction::build(
                    checking,
                    NaiveDate::from_ymd_opt(2025, 3, 5).unwrap(),
                    -7500,
                ),
                &connection,
            )
            .expect("Could not create transaction")
        };
        convert_transfer_endpoint(
            State(state.clone()),
            Path(existing.id),
            Json(ConvertTransferRequest {
                transfer_to_account_id: savings,
            }),
        )
        .await
        .expect("Could not convert transaction");

        let response = convert_transfer_endpoint(
            State(state),
            Path(existing.id),
            Json(ConvertTransferRequest {
                transfer_to_account_id: brokerage,
            }),
        )
        .await
        .into_response();

        assert_eq!(StatusCode::BAD_REQUEST, response.status());
    }
}
