//! Defines the JSON endpoints for managing accounts.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    account::{
        AccountData, create_account, delete_account, get_account, get_all_accounts, update_account,
    },
    database_id::DatabaseID,
};

/// The state needed for the account endpoints.
#[derive(Debug, Clone)]
pub struct AccountState {
    /// The database connection for managing accounts.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for AccountState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler for listing all accounts.
pub async fn get_accounts_endpoint(State(state): State<AccountState>) -> Result<Response, Error> {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Err(Error::DatabaseLockError);
        }
    };

    let accounts = get_all_accounts(&connection)?;

    Ok(Json(accounts).into_response())
}

/// A route handler for creating a new account.
pub async fn create_account_endpoint(
    State(state): State<AccountState>,
    Json(data): Json<AccountData>,
) -> Result<Response, Error> {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Err(Error::DatabaseLockError);
        }
    };

    let account = create_account(data, &connection)?;

    Ok((StatusCode::CREATED, Json(account)).into_response())
}

/// A route handler for retrieving a single account.
pub async fn get_account_endpoint(
    State(state): State<AccountState>,
    Path(account_id): Path<DatabaseID>,
) -> Result<Response, Error> {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Err(Error::DatabaseLockError);
        }
    };

    let account = get_account(account_id, &connection)?;

    Ok(Json(account).into_response())
}

/// A route handler for replacing an account's fields.
pub async fn update_account_endpoint(
    State(state): State<AccountState>,
    Path(account_id): Path<DatabaseID>,
    Json(data): Json<AccountData>,
) -> Result<Response, Error> {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Err(Error::DatabaseLockError);
        }
    };

    let account = update_account(account_id, data, &connection)?;

    Ok(Json(account).into_response())
}

/// A route handler for deleting an account and everything it owns.
pub async fn delete_account_endpoint(
    State(state): State<AccountState>,
    Path(account_id): Path<DatabaseID>,
) -> Result<Response, Error> {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Err(Error::DatabaseLockError);
        }
    };

    let transaction = connection.unchecked_transaction()?;
    delete_account(account_id, &transaction)?;
    transaction.commit()?;

    Ok(StatusCode::NO_CONTENT.into_response())
}
