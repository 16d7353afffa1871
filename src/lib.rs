//! Ledgerbook is a local-first personal finance app built around a single
//! SQLite "book" file.
//!
//! This library provides a REST API for recording transactions, importing
//! bank statements (CSV and OFX), naming payees via match rules, linking
//! transfers between accounts, and projecting forecasts from recurring
//! templates.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde_json::json;
use tokio::signal;

mod account;
mod app_state;
mod book;
mod category;
mod database_id;
mod db;
mod endpoints;
mod forecast;
mod import;
mod logging;
mod payee;
mod routing;
mod transaction;
mod transfer;

pub use app_state::AppState;
pub use database_id::{DatabaseID, TransactionID};
pub use db::initialize as initialize_db;
pub use routing::build_router;

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The requested resource was not found.
    ///
    /// For HTTP request handlers, the client should check that the parameters
    /// (e.g., ID) are correct and that the resource has been created.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// A date string could not be parsed with any known format.
    #[error("Could not parse date: {0}")]
    InvalidDate(String),

    /// An amount string could not be parsed into whole cents.
    #[error("Could not parse amount: {0}")]
    InvalidAmount(String),

    /// An uploaded statement file could not be used at all, e.g. it was empty
    /// or had an unsupported file extension.
    #[error("Could not read the statement file: {0}")]
    InvalidImportFile(String),

    /// The category ID attached to a row did not match a valid category.
    #[error("the category ID {0:?} does not refer to a valid category")]
    InvalidCategory(Option<DatabaseID>),

    /// The specified payee name already exists in the book.
    ///
    /// Payee names must be unique because transactions reference payees by
    /// their display name.
    #[error("the payee \"{0}\" already exists in the book")]
    DuplicatePayeeName(String),

    /// Tried to update an account that does not exist
    #[error("tried to update an account that is not in the book")]
    UpdateMissingAccount,

    /// Tried to delete an account that does not exist
    #[error("tried to delete an account that is not in the book")]
    DeleteMissingAccount,

    /// Tried to update a category that does not exist
    #[error("tried to update a category that is not in the book")]
    UpdateMissingCategory,

    /// Tried to delete a category that does not exist
    #[error("tried to delete a category that is not in the book")]
    DeleteMissingCategory,

    /// The parent category ID given when creating or updating a category did
    /// not match an existing category.
    #[error("the parent category could not be found")]
    MissingParentCategory,

    /// A category was updated to use itself as its parent.
    #[error("a category cannot be its own parent")]
    CategoryOwnParent,

    /// Tried to delete a category that still has subcategories.
    #[error("cannot delete a category that still has subcategories")]
    CategoryHasSubcategories,

    /// Tried to update a transaction that does not exist
    #[error("tried to update a transaction that is not in the book")]
    UpdateMissingTransaction,

    /// Tried to delete a transaction that does not exist
    #[error("tried to delete a transaction that is not in the book")]
    DeleteMissingTransaction,

    /// Tried to update a payee that does not exist
    #[error("tried to update a payee that is not in the book")]
    UpdateMissingPayee,

    /// Tried to delete a payee that does not exist
    #[error("tried to delete a payee that is not in the book")]
    DeleteMissingPayee,

    /// The destination account for a transfer could not be found.
    #[error("the destination account could not be found")]
    MissingDestinationAccount,

    /// A transfer was requested between an account and itself.
    #[error("a transfer must be between two different accounts")]
    SameTransferAccount,

    /// Tried to convert a transaction into a transfer when it is already one
    /// half of a transfer pair.
    #[error("the transaction is already part of a transfer")]
    AlreadyATransfer,

    /// An error occurred while serializing a struct as JSON
    #[error("could not serialize as JSON: {0}")]
    JSONSerializationError(String),

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::JSONSerializationError(value.to_string())
    }
}

impl Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::NotFound
            | Error::UpdateMissingAccount
            | Error::DeleteMissingAccount
            | Error::UpdateMissingCategory
            | Error::DeleteMissingCategory
            | Error::MissingParentCategory
            | Error::UpdateMissingTransaction
            | Error::DeleteMissingTransaction
            | Error::UpdateMissingPayee
            | Error::DeleteMissingPayee
            | Error::MissingDestinationAccount => StatusCode::NOT_FOUND,
            Error::CategoryOwnParent
            | Error::CategoryHasSubcategories
            | Error::SameTransferAccount
            | Error::AlreadyATransfer
            | Error::InvalidCategory(_)
            | Error::InvalidImportFile(_) => StatusCode::BAD_REQUEST,
            Error::DuplicatePayeeName(_) => StatusCode::CONFLICT,
            Error::InvalidDate(_) | Error::InvalidAmount(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::SqlError(_) | Error::DatabaseLockError | Error::JSONSerializationError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status_code = self.status_code();

        // SQL and lock errors are not intended to be shown to the client.
        let message = if status_code == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("An unexpected error occurred: {}", self);
            "an unexpected error occurred, check the server logs for more details".to_owned()
        } else {
            self.to_string()
        };

        (status_code, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod error_tests {
    use axum::http::StatusCode;

    use crate::Error;

    #[test]
    fn maps_no_rows_to_not_found() {
        let got: Error = rusqlite::Error::QueryReturnedNoRows.into();

        assert_eq!(got, Error::NotFound);
    }

    #[test]
    fn wraps_other_sql_errors() {
        let got: Error = rusqlite::Error::InvalidQuery.into();

        assert_eq!(got, Error::SqlError(rusqlite::Error::InvalidQuery));
    }

    #[test]
    fn client_errors_use_client_status_codes() {
        assert_eq!(Error::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            Error::CategoryOwnParent.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::DuplicatePayeeName("Countdown".to_owned()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            Error::InvalidAmount("abc".to_owned()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            Error::DatabaseLockError.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
