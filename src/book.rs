//! Defines the endpoint reporting which book file is open.

use std::path::Path as FilePath;
use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{AppState, Error};

/// A summary of the currently open book file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookStatus {
    /// Whether a book is open. Always true while the server is running.
    pub is_open: bool,
    /// The path to the book file as given at startup.
    pub path: String,
    /// The book's display name, taken from the file stem.
    pub name: String,
}

/// The state needed for the book endpoint.
#[derive(Debug, Clone)]
pub struct BookState {
    /// The path to the book file as given at startup.
    pub book_path: String,
    /// The database connection for the open book.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for BookState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            book_path: state.book_path.clone(),
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler for reporting the currently open book.
pub async fn get_book_endpoint(State(state): State<BookState>) -> Result<Response, Error> {
    let name = FilePath::new(&state.book_path)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| state.book_path.clone());

    let status = BookStatus {
        is_open: true,
        path: state.book_path,
        name,
    };

    Ok(Json(status).into_response())
}
