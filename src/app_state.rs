//! Implements a struct that holds the state of the REST server.

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::{Error, db::initialize};

/// The state of the REST server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The database connection for the open book.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The file path of the open book.
    pub book_path: String,
}

impl AppState {
    /// Create a new [AppState] from a SQLite database connection.
    ///
    /// This function will initialize the database by adding the tables for
    /// the domain models. `book_path` should be the file path the connection
    /// was opened from, and is only used for reporting the book status.
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized.
    pub fn new(db_connection: Connection, book_path: &str) -> Result<Self, Error> {
        initialize(&db_connection)?;
        let connection = Arc::new(Mutex::new(db_connection));

        Ok(Self {
            db_connection: connection,
            book_path: book_path.to_owned(),
        })
    }
}
