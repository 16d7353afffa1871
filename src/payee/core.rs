//! Defines the core data model and database queries for payees.
//!
//! A payee is a canonical name for the other party of a transaction, paired
//! with the match rules that map raw bank payee text onto it.

use rusqlite::{Connection, Row, named_params};
use serde::{Deserialize, Serialize};

use crate::{Error, database_id::DatabaseID};

// ============================================================================
// MODELS
// ============================================================================

/// A single rule for matching raw bank payee text.
///
/// All rule types compare case-insensitively. A rule with an empty pattern
/// never matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatchRule {
    /// The raw text starts with the pattern.
    StartsWith {
        /// The text to match.
        pattern: String,
    },
    /// The raw text contains the pattern.
    Contains {
        /// The text to match.
        pattern: String,
    },
    /// The raw text equals the pattern.
    Exact {
        /// The text to match.
        pattern: String,
    },
    /// The raw text matches the regular expression.
    Regex {
        /// The regular expression to match. A pattern that fails to compile
        /// matches nothing.
        pattern: String,
    },
}

impl MatchRule {
    /// The pattern text of this rule.
    pub fn pattern(&self) -> &str {
        match self {
            Self::StartsWith { pattern }
            | Self::Contains { pattern }
            | Self::Exact { pattern }
            | Self::Regex { pattern } => pattern,
        }
    }
}

/// A named payee with the rules for recognising it in raw bank payee text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payee {
    /// The ID of the payee.
    pub id: DatabaseID,
    /// The payee's canonical name, unique within the book.
    pub name: String,
    /// The rules for matching raw payee text, tried in order.
    pub match_patterns: Vec<MatchRule>,
    /// The category suggested for this payee's transactions.
    pub default_category_id: Option<DatabaseID>,
}

/// The data for creating or updating a payee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayeeData {
    /// The payee's canonical name, unique within the book.
    pub name: String,
    /// The rules for matching raw payee text, tried in order.
    #[serde(default)]
    pub match_patterns: Vec<MatchRule>,
    /// The category suggested for this payee's transactions.
    #[serde(default)]
    pub default_category_id: Option<DatabaseID>,
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create the payee table in the database.
///
/// # Errors
/// Returns an [Error::SqlError] if there was an SQL error.
pub fn create_payee_table(connection: &Connection) -> Result<(), Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS payee (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            match_patterns TEXT NOT NULL DEFAULT '[]',
            default_category_id INTEGER REFERENCES category(id)
                ON UPDATE CASCADE
                ON DELETE SET NULL
        )",
        (),
    )?;

    Ok(())
}

/// Create a new payee in the database.
///
/// # Errors
/// This function will return a:
/// - [Error::DuplicatePayeeName] if a payee named `data.name` already exists,
/// - [Error::InvalidCategory] if `data.default_category_id` does not refer to
///   a valid category,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_payee(data: PayeeData, connection: &Connection) -> Result<Payee, Error> {
    let match_patterns = serde_json::to_string(&data.match_patterns)?;

    let payee = connection
        .prepare(
            "INSERT INTO payee (name, match_patterns, default_category_id)
             VALUES (?1, ?2, ?3)
             RETURNING id, name, match_patterns, default_category_id",
        )?
        .query_row(
            (&data.name, &match_patterns, data.default_category_id),
            map_row_to_payee,
        )
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
                },
                _,
            ) => Error::DuplicatePayeeName(data.name.clone()),
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY,
                },
                _,
            ) => Error::InvalidCategory(data.default_category_id),
            error => error.into(),
        })?;

    Ok(payee)
}

/// Retrieve the payee with the ID `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid payee,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_payee(id: DatabaseID, connection: &Connection) -> Result<Payee, Error> {
    connection
        .prepare(
            "SELECT id, name, match_patterns, default_category_id FROM payee WHERE id = :id",
        )?
        .query_one(&[(":id", &id)], map_row_to_payee)
        .map_err(Error::from)
}

/// Retrieve all payees, ordered by ID.
///
/// The ID order is the order the matcher tries payees in, so re-running a
/// match always produces the same winner.
///
/// # Errors
/// Returns an [Error::SqlError] if there was an SQL error.
pub fn get_all_payees(connection: &Connection) -> Result<Vec<Payee>, Error> {
    connection
        .prepare("SELECT id, name, match_patterns, default_category_id FROM payee ORDER BY id")?
        .query_map([], map_row_to_payee)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(Error::from)
}

/// Replace the payee `id` with `data`.
///
/// # Errors
/// This function will return a:
/// - [Error::UpdateMissingPayee] if `id` does not refer to a valid payee,
/// - [Error::DuplicatePayeeName] if another payee is already named
///   `data.name`,
/// - [Error::InvalidCategory] if `data.default_category_id` does not refer to
///   a valid category,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn update_payee(
    id: DatabaseID,
    data: PayeeData,
    connection: &Connection,
) -> Result<Payee, Error> {
    let match_patterns = serde_json::to_string(&data.match_patterns)?;

    let rows_updated = connection
        .execute(
            "UPDATE payee
             SET name = :name, match_patterns = :match_patterns,
                 default_category_id = :default_category_id
             WHERE id = :id",
            named_params! {
                ":name": data.name,
                ":match_patterns": match_patterns,
                ":default_category_id": data.default_category_id,
                ":id": id,
            },
        )
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
                },
                _,
            ) => Error::DuplicatePayeeName(data.name.clone()),
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY,
                },
                _,
            ) => Error::InvalidCategory(data.default_category_id),
            error => error.into(),
        })?;

    if rows_updated == 0 {
        return Err(Error::UpdateMissingPayee);
    }

    get_payee(id, connection)
}

/// Delete the payee with the ID `id`, along with its recurring template if it
/// has one.
///
/// # Errors
/// This function will return a:
/// - [Error::DeleteMissingPayee] if `id` does not refer to a valid payee,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn delete_payee(id: DatabaseID, connection: &Connection) -> Result<(), Error> {
    crate::forecast::delete_templates_for_payee(id, connection)?;

    let rows_deleted = connection.execute("DELETE FROM payee WHERE id = ?1", (id,))?;

    if rows_deleted == 0 {
        return Err(Error::DeleteMissingPayee);
    }

    Ok(())
}

/// Convert a database row into a [Payee].
///
/// # Errors
/// Returns a [rusqlite::Error] if a column is missing, has an unexpected
/// type, or holds match patterns that are not valid JSON.
pub fn map_row_to_payee(row: &Row) -> Result<Payee, rusqlite::Error> {
    let id = row.get(0)?;
    let name = row.get(1)?;
    let raw_patterns: String = row.get(2)?;
    let match_patterns = serde_json::from_str(&raw_patterns).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(error))
    })?;
    let default_category_id = row.get(3)?;

    Ok(Payee {
        id,
        name,
        match_patterns,
        default_category_id,
    })
}

// ============================================================================
// TESTS
// ============================================================================
