//! Defines the core data model and database queries for accounts.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::{Error, database_id::DatabaseID, transfer::unlink_account_transfers};

// ============================================================================
// MODELS
// ============================================================================

/// A bank, credit or cash account that transactions belong to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// The ID of the account.
    pub id: DatabaseID,
    /// The display name of the account.
    pub name: String,
    /// What sort of account this is, e.g. "checking", "savings", "credit_card".
    pub kind: String,
    /// The bank or institution that holds the account.
    pub institution: Option<String>,
    /// Sort key used when listing accounts.
    pub display_order: i64,
}

/// The fields of an [Account] supplied by the client on create and update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountData {
    /// The display name of the account.
    pub name: String,
    /// What sort of account this is, e.g. "checking", "savings", "credit_card".
    pub kind: String,
    /// The bank or institution that holds the account.
    #[serde(default)]
    pub institution: Option<String>,
    /// Sort key used when listing accounts.
    #[serde(default)]
    pub display_order: i64,
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create the account table in the database.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn create_account_table(connection: &Connection) -> Result<(), Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS account (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            kind TEXT NOT NULL,
            institution TEXT,
            display_order INTEGER NOT NULL DEFAULT 0
        )",
        (),
    )?;

    Ok(())
}

/// Create a new account in the database.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn create_account(data: AccountData, connection: &Connection) -> Result<Account, Error> {
    let account = connection
        .prepare(
            "INSERT INTO account (name, kind, institution, display_order)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING id, name, kind, institution, display_order",
        )?
        .query_row(
            (&data.name, &data.kind, &data.institution, data.display_order),
            map_row_to_account,
        )?;

    Ok(account)
}

/// Retrieve an account by its ID.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a real account,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_account(id: DatabaseID, connection: &Connection) -> Result<Account, Error> {
    let account = connection
        .prepare(
            "SELECT id, name, kind, institution, display_order FROM account WHERE id = :id",
        )?
        .query_one(&[(":id", &id)], map_row_to_account)?;

    Ok(account)
}

/// Retrieve all accounts, ordered by display order and then name.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn get_all_accounts(connection: &Connection) -> Result<Vec<Account>, Error> {
    connection
        .prepare(
            "SELECT id, name, kind, institution, display_order
             FROM account
             ORDER BY display_order, name",
        )?
        .query_map([], map_row_to_account)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(Error::from)
}

/// Replace the stored fields of the account `id` with `data`.
///
/// # Errors
/// This function will return a:
/// - [Error::UpdateMissingAccount] if `id` does not refer to a real account,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn update_account(
    id: DatabaseID,
    data: AccountData,
    connection: &Connection,
) -> Result<Account, Error> {
    let rows_updated = connection.execute(
        "UPDATE account SET name = ?1, kind = ?2, institution = ?3, display_order = ?4
         WHERE id = ?5",
        (&data.name, &data.kind, &data.institution, data.display_order, id),
    )?;

    if rows_updated == 0 {
        return Err(Error::UpdateMissingAccount);
    }

    get_account(id, connection)
}

/// Delete the account `id` along with its transactions, import profile,
/// recurring templates and dismissals.
///
/// Transfer links that cross the account boundary are nulled out first so the
/// surviving half in another account is not left pointing at a deleted row.
///
/// **Note**: Callers that need all-or-nothing behaviour should pass in a
/// transaction for `connection`.
///
/// # Errors
/// This function will return a:
/// - [Error::DeleteMissingAccount] if `id` does not refer to a real account,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn delete_account(id: DatabaseID, connection: &Connection) -> Result<(), Error> {
    unlink_account_transfers(id, connection)?;

    let rows_deleted = connection.execute("DELETE FROM account WHERE id = ?1", (id,))?;

    if rows_deleted == 0 {
        return Err(Error::DeleteMissingAccount);
    }

    Ok(())
}

/// Convert a database row into an [Account].
///
/// # Errors
/// Returns a [rusqlite::Error] if a column is missing or holds an unexpected type.
pub fn map_row_to_account(row: &Row) -> Result<Account, rusqlite::Error> {
    let id = row.get(0)?;
    let name = row.get(1)?;
    let kind = row.get(2)?;
    let institution = row.get(3)?;
    let display_order = row.get(4)?;

    Ok(Account {
        id,
        name,
        kind,
        institution,
        display_order,
    })
}

// ============================================================================
// TESTS
// ============================================================================
