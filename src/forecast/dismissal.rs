//! Defines the database queries for forecast dismissals.
//!
//! A dismissal suppresses one projected forecast instance, keyed by payee,
//! account, and the first day of the forecast's month.

use std::collections::HashSet;

use chrono::NaiveDate;
use rusqlite::{Connection, named_params};

use crate::{Error, database_id::DatabaseID, forecast::projector::first_of_month};

/// Create the forecast dismissal table in the database.
///
/// # Errors
/// Returns an [Error::SqlError] if there was an SQL error.
pub fn create_forecast_dismissal_table(connection: &Connection) -> Result<(), Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS forecast_dismissal (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            payee_id INTEGER NOT NULL REFERENCES payee(id) ON UPDATE CASCADE ON DELETE CASCADE,
            account_id INTEGER NOT NULL REFERENCES account(id)
                ON UPDATE CASCADE
                ON DELETE CASCADE,
            period_date TEXT NOT NULL,
            UNIQUE (payee_id, account_id, period_date)
        )",
        (),
    )?;

    Ok(())
}

/// Record a dismissal for the payee's forecast in the month of `period_date`.
///
/// The period is normalised to the first day of its month. Returns whether a
/// new dismissal was recorded; dismissing the same period twice is not an
/// error.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `payee_id` or `account_id` is not in the book,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn dismiss_forecast(
    payee_id: DatabaseID,
    account_id: DatabaseID,
    period_date: NaiveDate,
    connection: &Connection,
) -> Result<bool, Error> {
    let rows_inserted = connection
        .execute(
            "INSERT INTO forecast_dismissal (payee_id, account_id, period_date)
             VALUES (:payee_id, :account_id, :period_date)
             ON CONFLICT (payee_id, account_id, period_date) DO NOTHING",
            named_params! {
                ":payee_id": payee_id,
                ":account_id": account_id,
                ":period_date": first_of_month(period_date),
            },
        )
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY,
                },
                _,
            ) => Error::NotFound,
            error => error.into(),
        })?;

    Ok(rows_inserted > 0)
}

/// The set of (payee id, period) pairs dismissed for `account_id` between the
/// months of `window_start` and `window_end` inclusive.
///
/// # Errors
/// Returns an [Error::SqlError] if there was an SQL error.
pub fn get_dismissed_periods(
    account_id: DatabaseID,
    window_start: NaiveDate,
    window_end: NaiveDate,
    connection: &Connection,
) -> Result<HashSet<(DatabaseID, NaiveDate)>, Error> {
    connection
        .prepare(
            "SELECT payee_id, period_date FROM forecast_dismissal
             WHERE account_id = :account_id
               AND period_date >= :first_period
               AND period_date <= :last_period",
        )?
        .query_map(
            named_params! {
                ":account_id": account_id,
                ":first_period": first_of_month(window_start),
                ":last_period": first_of_month(window_end),
            },
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?
        .collect::<Result<HashSet<_>, _>>()
        .map_err(Error::from)
}

/// Count the dismissals for the payee `payee_id` from the month of `today`
/// onward.
///
/// # Errors
/// Returns an [Error::SqlError] if there was an SQL error.
pub fn count_dismissals_since(
    payee_id: DatabaseID,
    today: NaiveDate,
    connection: &Connection,
) -> Result<usize, Error> {
    let count: i64 = connection
        .prepare(
            "SELECT COUNT(*) FROM forecast_dismissal
             WHERE payee_id = :payee_id AND period_date >= :first_period",
        )?
        .query_one(
            named_params! {
                ":payee_id": payee_id,
                ":first_period": first_of_month(today),
            },
            |row| row.get(0),
        )?;

    Ok(count as usize)
}

/// Delete every dismissal for the payee `payee_id`, returning how many were
/// deleted.
///
/// # Errors
/// Returns an [Error::SqlError] if there was an SQL error.
pub fn clear_dismissals(payee_id: DatabaseID, connection: &Connection) -> Result<usize, Error> {
    connection
        .execute(
            "DELETE FROM forecast_dismissal WHERE payee_id = ?1",
            (payee_id,),
        )
        .map_err(Error::from)
}

/// Delete dismissals for months before the month of `today`, returning how
/// many were deleted.
///
/// Past periods are never projected again, so their dismissals have nothing
/// left to suppress.
///
/// # Errors
/// Returns an [Error::SqlError] if there was an SQL error.
pub fn purge_stale_dismissals(today: NaiveDate, connection: &Connection) -> Result<usize, Error> {
    connection
        .execute(
            "DELETE FROM forecast_dismissal WHERE period_date < ?1",
            (first_of_month(today),),
        )
        .map_err(Error::from)
}

// ============================================================================
// TESTS
// ============================================================================
