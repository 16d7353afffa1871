//! Database initialisation for the application.

use rusqlite::{Connection, Transaction as SqlTransaction, TransactionBehavior};

use crate::{
    Error,
    account::create_account_table,
    category::create_category_table,
    forecast::{
        create_forecast_dismissal_table, create_recurring_template_table, purge_stale_dismissals,
    },
    import::create_import_profile_table,
    payee::create_payee_table,
    transaction::create_transaction_table,
};

/// Create the tables for the application's domain models.
///
/// Tables are only created if they do not already exist, so it is safe to
/// call this function on a book that has already been initialised.
///
/// Forecast dismissals from before the current month are purged on each call
/// since the forecasts they refer to are no longer shown.
///
/// # Errors
/// Returns an error if the tables cannot be created or if there is an SQL error.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    connection.pragma_update(None, "foreign_keys", true)?;

    let transaction = SqlTransaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_account_table(&transaction)?;
    create_category_table(&transaction)?;
    create_transaction_table(&transaction)?;
    create_payee_table(&transaction)?;
    create_import_profile_table(&transaction)?;
    create_recurring_template_table(&transaction)?;
    create_forecast_dismissal_table(&transaction)?;

    let today = chrono::Local::now().date_naive();
    let purged = purge_stale_dismissals(today, &transaction)?;
    if purged > 0 {
        tracing::debug!("Purged {purged} stale forecast dismissals");
    }

    transaction.commit()?;

    Ok(())
}

#[cfg(test)]
mod initialize_tests {
    use rusqlite::Connection;

    use crate::db::initialize;

    #[test]
    fn sql_is_valid() {
        let conn = Connection::open_in_memory().unwrap();

        let result = initialize(&conn);

        assert!(result.is_ok(), "could not initialize database: {result:?}");
    }

    #[test]
    fn initialize_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        let result = initialize(&conn);

        assert!(
            result.is_ok(),
            "could not initialize database twice: {result:?}"
        );
    }

    #[test]
    fn enables_foreign_keys() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        let enabled: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();

        assert_eq!(enabled, 1);
    }
}
