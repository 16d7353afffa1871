//! Defines the core data model and database queries for transactions.
//!
//! Amounts are stored as signed integer cents: negative amounts are money
//! leaving the account, positive amounts are money coming in. No row ever
//! stores a fractional cent.

use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::{Connection, Row, named_params, params};
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    database_id::{DatabaseID, TransactionID},
};

// ============================================================================
// MODELS
// ============================================================================

/// What a transaction row represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// A real posted transaction.
    Actual,
    /// A projected row synthesized from a recurring template, never persisted.
    Forecast,
    /// A manual correction aligning the ledger with a statement balance.
    BalanceAdjustment,
    /// One side of a linked transfer pair.
    Transfer,
}

impl TransactionKind {
    /// The text stored in the database for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Actual => "actual",
            Self::Forecast => "forecast",
            Self::BalanceAdjustment => "balance_adjustment",
            Self::Transfer => "transfer",
        }
    }
}

impl Default for TransactionKind {
    fn default() -> Self {
        Self::Actual
    }
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text {
            "actual" => Ok(Self::Actual),
            "forecast" => Ok(Self::Forecast),
            "balance_adjustment" => Ok(Self::BalanceAdjustment),
            "transfer" => Ok(Self::Transfer),
            _ => Err(format!("unknown transaction kind '{text}'")),
        }
    }
}

/// How a transaction row came into existence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionSource {
    /// Entered by hand.
    Manual,
    /// Imported from a CSV bank export.
    ImportCsv,
    /// Imported from an OFX/QFX bank export.
    ImportQfx,
    /// Created by the system, e.g. the mirrored half of a converted transfer.
    System,
}

impl TransactionSource {
    /// The text stored in the database for this source.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::ImportCsv => "import_csv",
            Self::ImportQfx => "import_qfx",
            Self::System => "system",
        }
    }
}

impl Default for TransactionSource {
    fn default() -> Self {
        Self::Manual
    }
}

impl FromStr for TransactionSource {
    type Err = String;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text {
            "manual" => Ok(Self::Manual),
            "import_csv" => Ok(Self::ImportCsv),
            "import_qfx" => Ok(Self::ImportQfx),
            "system" => Ok(Self::System),
            _ => Err(format!("unknown transaction source '{text}'")),
        }
    }
}

/// A single row in an account's ledger.
///
/// To create a new `Transaction`, use [Transaction::build].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionID,
    /// The ID of the account the transaction belongs to.
    pub account_id: DatabaseID,
    /// The date the transaction posted to the account.
    pub posted_date: NaiveDate,
    /// The amount in integer cents. Negative = outflow.
    pub amount_cents: i64,
    /// The payee text exactly as it appeared in the source file.
    pub payee_raw: Option<String>,
    /// A cleaned-up payee label set by the system, e.g. transfer labels.
    pub payee_normalized: Option<String>,
    /// The canonical payee name assigned by the payee matcher.
    pub display_name: Option<String>,
    /// The memo text from the source file or the user.
    pub memo: Option<String>,
    /// Free-form user notes.
    pub notes: Option<String>,
    /// The ID of the category the transaction is assigned to.
    pub category_id: Option<DatabaseID>,
    /// What this row represents.
    pub kind: TransactionKind,
    /// How this row came into existence.
    pub source: TransactionSource,
    /// The batch token of the import that created this row.
    pub import_batch_id: Option<String>,
    /// The bank-assigned transaction ID (e.g. an OFX FITID).
    pub external_id: Option<String>,
    /// The ID of the other side of a transfer pair.
    pub transfer_link_id: Option<TransactionID>,
    /// The recurring template this row was confirmed from.
    pub recurring_template_id: Option<DatabaseID>,
    /// Whether the transaction has been reconciled against a statement.
    pub is_cleared: bool,
}

impl Transaction {
    /// Create a new transaction.
    ///
    /// Shortcut for [TransactionBuilder] for discoverability.
    pub fn build(
        account_id: DatabaseID,
        posted_date: NaiveDate,
        amount_cents: i64,
    ) -> TransactionBuilder {
        TransactionBuilder {
            account_id,
            posted_date,
            amount_cents,
            payee_raw: None,
            payee_normalized: None,
            memo: None,
            notes: None,
            category_id: None,
            kind: TransactionKind::Actual,
            source: TransactionSource::Manual,
            import_batch_id: None,
            external_id: None,
            transfer_link_id: None,
            is_cleared: false,
        }
    }
}

/// A builder for creating [Transaction] instances.
///
/// Optional fields default to absent, the kind to [TransactionKind::Actual]
/// and the source to [TransactionSource::Manual]. Pass the finished builder to
/// [create_transaction] to persist it.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionBuilder {
    account_id: DatabaseID,
    posted_date: NaiveDate,
    amount_cents: i64,
    payee_raw: Option<String>,
    payee_normalized: Option<String>,
    memo: Option<String>,
    notes: Option<String>,
    category_id: Option<DatabaseID>,
    kind: TransactionKind,
    source: TransactionSource,
    import_batch_id: Option<String>,
    external_id: Option<String>,
    transfer_link_id: Option<TransactionID>,
    is_cleared: bool,
}

impl TransactionBuilder {
    /// Set the raw payee text from the source file.
    pub fn payee_raw(mut self, payee_raw: Option<String>) -> Self {
        self.payee_raw = payee_raw;
        self
    }

    /// Set the system-assigned payee label.
    pub fn payee_normalized(mut self, payee_normalized: Option<String>) -> Self {
        self.payee_normalized = payee_normalized;
        self
    }

    /// Set the memo text.
    pub fn memo(mut self, memo: Option<String>) -> Self {
        self.memo = memo;
        self
    }

    /// Set the user notes.
    pub fn notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }

    /// Set the category.
    pub fn category_id(mut self, category_id: Option<DatabaseID>) -> Self {
        self.category_id = category_id;
        self
    }

    /// Set what this row represents.
    pub fn kind(mut self, kind: TransactionKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set how this row came into existence.
    pub fn source(mut self, source: TransactionSource) -> Self {
        self.source = source;
        self
    }

    /// Set the import batch token.
    pub fn import_batch_id(mut self, import_batch_id: Option<String>) -> Self {
        self.import_batch_id = import_batch_id;
        self
    }

    /// Set the bank-assigned transaction ID.
    pub fn external_id(mut self, external_id: Option<String>) -> Self {
        self.external_id = external_id;
        self
    }

    /// Set the other side of a transfer pair.
    pub fn transfer_link_id(mut self, transfer_link_id: Option<TransactionID>) -> Self {
        self.transfer_link_id = transfer_link_id;
        self
    }

    /// Set whether the transaction has been reconciled.
    pub fn is_cleared(mut self, is_cleared: bool) -> Self {
        self.is_cleared = is_cleared;
        self
    }
}

/// The fields of a [Transaction] that the client may replace on update.
///
/// Transfer bookkeeping fields (kind, source, link, batch and external IDs)
/// are owned by the system and cannot be edited directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateTransaction {
    /// The date the transaction posted to the account.
    pub posted_date: NaiveDate,
    /// The amount in integer cents. Negative = outflow.
    pub amount_cents: i64,
    /// The payee text exactly as it appeared in the source file.
    #[serde(default)]
    pub payee_raw: Option<String>,
    /// The memo text.
    #[serde(default)]
    pub memo: Option<String>,
    /// Free-form user notes.
    #[serde(default)]
    pub notes: Option<String>,
    /// The ID of the category the transaction is assigned to.
    #[serde(default)]
    pub category_id: Option<DatabaseID>,
    /// Whether the transaction has been reconciled against a statement.
    #[serde(default)]
    pub is_cleared: bool,
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// The transaction columns in the order [map_row_to_transaction] expects.
pub const TRANSACTION_COLUMNS: &str = "id, account_id, posted_date, amount_cents, payee_raw, \
     payee_normalized, display_name, memo, notes, category_id, kind, source, import_batch_id, \
     external_id, transfer_link_id, recurring_template_id, is_cleared";

/// Create the transaction table in the database.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            account_id INTEGER NOT NULL REFERENCES account (id) ON DELETE CASCADE,
            posted_date TEXT NOT NULL,
            amount_cents INTEGER NOT NULL,
            payee_raw TEXT,
            payee_normalized TEXT,
            display_name TEXT,
            memo TEXT,
            notes TEXT,
            category_id INTEGER REFERENCES category (id) ON DELETE SET NULL,
            kind TEXT NOT NULL DEFAULT 'actual',
            source TEXT NOT NULL DEFAULT 'manual',
            import_batch_id TEXT,
            external_id TEXT,
            transfer_link_id INTEGER REFERENCES \"transaction\" (id) ON DELETE SET NULL,
            recurring_template_id INTEGER REFERENCES recurring_template (id) ON DELETE SET NULL,
            is_cleared INTEGER NOT NULL DEFAULT 0
        )",
        (),
    )?;

    // Ensure the table has an entry in sqlite_sequence so that concurrent
    // inserts always draw monotonically increasing IDs.
    connection.execute(
        "INSERT OR IGNORE INTO sqlite_sequence (name, seq) VALUES ('transaction', 0)",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_account_date
         ON \"transaction\" (account_id, posted_date)",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_batch
         ON \"transaction\" (import_batch_id)",
        (),
    )?;

    Ok(())
}

/// Create a new transaction in the database from a builder.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidCategory] if the builder's category ID does not refer to a real category,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_transaction(
    builder: TransactionBuilder,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(&format!(
            "INSERT INTO \"transaction\" (account_id, posted_date, amount_cents, payee_raw,
                 payee_normalized, memo, notes, category_id, kind, source, import_batch_id,
                 external_id, transfer_link_id, is_cleared)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
             RETURNING {TRANSACTION_COLUMNS}"
        ))?
        .query_row(
            params![
                builder.account_id,
                builder.posted_date,
                builder.amount_cents,
                builder.payee_raw,
                builder.payee_normalized,
                builder.memo,
                builder.notes,
                builder.category_id,
                builder.kind.as_str(),
                builder.source.as_str(),
                builder.import_batch_id,
                builder.external_id,
                builder.transfer_link_id,
                builder.is_cleared,
            ],
            map_row_to_transaction,
        )
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY,
                },
                _,
            ) => Error::InvalidCategory(builder.category_id),
            error => error.into(),
        })?;

    Ok(transaction)
}

/// Retrieve a transaction by its ID.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a real transaction,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_transaction(id: TransactionID, connection: &Connection) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" WHERE id = :id"
        ))?
        .query_one(&[(":id", &id)], map_row_to_transaction)?;

    Ok(transaction)
}

/// Retrieve transactions, optionally filtered by account and month.
///
/// The year/month filter only applies when both parts are given. Results are
/// ordered by posted date and then ID, so rows within a day keep insertion
/// order.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn list_transactions(
    account_id: Option<DatabaseID>,
    year: Option<i32>,
    month: Option<u32>,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\"
             WHERE (:account_id IS NULL OR account_id = :account_id)
               AND (:year IS NULL OR :month IS NULL
                    OR (CAST(strftime('%Y', posted_date) AS INTEGER) = :year
                        AND CAST(strftime('%m', posted_date) AS INTEGER) = :month))
             ORDER BY posted_date, id"
        ))?
        .query_map(
            named_params! {
                ":account_id": account_id,
                ":year": year,
                ":month": month,
            },
            map_row_to_transaction,
        )?
        .collect::<Result<Vec<_>, _>>()
        .map_err(Error::from)
}

/// Replace the editable fields of the transaction `id` with `data`.
///
/// Callers are responsible for mirroring edits onto the other side of a
/// transfer pair before calling this.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidCategory] if `data.category_id` does not refer to a real category,
/// - [Error::UpdateMissingTransaction] if `id` does not refer to a real transaction,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn update_transaction(
    id: TransactionID,
    data: UpdateTransaction,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let rows_updated = connection
        .execute(
            "UPDATE \"transaction\"
             SET posted_date = ?1, amount_cents = ?2, payee_raw = ?3, memo = ?4, notes = ?5,
                 category_id = ?6, is_cleared = ?7
             WHERE id = ?8",
            params![
                data.posted_date,
                data.amount_cents,
                data.payee_raw,
                data.memo,
                data.notes,
                data.category_id,
                data.is_cleared,
                id,
            ],
        )
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY,
                },
                _,
            ) => Error::InvalidCategory(data.category_id),
            error => error.into(),
        })?;

    if rows_updated == 0 {
        return Err(Error::UpdateMissingTransaction);
    }

    get_transaction(id, connection)
}

/// Delete the transaction `id`.
///
/// Callers must handle transfer pairs themselves: deleting one side of a
/// linked pair through this function leaves the other side in place.
///
/// # Errors
/// This function will return a:
/// - [Error::DeleteMissingTransaction] if `id` does not refer to a real transaction,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn delete_transaction(id: TransactionID, connection: &Connection) -> Result<(), Error> {
    let rows_deleted = connection.execute("DELETE FROM \"transaction\" WHERE id = ?1", (id,))?;

    if rows_deleted == 0 {
        return Err(Error::DeleteMissingTransaction);
    }

    Ok(())
}

/// Count all transactions in the database.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn count_transactions(connection: &Connection) -> Result<usize, Error> {
    let count: i64 = connection
        .prepare("SELECT COUNT(id) FROM \"transaction\"")?
        .query_one([], |row| row.get(0))?;

    Ok(count as usize)
}

/// Retrieve the most recent actual or transfer transaction whose display name
/// is `display_name`, or `None` if the payee has no history.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn get_latest_transaction_by_display_name(
    display_name: &str,
    connection: &Connection,
) -> Result<Option<Transaction>, Error> {
    connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\"
             WHERE display_name = :display_name AND kind IN ('actual', 'transfer')
             ORDER BY posted_date DESC, id DESC
             LIMIT 1"
        ))?
        .query_row(
            &[(":display_name", &display_name)],
            map_row_to_transaction,
        )
        .map(Some)
        .or_else(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            error => Err(error.into()),
        })
}

/// Retrieve the amounts of the most recent transactions whose display name is
/// `display_name`, newest first, across all accounts.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn get_recent_amount_cents(
    display_name: &str,
    limit: u32,
    connection: &Connection,
) -> Result<Vec<i64>, Error> {
    connection
        .prepare(
            "SELECT amount_cents FROM \"transaction\"
             WHERE display_name = :display_name
             ORDER BY posted_date DESC, id DESC
             LIMIT :limit",
        )?
        .query_map(
            named_params! { ":display_name": display_name, ":limit": limit },
            |row| row.get(0),
        )?
        .collect::<Result<Vec<_>, _>>()
        .map_err(Error::from)
}

/// Convert a database row into a [Transaction].
///
/// # Errors
/// Returns a [rusqlite::Error] if a column is missing or holds an unexpected type.
pub fn map_row_to_transaction(row: &Row) -> Result<Transaction, rusqlite::Error> {
    let kind_text: String = row.get(10)?;
    let kind = kind_text.parse().map_err(|error: String| {
        rusqlite::Error::FromSqlConversionFailure(10, rusqlite::types::Type::Text, error.into())
    })?;

    let source_text: String = row.get(11)?;
    let source = source_text.parse().map_err(|error: String| {
        rusqlite::Error::FromSqlConversionFailure(11, rusqlite::types::Type::Text, error.into())
    })?;

    Ok(Transaction {
        id: row.get(0)?,
        account_id: row.get(1)?,
        posted_date: row.get(2)?,
        amount_cents: row.get(3)?,
        payee_raw: row.get(4)?,
        payee_normalized: row.get(5)?,
        display_name: row.get(6)?,
        memo: row.get(7)?,
        notes: row.get(8)?,
        category_id: row.get(9)?,
        kind,
        source,
        import_batch_id: row.get(12)?,
        external_id: row.get(13)?,
        transfer_link_id: row.get(14)?,
        recurring_template_id: row.get(15)?,
        is_cleared: row.get(16)?,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod database_tests {
    use chrono::NaiveDate;
    use rusqlite::Connection;

    use crate::{
        Error,
        account::{AccountData, create_account},
        db::initialize,
        transaction::{
            Transaction, TransactionKind, TransactionSource, UpdateTransaction,
            count_transactions, create_transaction, delete_transaction,
            get_latest_transaction_by_display_name, get_recent_amount_cents, get_transaction,
            list_transactions, update_transaction,
        },
    };

    fn get_test_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn
    }

    fn create_test_account(conn: &Connection) -> i64 {
        create_account(
            AccountData {
                name: "Checking".to_owned(),
                kind: "checking".to_owned(),
                institution: None,
                display_order: 0,
            },
            conn,
        )
        .expect("Could not create account")
        .id
    }

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn create_succeeds_with_defaults() {
        let conn = get_test_connection();
        let account_id = create_test_account(&conn);

        let result = create_transaction(
            Transaction::build(account_id, date(2025, 1, 15), -4250),
            &conn,
        );

        match result {
            Ok(transaction) => {
                assert!(transaction.id > 0);
                assert_eq!(transaction.amount_cents, -4250);
                assert_eq!(transaction.kind, TransactionKind::Actual);
                assert_eq!(transaction.source, TransactionSource::Manual);
                assert!(!transaction.is_cleared);
            }
            Err(error) => panic!("Unexpected error: {error}"),
        }
    }

    #[test]
    fn create_round_trips_all_fields() {
        let conn = get_test_connection();
        let account_id = create_test_account(&conn);
        let builder = Transaction::build(account_id, date(2025, 1, 15), -4250)
            .payee_raw(Some("COFFEE SHOP #42".to_owned()))
            .memo(Some("flat white".to_owned()))
            .notes(Some("client meeting".to_owned()))
            .source(TransactionSource::ImportCsv)
            .import_batch_id(Some("ab12cd34".to_owned()))
            .external_id(Some("FITID-1".to_owned()))
            .is_cleared(true);

        let created = create_transaction(builder, &conn).expect("Could not create transaction");

        let got = get_transaction(created.id, &conn).expect("Could not get transaction");
        assert_eq!(created, got);
        assert_eq!(got.payee_raw.as_deref(), Some("COFFEE SHOP #42"));
        assert_eq!(got.source, TransactionSource::ImportCsv);
        assert!(got.is_cleared);
    }

    #[test]
    fn create_fails_on_invalid_category() {
        let conn = get_test_connection();
        let account_id = create_test_account(&conn);
        let category_id = Some(42);

        let result = create_transaction(
            Transaction::build(account_id, date(2025, 1, 15), -4250).category_id(category_id),
            &conn,
        );

        assert_eq!(result, Err(Error::InvalidCategory(category_id)));
    }

    #[test]
    fn get_fails_on_missing_transaction() {
        let conn = get_test_connection();

        let result = get_transaction(999, &conn);

        assert_eq!(result, Err(Error::NotFound));
    }

    #[test]
    fn list_filters_by_account() {
        let conn = get_test_connection();
        let account_id = create_test_account(&conn);
        let other_account_id = create_test_account(&conn);
        for _ in 0..3 {
            create_transaction(Transaction::build(account_id, date(2025, 1, 15), -100), &conn)
                .expect("Could not create transaction");
        }
        create_transaction(
            Transaction::build(other_account_id, date(2025, 1, 15), -100),
            &conn,
        )
        .expect("Could not create transaction");

        let transactions = list_transactions(Some(account_id), None, None, &conn)
            .expect("Could not list transactions");

        assert_eq!(3, transactions.len());
        assert!(
            transactions
                .iter()
                .all(|transaction| transaction.account_id == account_id)
        );
    }

    #[test]
    fn list_filters_by_month_only_when_year_and_month_given() {
        let conn = get_test_connection();
        let account_id = create_test_account(&conn);
        create_transaction(Transaction::build(account_id, date(2025, 1, 15), -100), &conn)
            .expect("Could not create transaction");
        create_transaction(Transaction::build(account_id, date(2025, 2, 15), -200), &conn)
            .expect("Could not create transaction");

        let january = list_transactions(Some(account_id), Some(2025), Some(1), &conn)
            .expect("Could not list transactions");
        let year_only = list_transactions(Some(account_id), Some(2025), None, &conn)
            .expect("Could not list transactions");

        assert_eq!(1, january.len());
        assert_eq!(january[0].amount_cents, -100);
        assert_eq!(2, year_only.len());
    }

    #[test]
    fn list_orders_by_date_then_id() {
        let conn = get_test_connection();
        let account_id = create_test_account(&conn);
        let later = create_transaction(
            Transaction::build(account_id, date(2025, 3, 2), -300),
            &conn,
        )
        .expect("Could not create transaction");
        let earlier = create_transaction(
            Transaction::build(account_id, date(2025, 3, 1), -100),
            &conn,
        )
        .expect("Could not create transaction");
        let same_day = create_transaction(
            Transaction::build(account_id, date(2025, 3, 2), -200),
            &conn,
        )
        .expect("Could not create transaction");

        let transactions =
            list_transactions(None, None, None, &conn).expect("Could not list transactions");

        let want = vec![earlier.id, later.id, same_day.id];
        let got: Vec<i64> = transactions
            .iter()
            .map(|transaction| transaction.id)
            .collect();
        assert_eq!(want, got);
    }

    #[test]
    fn update_replaces_editable_fields() {
        let conn = get_test_connection();
        let account_id = create_test_account(&conn);
        let transaction = create_transaction(
            Transaction::build(account_id, date(2025, 1, 15), -4250)
                .payee_raw(Some("OLD".to_owned())),
            &conn,
        )
        .expect("Could not create transaction");

        let updated = update_transaction(
            transaction.id,
            UpdateTransaction {
                posted_date: date(2025, 1, 16),
                amount_cents: -5000,
                payee_raw: Some("NEW".to_owned()),
                memo: None,
                notes: Some("edited".to_owned()),
                category_id: None,
                is_cleared: true,
            },
            &conn,
        )
        .expect("Could not update transaction");

        assert_eq!(updated.posted_date, date(2025, 1, 16));
        assert_eq!(updated.amount_cents, -5000);
        assert_eq!(updated.payee_raw.as_deref(), Some("NEW"));
        assert_eq!(updated.notes.as_deref(), Some("edited"));
        assert!(updated.is_cleared);
    }

    #[test]
    fn update_fails_on_missing_transaction() {
        let conn = get_test_connection();

        let result = update_transaction(
            999,
            UpdateTransaction {
                posted_date: date(2025, 1, 16),
                amount_cents: -5000,
                payee_raw: None,
                memo: None,
                notes: None,
                category_id: None,
                is_cleared: false,
            },
            &conn,
        );

        assert_eq!(result, Err(Error::UpdateMissingTransaction));
    }

    #[test]
    fn delete_removes_transaction() {
        let conn = get_test_connection();
        let account_id = create_test_account(&conn);
        let transaction =
            create_transaction(Transaction::build(account_id, date(2025, 1, 15), -100), &conn)
                .expect("Could not create transaction");

        delete_transaction(transaction.id, &conn).expect("Could not delete transaction");

        assert_eq!(get_transaction(transaction.id, &conn), Err(Error::NotFound));
    }

    #[test]
    fn delete_fails_on_missing_transaction() {
        let conn = get_test_connection();

        let result = delete_transaction(999, &conn);

        assert_eq!(result, Err(Error::DeleteMissingTransaction));
    }

    #[test]
    fn get_count() {
        let conn = get_test_connection();
        let account_id = create_test_account(&conn);
        let want_count = 5;
        for i in 1..=want_count {
            create_transaction(
                Transaction::build(account_id, date(2025, 1, 15), -(i as i64)),
                &conn,
            )
            .expect("Could not create transaction");
        }

        let got_count = count_transactions(&conn).expect("Could not get count");

        assert_eq!(want_count, got_count);
    }

    #[test]
    fn latest_by_display_name_prefers_newest() {
        let conn = get_test_connection();
        let account_id = create_test_account(&conn);
        for (day, cents) in [(1, -1000), (20, -3000), (10, -2000)] {
            let transaction = create_transaction(
                Transaction::build(account_id, date(2025, 1, day), cents)
                    .payee_raw(Some("NETFLIX.COM".to_owned())),
                &conn,
            )
            .expect("Could not create transaction");
            conn.execute(
                "UPDATE \"transaction\" SET display_name = 'Netflix' WHERE id = ?1",
                (transaction.id,),
            )
            .unwrap();
        }

        let latest = get_latest_transaction_by_display_name("Netflix", &conn)
            .expect("Could not get latest transaction")
            .expect("Expected a transaction");

        assert_eq!(latest.posted_date, date(2025, 1, 20));
        assert_eq!(latest.amount_cents, -3000);
    }

    #[test]
    fn latest_by_display_name_returns_none_without_history() {
        let conn = get_test_connection();

        let result = get_latest_transaction_by_display_name("Nobody", &conn)
            .expect("Could not get latest transaction");

        assert_eq!(None, result);
    }

    #[test]
    fn recent_amounts_are_newest_first_and_limited() {
        let conn = get_test_connection();
        let account_id = create_test_account(&conn);
        for (day, cents) in [(1, -1000), (2, -2000), (3, -3000), (4, -4000)] {
            let transaction = create_transaction(
                Transaction::build(account_id, date(2025, 1, day), cents),
                &conn,
            )
            .expect("Could not create transaction");
            conn.execute(
                "UPDATE \"transaction\" SET display_name = 'Power Co' WHERE id = ?1",
                (transaction.id,),
            )
            .unwrap();
        }

        let amounts =
            get_recent_amount_cents("Power Co", 3, &conn).expect("Could not get amounts");

        assert_eq!(vec![-4000, -3000, -2000], amounts);
    }
}
