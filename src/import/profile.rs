//! Defines the core data model and database queries for import profiles.
//!
//! A profile remembers how one account's statement exports are laid out so
//! the next upload with the same header row parses without any manual
//! mapping. Each account keeps at most one profile; saving again replaces it.

use rusqlite::{Connection, Row, named_params, params};
use serde::{Deserialize, Serialize};

use crate::{
    DatabaseID, Error,
    import::csv::{AmountConfig, ColumnMapping, CsvParseConfig},
};

// ============================================================================
// MODELS
// ============================================================================

/// A saved statement layout for an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportProfile {
    /// The ID of the profile.
    pub id: DatabaseID,
    /// The ID of the account the profile belongs to.
    pub account_id: DatabaseID,
    /// A user-facing label, e.g. the bank's name.
    pub name: String,
    /// The header signature the profile is matched by.
    pub header_signature: String,
    /// Where each field lives in a row.
    pub column_mapping: ColumnMapping,
    /// How the signed amount is derived.
    pub amount_config: AmountConfig,
    /// An explicit strftime date format, or None to auto-detect.
    pub date_format: Option<String>,
    /// The field delimiter.
    pub delimiter: String,
    /// Physical lines to drop before the header row.
    pub skip_rows: usize,
    /// Whether the first row names the columns.
    pub has_header: bool,
}

/// The data for creating or replacing an account's import profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportProfileData {
    /// The ID of the account the profile belongs to.
    pub account_id: DatabaseID,
    /// A user-facing label, e.g. the bank's name.
    pub name: String,
    /// The header signature the profile is matched by.
    pub header_signature: String,
    /// Where each field lives in a row.
    pub column_mapping: ColumnMapping,
    /// How the signed amount is derived.
    pub amount_config: AmountConfig,
    /// An explicit strftime date format, or None to auto-detect.
    #[serde(default)]
    pub date_format: Option<String>,
    /// The field delimiter.
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    /// Physical lines to drop before the header row.
    #[serde(default)]
    pub skip_rows: usize,
    /// Whether the first row names the columns.
    #[serde(default = "default_has_header")]
    pub has_header: bool,
}

fn default_delimiter() -> String {
    ",".to_owned()
}

fn default_has_header() -> bool {
    true
}

impl From<&ImportProfile> for CsvParseConfig {
    fn from(profile: &ImportProfile) -> Self {
        Self {
            delimiter: profile.delimiter.clone(),
            has_header: profile.has_header,
            skip_rows: profile.skip_rows,
            column_mapping: Some(profile.column_mapping.clone()),
            amount_config: Some(profile.amount_config.clone()),
            date_format: profile.date_format.clone(),
        }
    }
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

const PROFILE_COLUMNS: &str = "id, account_id, name, header_signature, column_mapping, \
     amount_config, date_format, delimiter, skip_rows, has_header";

/// Create the import profile table in the database.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn create_import_profile_table(connection: &Connection) -> Result<(), Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS import_profile (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            account_id INTEGER NOT NULL UNIQUE REFERENCES account (id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            header_signature TEXT NOT NULL,
            column_mapping TEXT NOT NULL,
            amount_config TEXT NOT NULL,
            date_format TEXT,
            delimiter TEXT NOT NULL DEFAULT ',',
            skip_rows INTEGER NOT NULL DEFAULT 0,
            has_header INTEGER NOT NULL DEFAULT 1
        )",
        (),
    )?;

    Ok(())
}

/// Create or replace the import profile for an account.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if the account ID does not refer to a real account,
/// - [Error::JSONSerializationError] if the mapping cannot be serialized,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn upsert_profile(
    data: ImportProfileData,
    connection: &Connection,
) -> Result<ImportProfile, Error> {
    let column_mapping = serde_json::to_string(&data.column_mapping)?;
    let amount_config = serde_json::to_string(&data.amount_config)?;

    let profile = connection
        .prepare(&format!(
            "INSERT INTO import_profile (account_id, name, header_signature, column_mapping,
                 amount_config, date_format, delimiter, skip_rows, has_header)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT (account_id) DO UPDATE SET
                 name = excluded.name,
                 header_signature = excluded.header_signature,
                 column_mapping = excluded.column_mapping,
                 amount_config = excluded.amount_config,
                 date_format = excluded.date_format,
                 delimiter = excluded.delimiter,
                 skip_rows = excluded.skip_rows,
                 has_header = excluded.has_header
             RETURNING {PROFILE_COLUMNS}"
        ))?
        .query_row(
            params![
                data.account_id,
                data.name,
                data.header_signature,
                column_mapping,
                amount_config,
                data.date_format,
                data.delimiter,
                data.skip_rows as i64,
                data.has_header,
            ],
            map_row_to_profile,
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

    Ok(profile)
}

/// Retrieve the import profiles saved for an account.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn get_profiles_for_account(
    account_id: DatabaseID,
    connection: &Connection,
) -> Result<Vec<ImportProfile>, Error> {
    connection
        .prepare(&format!(
            "SELECT {PROFILE_COLUMNS} FROM import_profile WHERE account_id = :account_id
             ORDER BY id"
        ))?
        .query_map(&[(":account_id", &account_id)], map_row_to_profile)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(Error::from)
}

/// Find the profile whose saved header signature exactly matches `header_signature`.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn find_matching_profile(
    account_id: DatabaseID,
    header_signature: &str,
    connection: &Connection,
) -> Result<Option<ImportProfile>, Error> {
    connection
        .prepare(&format!(
            "SELECT {PROFILE_COLUMNS} FROM import_profile
             WHERE account_id = :account_id AND header_signature = :header_signature"
        ))?
        .query_one(
            named_params! {
                ":account_id": account_id,
                ":header_signature": header_signature,
            },
            map_row_to_profile,
        )
        .map(Some)
        .or_else(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            error => Err(error.into()),
        })
}

fn map_row_to_profile(row: &Row) -> Result<ImportProfile, rusqlite::Error> {
    let column_mapping_text: String = row.get(4)?;
    let column_mapping = serde_json::from_str(&column_mapping_text).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, error.into())
    })?;

    let amount_config_text: String = row.get(5)?;
    let amount_config = serde_json::from_str(&amount_config_text).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, error.into())
    })?;

    Ok(ImportProfile {
        id: row.get(0)?,
        account_id: row.get(1)?,
        name: row.get(2)?,
        header_signature: row.get(3)?,
        column_mapping,
        amount_config,
        date_format: row.get(6)?,
        delimiter: row.get(7)?,
        skip_rows: row.get::<_, i64>(8)? as usize,
        has_header: row.get(9)?,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod database_tests {
    use rusqlite::Connection;

    use crate::{
        Error,
        account::{AccountData, create_account},
        db::initialize,
        import::{
            csv::{AmountConfig, ColumnMapping},
            profile::{
                ImportProfileData, find_matching_profile, get_profiles_for_account, upsert_profile,
            },
        },
    };

    fn get_test_connection() -> Connection {
        let connection =
            Connection::open_in_memory().expect("Could not open database in memory.");
        initialize(&connection).expect("Could not initialize database.");

        connection
    }

    fn seed_account(connection: &Connection, name: &str) -> crate::account::Account {
        create_account(
            AccountData {
                name: name.to_owned(),
                kind: "checking".to_owned(),
                institution: None,
                display_order: 0,
            },
            connection,
        )
        .expect("Could not create account")
    }

    fn profile_data(account_id: crate::DatabaseID, name: &str) -> ImportProfileData {
        ImportProfileData {
            account_id,
            name: name.to_owned(),
            header_signature: "a1b2c3d4e5f60718".to_owned(),
            column_mapping: ColumnMapping {
                date: 0,
                payee: Some(2),
                memo: None,
                amount: Some(1),
            },
            amount_config: AmountConfig::Single {
                column: 1,
                negate: false,
            },
            date_format: Some("%m/%d/%Y".to_owned()),
            delimiter: ",".to_owned(),
            skip_rows: 0,
            has_header: true,
        }
    }

    #[test]
    fn upsert_creates_profile_for_account() {
        let connection = get_test_connection();
        let account = seed_account(&connection, "Everyday Checking");

        let profile = upsert_profile(profile_data(account.id, "ASB export"), &connection)
            .expect("Could not create profile");

        assert_eq!(profile.account_id, account.id);
        assert_eq!(profile.name, "ASB export");
        assert_eq!(profile.date_format.as_deref(), Some("%m/%d/%Y"));
        assert_eq!(
            profile.amount_config,
            AmountConfig::Single {
                column: 1,
                negate: false,
            }
        );
    }

    #[test]
    fn upsert_replaces_existing_profile_in_place() {
        let connection = get_test_connection();
        let account = seed_account(&connection, "Everyday Checking");
        let first = upsert_profile(profile_data(account.id, "ASB export"), &connection)
            .expect("Could not create profile");

        let mut replacement = profile_data(account.id, "ASB export v2");
        replacement.header_signature = "ffffffffffffffff".to_owned();
        replacement.amount_config = AmountConfig::Split {
            debit_column: 2,
            credit_column: 3,
        };
        let second =
            upsert_profile(replacement, &connection).expect("Could not replace profile");

        assert_eq!(second.id, first.id);
        assert_eq!(second.name, "ASB export v2");
        assert_eq!(second.header_signature, "ffffffffffffffff");

        let profiles = get_profiles_for_account(account.id, &connection)
            .expect("Could not list profiles");
        assert_eq!(profiles, vec![second]);
    }

    #[test]
    fn upsert_fails_on_missing_account() {
        let connection = get_test_connection();

        let result = upsert_profile(profile_data(999, "Orphan"), &connection);

        assert_eq!(result, Err(Error::NotFound));
    }

    #[test]
    fn find_matching_profile_requires_exact_signature() {
        let connection = get_test_connection();
        let account = seed_account(&connection, "Everyday Checking");
        let profile = upsert_profile(profile_data(account.id, "ASB export"), &connection)
            .expect("Could not create profile");

        let matched = find_matching_profile(account.id, "a1b2c3d4e5f60718", &connection)
            .expect("Could not query profiles");
        assert_eq!(matched, Some(profile));

        let near_miss = find_matching_profile(account.id, "a1b2c3d4e5f607", &connection)
            .expect("Could not query profiles");
        assert_eq!(near_miss, None);
    }

    #[test]
    fn profiles_are_scoped_to_their_account() {
        let connection = get_test_connection();
        let checking = seed_account(&connection, "Everyday Checking");
        let savings = seed_account(&connection, "Rainy Day Savings");
        upsert_profile(profile_data(checking.id, "ASB export"), &connection)
            .expect("Could not create profile");

        let matched = find_matching_profile(savings.id, "a1b2c3d4e5f60718", &connection)
            .expect("Could not query profiles");
        assert_eq!(matched, None);

        let profiles =
            get_profiles_for_account(savings.id, &connection).expect("Could not list profiles");
        assert_eq!(profiles, Vec::new());
    }

    #[test]
    fn deleting_an_account_removes_its_profile() {
        let connection = get_test_connection();
        let account = seed_account(&connection, "Everyday Checking");
        upsert_profile(profile_data(account.id, "ASB export"), &connection)
            .expect("Could not create profile");

        crate::account::delete_account(account.id, &connection)
            .expect("Could not delete account");

        let profiles = get_profiles_for_account(account.id, &connection)
            .expect("Could not list profiles");
        assert_eq!(profiles, Vec::new());
    }
}
