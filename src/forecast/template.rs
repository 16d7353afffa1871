//! Defines the core data model and database queries for recurring templates.
//!
//! A recurring template is the persisted schedule behind a payee's recurring
//! rule. Forecast rows are projected from templates on demand and are never
//! written to the transaction table.

use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::{Connection, Row, named_params, params};
use serde::{Deserialize, Serialize};

use crate::{Error, database_id::DatabaseID, payee::Payee};

// ============================================================================
// MODELS
// ============================================================================

/// How the projected amount for a forecast row is calculated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountMethod {
    /// Always use the template's fixed amount.
    Fixed,
    /// Copy the amount of the payee's most recent transaction.
    CopyLast,
    /// Average the amounts of the payee's most recent transactions.
    Average,
}

impl AmountMethod {
    /// The text stored in the database for this method.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::CopyLast => "copy_last",
            Self::Average => "average",
        }
    }
}

impl Default for AmountMethod {
    fn default() -> Self {
        Self::Fixed
    }
}

impl FromStr for AmountMethod {
    type Err = String;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text {
            "fixed" => Ok(Self::Fixed),
            "copy_last" => Ok(Self::CopyLast),
            "average" => Ok(Self::Average),
            _ => Err(format!("unknown amount method '{text}'")),
        }
    }
}

/// How often a recurring template emits a forecast row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    /// Every calendar month.
    Monthly,
    /// Every N calendar months, anchored to the template's start date.
    EveryNMonths,
    /// Once a year, in the start date's month.
    Annual,
}

impl Frequency {
    /// The text stored in the database for this frequency.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::EveryNMonths => "every_n_months",
            Self::Annual => "annual",
        }
    }
}

impl Default for Frequency {
    fn default() -> Self {
        Self::Monthly
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text {
            "monthly" => Ok(Self::Monthly),
            "every_n_months" => Ok(Self::EveryNMonths),
            "annual" => Ok(Self::Annual),
            _ => Err(format!("unknown frequency '{text}'")),
        }
    }
}

/// A persisted schedule that forecast rows are projected from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringTemplate {
    /// The ID of the template.
    pub id: DatabaseID,
    /// The account the projected rows belong to.
    pub account_id: DatabaseID,
    /// The payee this template is linked to.
    ///
    /// Templates managed through the payee API always have a payee. Each
    /// payee owns at most one template.
    pub payee_id: Option<DatabaseID>,
    /// The display name given to projected rows.
    pub name: String,
    /// The category given to projected rows.
    pub category_id: Option<DatabaseID>,
    /// How the projected amount is calculated.
    pub amount_method: AmountMethod,
    /// The amount used by [AmountMethod::Fixed], and the fallback when the
    /// other methods find no transaction history.
    pub fixed_amount_cents: Option<i64>,
    /// How many recent transactions [AmountMethod::Average] looks at.
    pub average_count: u32,
    /// How often the template emits a forecast row.
    pub frequency: Frequency,
    /// The N in [Frequency::EveryNMonths].
    pub frequency_n: u32,
    /// The day of the month forecast rows fall on, clamped to the last day of
    /// short months.
    pub day_of_month: u32,
    /// The first date the template may emit a forecast row.
    pub start_date: NaiveDate,
    /// The last date the template may emit a forecast row, or `None` for no
    /// end.
    pub end_date: Option<NaiveDate>,
    /// Whether the template currently emits forecast rows.
    pub is_active: bool,
}

/// The recurring schedule attached to a payee, as it appears in API requests
/// and responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringRule {
    /// The account the projected rows belong to.
    pub account_id: DatabaseID,
    /// How often the schedule emits a forecast row.
    #[serde(default)]
    pub frequency: Frequency,
    /// The N in [Frequency::EveryNMonths].
    #[serde(default = "default_frequency_n")]
    pub frequency_n: u32,
    /// The day of the month forecast rows fall on.
    #[serde(default = "default_day_of_month")]
    pub day_of_month: u32,
    /// How the projected amount is calculated.
    #[serde(default)]
    pub amount_method: AmountMethod,
    /// The amount used by [AmountMethod::Fixed], and the fallback when the
    /// other methods find no transaction history.
    #[serde(default)]
    pub fixed_amount_cents: Option<i64>,
    /// How many recent transactions [AmountMethod::Average] looks at.
    #[serde(default = "default_average_count")]
    pub average_count: u32,
    /// The first date the schedule may emit a forecast row.
    pub start_date: NaiveDate,
    /// The last date the schedule may emit a forecast row, or `None` for no
    /// end.
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    /// The category given to projected rows.
    #[serde(default)]
    pub category_id: Option<DatabaseID>,
}

fn default_frequency_n() -> u32 {
    1
}

fn default_day_of_month() -> u32 {
    1
}

fn default_average_count() -> u32 {
    3
}

impl From<&RecurringTemplate> for RecurringRule {
    fn from(template: &RecurringTemplate) -> Self {
        Self {
            account_id: template.account_id,
            frequency: template.frequency,
            frequency_n: template.frequency_n,
            day_of_month: template.day_of_month,
            amount_method: template.amount_method,
            fixed_amount_cents: template.fixed_amount_cents,
            average_count: template.average_count,
            start_date: template.start_date,
            end_date: template.end_date,
            category_id: template.category_id,
        }
    }
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

const TEMPLATE_COLUMNS: &str = "id, account_id, payee_id, name, category_id, amount_method, \
     fixed_amount_cents, average_count, frequency, frequency_n, day_of_month, start_date, \
     end_date, is_active";

/// Create the recurring template table in the database.
///
/// # Errors
/// Returns an [Error::SqlError] if there was an SQL error.
pub fn create_recurring_template_table(connection: &Connection) -> Result<(), Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS recurring_template (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            account_id INTEGER NOT NULL REFERENCES account(id) ON UPDATE CASCADE ON DELETE CASCADE,
            payee_id INTEGER UNIQUE REFERENCES payee(id) ON UPDATE CASCADE ON DELETE CASCADE,
            name TEXT NOT NULL,
            category_id INTEGER REFERENCES category(id) ON UPDATE CASCADE ON DELETE SET NULL,
            amount_method TEXT NOT NULL DEFAULT 'fixed',
            fixed_amount_cents INTEGER,
            average_count INTEGER NOT NULL DEFAULT 3,
            frequency TEXT NOT NULL DEFAULT 'monthly',
            frequency_n INTEGER NOT NULL DEFAULT 1,
            day_of_month INTEGER NOT NULL DEFAULT 1,
            start_date TEXT NOT NULL,
            end_date TEXT,
            is_active INTEGER NOT NULL DEFAULT 1
        )",
        (),
    )?;

    Ok(())
}

/// Create or replace the recurring template linked to `payee`.
///
/// Each payee owns at most one template. If the payee already has one, every
/// schedule field is overwritten in place and the template is reactivated;
/// otherwise a new template is inserted. The template's name always follows
/// the payee's name.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `rule` refers to an account or category that is not
///   in the book,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn upsert_template_for_payee(
    payee: &Payee,
    rule: &RecurringRule,
    connection: &Connection,
) -> Result<RecurringTemplate, Error> {
    let template = connection
        .prepare(&format!(
            "INSERT INTO recurring_template (
                account_id, payee_id, name, category_id, amount_method, fixed_amount_cents,
                average_count, frequency, frequency_n, day_of_month, start_date, end_date,
                is_active
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, 1)
            ON CONFLICT (payee_id) DO UPDATE SET
                account_id = excluded.account_id,
                name = excluded.name,
                category_id = excluded.category_id,
                amount_method = excluded.amount_method,
                fixed_amount_cents = excluded.fixed_amount_cents,
                average_count = excluded.average_count,
                frequency = excluded.frequency,
                frequency_n = excluded.frequency_n,
                day_of_month = excluded.day_of_month,
                start_date = excluded.start_date,
                end_date = excluded.end_date,
                is_active = 1
            RETURNING {TEMPLATE_COLUMNS}"
        ))?
        .query_row(
            params![
                rule.account_id,
                payee.id,
                payee.name,
                rule.category_id,
                rule.amount_method.as_str(),
                rule.fixed_amount_cents,
                rule.average_count,
                rule.frequency.as_str(),
                rule.frequency_n,
                rule.day_of_month,
                rule.start_date,
                rule.end_date,
            ],
            map_row_to_template,
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

    Ok(template)
}

/// Retrieve the active template linked to the payee `payee_id`, if any.
///
/// # Errors
/// Returns an [Error::SqlError] if there was an SQL error.
pub fn get_active_template_for_payee(
    payee_id: DatabaseID,
    connection: &Connection,
) -> Result<Option<RecurringTemplate>, Error> {
    connection
        .prepare(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM recurring_template
             WHERE payee_id = :payee_id AND is_active = 1"
        ))?
        .query_row(named_params! { ":payee_id": payee_id }, map_row_to_template)
        .map(Some)
        .or_else(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            error => Err(error.into()),
        })
}

/// Retrieve the active, payee-linked templates for the account `account_id`.
///
/// # Errors
/// Returns an [Error::SqlError] if there was an SQL error.
pub fn get_active_templates_for_account(
    account_id: DatabaseID,
    connection: &Connection,
) -> Result<Vec<RecurringTemplate>, Error> {
    connection
        .prepare(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM recurring_template
             WHERE account_id = :account_id AND is_active = 1 AND payee_id IS NOT NULL
             ORDER BY id"
        ))?
        .query_map(named_params! { ":account_id": account_id }, map_row_to_template)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(Error::from)
}

/// Delete the template linked to the payee `payee_id`, returning the number
/// of templates deleted.
///
/// # Errors
/// Returns an [Error::SqlError] if there was an SQL error.
pub fn delete_templates_for_payee(
    payee_id: DatabaseID,
    connection: &Connection,
) -> Result<usize, Error> {
    connection
        .execute(
            "DELETE FROM recurring_template WHERE payee_id = ?1",
            (payee_id,),
        )
        .map_err(Error::from)
}

/// Convert a database row into a [RecurringTemplate].
///
/// # Errors
/// Returns a [rusqlite::Error] if a column is missing or has an unexpected
/// type or value.
pub fn map_row_to_template(row: &Row) -> Result<RecurringTemplate, rusqlite::Error> {
    let amount_method_text: String = row.get(5)?;
    let amount_method = amount_method_text.parse().map_err(|error: String| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, error.into())
    })?;

    let frequency_text: String = row.get(8)?;
    let frequency = frequency_text.parse().map_err(|error: String| {
        rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, error.into())
    })?;

    Ok(RecurringTemplate {
        id: row.get(0)?,
        account_id: row.get(1)?,
        payee_id: row.get(2)?,
        name: row.get(3)?,
        category_id: row.get(4)?,
        amount_method,
        fixed_amount_cents: row.get(6)?,
        average_count: row.get(7)?,
        frequency,
        frequency_n: row.get(9)?,
        day_of_month: row.get(10)?,
        start_date: row.get(11)?,
        end_date: row.get(12)?,
        is_active: row.get(13)?,
    })
}

// ============================================================================
// TESTS
// ============================================================================
