//! Projects recurring templates into ephemeral forecast transactions.
//!
//! Forecast rows are computed on demand for a date window and returned
//! alongside real transactions. They are never written to the transaction
//! table; their negative synthetic IDs cannot collide with persisted rows.

use chrono::{Datelike, Months, NaiveDate};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    database_id::{DatabaseID, TransactionID},
    forecast::{
        dismissal::get_dismissed_periods,
        template::{AmountMethod, Frequency, RecurringTemplate, get_active_templates_for_account},
    },
    payee::get_payee,
    transaction::{TransactionKind, TransactionSource, get_recent_amount_cents},
};

/// A single projected forecast row.
///
/// Mirrors the transaction fields a ledger view needs, plus the payee and
/// period keys used to dismiss the instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastItem {
    /// A negative synthetic ID, deterministic per template and period.
    pub id: TransactionID,
    /// The account the forecast belongs to.
    pub account_id: DatabaseID,
    /// The projected posting date.
    pub posted_date: NaiveDate,
    /// The projected amount in integer cents.
    pub amount_cents: i64,
    /// The linked payee's name.
    pub display_name: String,
    /// The template's category.
    pub category_id: Option<DatabaseID>,
    /// Always [TransactionKind::Forecast].
    pub kind: TransactionKind,
    /// Always [TransactionSource::System].
    pub source: TransactionSource,
    /// Always false; a forecast has not happened yet.
    pub is_cleared: bool,
    /// The template this row was projected from.
    pub recurring_template_id: DatabaseID,
    /// The linked payee, used to key a dismissal.
    pub payee_id: DatabaseID,
    /// The first day of the projected month, used to key a dismissal.
    pub period_date: NaiveDate,
}

/// The first day of the month `date` falls in.
pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    // Day one exists in every month.
    date.with_day(1).unwrap_or(date)
}

fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if year % 4 == 0 && (year % 100 != 0 || year % 400 == 0) => 29,
        _ => 28,
    }
}

/// The date `day` would fall on in the given month, clamped so that e.g. day
/// 31 in a 30-day month becomes day 30.
fn clamp_day(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day.clamp(1, days_in_month(year, month)))
}

fn step_months(frequency: Frequency, frequency_n: u32) -> u32 {
    match frequency {
        Frequency::Monthly => 1,
        // A zero step would never advance the cursor.
        Frequency::EveryNMonths => frequency_n.max(1),
        Frequency::Annual => 12,
    }
}

/// The projected amount for `template`, or `None` if the template has no
/// amount to offer.
///
/// History lookups match on display name across all accounts. A method that
/// needs history but finds none falls back to the fixed amount.
fn compute_amount(
    template: &RecurringTemplate,
    payee_name: &str,
    connection: &Connection,
) -> Result<Option<i64>, Error> {
    match template.amount_method {
        AmountMethod::Fixed => Ok(template.fixed_amount_cents),
        AmountMethod::CopyLast => {
            let recent = get_recent_amount_cents(payee_name, 1, connection)?;

            Ok(recent.first().copied().or(template.fixed_amount_cents))
        }
        AmountMethod::Average => {
            let recent = get_recent_amount_cents(payee_name, template.average_count, connection)?;

            if recent.is_empty() {
                return Ok(template.fixed_amount_cents);
            }

            let sum: i64 = recent.iter().sum();
            let mean = sum as f64 / recent.len() as f64;

            Ok(Some(mean.round() as i64))
        }
    }
}

fn synthetic_id(template_id: DatabaseID, period: NaiveDate) -> TransactionID {
    -(template_id * 100_000 + i64::from(period.year()) * 100 + i64::from(period.month()))
}

/// Project the active recurring templates of `account_id` into forecast rows
/// for the window `[window_start, window_end]`.
///
/// Each template walks month-by-month from its start month to the window's
/// end month. A candidate is emitted when its clamped date lies inside the
/// window and the template's own date range, and its period has not been
/// dismissed.
///
/// # Errors
/// Returns an [Error::SqlError] if there was an SQL error.
pub fn project_forecasts(
    account_id: DatabaseID,
    window_start: NaiveDate,
    window_end: NaiveDate,
    connection: &Connection,
) -> Result<Vec<ForecastItem>, Error> {
    let templates = get_active_templates_for_account(account_id, connection)?;
    let dismissed = get_dismissed_periods(account_id, window_start, window_end, connection)?;

    let mut forecasts = Vec::new();

    for template in templates {
        let Some(payee_id) = template.payee_id else {
            continue;
        };
        let payee = match get_payee(payee_id, connection) {
            Ok(payee) => payee,
            Err(Error::NotFound) => continue,
            Err(error) => return Err(error),
        };

        let Some(amount_cents) = compute_amount(&template, &payee.name, connection)? else {
            continue;
        };

        let step = step_months(template.frequency, template.frequency_n);
        let window_end_month = first_of_month(window_end);
        let mut cursor = first_of_month(template.start_date);

        while cursor <= window_end_month {
            if let Some(forecast_date) =
                clamp_day(cursor.year(), cursor.month(), template.day_of_month)
            {
                let within_window = forecast_date >= window_start && forecast_date <= window_end;
                let within_template = forecast_date >= template.start_date
                    && template.end_date.is_none_or(|end| forecast_date <= end);

                if within_window && within_template && !dismissed.contains(&(payee_id, cursor)) {
                    forecasts.push(ForecastItem {
                        id: synthetic_id(template.id, cursor),
                        account_id,
                        posted_date: forecast_date,
                        amount_cents,
                        display_name: payee.name.clone(),
                        category_id: template.category_id,
                        kind: TransactionKind::Forecast,
                        source: TransactionSource::System,
                        is_cleared: false,
                        recurring_template_id: template.id,
                        payee_id,
                        period_date: cursor,
                    });
                }
            }

            match cursor.checked_add_months(Months::new(step)) {
                Some(next) => cursor = next,
                None => break,
            }
        }
    }

    Ok(forecasts)
}

// ============================================================================
// TESTS
// ============================================================================
