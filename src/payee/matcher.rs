//! Matches raw bank payee text against payee rules and keeps transaction
//! display names in sync with them.
//!
//! Payees are tried in ID order and each payee's rules in stored order. The
//! first rule that matches anywhere wins, so re-running a match over
//! unchanged data always picks the same payee.

use regex::RegexBuilder;
use rusqlite::{Connection, named_params};

use crate::{
    Error,
    database_id::TransactionID,
    payee::{MatchRule, Payee, get_all_payees},
    transaction::Transaction,
};

/// Find the first payee whose rules match `payee_raw`.
///
/// Matching is case-insensitive. Empty input matches no payee.
pub fn match_payee<'a>(payees: &'a [Payee], payee_raw: &str) -> Option<&'a Payee> {
    if payee_raw.is_empty() {
        return None;
    }

    let raw_lower = payee_raw.to_lowercase();

    payees
        .iter()
        .find(|payee| rules_match_lowered(&payee.match_patterns, &raw_lower))
}

/// Check whether any rule in `rules` matches `payee_raw`.
pub fn rules_match(rules: &[MatchRule], payee_raw: &str) -> bool {
    rules_match_lowered(rules, &payee_raw.to_lowercase())
}

fn rules_match_lowered(rules: &[MatchRule], raw_lower: &str) -> bool {
    rules.iter().any(|rule| rule_matches(rule, raw_lower))
}

fn rule_matches(rule: &MatchRule, raw_lower: &str) -> bool {
    if rule.pattern().is_empty() {
        return false;
    }

    match rule {
        MatchRule::StartsWith { pattern } => raw_lower.starts_with(&pattern.to_lowercase()),
        MatchRule::Contains { pattern } => raw_lower.contains(&pattern.to_lowercase()),
        MatchRule::Exact { pattern } => raw_lower == pattern.to_lowercase(),
        // A pattern that does not compile matches nothing rather than
        // failing the whole operation.
        MatchRule::Regex { pattern } => RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map(|regex| regex.is_match(raw_lower))
            .unwrap_or(false),
    }
}

/// Recompute and store the display name of `transaction` from `payees`.
///
/// A transaction without raw payee text, or whose raw text matches no payee,
/// has its display name cleared. Returns whether the stored display name
/// changed.
///
/// # Errors
/// Returns an [Error::SqlError] if there was an SQL error.
pub fn apply_match_to_transaction(
    transaction: &mut Transaction,
    payees: &[Payee],
    connection: &Connection,
) -> Result<bool, Error> {
    let new_name = transaction
        .payee_raw
        .as_deref()
        .and_then(|payee_raw| match_payee(payees, payee_raw))
        .map(|payee| payee.name.clone());

    if new_name == transaction.display_name {
        return Ok(false);
    }

    connection.execute(
        "UPDATE \"transaction\" SET display_name = :display_name WHERE id = :id",
        named_params! { ":display_name": new_name, ":id": transaction.id },
    )?;
    transaction.display_name = new_name;

    Ok(true)
}

/// Recompute the display name of every transaction with raw payee text,
/// returning how many rows changed.
///
/// If the book has no payees at all, every stored display name is cleared
/// instead. Rows whose display name already matches are left untouched, so a
/// second run reports zero updates.
///
/// # Errors
/// Returns an [Error::SqlError] if there was an SQL error.
pub fn rematch_all(connection: &Connection) -> Result<usize, Error> {
    let payees = get_all_payees(connection)?;

    if payees.is_empty() {
        let cleared = connection.execute(
            "UPDATE \"transaction\" SET display_name = NULL WHERE display_name IS NOT NULL",
            (),
        )?;

        return Ok(cleared);
    }

    let rows: Vec<(TransactionID, String, Option<String>)> = connection
        .prepare(
            "SELECT id, payee_raw, display_name FROM \"transaction\"
             WHERE payee_raw IS NOT NULL",
        )?
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut statement = connection
        .prepare("UPDATE \"transaction\" SET display_name = :display_name WHERE id = :id")?;
    let mut updated = 0;

    for (id, payee_raw, display_name) in rows {
        let new_name = match_payee(&payees, &payee_raw).map(|payee| payee.name.clone());

        if new_name != display_name {
            statement.execute(named_params! { ":display_name": new_name, ":id": id })?;
            updated += 1;
        }
    }

    Ok(updated)
}

/// Recompute display names for the transactions `payee` touches, returning
/// how many rows changed.
///
/// A transaction is touched if it currently displays this payee's name or if
/// its raw text matches this payee's rules. Each touched row is re-run
/// through the full matcher, so a row this payee no longer matches is
/// released: it takes another payee's name if one matches, or has its display
/// name cleared.
///
/// # Errors
/// Returns an [Error::SqlError] if there was an SQL error.
pub fn rematch_payee(payee: &Payee, connection: &Connection) -> Result<usize, Error> {
    let payees = get_all_payees(connection)?;

    let rows: Vec<(TransactionID, Option<String>, Option<String>)> = connection
        .prepare("SELECT id, payee_raw, display_name FROM \"transaction\"")?
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut statement = connection
        .prepare("UPDATE \"transaction\" SET display_name = :display_name WHERE id = :id")?;
    let mut updated = 0;

    for (id, payee_raw, display_name) in rows {
        let displays_payee = display_name.as_deref() == Some(payee.name.as_str());
        let matches_payee = payee_raw
            .as_deref()
            .is_some_and(|raw| rules_match(&payee.match_patterns, raw));

        if !displays_payee && !matches_payee {
            continue;
        }

        let new_name = payee_raw
            .as_deref()
            .and_then(|raw| match_payee(&payees, raw))
            .map(|winner| winner.name.clone());

        if new_name != display_name {
            statement.execute(named_params! { ":display_name": new_name, ":id": id })?;
            updated += 1;
        }
    }

    Ok(updated)
}

/// The distinct raw payee strings in the book that `rules` match, sorted
/// case-insensitively.
///
/// # Errors
/// Returns an [Error::SqlError] if there was an SQL error.
pub fn matching_raw_payees(
    rules: &[MatchRule],
    connection: &Connection,
) -> Result<Vec<String>, Error> {
    let raw_payees: Vec<String> = connection
        .prepare(
            "SELECT DISTINCT payee_raw FROM \"transaction\" WHERE payee_raw IS NOT NULL",
        )?
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut matches: Vec<String> = raw_payees
        .into_iter()
        .filter(|raw| rules_match(rules, raw))
        .collect();
    matches.sort_by_key(|raw| raw.to_lowercase());

    Ok(matches)
}

// ============================================================================
// TESTS
// ============================================================================
