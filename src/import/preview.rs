//! Reconciles parsed statement rows against the ledger.
//!
//! Every preview splits the parsed rows into new rows and duplicates so the
//! user can decide, row by row, what actually gets imported.

use std::collections::HashMap;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    DatabaseID, Error,
    import::{
        fingerprint::{compute_fingerprint, new_batch_id},
        statement::{ParsedRow, ParsedStatement},
    },
    transaction::{Transaction, list_transactions},
};

/// A parsed row paired with the existing transaction it appears to duplicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateRow {
    /// The parsed statement row.
    pub row: ParsedRow,
    /// The transaction already in the ledger that conflicts with it.
    pub existing: Transaction,
}

/// The result of reconciling a parsed statement against an account's ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportPreview {
    /// The ID of the account the statement was previewed against.
    pub account_id: DatabaseID,
    /// The batch ID that a commit of this preview should use.
    pub batch_id: String,
    /// Rows with no conflicting transaction in the ledger.
    pub new_transactions: Vec<ParsedRow>,
    /// Rows that appear to already exist in the ledger.
    pub duplicates: Vec<DuplicateRow>,
    /// How many rows parsed, new and duplicate combined.
    pub total_count: usize,
    /// How many rows have no conflict.
    pub new_count: usize,
    /// How many rows conflict with an existing transaction.
    pub duplicate_count: usize,
    /// How many rows failed to parse.
    pub error_count: usize,
    /// The row-level parse errors.
    pub errors: Vec<String>,
}

/// Split a parsed statement into new rows and duplicates of existing
/// transactions in `account_id`'s ledger.
///
/// A row with an external ID is a duplicate of the transaction carrying the
/// same external ID, regardless of its other fields. Rows without one fall
/// back to the date, amount and payee fingerprint.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn preview_import(
    account_id: DatabaseID,
    statement: &ParsedStatement,
    connection: &Connection,
) -> Result<ImportPreview, Error> {
    let existing = list_transactions(Some(account_id), None, None, connection)?;

    let by_external_id: HashMap<&str, &Transaction> = existing
        .iter()
        .filter_map(|transaction| {
            transaction
                .external_id
                .as_deref()
                .map(|external_id| (external_id, transaction))
        })
        .collect();
    let by_fingerprint: HashMap<String, &Transaction> = existing
        .iter()
        .map(|transaction| {
            let fingerprint = compute_fingerprint(
                transaction.posted_date,
                transaction.amount_cents,
                transaction.payee_raw.as_deref(),
            );
            (fingerprint, transaction)
        })
        .collect();

    let mut new_transactions = Vec::new();
    let mut duplicates = Vec::new();

    for row in &statement.rows {
        let conflict: Option<&Transaction> = row
            .external_id
            .as_deref()
            .and_then(|external_id| by_external_id.get(external_id))
            .or_else(|| by_fingerprint.get(&row.fingerprint))
            .copied();

        match conflict {
            Some(existing) => duplicates.push(DuplicateRow {
                row: row.clone(),
                existing: existing.clone(),
            }),
            None => new_transactions.push(row.clone()),
        }
    }

    let new_count = new_transactions.len();
    let duplicate_count = duplicates.len();

    Ok(ImportPreview {
        account_id,
        batch_id: new_batch_id(),
        new_transactions,
        duplicates,
        total_count: new_count + duplicate_count,
        new_count,
        duplicate_count,
        error_count: statement.error_count,
        errors: statement.errors.clone(),
    })
}

// ============================================================================
// TESTS
// ============================================================================
