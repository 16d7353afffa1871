//! Writes previewed statement rows into the ledger.

use std::collections::HashSet;

use rusqlite::{Connection, named_params};
use serde::{Deserialize, Serialize};

use crate::{
    DatabaseID, Error, TransactionID,
    import::statement::ParsedRow,
    payee::{get_all_payees, matcher::apply_match_to_transaction},
    transaction::{
        TRANSACTION_COLUMNS, Transaction, TransactionKind, TransactionSource, create_transaction,
        map_row_to_transaction,
    },
};

/// The result of committing an import batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportOutcome {
    /// The batch ID stamped onto every imported transaction.
    pub batch_id: String,
    /// How many rows became transactions.
    pub imported_count: usize,
    /// How many rows were dropped as duplicates at commit time.
    pub skipped_count: usize,
    /// The IDs of the created transactions.
    pub transaction_ids: Vec<TransactionID>,
}

/// Write statement rows into `account_id`'s ledger, tagged with `batch_id`.
///
/// Rows listed in `accepted_indices` were confirmed by the user and insert
/// unconditionally. Every other row is re-checked against the ledger, since
/// transactions may have appeared between preview and commit, and is skipped
/// when a duplicate exists. Payee match rules run against each created
/// transaction.
///
/// The caller is expected to wrap this in a database transaction so a failed
/// commit leaves no partial batch behind.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidCategory] if a matched payee's default category no longer
///   exists,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn commit_import(
    account_id: DatabaseID,
    batch_id: &str,
    rows: &[ParsedRow],
    accepted_indices: &[usize],
    source: TransactionSource,
    connection: &Connection,
) -> Result<ImportOutcome, Error> {
    let accepted: HashSet<usize> = accepted_indices.iter().copied().collect();
    let payees = get_all_payees(connection)?;

    let mut transaction_ids = Vec::new();
    let mut skipped_count = 0;

    for row in rows {
        if !accepted.contains(&row.row_index)
            && find_duplicate(account_id, row, batch_id, connection)?.is_some()
        {
            skipped_count += 1;
            continue;
        }

        let builder = Transaction::build(account_id, row.posted_date, row.amount_cents)
            .payee_raw(row.payee_raw.clone())
            .memo(row.memo.clone())
            .kind(TransactionKind::Actual)
            .source(source)
            .import_batch_id(Some(batch_id.to_owned()))
            .external_id(row.external_id.clone());
        let mut transaction = create_transaction(builder, connection)?;
        apply_match_to_transaction(&mut transaction, &payees, connection)?;

        transaction_ids.push(transaction.id);
    }

    Ok(ImportOutcome {
        batch_id: batch_id.to_owned(),
        imported_count: transaction_ids.len(),
        skipped_count,
        transaction_ids,
    })
}

/// Find a transaction in the ledger that `row` duplicates.
///
/// Transactions in the current batch are not counted, so a statement that
/// legitimately carries two identical rows imports both.
fn find_duplicate(
    account_id: DatabaseID,
    row: &ParsedRow,
    batch_id: &str,
    connection: &Connection,
) -> Result<Option<Transaction>, Error> {
    if let Some(external_id) = row.external_id.as_deref() {
        let matched = connection
            .prepare(&format!(
                "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\"
                 WHERE account_id = :account_id AND external_id = :external_id
                     AND (import_batch_id IS NULL OR import_batch_id <> :batch_id)
                 LIMIT 1"
            ))?
            .query_one(
                named_params! {
                    ":account_id": account_id,
                    ":external_id": external_id,
                    ":batch_id": batch_id,
                },
                map_row_to_transaction,
            )
            .map(Some)
            .or_else(|error| match error {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                error => Err(Error::from(error)),
            })?;

        if matched.is_some() {
            return Ok(matched);
        }
    }

    connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\"
             WHERE account_id = :account_id AND posted_date = :posted_date
                 AND amount_cents = :amount_cents
                 AND (import_batch_id IS NULL OR import_batch_id <> :batch_id)
             LIMIT 1"
        ))?
        .query_one(
            named_params! {
                ":account_id": account_id,
                ":posted_date": row.posted_date,
                ":amount_cents": row.amount_cents,
                ":batch_id": batch_id,
            },
            map_row_to_transaction,
        )
        .map(Some)
        .or_else(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            error => Err(Error::from(error)),
        })
}

// ============================================================================
// TESTS
// ============================================================================
