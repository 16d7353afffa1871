//! Maintains the two-sided invariant for transfer transactions.
//!
//! A transfer is stored as a pair of rows: an outflow (negative amount, in the
//! source account) and an inflow (positive amount, in the destination
//! account), each holding the other's ID in `transfer_link_id`. Every
//! operation here keeps that pairing intact; none of them may leave a dangling
//! half behind.

use chrono::NaiveDate;
use rusqlite::{Connection, params};

use crate::{
    Error,
    account::get_account,
    database_id::{DatabaseID, TransactionID},
    transaction::{
        Transaction, TransactionKind, TransactionSource, UpdateTransaction, create_transaction,
        get_transaction, update_transaction,
    },
};

/// Create a linked transfer pair between two accounts.
///
/// The outflow is inserted first, then the inflow referencing it, then the
/// outflow is back-linked. `amount_cents` may carry either sign; the outflow
/// always stores the negative magnitude and the inflow the positive one.
///
/// Returns the (outflow, inflow) pair with both links set.
///
/// **Note**: Three writes. Callers that need all-or-nothing behaviour should
/// pass in a transaction for `connection`.
///
/// # Errors
/// This function will return a:
/// - [Error::SameTransferAccount] if both sides name the same account,
/// - [Error::MissingDestinationAccount] if the destination account does not exist,
/// - [Error::NotFound] if the source account does not exist,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_transfer(
    source_account_id: DatabaseID,
    destination_account_id: DatabaseID,
    posted_date: NaiveDate,
    amount_cents: i64,
    memo: Option<String>,
    source: TransactionSource,
    connection: &Connection,
) -> Result<(Transaction, Transaction), Error> {
    if source_account_id == destination_account_id {
        return Err(Error::SameTransferAccount);
    }

    let destination_account =
        get_account(destination_account_id, connection).map_err(|error| match error {
            Error::NotFound => Error::MissingDestinationAccount,
            error => error,
        })?;
    let source_account = get_account(source_account_id, connection)?;

    let outflow = create_transaction(
        Transaction::build(source_account_id, posted_date, -amount_cents.abs())
            .payee_normalized(Some(format!("Transfer to {}", destination_account.name)))
            .memo(memo.clone())
            .kind(TransactionKind::Transfer)
            .source(source),
        connection,
    )?;

    let inflow = create_transaction(
        Transaction::build(destination_account_id, posted_date, amount_cents.abs())
            .payee_normalized(Some(format!("Transfer from {}", source_account.name)))
            .memo(memo)
            .kind(TransactionKind::Transfer)
            .source(source)
            .transfer_link_id(Some(outflow.id)),
        connection,
    )?;

    connection.execute(
        "UPDATE \"transaction\" SET transfer_link_id = ?1 WHERE id = ?2",
        (inflow.id, outflow.id),
    )?;

    let outflow = get_transaction(outflow.id, connection)?;

    Ok((outflow, inflow))
}

/// Turn an existing non-transfer transaction into one side of a transfer pair
/// without changing its ID.
///
/// The direction is inferred from the existing amount's sign: a negative row
/// becomes the outflow and gets a positive mirror in the destination account,
/// a positive row becomes the inflow and gets a negative mirror. The existing
/// row's category and raw payee are cleared since a transfer has neither; the
/// mirror row is system-sourced.
///
/// Returns the (converted, mirror) pair.
///
/// **Note**: Two writes. Callers that need all-or-nothing behaviour should
/// pass in a transaction for `connection`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `transaction_id` does not refer to a real transaction,
/// - [Error::AlreadyATransfer] if the transaction is already half of a pair,
/// - [Error::SameTransferAccount] if the destination is the transaction's own account,
/// - [Error::MissingDestinationAccount] if the destination account does not exist,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn convert_to_transfer(
    transaction_id: TransactionID,
    destination_account_id: DatabaseID,
    connection: &Connection,
) -> Result<(Transaction, Transaction), Error> {
    let existing = get_transaction(transaction_id, connection)?;

    if existing.kind == TransactionKind::Transfer || existing.transfer_link_id.is_some() {
        return Err(Error::AlreadyATransfer);
    }

    if existing.account_id == destination_account_id {
        return Err(Error::SameTransferAccount);
    }

    let destination_account =
        get_account(destination_account_id, connection).map_err(|error| match error {
            Error::NotFound => Error::MissingDestinationAccount,
            error => error,
        })?;
    let source_account = get_account(existing.account_id, connection)?;

    // Negative rows are the outflow half; money moves towards the destination.
    let (label, mirror_label) = if existing.amount_cents <= 0 {
        (
            format!("Transfer to {}", destination_account.name),
            format!("Transfer from {}", source_account.name),
        )
    } else {
        (
            format!("Transfer from {}", destination_account.name),
            format!("Transfer to {}", source_account.name),
        )
    };

    let mirror = create_transaction(
        Transaction::build(
            destination_account_id,
            existing.posted_date,
            -existing.amount_cents,
        )
        .payee_normalized(Some(mirror_label))
        .memo(existing.memo.clone())
        .kind(TransactionKind::Transfer)
        .source(TransactionSource::System)
        .transfer_link_id(Some(existing.id)),
        connection,
    )?;

    connection.execute(
        "UPDATE \"transaction\"
         SET kind = 'transfer', payee_normalized = ?1, payee_raw = NULL, display_name = NULL,
             category_id = NULL, transfer_link_id = ?2
         WHERE id = ?3",
        params![label, mirror.id, existing.id],
    )?;

    let converted = get_transaction(existing.id, connection)?;

    Ok((converted, mirror))
}

/// Apply `data` to one side of a transfer pair, mirroring the shared fields
/// onto the other side.
///
/// The mirrored fields are the amount (as its negation), the posted date and
/// the memo. Category and cleared status are deliberately not mirrored so each
/// side can be reconciled on its own.
///
/// # Errors
/// This function will return a:
/// - [Error::UpdateMissingTransaction] if either side no longer exists,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn update_transfer_pair(
    existing: &Transaction,
    data: UpdateTransaction,
    connection: &Connection,
) -> Result<Transaction, Error> {
    if let Some(linked_id) = existing.transfer_link_id {
        let rows_updated = connection.execute(
            "UPDATE \"transaction\" SET amount_cents = ?1, posted_date = ?2, memo = ?3
             WHERE id = ?4",
            params![-data.amount_cents, data.posted_date, data.memo, linked_id],
        )?;

        if rows_updated == 0 {
            return Err(Error::UpdateMissingTransaction);
        }
    }

    update_transaction(existing.id, data, connection)
}

/// Delete both sides of a transfer pair.
///
/// The link fields are nulled first so neither delete trips over the
/// self-referencing foreign key, then both rows are removed.
///
/// **Note**: Callers that need all-or-nothing behaviour should pass in a
/// transaction for `connection`.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn delete_transfer_pair(
    first: TransactionID,
    second: TransactionID,
    connection: &Connection,
) -> Result<(), Error> {
    connection.execute(
        "UPDATE \"transaction\" SET transfer_link_id = NULL WHERE id IN (?1, ?2)",
        (first, second),
    )?;

    connection.execute(
        "DELETE FROM \"transaction\" WHERE id IN (?1, ?2)",
        (first, second),
    )?;

    Ok(())
}

/// Null out every transfer link that crosses the boundary of `account_id`, in
/// both directions: links held by the account's own rows, and links in other
/// accounts pointing at the account's rows.
///
/// Run before bulk-deleting the account so no surviving half keeps a link to a
/// deleted row. Returns the number of rows unlinked.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn unlink_account_transfers(
    account_id: DatabaseID,
    connection: &Connection,
) -> Result<usize, Error> {
    let rows_updated = connection.execute(
        "UPDATE \"transaction\"
         SET transfer_link_id = NULL
         WHERE transfer_link_id IN (SELECT id FROM \"transaction\" WHERE account_id = ?1)
            OR (account_id = ?1 AND transfer_link_id IS NOT NULL)",
        (account_id,),
    )?;

    Ok(rows_updated)
}

// ============================================================================
// TESTS
// ============================================================================
