//! Defines the JSON endpoints for managing transactions.
//!
//! Transfer behaviour rides on these endpoints: a create request with a
//! destination account becomes a linked pair, and updates or deletes on one
//! half of a pair keep the other half consistent.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error,
    account::get_account,
    database_id::{DatabaseID, TransactionID},
    payee::{get_all_payees, matcher::apply_match_to_transaction},
    transaction::{
        Transaction, TransactionKind, TransactionSource, UpdateTransaction, create_transaction,
        delete_transaction, get_transaction, list_transactions, update_transaction,
    },
    transfer::{create_transfer, delete_transfer_pair, update_transfer_pair},
};

/// The state needed for the transaction endpoints.
#[derive(Debug, Clone)]
pub struct TransactionState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for TransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The query parameters for listing transactions.
///
/// Month filtering applies only when both `year` and `month` are given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionFilter {
    /// Limit results to one account.
    #[serde(default)]
    pub account_id: Option<DatabaseID>,
    /// The calendar year to filter by.
    #[serde(default)]
    pub year: Option<i32>,
    /// The calendar month (1-12) to filter by.
    #[serde(default)]
    pub month: Option<u32>,
}

/// The request body for creating a transaction.
///
/// Setting `transfer_to_account_id` creates a linked transfer pair instead of
/// a single row; the response is then the outflow half.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTransactionRequest {
    /// The account the transaction belongs to.
    pub account_id: DatabaseID,
    /// The date the transaction posted.
    pub posted_date: NaiveDate,
    /// The amount in integer cents; negative amounts are money leaving the
    /// account.
    pub amount_cents: i64,
    /// The payee text as it appeared at the source.
    #[serde(default)]
    pub payee_raw: Option<String>,
    /// A cleaned-up copy of the payee text.
    #[serde(default)]
    pub payee_normalized: Option<String>,
    /// A short note from the source.
    #[serde(default)]
    pub memo: Option<String>,
    /// Free-form notes.
    #[serde(default)]
    pub notes: Option<String>,
    /// The transaction's category.
    #[serde(default)]
    pub category_id: Option<DatabaseID>,
    /// What the row represents. Defaults to an actual transaction.
    #[serde(default)]
    pub kind: TransactionKind,
    /// Where the row came from. Defaults to manual entry.
    #[serde(default)]
    pub source: TransactionSource,
    /// Whether the row has been reconciled against a statement.
    #[serde(default)]
    pub is_cleared: bool,
    /// Create a transfer into this account instead of a plain transaction.
    #[serde(default)]
    pub transfer_to_account_id: Option<DatabaseID>,
}

/// A route handler for listing transactions, optionally filtered by account
/// and month.
pub async fn get_transactions_endpoint(
    State(state): State<TransactionState>,
    Query(filter): Query<TransactionFilter>,
) -> Result<Response, Error> {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Err(Error::DatabaseLockError);
        }
    };

    let transactions =
        list_transactions(filter.account_id, filter.year, filter.month, &connection)?;

    Ok(Json(transactions).into_response())
}

/// A route handler for creating a transaction or a transfer pair.
pub async fn create_transaction_endpoint(
    State(state): State<TransactionState>,
    Json(request): Json<CreateTransactionRequest>,
) -> Result<Response, Error> {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Err(Error::DatabaseLockError);
        }
    };

    get_account(request.account_id, &connection)?;

    if let Some(destination_id) = request.transfer_to_account_id {
        let transaction = connection.unchecked_transaction()?;
        let (outflow, _inflow) = create_transfer(
            request.account_id,
            destination_id,
            request.posted_date,
            request.amount_cents,
            request.memo,
            request.source,
            &transaction,
        )?;
        transaction.commit()?;

        return Ok((StatusCode::CREATED, Json(outflow)).into_response());
    }

    let builder = Transaction::build(request.account_id, request.posted_date, request.amount_cents)
        .payee_raw(request.payee_raw)
        .payee_normalized(request.payee_normalized)
        .memo(request.memo)
        .notes(request.notes)
        .category_id(request.category_id)
        .kind(request.kind)
        .source(request.source)
        .is_cleared(request.is_cleared);

    let transaction = connection.unchecked_transaction()?;
    let mut created = create_transaction(builder, &transaction)?;
    let payees = get_all_payees(&transaction)?;
    apply_match_to_transaction(&mut created, &payees, &transaction)?;
    transaction.commit()?;

    Ok((StatusCode::CREATED, Json(created)).into_response())
}

/// A route handler for retrieving a single transaction.
pub async fn get_transaction_endpoint(
    State(state): State<TransactionState>,
    Path(transaction_id): Path<TransactionID>,
) -> Result<Response, Error> {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Err(Error::DatabaseLockError);
        }
    };

    let transaction = get_transaction(transaction_id, &connection)?;

    Ok(Json(transaction).into_response())
}

/// A route handler for replacing a transaction's editable fields.
///
/// Updating one half of a transfer pair mirrors the amount (negated), date,
/// and memo onto the other half.
pub async fn update_transaction_endpoint(
    State(state): State<TransactionState>,
    Path(transaction_id): Path<TransactionID>,
    Json(data): Json<UpdateTransaction>,
) -> Result<Response, Error> {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Err(Error::DatabaseLockError);
        }
    };

    let existing = get_transaction(transaction_id, &connection)?;

    let transaction = connection.unchecked_transaction()?;
    let updated = if existing.transfer_link_id.is_some() {
        update_transfer_pair(&existing, data, &transaction)?
    } else {
        update_transaction(transaction_id, data, &transaction)?
    };
    transaction.commit()?;

    Ok(Json(updated).into_response())
}

/// A route handler for deleting a transaction.
///
/// Deleting one half of a transfer pair deletes the other half too.
pub async fn delete_transaction_endpoint(
    State(state): State<TransactionState>,
    Path(transaction_id): Path<TransactionID>,
) -> Result<Response, Error> {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Err(Error::DatabaseLockError);
        }
    };

    let existing = get_transaction(transaction_id, &connection)?;

    let transaction = connection.unchecked_transaction()?;
    if let Some(linked_id) = existing.transfer_link_id {
        delete_transfer_pair(existing.id, linked_id, &transaction)?;
    } else {
        delete_transaction(transaction_id, &transaction)?;
    }
    transaction.commit()?;

    Ok(StatusCode::NO_CONTENT.into_response())
}

#[cfg(test)]
mod endpoint_tests {
    use axum::{
        Json,
        body::to_bytes,
        extract::{FromRef, Path, Query, State},
        http::StatusCode,
        response::{IntoResponse, Response},
    };
    use chrono::NaiveDate;
    use rusqlite::Connection;

    use crate::{
        AppState,
        account::{AccountData, create_account},
        database_id::DatabaseID,
        payee::{MatchRule, PayeeData, create_payee},
        transaction::{
            CreateTransactionRequest, Transaction, TransactionKind, TransactionSource,
            TransactionState, UpdateTransaction, create_transaction_endpoint,
            delete_transaction_endpoint, get_transaction_endpoint, get_transactions_endpoint,
            update_transaction_endpoint,
        },
    };

    fn get_test_state() -> (TransactionState, AppState) {
        let connection = Connection::open_in_memory().unwrap();
        let app_state = AppState::new(connection, ":memory:").unwrap();

        (TransactionState::from_ref(&app_state), app_state)
    }

    async fn parse_body<T: serde::de::DeserializeOwned>(response: Response) -> T {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).expect("Could not parse response body")
    }

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn seed_account(app_state: &AppState, name: &str) -> DatabaseID {
        let connection = app_state.db_connection.lock().unwrap();
        create_account(
            AccountData {
                name: name.to_owned(),
                kind: "checking".to_owned(),
                institution: None,
                display_order: 0,
            },
            &connection,
        )
        .expect("Could not create account")
        .id
    }

    fn request(account_id: DatabaseID, amount_cents: i64) -> CreateTransactionRequest {
        CreateTransactionRequest {
            account_id,
            posted_date: date(2026, 1, 15),
            amount_cents,
            payee_raw: None,
            payee_normalized: None,
            memo: None,
            notes: None,
            category_id: None,
            kind: TransactionKind::Actual,
            source: TransactionSource::Manual,
            is_cleared: false,
            transfer_to_account_id: None,
        }
    }

    #[tokio::test]
    async fn create_returns_created_transaction() {
        let (state, app_state) = get_test_state();
        let account_id = seed_account(&app_state, "Checking");
        let mut body = request(account_id, -2350);
        body.payee_raw = Some("COUNTDOWN AUCKLAND".to_owned());
        body.memo = Some("groceries".to_owned());

        let response = create_transaction_endpoint(State(state), Json(body))
            .await
            .into_response();

        assert_eq!(StatusCode::CREATED, response.status());
        let created: Transaction = parse_body(response).await;
        assert!(created.id > 0);
        assert_eq!(created.account_id, account_id);
        assert_eq!(created.amount_cents, -2350);
        assert_eq!(created.payee_raw.as_deref(), Some("COUNTDOWN AUCKLAND"));
        assert_eq!(created.kind, TransactionKind::Actual);
    }

    #[tokio::test]
    async fn create_missing_account_returns_not_found() {
        let (state, _app_state) = get_test_state();

        let response = create_transaction_endpoint(State(state), Json(request(999, -2350)))
            .await
            .into_response();

        assert_eq!(StatusCode::NOT_FOUND, response.status());
    }

    #[tokio::test]
    async fn create_applies_payee_match() {
        let (state, app_state) = get_test_state();
        let account_id = seed_account(&app_state, "Checking");
        {
            let connection = app_state.db_connection.lock().unwrap();
            create_payee(
                PayeeData {
                    name: "Countdown".to_owned(),
                    match_patterns: vec![MatchRule::Contains {
                        pattern: "countdown".to_owned(),
                    }],
                    default_category_id: None,
                },
                &connection,
            )
            .expect("Could not create payee");
        }
        let mut body = request(account_id, -2350);
        body.payee_raw = Some("COUNTDOWN AUCKLAND".to_owned());

        let response = create_transaction_endpoint(State(state), Json(body))
            .await
            .into_response();

        let created: Transaction = parse_body(response).await;
        assert_eq!(created.display_name.as_deref(), Some("Countdown"));
    }

    #[tokio::test]
    async fn create_with_destination_creates_transfer_pair() {
        let (state, app_state) = get_test_state();
        let source_id = seed_account(&app_state, "Checking");
        let destination_id = seed_account(&app_state, "Savings");
        let mut body = request(source_id, 10_000);
        body.transfer_to_account_id = Some(destination_id);

        let response = create_transaction_endpoint(State(state.clone()), Json(body))
            .await
            .into_response();

        assert_eq!(StatusCode::CREATED, response.status());
        let outflow: Transaction = parse_body(response).await;
        assert_eq!(outflow.account_id, source_id);
        assert_eq!(outflow.amount_cents, -10_000);
        assert_eq!(outflow.kind, TransactionKind::Transfer);
        let linked_id = outflow.transfer_link_id.expect("Expected a linked row");

        let response = get_transaction_endpoint(State(state), Path(linked_id))
            .await
            .into_response();
        let inflow: Transaction = parse_body(response).await;
        assert_eq!(inflow.account_id, destination_id);
        assert_eq!(inflow.amount_cents, 10_000);
        assert_eq!(inflow.transfer_link_id, Some(outflow.id));
    }

    #[tokio::test]
    async fn list_filters_by_account() {
        let (state, app_state) = get_test_state();
        let checking = seed_account(&app_state, "Checking");
        let savings = seed_account(&app_state, "Savings");
        for amount in [-100, -200] {
            create_transaction_endpoint(State(state.clone()), Json(request(checking, amount)))
                .await
                .expect("Could not create transaction");
        }
        create_transaction_endpoint(State(state.clone()), Json(request(savings, -300)))
            .await
            .expect("Could not create transaction");

        let response = get_transactions_endpoint(
            State(state),
            Query(super::TransactionFilter {
                account_id: Some(checking),
                year: None,
                month: None,
            }),
        )
        .await
        .into_response();

        assert_eq!(StatusCode::OK, response.status());
        let transactions: Vec<Transaction> = parse_body(response).await;
        assert_eq!(transactions.len(), 2);
    }

    #[tokio::test]
    async fn list_filters_by_year_and_month() {
        let (state, app_state) = get_test_state();
        let account_id = seed_account(&app_state, "Checking");
        let mut january = request(account_id, -100);
        january.posted_date = date(2026, 1, 15);
        let mut february = request(account_id, -200);
        february.posted_date = date(2026, 2, 20);
        for body in [january, february] {
            create_transaction_endpoint(State(state.clone()), Json(body))
                .await
                .expect("Could not create transaction");
        }

        let response = get_transactions_endpoint(
            State(state),
            Query(super::TransactionFilter {
                account_id: None,
                year: Some(2026),
                month: Some(2),
            }),
        )
        .await
        .into_response();

        let transactions: Vec<Transaction> = parse_body(response).await;
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].posted_date, date(2026, 2, 20));
    }

    #[tokio::test]
    async fn update_mirrors_linked_transfer() {
        let (state, app_state) = get_test_state();
        let source_id = seed_account(&app_state, "Checking");
        let destination_id = seed_account(&app_state, "Savings");
        let mut body = request(source_id, 10_000);
        body.transfer_to_account_id = Some(destination_id);
        let response = create_transaction_endpoint(State(state.clone()), Json(body))
            .await
            .into_response();
        let outflow: Transaction = parse_body(response).await;

        let response = update_transaction_endpoint(
            State(state.clone()),
            Path(outflow.id),
            Json(UpdateTransaction {
                posted_date: date(2026, 2, 1),
                amount_cents: -7500,
                payee_raw: None,
                memo: Some("rebalanced".to_owned()),
                notes: None,
                category_id: None,
                is_cleared: false,
            }),
        )
        .await
        .into_response();

        assert_eq!(StatusCode::OK, response.status());
        let updated: Transaction = parse_body(response).await;
        assert_eq!(updated.amount_cents, -7500);

        let linked_id = updated.transfer_link_id.expect("Expected a linked row");
        let response = get_transaction_endpoint(State(state), Path(linked_id))
            .await
            .into_response();
        let inflow: Transaction = parse_body(response).await;
        assert_eq!(inflow.amount_cents, 7500);
        assert_eq!(inflow.posted_date, date(2026, 2, 1));
        assert_eq!(inflow.memo.as_deref(), Some("rebalanced"));
    }

    #[tokio::test]
    async fn delete_removes_both_transfer_halves() {
        let (state, app_state) = get_test_state();
        let source_id = seed_account(&app_state, "Checking");
        let destination_id = seed_account(&app_state, "Savings");
        let mut body = request(source_id, 10_000);
        body.transfer_to_account_id = Some(destination_id);
        let response = create_transaction_endpoint(State(state.clone()), Json(body))
            .await
            .into_response();
        let outflow: Transaction = parse_body(response).await;
        let linked_id = outflow.transfer_link_id.expect("Expected a linked row");

        let response = delete_transaction_endpoint(State(state.clone()), Path(outflow.id))
            .await
            .into_response();

        assert_eq!(StatusCode::NO_CONTENT, response.status());
        for id in [outflow.id, linked_id] {
            let response = get_transaction_endpoint(State(state.clone()), Path(id))
                .await
                .into_response();
            assert_eq!(StatusCode::NOT_FOUND, response.status());
        }
    }

    #[tokio::test]
    async fn delete_missing_transaction_returns_not_found() {
        let (state, _app_state) = get_test_state();

        let response = delete_transaction_endpoint(State(state), Path(999))
            .await
            .into_response();

        assert_eq!(StatusCode::NOT_FOUND, response.status());
    }
}
