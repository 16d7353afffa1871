//! Defines the JSON endpoints for managing payees, their recurring rules,
//! and re-matching transaction display names.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error,
    database_id::{DatabaseID, TransactionID},
    forecast::{
        RecurringRule, delete_templates_for_payee, get_active_template_for_payee,
        upsert_template_for_payee,
    },
    payee::{
        Payee, PayeeData, create_payee, delete_payee, get_all_payees, get_payee,
        matcher::{matching_raw_payees, rematch_all, rematch_payee},
        update_payee,
    },
    transaction::get_latest_transaction_by_display_name,
};

/// The state needed for the payee endpoints.
#[derive(Debug, Clone)]
pub struct PayeeState {
    /// The database connection for managing payees.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for PayeeState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A payee as returned by the API, with its recurring rule attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayeeWithRule {
    /// The payee itself.
    #[serde(flatten)]
    pub payee: Payee,
    /// The payee's recurring schedule, if it has an active one.
    pub recurring_rule: Option<RecurringRule>,
}

/// The request body for creating a payee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatePayeeRequest {
    /// The payee's fields.
    #[serde(flatten)]
    pub payee: PayeeData,
    /// A recurring schedule to attach to the new payee.
    #[serde(default)]
    pub recurring_rule: Option<RecurringRule>,
}

/// The request body for updating a payee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdatePayeeRequest {
    /// The payee's replacement fields.
    #[serde(flatten)]
    pub payee: PayeeData,
    /// A recurring schedule to create or replace on the payee. Ignored when
    /// `remove_recurring_rule` is set.
    #[serde(default)]
    pub recurring_rule: Option<RecurringRule>,
    /// Detach and delete the payee's recurring schedule.
    #[serde(default)]
    pub remove_recurring_rule: bool,
}

/// The number of transactions whose display name changed during a re-match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RematchResponse {
    /// How many rows were updated.
    pub updated_count: usize,
}

/// The abbreviated transaction returned by the latest-transaction lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestTransaction {
    /// The ID of the transaction.
    pub id: TransactionID,
    /// The account the transaction belongs to.
    pub account_id: DatabaseID,
    /// The date the transaction posted.
    pub posted_date: NaiveDate,
    /// The amount in integer cents.
    pub amount_cents: i64,
    /// The transaction's category.
    pub category_id: Option<DatabaseID>,
}

fn payee_with_rule(payee: Payee, connection: &Connection) -> Result<PayeeWithRule, Error> {
    let recurring_rule = get_active_template_for_payee(payee.id, connection)?
        .as_ref()
        .map(RecurringRule::from);

    Ok(PayeeWithRule {
        payee,
        recurring_rule,
    })
}

/// A route handler for listing all payees, sorted by name.
pub async fn get_payees_endpoint(State(state): State<PayeeState>) -> Result<Response, Error> {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Err(Error::DatabaseLockError);
        }
    };

    let mut payees = get_all_payees(&connection)?;
    payees.sort_by(|a, b| a.name.cmp(&b.name));

    let payees = payees
        .into_iter()
        .map(|payee| payee_with_rule(payee, &connection))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(payees).into_response())
}

/// A route handler for creating a new payee, optionally with a recurring
/// rule.
pub async fn create_payee_endpoint(
    State(state): State<PayeeState>,
    Json(request): Json<CreatePayeeRequest>,
) -> Result<Response, Error> {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Err(Error::DatabaseLockError);
        }
    };

    let transaction = connection.unchecked_transaction()?;
    let payee = create_payee(request.payee, &transaction)?;
    let recurring_rule = match &request.recurring_rule {
        Some(rule) => {
            let template = upsert_template_for_payee(&payee, rule, &transaction)?;
            Some(RecurringRule::from(&template))
        }
        None => None,
    };
    transaction.commit()?;

    let response = PayeeWithRule {
        payee,
        recurring_rule,
    };

    Ok((StatusCode::CREATED, Json(response)).into_response())
}

/// A route handler for retrieving a single payee.
pub async fn get_payee_endpoint(
    State(state): State<PayeeState>,
    Path(payee_id): Path<DatabaseID>,
) -> Result<Response, Error> {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Err(Error::DatabaseLockError);
        }
    };

    let payee = get_payee(payee_id, &connection)?;
    let response = payee_with_rule(payee, &connection)?;

    Ok(Json(response).into_response())
}

/// A route handler for replacing a payee's fields and recurring rule.
pub async fn update_payee_endpoint(
    State(state): State<PayeeState>,
    Path(payee_id): Path<DatabaseID>,
    Json(request): Json<UpdatePayeeRequest>,
) -> Result<Response, Error> {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Err(Error::DatabaseLockError);
        }
    };

    let transaction = connection.unchecked_transaction()?;
    let payee = update_payee(payee_id, request.payee, &transaction)?;
    if request.remove_recurring_rule {
        delete_templates_for_payee(payee.id, &transaction)?;
    } else if let Some(rule) = &request.recurring_rule {
        upsert_template_for_payee(&payee, rule, &transaction)?;
    }
    transaction.commit()?;

    let response = payee_with_rule(payee, &connection)?;

    Ok(Json(response).into_response())
}

/// A route handler for deleting a payee and its recurring rule.
pub async fn delete_payee_endpoint(
    State(state): State<PayeeState>,
    Path(payee_id): Path<DatabaseID>,
) -> Result<Response, Error> {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Err(Error::DatabaseLockError);
        }
    };

    let transaction = connection.unchecked_transaction()?;
    delete_payee(payee_id, &transaction)?;
    transaction.commit()?;

    Ok(StatusCode::NO_CONTENT.into_response())
}

/// A route handler for re-matching the display names of every transaction in
/// the book.
pub async fn rematch_payees_endpoint(State(state): State<PayeeState>) -> Result<Response, Error> {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Err(Error::DatabaseLockError);
        }
    };

    let transaction = connection.unchecked_transaction()?;
    let updated_count = rematch_all(&transaction)?;
    transaction.commit()?;

    tracing::info!("rematched display names on {updated_count} transactions");

    Ok(Json(RematchResponse { updated_count }).into_response())
}

/// A route handler for re-matching the transactions a single payee touches.
pub async fn rematch_payee_endpoint(
    State(state): State<PayeeState>,
    Path(payee_id): Path<DatabaseID>,
) -> Result<Response, Error> {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Err(Error::DatabaseLockError);
        }
    };

    let payee = get_payee(payee_id, &connection)?;

    let transaction = connection.unchecked_transaction()?;
    let updated_count = rematch_payee(&payee, &transaction)?;
    transaction.commit()?;

    Ok(Json(RematchResponse { updated_count }).into_response())
}

/// A route handler for finding the most recent transaction displaying a
/// payee's name.
///
/// Returns JSON `null` when the payee has no transaction history.
pub async fn get_latest_payee_transaction_endpoint(
    State(state): State<PayeeState>,
    Path(payee_id): Path<DatabaseID>,
) -> Result<Response, Error> {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Err(Error::DatabaseLockError);
        }
    };

    let payee = get_payee(payee_id, &connection)?;
    let latest = get_latest_transaction_by_display_name(&payee.name, &connection)?.map(
        |transaction| LatestTransaction {
            id: transaction.id,
            account_id: transaction.account_id,
            posted_date: transaction.posted_date,
            amount_cents: transaction.amount_cents,
            category_id: transaction.category_id,
        },
    );

    Ok(Json(latest).into_response())
}

/// A route handler for listing the raw payee strings a payee's stored rules
/// match.
pub async fn get_payee_matches_endpoint(
    State(state): State<PayeeState>,
    Path(payee_id): Path<DatabaseID>,
) -> Result<Response, Error> {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Err(Error::DatabaseLockError);
        }
    };

    let payee = get_payee(payee_id, &connection)?;
    let matches = matching_raw_payees(&payee.match_patterns, &connection)?;

    Ok(Json(matches).into_response())
}

/// A route handler for listing the raw payee strings a proposed rule set
/// would match, without saving anything.
pub async fn preview_payee_matches_endpoint(
    State(state): State<PayeeState>,
    Json(data): Json<PayeeData>,
) -> Result<Response, Error> {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Err(Error::DatabaseLockError);
        }
    };

    let matches = matching_raw_payees(&data.match_patterns, &connection)?;

    Ok(Json(matches).into_response())
}

#[cfg(test)]
mod endpoint_tests {
    use axum::{
        Json,
        body::to_bytes,
        extract::{FromRef, Path, State},
        http::StatusCode,
        response::{IntoResponse, Response},
    };
    use chrono::NaiveDate;
    use rusqlite::Connection;

    use crate::{
        AppState,
        account::{AccountData, create_account},
        database_id::DatabaseID,
        forecast::{AmountMethod, Frequency, RecurringRule},
        payee::{
            CreatePayeeRequest, LatestTransaction, MatchRule, PayeeData, PayeeState,
            PayeeWithRule, RematchResponse, UpdatePayeeRequest, create_payee_endpoint,
            delete_payee_endpoint, get_latest_payee_transaction_endpoint, get_payee_endpoint,
            preview_payee_matches_endpoint, rematch_payees_endpoint, update_payee_endpoint,
        },
        transaction::{Transaction, create_transaction},
    };

    fn get_test_state() -> (PayeeState, AppState) {
        let connection = Connection::open_in_memory().unwrap();
        let app_state = AppState::new(connection, ":memory:").unwrap();

        (PayeeState::from_ref(&app_state), app_state)
    }

    async fn parse_body<T: serde::de::DeserializeOwned>(response: Response) -> T {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).expect("Could not parse response body")
    }

    fn payee_data(name: &str, match_patterns: Vec<MatchRule>) -> PayeeData {
        PayeeData {
            name: name.to_owned(),
            match_patterns,
            default_category_id: None,
        }
    }

    fn seed_account(app_state: &AppState) -> DatabaseID {
        let connection = app_state.db_connection.lock().unwrap();
        create_account(
            AccountData {
                name: "Checking".to_owned(),
                kind: "checking".to_owned(),
                institution: None,
                display_order: 0,
            },
            &connection,
        )
        .expect("Could not create account")
        .id
    }

    fn seed_transaction(app_state: &AppState, account_id: DatabaseID, payee_raw: &str) {
        let connection = app_state.db_connection.lock().unwrap();
        create_transaction(
            Transaction::build(
                account_id,
                NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
                -2350,
            )
            .payee_raw(Some(payee_raw.to_owned())),
            &connection,
        )
        .expect("Could not create transaction");
    }

    fn sample_rule(account_id: DatabaseID) -> RecurringRule {
        RecurringRule {
            account_id,
            frequency: Frequency::Monthly,
            frequency_n: 1,
            day_of_month: 20,
            amount_method: AmountMethod::Fixed,
            fixed_amount_cents: Some(-8900),
            average_count: 3,
            start_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            end_date: None,
            category_id: None,
        }
    }

    #[tokio::test]
    async fn create_returns_payee_with_rule() {
        let (state, app_state) = get_test_state();
        let account_id = seed_account(&app_state);

        let response = create_payee_endpoint(
            State(state),
            Json(CreatePayeeRequest {
                payee: payee_data("Powerco", vec![]),
                recurring_rule: Some(sample_rule(account_id)),
            }),
        )
        .await
        .into_response();

        assert_eq!(StatusCode::CREATED, response.status());
        let created: PayeeWithRule = parse_body(response).await;
        assert_eq!("Powerco", created.payee.name);
        let rule = created.recurring_rule.expect("Expected a recurring rule");
        assert_eq!(rule.account_id, account_id);
        assert_eq!(rule.fixed_amount_cents, Some(-8900));
    }

    #[tokio::test]
    async fn create_duplicate_name_returns_conflict() {
        let (state, _app_state) = get_test_state();
        create_payee_endpoint(
            State(state.clone()),
            Json(CreatePayeeRequest {
                payee: payee_data("Countdown", vec![]),
                recurring_rule: None,
            }),
        )
        .await
        .expect("Could not create payee");

        let response = create_payee_endpoint(
            State(state),
            Json(CreatePayeeRequest {
                payee: payee_data("Countdown", vec![]),
                recurring_rule: None,
            }),
        )
        .await
        .into_response();

        assert_eq!(StatusCode::CONFLICT, response.status());
    }

    #[tokio::test]
    async fn get_missing_payee_returns_not_found() {
        let (state, _app_state) = get_test_state();

        let response = get_payee_endpoint(State(state), Path(999))
            .await
            .into_response();

        assert_eq!(StatusCode::NOT_FOUND, response.status());
    }

    #[tokio::test]
    async fn update_removes_rule_when_flagged() {
        let (state, app_state) = get_test_state();
        let account_id = seed_account(&app_state);
        let response = create_payee_endpoint(
            State(state.clone()),
            Json(CreatePayeeRequest {
                payee: payee_data("Powerco", vec![]),
                recurring_rule: Some(sample_rule(account_id)),
            }),
        )
        .await
        .into_response();
        let created: PayeeWithRule = parse_body(response).await;

        let response = update_payee_endpoint(
            State(state),
            Path(created.payee.id),
            Json(UpdatePayeeRequest {
                payee: payee_data("Powerco", vec![]),
                recurring_rule: None,
                remove_recurring_rule: true,
            }),
        )
        .await
        .into_response();

        assert_eq!(StatusCode::OK, response.status());
        let updated: PayeeWithRule = parse_body(response).await;
        assert_eq!(updated.recurring_rule, None);
    }

    #[tokio::test]
    async fn rematch_returns_updated_count() {
        let (state, app_state) = get_test_state();
        let account_id = seed_account(&app_state);
        seed_transaction(&app_state, account_id, "COUNTDOWN AUCKLAND");
        create_payee_endpoint(
            State(state.clone()),
            Json(CreatePayeeRequest {
                payee: payee_data(
                    "Countdown",
                    vec![MatchRule::Contains {
                        pattern: "countdown".to_owned(),
                    }],
                ),
                recurring_rule: None,
            }),
        )
        .await
        .expect("Could not create payee");

        let response = rematch_payees_endpoint(State(state)).await.into_response();

        assert_eq!(StatusCode::OK, response.status());
        let rematch: RematchResponse = parse_body(response).await;
        assert_eq!(rematch.updated_count, 1);
    }

    #[tokio::test]
    async fn latest_transaction_returns_null_without_history() {
        let (state, _app_state) = get_test_state();
        let response = create_payee_endpoint(
            State(state.clone()),
            Json(CreatePayeeRequest {
                payee: payee_data("Powerco", vec![]),
                recurring_rule: None,
            }),
        )
        .await
        .into_response();
        let created: PayeeWithRule = parse_body(response).await;

        let response =
            get_latest_payee_transaction_endpoint(State(state), Path(created.payee.id))
                .await
                .into_response();

        assert_eq!(StatusCode::OK, response.status());
        let latest: Option<LatestTransaction> = parse_body(response).await;
        assert_eq!(latest, None);
    }

    #[tokio::test]
    async fn preview_matches_lists_matching_raw_payees() {
        let (state, app_state) = get_test_state();
        let account_id = seed_account(&app_state);
        seed_transaction(&app_state, account_id, "Countdown Akl");
        seed_transaction(&app_state, account_id, "bp connect albany");

        let response = preview_payee_matches_endpoint(
            State(state),
            Json(payee_data(
                "Countdown",
                vec![MatchRule::Contains {
                    pattern: "countdown".to_owned(),
                }],
            )),
        )
        .await
        .into_response();

        assert_eq!(StatusCode::OK, response.status());
        let matches: Vec<String> = parse_body(response).await;
        assert_eq!(matches, vec!["Countdown Akl".to_owned()]);
    }

    #[tokio::test]
    async fn delete_returns_no_content() {
        let (state, _app_state) = get_test_state();
        let response = create_payee_endpoint(
            State(state.clone()),
            Json(CreatePayeeRequest {
                payee: payee_data("Doomed", vec![]),
                recurring_rule: None,
            }),
        )
        .await
        .into_response();
        let created: PayeeWithRule = parse_body(response).await;

        let response = delete_payee_endpoint(State(state.clone()), Path(created.payee.id))
            .await
            .into_response();

        assert_eq!(StatusCode::NO_CONTENT, response.status());
        let response = get_payee_endpoint(State(state), Path(created.payee.id))
            .await
            .into_response();
        assert_eq!(StatusCode::NOT_FOUND, response.status());
    }
}
