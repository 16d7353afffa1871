//! Defines the JSON endpoints for projecting forecasts and managing
//! dismissals.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    AppState, Error,
    database_id::DatabaseID,
    forecast::{
        dismissal::{clear_dismissals, count_dismissals_since, dismiss_forecast},
        projector::project_forecasts,
    },
};

/// The state needed for the forecast endpoints.
#[derive(Debug, Clone)]
pub struct ForecastState {
    /// The database connection for projecting forecasts.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for ForecastState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The query parameters for projecting forecasts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastQuery {
    /// The account to project forecasts for.
    pub account_id: DatabaseID,
    /// The first date of the projection window.
    pub start_date: NaiveDate,
    /// The last date of the projection window.
    pub end_date: NaiveDate,
}

/// The request body for dismissing a projected forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DismissRequest {
    /// The payee whose forecast is being dismissed.
    pub payee_id: DatabaseID,
    /// The account the forecast was projected for.
    pub account_id: DatabaseID,
    /// Any date within the month being dismissed.
    pub period_date: NaiveDate,
}

/// The query parameters for counting or clearing a payee's dismissals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DismissalQuery {
    /// The payee whose dismissals are being counted or cleared.
    pub payee_id: DatabaseID,
}

/// A route handler for projecting forecast rows for an account and window.
pub async fn get_forecasts_endpoint(
    State(state): State<ForecastState>,
    Query(query): Query<ForecastQuery>,
) -> Result<Response, Error> {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Err(Error::DatabaseLockError);
        }
    };

    let forecasts = project_forecasts(
        query.account_id,
        query.start_date,
        query.end_date,
        &connection,
    )?;

    Ok(Json(forecasts).into_response())
}

/// A route handler for dismissing one projected forecast instance.
///
/// Dismissing an already dismissed period reports `already_dismissed` rather
/// than an error, so the operation can be retried safely.
pub async fn dismiss_forecast_endpoint(
    State(state): State<ForecastState>,
    Json(request): Json<DismissRequest>,
) -> Result<Response, Error> {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Err(Error::DatabaseLockError);
        }
    };

    let newly_dismissed = dismiss_forecast(
        request.payee_id,
        request.account_id,
        request.period_date,
        &connection,
    )?;

    let status = if newly_dismissed {
        "dismissed"
    } else {
        "already_dismissed"
    };

    Ok((StatusCode::CREATED, Json(json!({ "status": status }))).into_response())
}

/// A route handler for counting a payee's dismissals from the current month
/// onward.
pub async fn count_dismissals_endpoint(
    State(state): State<ForecastState>,
    Query(query): Query<DismissalQuery>,
) -> Result<Response, Error> {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Err(Error::DatabaseLockError);
        }
    };

    let today = chrono::Local::now().date_naive();
    let count = count_dismissals_since(query.payee_id, today, &connection)?;

    Ok(Json(json!({ "count": count })).into_response())
}

/// A route handler for clearing every dismissal a payee has.
pub async fn clear_dismissals_endpoint(
    State(state): State<ForecastState>,
    Query(query): Query<DismissalQuery>,
) -> Result<Response, Error> {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Err(Error::DatabaseLockError);
        }
    };

    let deleted_count = clear_dismissals(query.payee_id, &connection)?;

    Ok(Json(json!({ "deleted_count": deleted_count })).into_response())
}
