//! Defines the JSON endpoints for managing categories.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    category::{
        CategoryData, create_category, delete_category, get_all_categories, get_category,
        update_category,
    },
    database_id::DatabaseID,
};

/// The state needed for the category endpoints.
#[derive(Debug, Clone)]
pub struct CategoryState {
    /// The database connection for managing categories.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CategoryState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler for listing all categories.
pub async fn get_categories_endpoint(
    State(state): State<CategoryState>,
) -> Result<Response, Error> {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Err(Error::DatabaseLockError);
        }
    };

    let categories = get_all_categories(&connection)?;

    Ok(Json(categories).into_response())
}

/// A route handler for creating a new category.
pub async fn create_category_endpoint(
    State(state): State<CategoryState>,
    Json(data): Json<CategoryData>,
) -> Result<Response, Error> {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Err(Error::DatabaseLockError);
        }
    };

    let category = create_category(data, &connection)?;

    Ok((StatusCode::CREATED, Json(category)).into_response())
}

/// A route handler for retrieving a single category.
pub async fn get_category_endpoint(
    State(state): State<CategoryState>,
    Path(category_id): Path<DatabaseID>,
) -> Result<Response, Error> {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Err(Error::DatabaseLockError);
        }
    };

    let category = get_category(category_id, &connection)?;

    Ok(Json(category).into_response())
}

/// A route handler for replacing a category's fields.
pub async fn update_category_endpoint(
    State(state): State<CategoryState>,
    Path(category_id): Path<DatabaseID>,
    Json(data): Json<CategoryData>,
) -> Result<Response, Error> {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Err(Error::DatabaseLockError);
        }
    };

    let category = update_category(category_id, data, &connection)?;

    Ok(Json(category).into_response())
}

/// A route handler for deleting a category.
pub async fn delete_category_endpoint(
    State(state): State<CategoryState>,
    Path(category_id): Path<DatabaseID>,
) -> Result<Response, Error> {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Err(Error::DatabaseLockError);
        }
    };

    delete_category(category_id, &connection)?;

    Ok(StatusCode::NO_CONTENT.into_response())
}
