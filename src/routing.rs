//! Application router configuration for the JSON API.

use axum::{
    Json, Router,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde_json::json;

use crate::{
    AppState,
    account::{
        create_account_endpoint, delete_account_endpoint, get_account_endpoint,
        get_accounts_endpoint, update_account_endpoint,
    },
    book::get_book_endpoint,
    category::{
        create_category_endpoint, delete_category_endpoint, get_categories_endpoint,
        get_category_endpoint, update_category_endpoint,
    },
    endpoints,
    forecast::{
        clear_dismissals_endpoint, count_dismissals_endpoint, dismiss_forecast_endpoint,
        get_forecasts_endpoint,
    },
    import::{
        commit_import_endpoint, create_import_profile_endpoint, get_import_profiles_endpoint,
        preview_import_endpoint,
    },
    logging::logging_middleware,
    payee::{
        create_payee_endpoint, delete_payee_endpoint, get_latest_payee_transaction_endpoint,
        get_payee_endpoint, get_payee_matches_endpoint, get_payees_endpoint,
        preview_payee_matches_endpoint, rematch_payee_endpoint, rematch_payees_endpoint,
        update_payee_endpoint,
    },
    transaction::{
        create_transaction_endpoint, delete_transaction_endpoint, get_transaction_endpoint,
        get_transactions_endpoint, update_transaction_endpoint,
    },
    transfer::convert_transfer_endpoint,
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(endpoints::BOOK, get(get_book_endpoint))
        .route(
            endpoints::ACCOUNTS,
            get(get_accounts_endpoint).post(create_account_endpoint),
        )
        .route(
            endpoints::ACCOUNT,
            get(get_account_endpoint)
                .put(update_account_endpoint)
                .delete(delete_account_endpoint),
        )
        .route(
            endpoints::CATEGORIES,
            get(get_categories_endpoint).post(create_category_endpoint),
        )
        .route(
            endpoints::CATEGORY,
            get(get_category_endpoint)
                .put(update_category_endpoint)
                .delete(delete_category_endpoint),
        )
        .route(
            endpoints::TRANSACTIONS,
            get(get_transactions_endpoint).post(create_transaction_endpoint),
        )
        .route(
            endpoints::TRANSACTION,
            get(get_transaction_endpoint)
                .put(update_transaction_endpoint)
                .delete(delete_transaction_endpoint),
        )
        .route(
            endpoints::CONVERT_TRANSFER,
            post(convert_transfer_endpoint),
        )
        .route(
            endpoints::PAYEES,
            get(get_payees_endpoint).post(create_payee_endpoint),
        )
        .route(
            endpoints::PAYEE,
            get(get_payee_endpoint)
                .put(update_payee_endpoint)
                .delete(delete_payee_endpoint),
        )
        .route(endpoints::PAYEE_REMATCH_ALL, post(rematch_payees_endpoint))
        .route(endpoints::PAYEE_REMATCH, post(rematch_payee_endpoint))
        .route(
            endpoints::PAYEE_LATEST_TRANSACTION,
            get(get_latest_payee_transaction_endpoint),
        )
        .route(endpoints::PAYEE_MATCHES, get(get_payee_matches_endpoint))
        .route(
            endpoints::PAYEE_PREVIEW_MATCHES,
            post(preview_payee_matches_endpoint),
        )
        .route(endpoints::IMPORT_PREVIEW, post(preview_import_endpoint))
        .route(endpoints::IMPORT_COMMIT, post(commit_import_endpoint))
        .route(
            endpoints::IMPORT_PROFILES,
            post(create_import_profile_endpoint),
        )
        .route(
            endpoints::IMPORT_PROFILES_FOR_ACCOUNT,
            get(get_import_profiles_endpoint),
        )
        .route(endpoints::FORECASTS, get(get_forecasts_endpoint))
        .route(endpoints::FORECAST_DISMISS, post(dismiss_forecast_endpoint))
        .route(
            endpoints::FORECAST_DISMISSALS,
            delete(clear_dismissals_endpoint),
        )
        .route(
            endpoints::FORECAST_DISMISSAL_COUNT,
            get(count_dismissals_endpoint),
        )
        .layer(middleware::from_fn(logging_middleware))
        .fallback(get_404_not_found)
        .with_state(state)
}

/// The JSON body returned for paths that match no route.
async fn get_404_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "no such route" })),
    )
        .into_response()
}

#[cfg(test)]
mod router_tests {
    use axum_test::TestServer;
    use rusqlite::Connection;
    use serde_json::json;

    use crate::{AppState, account::Account, endpoints, routing::build_router};

    fn get_test_server() -> TestServer {
        let db_connection =
            Connection::open_in_memory().expect("Could not open database in memory.");
        let state = AppState::new(db_connection, ":memory:").expect("Could not create app state.");

        TestServer::try_new(build_router(state)).expect("Could not create test server.")
    }

    #[tokio::test]
    async fn reports_book_status() {
        let server = get_test_server();

        let response = server.get(endpoints::BOOK).await;

        response.assert_status_ok();
        assert_eq!(response.json::<serde_json::Value>()["is_open"], json!(true));
    }

    #[tokio::test]
    async fn can_create_and_list_accounts_over_http() {
        let server = get_test_server();

        let created = server
            .post(endpoints::ACCOUNTS)
            .json(&json!({ "name": "Everyday Checking", "kind": "checking" }))
            .await;
        created.assert_status(axum::http::StatusCode::CREATED);

        let listed = server.get(endpoints::ACCOUNTS).await;
        let accounts: Vec<Account> = listed.json();

        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].name, "Everyday Checking");
    }

    #[tokio::test]
    async fn unknown_route_gets_a_json_error() {
        let server = get_test_server();

        let response = server.get("/api/definitely/not/a/route").await;

        response.assert_status_not_found();
        assert_eq!(
            response.json::<serde_json::Value>()["error"],
            json!("no such route")
        );
    }
}
