//! The API endpoints URIs.
//!
//! For endpoints that take a parameter, e.g., '/api/accounts/{account_id}',
//! use [format_endpoint].

/// The route for reporting the status of the open book.
pub const BOOK: &str = "/api/book";

/// The route to list and create accounts.
pub const ACCOUNTS: &str = "/api/accounts";

/// The route to get, update or delete a single account.
pub const ACCOUNT: &str = "/api/accounts/{account_id}";

/// The route to list and create categories.
pub const CATEGORIES: &str = "/api/categories";

/// The route to get, update or delete a single category.
pub const CATEGORY: &str = "/api/categories/{category_id}";

/// The route to list and create transactions.
pub const TRANSACTIONS: &str = "/api/transactions";

/// The route to get, update or delete a single transaction.
pub const TRANSACTION: &str = "/api/transactions/{transaction_id}";

/// The route to convert an existing transaction into one half of a transfer.
pub const CONVERT_TRANSFER: &str = "/api/transactions/{transaction_id}/convert_transfer";

/// The route to list and create payees.
pub const PAYEES: &str = "/api/payees";

/// The route to get, update or delete a single payee.
pub const PAYEE: &str = "/api/payees/{payee_id}";

/// The route to re-run payee matching over every transaction.
pub const PAYEE_REMATCH_ALL: &str = "/api/payees/rematch";

/// The route to re-run matching for a single payee.
pub const PAYEE_REMATCH: &str = "/api/payees/{payee_id}/rematch";

/// The route to fetch the most recent transaction named after a payee.
pub const PAYEE_LATEST_TRANSACTION: &str = "/api/payees/{payee_id}/latest_transaction";

/// The route to list the raw payee strings a payee's rules match.
pub const PAYEE_MATCHES: &str = "/api/payees/{payee_id}/matches";

/// The route to list the raw payee strings a set of draft rules would match.
pub const PAYEE_PREVIEW_MATCHES: &str = "/api/payees/preview_matches";

/// The route to parse a statement file and preview the import.
pub const IMPORT_PREVIEW: &str = "/api/import/preview";

/// The route to commit a previewed import.
pub const IMPORT_COMMIT: &str = "/api/import/commit";

/// The route to create or replace an import profile.
pub const IMPORT_PROFILES: &str = "/api/import/profiles";

/// The route to list the import profiles saved for an account.
pub const IMPORT_PROFILES_FOR_ACCOUNT: &str = "/api/import/profiles/{account_id}";

/// The route to project forecasts for an account over a date window.
pub const FORECASTS: &str = "/api/forecasts";

/// The route to dismiss a single forecast occurrence.
pub const FORECAST_DISMISS: &str = "/api/forecasts/dismiss";

/// The route to clear the dismissals recorded for a payee.
pub const FORECAST_DISMISSALS: &str = "/api/forecasts/dismissals";

/// The route to count the active dismissals recorded for a payee.
pub const FORECAST_DISMISSAL_COUNT: &str = "/api/forecasts/dismissals/count";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace.
/// For example, in the endpoint path '/api/accounts/{account_id}',
/// '{account_id}' is the parameter.
///
/// This function assumes that an endpoint path only contains ASCII characters
/// and a single parameter.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// the original `endpoint_path`.
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let mut param_start = None;
    let mut param_end = None;

    for (i, c) in endpoint_path.chars().enumerate() {
        if c == '{' {
            param_start = Some(i);
        } else if param_start.is_some() && c == '}' {
            param_end = Some(i + 1);
            break;
        }
    }

    let param_start = match param_start {
        Some(start) => start,
        None => return endpoint_path.to_string(),
    };

    let param_end = param_end.unwrap_or(endpoint_path.len());

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}
