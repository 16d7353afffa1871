//! Defines the JSON endpoints for importing bank statements.
//!
//! Importing is a two-step flow: preview parses the uploaded file and
//! reconciles it against the ledger without writing anything, then commit
//! writes the rows the user kept.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    AppState, DatabaseID, Error,
    account::get_account,
    import::{
        commit::commit_import,
        csv::{AmountConfig, ColumnMapping, CsvParseConfig, parse_csv},
        ofx::parse_ofx,
        preview::{ImportPreview, preview_import},
        profile::{
            ImportProfileData, find_matching_profile, get_profiles_for_account, upsert_profile,
        },
        statement::{ParsedRow, ParsedStatement},
    },
    transaction::TransactionSource,
};

/// The state needed for the statement import endpoints.
#[derive(Debug, Clone)]
pub struct ImportState {
    /// The database connection for reconciling and writing imports.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for ImportState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The request body for previewing a statement file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewRequest {
    /// The account the statement belongs to.
    pub account_id: DatabaseID,
    /// The uploaded file's name; the extension selects the parser.
    pub file_name: String,
    /// The uploaded file's text content.
    pub file_content: String,
    /// The field delimiter for CSV files.
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    /// Physical lines to drop before the header row.
    #[serde(default)]
    pub skip_rows: usize,
    /// Whether the first row names the columns.
    #[serde(default = "default_has_header")]
    pub has_header: bool,
    /// An explicit column mapping; overrides any saved profile.
    #[serde(default)]
    pub column_mapping: Option<ColumnMapping>,
    /// An explicit amount configuration.
    #[serde(default)]
    pub amount_config: Option<AmountConfig>,
    /// An explicit strftime date format.
    #[serde(default)]
    pub date_format: Option<String>,
}

fn default_delimiter() -> String {
    ",".to_owned()
}

fn default_has_header() -> bool {
    true
}

/// The response body for a statement preview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewResponse {
    /// The reconciled rows and counts.
    #[serde(flatten)]
    pub preview: ImportPreview,
    /// The column names found in the file.
    pub headers: Vec<String>,
    /// The signature used to match saved profiles.
    pub header_signature: String,
    /// The date format auto-detection settled on, if any.
    pub detected_date_format: Option<String>,
    /// The column mapping the rows were parsed with.
    pub column_mapping: Option<ColumnMapping>,
    /// The amount configuration the rows were parsed with.
    pub amount_config: Option<AmountConfig>,
    /// The ID of the saved profile that was applied, if any.
    pub matched_profile_id: Option<DatabaseID>,
    /// The name of the saved profile that was applied, if any.
    pub matched_profile_name: Option<String>,
}

/// The request body for committing a previewed statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitRequest {
    /// The account the statement belongs to.
    pub account_id: DatabaseID,
    /// The batch ID issued by the preview.
    pub batch_id: String,
    /// The rows to import, as returned by the preview.
    pub rows: Vec<ParsedRow>,
    /// Indices of duplicate rows the user chose to import anyway.
    #[serde(default)]
    pub accepted_row_indices: Vec<usize>,
    /// The source to stamp onto the imported transactions.
    pub source: TransactionSource,
}

/// A route handler for parsing a statement file and reconciling it against
/// the ledger.
///
/// Nothing is written; the response carries everything a later commit needs.
pub async fn preview_import_endpoint(
    State(state): State<ImportState>,
    Json(request): Json<PreviewRequest>,
) -> Result<Response, Error> {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Err(Error::DatabaseLockError);
        }
    };

    get_account(request.account_id, &connection)?;

    let extension = request
        .file_name
        .rsplit_once('.')
        .map(|(_, extension)| extension.to_lowercase())
        .unwrap_or_default();

    let mut matched_profile = None;
    let parsed: ParsedStatement = match extension.as_str() {
        "csv" => {
            let config = CsvParseConfig {
                delimiter: request.delimiter.clone(),
                has_header: request.has_header,
                skip_rows: request.skip_rows,
                column_mapping: request.column_mapping.clone(),
                amount_config: request.amount_config.clone(),
                date_format: request.date_format.clone(),
            };
            let parsed = parse_csv(&request.file_content, &config)?;

            // An explicit mapping from the client always wins over a saved
            // profile.
            if request.column_mapping.is_none() {
                matched_profile =
                    find_matching_profile(request.account_id, &parsed.header_signature, &connection)?;
            }

            match &matched_profile {
                Some(profile) => parse_csv(&request.file_content, &CsvParseConfig::from(profile))?,
                None => parsed,
            }
        }
        "ofx" | "qfx" => parse_ofx(&request.file_content)?,
        _ => {
            return Err(Error::InvalidImportFile(format!(
                "Unsupported file type '{extension}'"
            )));
        }
    };

    let preview = preview_import(request.account_id, &parsed, &connection)?;

    tracing::info!(
        "previewed {} rows for account {}: {} new, {} duplicate, {} errors",
        preview.total_count,
        request.account_id,
        preview.new_count,
        preview.duplicate_count,
        preview.error_count
    );

    let response = PreviewResponse {
        headers: parsed.headers,
        header_signature: parsed.header_signature,
        detected_date_format: parsed.detected_date_format,
        column_mapping: parsed.column_mapping,
        amount_config: parsed.amount_config,
        matched_profile_id: matched_profile.as_ref().map(|profile| profile.id),
        matched_profile_name: matched_profile.map(|profile| profile.name),
        preview,
    };

    Ok(Json(response).into_response())
}

/// A route handler for writing previewed rows into the ledger.
pub async fn commit_import_endpoint(
    State(state): State<ImportState>,
    Json(request): Json<CommitRequest>,
) -> Result<Response, Error> {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Err(Error::DatabaseLockError);
        }
    };

    get_account(request.account_id, &connection)?;

    let transaction = connection.unchecked_transaction()?;
    let outcome = commit_import(
        request.account_id,
        &request.batch_id,
        &request.rows,
        &request.accepted_row_indices,
        request.source,
        &transaction,
    )?;
    transaction.commit()?;

    tracing::info!(
        "imported {} transactions into account {} ({} skipped as duplicates)",
        outcome.imported_count,
        request.account_id,
        outcome.skipped_count
    );

    Ok(Json(outcome).into_response())
}

/// A route handler for saving an account's import profile.
pub async fn create_import_profile_endpoint(
    State(state): State<ImportState>,
    Json(data): Json<ImportProfileData>,
) -> Result<Response, Error> {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Err(Error::DatabaseLockError);
        }
    };

    let profile = upsert_profile(data, &connection)?;

    Ok((StatusCode::CREATED, Json(profile)).into_response())
}

/// A route handler for listing an account's saved import profiles.
pub async fn get_import_profiles_endpoint(
    State(state): State<ImportState>,
    Path(account_id): Path<DatabaseID>,
) -> Result<Response, Error> {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Err(Error::DatabaseLockError);
        }
    };

    let profiles = get_profiles_for_account(account_id, &connection)?;

    Ok(Json(profiles).into_response())
}
