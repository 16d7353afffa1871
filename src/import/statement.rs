//! Defines the rows and statements produced by the CSV and OFX readers.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::import::csv::{AmountConfig, ColumnMapping};

/// One transaction parsed out of an uploaded statement file.
///
/// Rows survive a round trip through the preview response and the commit
/// request, so everything needed to insert the transaction later is here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedRow {
    /// The 1-based position of the row in the source file.
    pub row_index: usize,
    /// The date the transaction posted.
    pub posted_date: NaiveDate,
    /// The amount in integer cents.
    pub amount_cents: i64,
    /// The payee text as it appeared in the file.
    pub payee_raw: Option<String>,
    /// A short note from the file.
    pub memo: Option<String>,
    /// The bank's own transaction ID, e.g. an OFX FITID.
    pub external_id: Option<String>,
    /// The duplicate-detection fingerprint.
    pub fingerprint: String,
    /// Every cell of the source row, keyed by header name.
    pub raw_data: BTreeMap<String, String>,
    /// Per-row notes that did not prevent parsing.
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// The outcome of parsing one statement file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedStatement {
    /// The column names, real or synthetic.
    pub headers: Vec<String>,
    /// The digest used to match saved import profiles.
    pub header_signature: String,
    /// The successfully parsed rows.
    pub rows: Vec<ParsedRow>,
    /// The date format detected during parsing, if a format had to be
    /// guessed.
    pub detected_date_format: Option<String>,
    /// The column mapping the parser used. None for OFX statements.
    pub column_mapping: Option<ColumnMapping>,
    /// The amount configuration the parser used. None for OFX statements.
    pub amount_config: Option<AmountConfig>,
    /// The number of parsed rows.
    pub row_count: usize,
    /// The number of rows that failed to parse.
    pub error_count: usize,
    /// Row-level parse failures, labelled with their source position.
    pub errors: Vec<String>,
}
