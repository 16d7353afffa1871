//! Statement import: file parsing, duplicate reconciliation and commit.

mod commit;
mod csv;
mod endpoints;
mod fingerprint;
mod normalize;
mod ofx;
mod preview;
mod profile;
mod statement;

pub use commit::{ImportOutcome, commit_import};
pub use csv::{
    AmountConfig, ColumnMapping, CsvParseConfig, DetectedColumns, detect_columns,
    header_signature, parse_csv,
};
pub use endpoints::{
    CommitRequest, ImportState, PreviewRequest, PreviewResponse, commit_import_endpoint,
    create_import_profile_endpoint, get_import_profiles_endpoint, preview_import_endpoint,
};
pub use fingerprint::{compute_fingerprint, new_batch_id};
pub use normalize::{DATE_FORMATS, DateParser, parse_amount_cents};
pub use ofx::parse_ofx;
pub use preview::{DuplicateRow, ImportPreview, preview_import};
pub use profile::{
    ImportProfile, ImportProfileData, create_import_profile_table, find_matching_profile,
    get_profiles_for_account, upsert_profile,
};
pub use statement::{ParsedRow, ParsedStatement};
