//! Derives duplicate-detection fingerprints and import batch IDs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::NaiveDate;

/// Compute the duplicate-detection fingerprint for a transaction.
///
/// Two rows with the same posted date, amount and payee text produce the same
/// fingerprint regardless of payee casing or surrounding whitespace. A
/// missing payee hashes the same as an empty one.
pub fn compute_fingerprint(
    posted_date: NaiveDate,
    amount_cents: i64,
    payee_raw: Option<&str>,
) -> String {
    let payee = payee_raw
        .map(|payee| payee.trim().to_lowercase())
        .unwrap_or_default();

    format!(
        "{:x}",
        md5::compute(format!("{posted_date}|{amount_cents}|{payee}"))
    )
}

static BATCH_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Create an opaque eight-character batch ID for one import preview.
///
/// The counter keeps IDs distinct even when two previews land on the same
/// clock tick.
pub fn new_batch_id() -> String {
    let counter = BATCH_COUNTER.fetch_add(1, Ordering::Relaxed);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or_default();
    let digest = format!("{:x}", md5::compute(format!("{nanos}-{counter}")));

    digest[..8].to_owned()
}
