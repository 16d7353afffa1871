//! Parses OFX and QFX bank exports.
//!
//! OFX is SGML-ish and most bank exports never close their tags, so this is a
//! line scanner over `<TAG>value` pairs rather than a real XML parse.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::{
    Error,
    import::{
        fingerprint::compute_fingerprint,
        normalize::parse_amount_cents,
        statement::{ParsedRow, ParsedStatement},
    },
};

/// The synthetic column names given to OFX fields so that parsed statements
/// share one shape with CSV ones.
const OFX_HEADERS: [&str; 5] = ["Date", "Amount", "Payee", "Memo", "FITID"];

#[derive(Debug, Default)]
struct BuildingRow {
    date_text: Option<String>,
    amount_text: Option<String>,
    name: Option<String>,
    memo: Option<String>,
    fitid: Option<String>,
}

/// Parse OFX statement content into rows.
///
/// Each `<STMTTRN>` block becomes one row. Malformed blocks become entries in
/// the returned error list; later blocks still parse.
///
/// # Errors
/// Returns an [Error::InvalidImportFile] if the content contains no
/// transaction blocks at all.
pub fn parse_ofx(content: &str) -> Result<ParsedStatement, Error> {
    let mut rows = Vec::new();
    let mut errors = Vec::new();
    let mut building: Option<BuildingRow> = None;
    let mut record_count = 0;

    for line in content.lines() {
        let Some(tag) = line.trim().strip_prefix('<') else {
            continue;
        };

        let (name, value) = match tag.split_once('>') {
            Some((name, value)) => (name.trim().to_uppercase(), value.trim()),
            None => (tag.trim_end_matches('>').trim().to_uppercase(), ""),
        };

        match name.as_str() {
            "STMTTRN" => {
                building = Some(BuildingRow::default());
                record_count += 1;
            }
            "/STMTTRN" => {
                if let Some(row) = building.take() {
                    match finish_row(row, record_count) {
                        Ok(parsed) => rows.push(parsed),
                        Err(error) => errors.push(format!("Transaction {record_count}: {error}")),
                    }
                }
            }
            _ => {
                let Some(row) = building.as_mut() else {
                    continue;
                };

                if value.is_empty() {
                    continue;
                }

                match name.as_str() {
                    "DTPOSTED" => row.date_text = Some(value.to_owned()),
                    "TRNAMT" => row.amount_text = Some(value.to_owned()),
                    "NAME" => row.name = Some(value.to_owned()),
                    "MEMO" => row.memo = Some(value.to_owned()),
                    "FITID" => row.fitid = Some(value.to_owned()),
                    _ => {}
                }
            }
        }
    }

    if record_count == 0 {
        return Err(Error::InvalidImportFile(
            "No transactions found in OFX file".to_owned(),
        ));
    }

    let headers: Vec<String> = OFX_HEADERS.iter().map(|&header| header.to_owned()).collect();
    let row_count = rows.len();
    let error_count = errors.len();

    Ok(ParsedStatement {
        headers,
        header_signature: "ofx".to_owned(),
        rows,
        detected_date_format: None,
        column_mapping: None,
        amount_config: None,
        row_count,
        error_count,
        errors,
    })
}

fn finish_row(building: BuildingRow, record_index: usize) -> Result<ParsedRow, String> {
    let date_text = building.date_text.ok_or("Missing <DTPOSTED> tag")?;
    // Timestamps look like 20240115120000[0:GMT]; the date is the first
    // eight characters.
    let compact: String = date_text.chars().take(8).collect();
    let posted_date = NaiveDate::parse_from_str(&compact, "%Y%m%d")
        .map_err(|_| format!("Could not parse date '{date_text}'"))?;

    let amount_text = building.amount_text.ok_or("Missing <TRNAMT> tag")?;
    let amount_cents = parse_amount_cents(&amount_text)
        .map_err(|_| format!("Could not parse amount '{amount_text}'"))?;

    let payee_raw = building.name.or_else(|| building.memo.clone());
    let memo = building
        .memo
        .filter(|memo| payee_raw.as_deref() != Some(memo.as_str()));

    let mut raw_data = BTreeMap::new();
    raw_data.insert("Date".to_owned(), date_text);
    raw_data.insert("Amount".to_owned(), amount_text);
    raw_data.insert("Payee".to_owned(), payee_raw.clone().unwrap_or_default());
    raw_data.insert("Memo".to_owned(), memo.clone().unwrap_or_default());
    raw_data.insert(
        "FITID".to_owned(),
        building.fitid.clone().unwrap_or_default(),
    );

    let fingerprint = compute_fingerprint(posted_date, amount_cents, payee_raw.as_deref());

    Ok(ParsedRow {
        row_index: record_index,
        posted_date,
        amount_cents,
        payee_raw,
        memo,
        external_id: building.fitid,
        fingerprint,
        raw_data,
        warnings: Vec::new(),
    })
}
