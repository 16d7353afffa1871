//! Parses delimited statement files into rows using a column mapping.
//!
//! Column positions come from an explicit mapping, a saved import profile, or
//! keyword-based auto-detection over the header row.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    Error,
    import::{
        fingerprint::compute_fingerprint,
        normalize::{DateParser, parse_amount_cents},
        statement::{ParsedRow, ParsedStatement},
    },
};

// ============================================================================
// MODELS
// ============================================================================

/// Where each transaction field lives in a delimited row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMapping {
    /// The zero-based date column. Defaults to the first column.
    #[serde(default)]
    pub date: usize,
    /// The zero-based payee column.
    #[serde(default)]
    pub payee: Option<usize>,
    /// The zero-based memo column.
    #[serde(default)]
    pub memo: Option<usize>,
    /// The zero-based amount column, for single-column statements.
    #[serde(default)]
    pub amount: Option<usize>,
}

/// How the signed amount is derived from a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AmountConfig {
    /// One signed amount column.
    Single {
        /// The zero-based amount column.
        column: usize,
        /// Flip the sign after parsing, for statements that record spending
        /// as positive numbers.
        #[serde(default)]
        negate: bool,
    },
    /// Separate debit and credit columns; the amount is credit minus debit.
    Split {
        /// The zero-based debit column.
        debit_column: usize,
        /// The zero-based credit column.
        credit_column: usize,
    },
}

/// The settings used to parse one delimited statement file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsvParseConfig {
    /// The field delimiter; only the first byte is used.
    pub delimiter: String,
    /// Whether the first row (after skipping) names the columns.
    pub has_header: bool,
    /// Physical lines to drop before the header row.
    pub skip_rows: usize,
    /// An explicit column mapping. None triggers auto-detection.
    pub column_mapping: Option<ColumnMapping>,
    /// An explicit amount configuration. None derives one from the mapping
    /// or auto-detection.
    pub amount_config: Option<AmountConfig>,
    /// An explicit strftime date format. None auto-detects per row.
    pub date_format: Option<String>,
}

impl Default for CsvParseConfig {
    fn default() -> Self {
        Self {
            delimiter: ",".to_owned(),
            has_header: true,
            skip_rows: 0,
            column_mapping: None,
            amount_config: None,
            date_format: None,
        }
    }
}

/// The column indices found by scanning header names for known keywords.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DetectedColumns {
    /// The detected date column.
    pub date: Option<usize>,
    /// The detected single amount column.
    pub amount: Option<usize>,
    /// The detected debit column.
    pub debit: Option<usize>,
    /// The detected credit column.
    pub credit: Option<usize>,
    /// The detected payee column.
    pub payee: Option<usize>,
    /// The detected memo column.
    pub memo: Option<usize>,
}

impl DetectedColumns {
    /// The detected columns as a usable mapping, defaulting the date to the
    /// first column.
    pub fn to_mapping(&self) -> ColumnMapping {
        ColumnMapping {
            date: self.date.unwrap_or(0),
            payee: self.payee,
            memo: self.memo,
            amount: self.amount,
        }
    }

    /// The amount configuration implied by the detected columns.
    ///
    /// Split mode wins whenever both a debit and a credit column were found.
    pub fn to_amount_config(&self) -> Option<AmountConfig> {
        match (self.debit, self.credit) {
            (Some(debit_column), Some(credit_column)) => Some(AmountConfig::Split {
                debit_column,
                credit_column,
            }),
            _ => self.amount.map(|column| AmountConfig::Single {
                column,
                negate: false,
            }),
        }
    }
}

// ============================================================================
// PARSING
// ============================================================================

/// A short stable digest of the column names, used to match saved profiles.
///
/// Case and surrounding whitespace are ignored, so two exports of the same
/// statement layout always produce the same signature.
pub fn header_signature(headers: &[String]) -> String {
    let joined = headers
        .iter()
        .map(|header| header.trim().to_lowercase())
        .collect::<Vec<_>>()
        .join("|");
    let digest = format!("{:x}", md5::compute(joined.as_bytes()));

    digest[..16].to_owned()
}

/// Scan lower-cased header names left to right for keyword families.
///
/// The first header containing any keyword of a family wins that family.
/// Headers mentioning a balance are never treated as the amount column, and
/// the memo column is never the same as the payee column.
pub fn detect_columns(headers: &[String]) -> DetectedColumns {
    let lowered: Vec<String> = headers
        .iter()
        .map(|header| header.trim().to_lowercase())
        .collect();

    let payee = find_column(
        &lowered,
        &["payee", "description", "merchant", "name", "vendor", "memo"],
        None,
        None,
    );

    DetectedColumns {
        date: find_column(
            &lowered,
            &[
                "date",
                "posted",
                "transaction date",
                "trans date",
                "post date",
            ],
            None,
            None,
        ),
        amount: find_column(
            &lowered,
            &["amount", "sum", "value", "total"],
            None,
            Some("balance"),
        ),
        debit: find_column(&lowered, &["debit", "withdrawal", "payment"], None, None),
        credit: find_column(&lowered, &["credit", "deposit"], None, None),
        payee,
        memo: find_column(&lowered, &["memo", "note", "reference", "check"], payee, None),
    }
}

fn find_column(
    lowered: &[String],
    keywords: &[&str],
    exclude: Option<usize>,
    reject_containing: Option<&str>,
) -> Option<usize> {
    lowered.iter().enumerate().find_map(|(index, header)| {
        if Some(index) == exclude {
            return None;
        }

        if reject_containing.is_some_and(|fragment| header.contains(fragment)) {
            return None;
        }

        keywords
            .iter()
            .any(|keyword| header.contains(keyword))
            .then_some(index)
    })
}

/// Parse delimited statement content into rows.
///
/// Rows that fail to parse become entries in the returned error list rather
/// than failing the call; only a file with no usable lines at all is an
/// error. Rows whose cells are all blank are skipped silently.
///
/// # Errors
/// Returns an [Error::InvalidImportFile] if no lines remain after skipping,
/// - or [Error::InvalidImportFile] if the CSV data itself is unreadable.
pub fn parse_csv(content: &str, config: &CsvParseConfig) -> Result<ParsedStatement, Error> {
    let lines: Vec<&str> = content.lines().skip(config.skip_rows).collect();

    if lines.iter().all(|line| line.trim().is_empty()) {
        return Err(Error::InvalidImportFile("Empty CSV file".to_owned()));
    }

    let body = lines.join("\n");
    let delimiter = config.delimiter.bytes().next().unwrap_or(b',');
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(body.as_bytes());

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|error| {
            Error::InvalidImportFile(format!("Could not read CSV data: {error}"))
        })?;
        records.push(record);
    }

    let (headers, data_start) = if config.has_header {
        let Some(first) = records.first() else {
            return Err(Error::InvalidImportFile("Empty CSV file".to_owned()));
        };
        let headers: Vec<String> = first.iter().map(|cell| cell.trim().to_owned()).collect();
        (headers, 1)
    } else {
        let width = records.first().map(csv::StringRecord::len).unwrap_or(0);
        let headers: Vec<String> = (1..=width).map(|index| format!("Column {index}")).collect();
        (headers, 0)
    };

    let signature = header_signature(&headers);
    let detected = detect_columns(&headers);
    let mapping = config
        .column_mapping
        .clone()
        .unwrap_or_else(|| detected.to_mapping());
    let amount_config = match (&config.amount_config, &config.column_mapping) {
        (Some(explicit), _) => Some(explicit.clone()),
        (None, Some(mapping)) => mapping.amount.map(|column| AmountConfig::Single {
            column,
            negate: false,
        }),
        (None, None) => detected.to_amount_config(),
    };

    let mut parser = DateParser::new(config.date_format.clone());
    let mut rows = Vec::new();
    let mut errors = Vec::new();

    for (index, record) in records.iter().skip(data_start).enumerate() {
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        let line_number = config.skip_rows + data_start + index + 1;
        match parse_record(
            record,
            &headers,
            &mapping,
            amount_config.as_ref(),
            &mut parser,
            index + 1,
        ) {
            Ok(row) => rows.push(row),
            Err(error) => errors.push(format!("Row {line_number}: {error}")),
        }
    }

    let row_count = rows.len();
    let error_count = errors.len();

    Ok(ParsedStatement {
        headers,
        header_signature: signature,
        rows,
        detected_date_format: parser.detected_format().map(ToOwned::to_owned),
        column_mapping: Some(mapping),
        amount_config,
        row_count,
        error_count,
        errors,
    })
}

fn parse_record(
    record: &csv::StringRecord,
    headers: &[String],
    mapping: &ColumnMapping,
    amount_config: Option<&AmountConfig>,
    parser: &mut DateParser,
    row_index: usize,
) -> Result<ParsedRow, Error> {
    let posted_date = parser.parse(record.get(mapping.date).unwrap_or(""))?;

    let amount_cents = match amount_config {
        Some(AmountConfig::Single { column, negate }) => {
            let cents = parse_amount_cents(record.get(*column).unwrap_or(""))?;
            if *negate { -cents } else { cents }
        }
        Some(AmountConfig::Split {
            debit_column,
            credit_column,
        }) => {
            let debit = parse_amount_cents(record.get(*debit_column).unwrap_or(""))?;
            let credit = parse_amount_cents(record.get(*credit_column).unwrap_or(""))?;
            credit - debit
        }
        None => 0,
    };

    let payee_raw = mapping
        .payee
        .and_then(|column| record.get(column))
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(ToOwned::to_owned);
    let memo = mapping
        .memo
        .and_then(|column| record.get(column))
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(ToOwned::to_owned);

    let raw_data: BTreeMap<String, String> = headers
        .iter()
        .enumerate()
        .map(|(column, header)| (header.clone(), record.get(column).unwrap_or("").to_owned()))
        .collect();

    let fingerprint = compute_fingerprint(posted_date, amount_cents, payee_raw.as_deref());

    Ok(ParsedRow {
        row_index,
        posted_date,
        amount_cents,
        payee_raw,
        memo,
        external_id: None,
        fingerprint,
        raw_data,
        warnings: Vec::new(),
    })
}

#[cfg(test)]
mod parse_csv_tests {
    use chrono::NaiveDate;

    use crate::{
        Error,
        import::csv::{
            AmountConfig, ColumnMapping, CsvParseConfig, detect_columns, header_signature,
            parse_csv,
        },
    };

    const BANK_STATEMENT_CSV: &str = "Date,Amount,Description\n\
        01/15/2024,-42.50,Coffee Shop\n\
        01/16/2024,1500.00,Payroll Deposit";

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|&name| name.to_owned()).collect()
    }

    #[test]
    fn can_parse_statement_with_detected_columns() {
        let statement = parse_csv(BANK_STATEMENT_CSV, &CsvParseConfig::default())
            .expect("Could not parse CSV");

        assert_eq!(statement.headers, headers(&["Date", "Amount", "Description"]));
        assert_eq!(statement.row_count, 2);
        assert_eq!(statement.error_count, 0);
        assert_eq!(
            statement.column_mapping,
            Some(ColumnMapping {
                date: 0,
                payee: Some(2),
                memo: None,
                amount: Some(1),
            })
        );
        assert_eq!(
            statement.amount_config,
            Some(AmountConfig::Single {
                column: 1,
                negate: false,
            })
        );
        assert_eq!(statement.detected_date_format.as_deref(), Some("%m/%d/%Y"));

        let first = &statement.rows[0];
        assert_eq!(first.row_index, 1);
        assert_eq!(first.posted_date, date(2024, 1, 15));
        assert_eq!(first.amount_cents, -4250);
        assert_eq!(first.payee_raw.as_deref(), Some("Coffee Shop"));
        assert_eq!(first.raw_data["Amount"], "-42.50");
    }

    #[test]
    fn header_signature_ignores_case_and_padding() {
        let signature = header_signature(&headers(&["Date", "Amount", "Description"]));

        assert_eq!(signature.len(), 16);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(
            signature,
            header_signature(&headers(&[" date ", "AMOUNT", "Description "]))
        );
        assert_ne!(
            signature,
            header_signature(&headers(&["Date", "Description", "Amount"]))
        );
    }

    #[test]
    fn headerless_files_get_synthetic_column_names() {
        let config = CsvParseConfig {
            has_header: false,
            column_mapping: Some(ColumnMapping {
                date: 0,
                payee: Some(2),
                memo: None,
                amount: None,
            }),
            amount_config: Some(AmountConfig::Single {
                column: 1,
                negate: false,
            }),
            ..CsvParseConfig::default()
        };

        let statement = parse_csv("01/15/2024,-42.50,Coffee Shop", &config)
            .expect("Could not parse CSV");

        assert_eq!(
            statement.headers,
            headers(&["Column 1", "Column 2", "Column 3"])
        );
        assert_eq!(statement.rows[0].raw_data["Column 3"], "Coffee Shop");
    }

    #[test]
    fn skip_rows_drops_leading_junk_lines() {
        let content = format!("Account 12-3456-7890123-00\nExported 2024-02-01\n{BANK_STATEMENT_CSV}");
        let config = CsvParseConfig {
            skip_rows: 2,
            ..CsvParseConfig::default()
        };

        let statement = parse_csv(&content, &config).expect("Could not parse CSV");

        assert_eq!(statement.headers, headers(&["Date", "Amount", "Description"]));
        assert_eq!(statement.row_count, 2);
    }

    #[test]
    fn blank_rows_are_skipped_silently() {
        let content = "Date,Amount,Description\n\
            01/15/2024,-42.50,Coffee Shop\n\
            ,,\n\
            01/16/2024,1500.00,Payroll Deposit";

        let statement = parse_csv(content, &CsvParseConfig::default())
            .expect("Could not parse CSV");

        assert_eq!(statement.row_count, 2);
        assert_eq!(statement.error_count, 0);
    }

    #[test]
    fn unparseable_date_is_a_row_level_error() {
        let content = "Date,Amount,Description\n\
            not-a-date,-42.50,Coffee Shop\n\
            01/16/2024,1500.00,Payroll Deposit";

        let statement = parse_csv(content, &CsvParseConfig::default())
            .expect("Could not parse CSV");

        assert_eq!(statement.row_count, 1);
        assert_eq!(
            statement.errors,
            vec!["Row 2: Could not parse date: not-a-date".to_owned()]
        );
        assert_eq!(statement.rows[0].posted_date, date(2024, 1, 16));
    }

    #[test]
    fn quoted_fields_keep_embedded_delimiters() {
        let content = "Date,Amount,Description\n\
            01/15/2024,-42.50,\"Coffee, The Good One\"";

        let statement = parse_csv(content, &CsvParseConfig::default())
            .expect("Could not parse CSV");

        assert_eq!(
            statement.rows[0].payee_raw.as_deref(),
            Some("Coffee, The Good One")
        );
    }

    #[test]
    fn detection_prefers_split_mode_when_debit_and_credit_exist() {
        let content = "Date,Description,Debit,Credit\n\
            01/15/2024,Coffee Shop,42.50,\n\
            01/16/2024,Payroll,,1500.00";

        let statement = parse_csv(content, &CsvParseConfig::default())
            .expect("Could not parse CSV");

        assert_eq!(
            statement.amount_config,
            Some(AmountConfig::Split {
                debit_column: 2,
                credit_column: 3,
            })
        );
        assert_eq!(statement.rows[0].amount_cents, -4250);
        assert_eq!(statement.rows[1].amount_cents, 150_000);
    }

    #[test]
    fn detection_never_picks_a_balance_column_as_the_amount() {
        let detected = detect_columns(&headers(&["Date", "Description", "Balance Total", "Amount"]));

        assert_eq!(detected.amount, Some(3));
    }

    #[test]
    fn detected_memo_column_is_never_the_payee_column() {
        let detected = detect_columns(&headers(&["Date", "Amount", "Memo"]));
        assert_eq!(detected.payee, Some(2));
        assert_eq!(detected.memo, None);

        let detected = detect_columns(&headers(&["Date", "Amount", "Description", "Note"]));
        assert_eq!(detected.payee, Some(2));
        assert_eq!(detected.memo, Some(3));
    }

    #[test]
    fn explicit_mapping_overrides_detection() {
        let config = CsvParseConfig {
            column_mapping: Some(ColumnMapping {
                date: 0,
                payee: Some(1),
                memo: None,
                amount: None,
            }),
            amount_config: Some(AmountConfig::Single {
                column: 2,
                negate: true,
            }),
            ..CsvParseConfig::default()
        };

        let statement = parse_csv("Date,Details,Spent\n01/15/2024,Coffee Shop,42.50", &config)
            .expect("Could not parse CSV");

        assert_eq!(statement.rows[0].payee_raw.as_deref(), Some("Coffee Shop"));
        assert_eq!(statement.rows[0].amount_cents, -4250);
    }

    #[test]
    fn empty_file_is_an_error() {
        assert_eq!(
            parse_csv("", &CsvParseConfig::default()),
            Err(Error::InvalidImportFile("Empty CSV file".to_owned()))
        );
        assert_eq!(
            parse_csv("junk line\n\n", &CsvParseConfig {
                skip_rows: 1,
                ..CsvParseConfig::default()
            }),
            Err(Error::InvalidImportFile("Empty CSV file".to_owned()))
        );
    }
}
