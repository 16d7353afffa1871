//! Parses statement dates and money amounts into typed values.

use chrono::NaiveDate;

use crate::Error;

/// Date formats tried, in order, when no explicit format is configured.
pub const DATE_FORMATS: [&str; 10] = [
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d/%m/%Y",
    "%m/%d/%y",
    "%d-%m-%Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%d %b %Y",
];

/// Parses the dates of one statement file.
///
/// The first format that parses successfully is remembered and tried first on
/// later rows, so a file of `01/02/2024` style dates cannot flip between
/// month-first and day-first interpretations halfway through.
#[derive(Debug, Clone, Default)]
pub struct DateParser {
    configured_format: Option<String>,
    detected_format: Option<String>,
}

impl DateParser {
    /// Create a parser, optionally pinned to an explicit strftime format.
    pub fn new(configured_format: Option<String>) -> Self {
        Self {
            configured_format,
            detected_format: None,
        }
    }

    /// The format that parsed a date earlier in this pass, if any format had
    /// to be guessed.
    pub fn detected_format(&self) -> Option<&str> {
        self.detected_format.as_deref()
    }

    /// Parse a date, trying the configured format, then the remembered
    /// format, then [DATE_FORMATS] in order.
    ///
    /// # Errors
    /// Returns an [Error::InvalidDate] if no format matches.
    pub fn parse(&mut self, text: &str) -> Result<NaiveDate, Error> {
        let trimmed = text.trim();

        if let Some(format) = &self.configured_format {
            if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
                return Ok(date);
            }
        }

        if let Some(format) = &self.detected_format {
            if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
                return Ok(date);
            }
        }

        for format in DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
                self.detected_format = Some(format.to_owned());
                return Ok(date);
            }
        }

        Err(Error::InvalidDate(text.to_owned()))
    }
}

/// Parse a money amount into whole cents, rounding half away from zero.
///
/// Accepts currency symbols, thousands separators and accounting-style
/// parentheses for negatives. An empty or whitespace-only string parses as
/// zero so blank debit/credit cells need no special casing.
///
/// # Errors
/// Returns an [Error::InvalidAmount] if the text contains no usable number.
pub fn parse_amount_cents(text: &str) -> Result<i64, Error> {
    let trimmed = text.trim();

    if trimmed.is_empty() {
        return Ok(0);
    }

    let mut negative = trimmed.starts_with('(') && trimmed.ends_with(')');
    let inner = if negative {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    };

    let cleaned: String = inner
        .chars()
        .filter(|character| character.is_ascii_digit() || matches!(character, '.' | ',' | '-'))
        .collect();

    let unsigned = match cleaned.strip_prefix('-') {
        Some(rest) => {
            negative = true;
            rest
        }
        None => cleaned.as_str(),
    };
    let unsigned = unsigned.replace(',', "");

    let (whole, fraction) = match unsigned.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (unsigned.as_str(), ""),
    };

    if whole.is_empty() && fraction.is_empty() {
        return Err(Error::InvalidAmount(text.to_owned()));
    }

    if !whole.bytes().all(|byte| byte.is_ascii_digit())
        || !fraction.bytes().all(|byte| byte.is_ascii_digit())
    {
        return Err(Error::InvalidAmount(text.to_owned()));
    }

    let whole_cents = if whole.is_empty() {
        0
    } else {
        whole
            .parse::<i64>()
            .ok()
            .and_then(|dollars| dollars.checked_mul(100))
            .ok_or_else(|| Error::InvalidAmount(text.to_owned()))?
    };

    let fraction_cents = match fraction.len() {
        0 => 0,
        1 => 10 * i64::from(fraction.as_bytes()[0] - b'0'),
        _ => {
            let cents = fraction[..2]
                .parse::<i64>()
                .map_err(|_| Error::InvalidAmount(text.to_owned()))?;

            // The third fractional digit decides the rounding carry.
            if fraction.len() > 2 && fraction.as_bytes()[2] >= b'5' {
                cents + 1
            } else {
                cents
            }
        }
    };

    let cents = whole_cents + fraction_cents;

    Ok(if negative { -cents } else { cents })
}


#[cfg(test)]
mod date_tests {
    use chrono::NaiveDate;

    use crate::{Error, import::normalize::DateParser};

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn parses_us_slash_dates() {
        let mut parser = DateParser::new(None);

        assert_eq!(parser.parse("01/15/2024"), Ok(date(2024, 1, 15)));
        assert_eq!(parser.detected_format(), Some("%m/%d/%Y"));
    }

    #[test]
    fn parses_iso_dates() {
        let mut parser = DateParser::new(None);

        assert_eq!(parser.parse("2024-01-15"), Ok(date(2024, 1, 15)));
    }

    #[test]
    fn parses_month_name_formats() {
        let mut parser = DateParser::new(None);

        assert_eq!(parser.parse("Jan 15, 2024"), Ok(date(2024, 1, 15)));
        assert_eq!(
            DateParser::new(None).parse("15 Jan 2024"),
            Ok(date(2024, 1, 15))
        );
        assert_eq!(
            DateParser::new(None).parse("January 15, 2024"),
            Ok(date(2024, 1, 15))
        );
    }

    #[test]
    fn configured_format_takes_precedence() {
        let mut parser = DateParser::new(Some("%d/%m/%Y".to_owned()));

        assert_eq!(parser.parse("03/04/2024"), Ok(date(2024, 4, 3)));
    }

    #[test]
    fn detected_format_is_reused_for_later_rows() {
        let mut parser = DateParser::new(None);

        // The first row is unambiguous and pins the format to month-first.
        assert_eq!(parser.parse("01/15/2024"), Ok(date(2024, 1, 15)));
        assert_eq!(parser.parse("03/04/2024"), Ok(date(2024, 3, 4)));
    }

    #[test]
    fn ambiguous_dates_use_the_first_listed_format() {
        let mut parser = DateParser::new(None);

        assert_eq!(parser.parse("03/04/2024"), Ok(date(2024, 3, 4)));
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        let mut parser = DateParser::new(None);

        assert_eq!(parser.parse(" 2024-01-15 "), Ok(date(2024, 1, 15)));
    }

    #[test]
    fn unparseable_text_is_an_error() {
        let mut parser = DateParser::new(None);

        assert_eq!(
            parser.parse("not-a-date"),
            Err(Error::InvalidDate("not-a-date".to_owned()))
        );
    }
}
