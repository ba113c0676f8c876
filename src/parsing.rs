//! Print-log parsing.
//!
//! Parsing happens in two stages:
//! 1. The exported CSV is read row by row into raw `LogRow`s (content and date
//!    columns only), skipping the export's leading metadata rows.
//! 2. `parse_event` turns one log sentence plus its date text into a
//!    `PrintingEvent`.
//!
//! A log sentence follows the spooler's fixed template:
//!
//! ```text
//! Document 1790, Report owned by 108109109 on \\10.1.34.21 was printed on A4-4515x through port 10.0.0.43_2.  Size in bytes: 201625. Pages printed: 3. No user action is required.
//! ```
//!
//! The host may be an IP address or a machine name, and the document name is
//! free text of any length, so fields are located from the rightmost
//! occurrence of each marker phrase.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::config::BillingConfig;
use crate::domain::{BannerId, PrintingEvent};

const DOCUMENT: &str = "Document ";
const OWNED_BY: &str = "owned by ";
const WAS_PRINTED_ON: &str = "was printed on ";
const PAGES_PRINTED: &str = "Pages printed: ";
const THROUGH_PORT: &str = " through port";
const ON_HOST: &str = " on ";

/// Rows shorter than this after stripping are leftovers of control characters.
const MIN_CONTENT_LEN: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Missing `{0}` marker")]
    MissingMarker(&'static str),
    #[error("Invalid banner id `{0}`")]
    InvalidBannerId(String),
    #[error("Invalid page count `{0}`")]
    InvalidPageCount(String),
    #[error("Empty {0}")]
    EmptyField(&'static str),
    #[error("Unrecognised date `{0}`")]
    InvalidDate(String),
}

/// Removes every character below space (tabs, CR/LF and the NULs the export
/// sometimes leaves behind).
pub fn strip_non_printable(s: &str) -> String {
    s.chars().filter(|c| *c >= ' ').collect()
}

/// Parses one log sentence and its date column into an event. Fails as a
/// whole; no partially filled event is ever returned.
pub fn parse_event(content: &str, date_text: &str) -> Result<PrintingEvent, ParseError> {
    let content = content.trim();

    let rest = content
        .strip_prefix(DOCUMENT)
        .ok_or(ParseError::MissingMarker(DOCUMENT))?;
    let (banner, rest) = rest.split_once(',').ok_or(ParseError::MissingMarker(","))?;
    let banner_id: u32 = banner
        .trim()
        .parse()
        .map_err(|_| ParseError::InvalidBannerId(banner.to_string()))?;

    let owned_by = rest
        .rfind(OWNED_BY)
        .ok_or(ParseError::MissingMarker(OWNED_BY))?;
    let pages_printed = rest
        .rfind(PAGES_PRINTED)
        .ok_or(ParseError::MissingMarker(PAGES_PRINTED))?;
    let printed_on = rest
        .rfind(WAS_PRINTED_ON)
        .ok_or(ParseError::MissingMarker(WAS_PRINTED_ON))?;

    // Untitled jobs leave nothing between the comma and the owner.
    let document_name = rest[..owned_by].trim();

    let owner = &rest[owned_by + OWNED_BY.len()..];
    let user_id = owner
        .find(ON_HOST)
        .map(|end| owner[..end].trim())
        .ok_or(ParseError::MissingMarker(ON_HOST))?;
    if user_id.is_empty() {
        return Err(ParseError::EmptyField("user id"));
    }

    let pages = &rest[pages_printed + PAGES_PRINTED.len()..];
    let pages = pages
        .split_once('.')
        .map(|(pages, _)| pages)
        .ok_or(ParseError::MissingMarker("."))?;
    let page_count: u32 = pages
        .trim()
        .parse()
        .map_err(|_| ParseError::InvalidPageCount(pages.to_string()))?;

    let printer = &rest[printed_on + WAS_PRINTED_ON.len()..];
    let printer_name = printer
        .find(THROUGH_PORT)
        .map(|end| printer[..end].trim())
        .ok_or(ParseError::MissingMarker(THROUGH_PORT))?;
    if printer_name.is_empty() {
        return Err(ParseError::EmptyField("printer name"));
    }

    let printed_at = parse_print_date(date_text)?;

    Ok(PrintingEvent::new(
        BannerId::from(banner_id),
        user_id,
        document_name,
        printer_name,
        page_count,
        printed_at,
    ))
}

const DATE_FORMAT: &str = "%d/%m/%Y";
const TIME_FORMATS: [&str; 4] = ["%H:%M:%S", "%H:%M", "%I:%M:%S %p", "%I:%M %p"];

/// Parses the export's day-first date column (`09-08-2012`, `09/08/2012 14:03:11`,
/// `9/8/2012 2:03:11 PM`). A date without a time is taken as midnight.
pub fn parse_print_date(date_text: &str) -> Result<NaiveDateTime, ParseError> {
    let normalized = date_text.trim().replace('-', "/");
    let invalid = || ParseError::InvalidDate(date_text.to_string());

    let (date, time) = match normalized.split_once(' ') {
        Some((date, time)) => (date, Some(time.trim())),
        None => (normalized.as_str(), None),
    };
    let date = NaiveDate::parse_from_str(date, DATE_FORMAT).map_err(|_| invalid())?;
    let time = match time {
        None | Some("") => NaiveTime::MIN,
        Some(time) => TIME_FORMATS
            .iter()
            .find_map(|format| NaiveTime::parse_from_str(time, format).ok())
            .ok_or_else(invalid)?,
    };
    Ok(date.and_time(time))
}

/// The two columns of an exported log row the loader cares about, already
/// stripped of control characters. `row` is the 0-based row index in the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRow {
    pub row: usize,
    pub content: String,
    pub date_text: String,
}

impl LogRow {
    pub fn new(row: usize, content: &str, date_text: &str) -> Self {
        Self {
            row,
            content: strip_non_printable(content).trim().to_string(),
            date_text: strip_non_printable(date_text),
        }
    }
    /// A row whose content is (nearly) empty once control characters are gone.
    pub fn is_blank(&self) -> bool {
        self.content.chars().count() < MIN_CONTENT_LEN
    }
}

/// A CSV record that could not be read.
#[derive(Debug, thiserror::Error)]
#[error("Unreadable CSV row {row}: {source}")]
pub struct CsvRowError {
    pub row: usize,
    #[source]
    pub source: csv::Error,
}

/// Builds the reader for an exported log: no header handling (the export's
/// metadata rows are skipped by index) and ragged rows allowed.
pub fn log_reader<R: std::io::Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader)
}

/// Returns an iterator over the data rows of an exported log, skipping the
/// first `config.skip_rows` rows. Fields are decoded lossily: bytes that are
/// not UTF-8 become U+FFFD instead of failing the row.
pub fn read_log_rows<'a, R: std::io::Read>(
    reader: &'a mut csv::Reader<R>,
    config: &'a BillingConfig,
) -> impl Iterator<Item = Result<LogRow, CsvRowError>> + 'a {
    reader
        .byte_records()
        .enumerate()
        .skip(config.skip_rows)
        .map(move |(row, record)| {
            let record = record.map_err(|source| CsvRowError { row, source })?;
            let field = |column| String::from_utf8_lossy(record.get(column).unwrap_or_default());
            Ok(LogRow::new(
                row,
                &field(config.content_column),
                &field(config.date_column),
            ))
        })
}
