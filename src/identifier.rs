//! Canonicalisation of the identifiers found in metadata workbooks, plate
//! sheets and OTU table headers.
//!
//! Excel hands out the same folder number as an integer, a float or a string
//! depending on who typed it in. Everything that is used as a join key goes
//! through this module so that `12345`, `12345.0` and `" 12345 "` end up as the
//! same key.

use calamine::DataType;
use chrono::{Duration, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;

/// Sentinel for a field that was not present in the input
pub const NO_VALUE: &str = "no_value";

/// Header prefixes that mark control samples in OTU tables (`u` for undetermined)
const CONTROL_HEADER_PREFIXES: [char; 6] = ['b', 'n', 'p', 'g', 't', 'u'];

/// Plain text of a cell, `None` for empty, error and whitespace-only cells
fn cell_text(raw: &DataType) -> Option<String> {
    let text = match raw {
        DataType::Empty | DataType::Error(_) => return None,
        DataType::Int(i) => i.to_string(),
        DataType::Float(f) | DataType::DateTime(f) => float_text(*f),
        other => other.to_string(),
    };
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Integral floats lose their `.0`, everything else keeps its decimal form
fn float_text(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        (f as i64).to_string()
    } else {
        f.to_string()
    }
}

/// Normalises a textual identifier.
///
/// If the trimmed text parses as an integer once all `.` are removed, the
/// integer's decimal form is used; otherwise the trimmed text itself. Empty
/// input gives `None`.
///
/// # Example
/// ```
/// assert_eq!(Some("1234"), normalize_id_str(" 12.34 ").as_deref());
/// assert_eq!(Some("42"), normalize_id_str("0042").as_deref());
/// assert_eq!(Some("AB-1"), normalize_id_str("AB-1").as_deref());
/// ```
pub fn normalize_id_str(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.replace('.', "").parse::<i64>() {
        Ok(n) => Some(n.to_string()),
        Err(_) => Some(trimmed.to_string()),
    }
}

/// Normalises a sample or site identifier cell, see [`normalize_id_str`].
pub fn normalize_id(raw: &DataType) -> Option<String> {
    cell_text(raw).and_then(|t| normalize_id_str(&t))
}

/// Canonical folder key: integer form if the value is integral, trimmed text otherwise.
///
/// Unlike [`normalize_id`], decimal points are kept, so `B12.S3` stays intact.
pub fn canonical_folder(raw: &DataType) -> Option<String> {
    cell_text(raw).map(|t| canonical_folder_str(&t))
}

pub fn canonical_folder_str(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.parse::<i64>() {
        Ok(n) => n.to_string(),
        Err(_) => trimmed.to_string(),
    }
}

/// Field that is copied as is, but numeric values are written without a fractional part
pub fn passthrough(raw: &DataType) -> Option<String> {
    cell_text(raw).map(|t| canonical_folder_str(&t))
}

/// Renders a date cell as `dd/mm/yyyy`. Excel stores dates as days since 1899-12-30.
pub fn date_text(raw: &DataType) -> Option<String> {
    match raw {
        DataType::DateTime(serial) => excel_date(*serial).map(|d| d.format("%d/%m/%Y").to_string()),
        other => cell_text(other),
    }
}

fn excel_date(serial: f64) -> Option<NaiveDate> {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.trunc() as i64))
}

/// Capitalises the first letter of every word and lowercases the rest.
/// Runs of whitespace collapse into single spaces.
pub fn title_case(raw: &str) -> String {
    raw.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Strips everything but ASCII letters and spaces
pub fn letters_only(raw: &str) -> String {
    lazy_static! {
        static ref RE_NOT_LETTER: Regex = Regex::new(r"[^a-zA-Z ]").unwrap();
    }
    RE_NOT_LETTER.replace_all(raw, "").to_string()
}

/// True for cells that spreadsheet exports use to say "nothing here"
pub fn is_missing(raw: &DataType) -> bool {
    match cell_text(raw) {
        None => true,
        Some(t) => t.eq_ignore_ascii_case("nan"),
    }
}

/// Normalises an OTU table column header.
///
/// Demultiplexing renames duplicated columns to `name.suffix`. For control
/// samples (header starting with one of `b n p g t u`) both parts are joined,
/// for site samples the suffix is dropped. A control header without a dot is
/// assumed to have been fixed by hand and is kept.
pub fn normalize_header(header: &str) -> String {
    let header = header.trim();
    let mut parts = header.splitn(2, '.');
    let head = parts.next().unwrap_or("");
    let tail = parts.next();

    let is_control = head
        .chars()
        .next()
        .map(|c| CONTROL_HEADER_PREFIXES.contains(&c.to_ascii_lowercase()))
        .unwrap_or(false);

    match (is_control, tail) {
        (true, Some(tail)) => {
            let second = tail.split('.').next().unwrap_or("");
            format!("{}{}", head, second)
        }
        (false, _) if !head.is_empty() => head.to_string(),
        _ => {
            debug!("Header {} has been assumed to have been changed manually", header);
            header.to_string()
        }
    }
}
