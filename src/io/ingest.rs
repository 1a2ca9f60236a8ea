//! CSV ingest for the two row shapes the search consumes.
//!
//! - category counts: `group,category,region,year,quarter,month,count`
//!   (`region`, `quarter`, `month` optional)
//! - point prices: `price,year,status` (`year`, `status` optional; `status_code`
//!   accepted as an alias)
//!
//! Headers are matched case-insensitively (a UTF-8 BOM is stripped). Rows that
//! fail to parse are collected as `RowError`s rather than aborting; a file
//! with no usable rows is an input error.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use tracing::{debug, warn};

use crate::domain::{CategoryRow, Period, PriceRow};
use crate::error::AppError;

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Parsed rows plus what was skipped.
#[derive(Debug, Clone)]
pub struct Ingested<T> {
    pub rows: Vec<T>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

/// Load category count rows from a CSV file.
pub fn load_category_rows(path: &Path) -> Result<Ingested<CategoryRow>, AppError> {
    let file = open(path)?;
    read_category_rows(file)
}

/// Load point-price rows from a CSV file.
pub fn load_price_rows(path: &Path) -> Result<Ingested<PriceRow>, AppError> {
    let file = open(path)?;
    read_price_rows(file)
}

fn open(path: &Path) -> Result<File, AppError> {
    File::open(path).map_err(|e| AppError::input(format!("Failed to open CSV '{}': {e}", path.display())))
}

pub fn read_category_rows<R: Read>(reader: R) -> Result<Ingested<CategoryRow>, AppError> {
    read_rows(reader, "category", &["group", "category", "year", "count"], parse_category_row)
}

pub fn read_price_rows<R: Read>(reader: R) -> Result<Ingested<PriceRow>, AppError> {
    read_rows(reader, "price", &["price"], parse_price_row)
}

fn read_rows<R, T, F>(reader: R, what: &str, required: &[&str], parse: F) -> Result<Ingested<T>, AppError>
where
    R: Read,
    F: Fn(&StringRecord, &HashMap<String, usize>) -> Result<T, String>,
{
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AppError::input(format!("Failed to read {what} CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    for &name in required {
        if !header_map.contains_key(name) {
            return Err(AppError::input(format!(
                "Missing required column in {what} CSV: `{name}`"
            )));
        }
    }

    let mut rows = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // Data starts on line 2, after the header.
        let line = idx + 2;
        rows_read += 1;

        let parsed = result
            .map_err(|e| format!("CSV parse error: {e}"))
            .and_then(|record| parse(&record, &header_map));
        match parsed {
            Ok(row) => rows.push(row),
            Err(message) => {
                debug!(line, %message, "skipping {what} row");
                row_errors.push(RowError { line, message });
            }
        }
    }

    if !row_errors.is_empty() {
        warn!(skipped = row_errors.len(), rows_read, "some {what} rows were skipped");
    }
    if rows.is_empty() {
        return Err(AppError::input(format!(
            "No usable rows in {what} CSV ({rows_read} read, {} rejected).",
            row_errors.len()
        )));
    }

    Ok(Ingested {
        rows,
        row_errors,
        rows_read,
    })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    name.trim().trim_start_matches('\u{feff}').trim().to_ascii_lowercase()
}

fn parse_category_row(record: &StringRecord, header_map: &HashMap<String, usize>) -> Result<CategoryRow, String> {
    let group = get_required(record, header_map, "group")?.to_string();
    let category = get_required(record, header_map, "category")?.to_string();
    let region = get_optional(record, header_map, "region").unwrap_or("").to_string();
    let year = parse_int(get_required(record, header_map, "year")?, "year")?;
    let quarter = get_optional(record, header_map, "quarter")
        .map(|s| parse_int(s, "quarter"))
        .transpose()?;
    let month = get_optional(record, header_map, "month")
        .map(|s| parse_int(s, "month"))
        .transpose()?;
    let count = parse_number(get_required(record, header_map, "count")?, "count")?;

    Ok(CategoryRow {
        group,
        category,
        region,
        period: Period { year, quarter, month },
        count,
    })
}

fn parse_price_row(record: &StringRecord, header_map: &HashMap<String, usize>) -> Result<PriceRow, String> {
    let price = parse_number(get_required(record, header_map, "price")?, "price")?;
    if price <= 0.0 {
        return Err(format!("Non-positive price {price}."));
    }
    let year = get_optional(record, header_map, "year")
        .map(|s| parse_int(s, "year"))
        .transpose()?;
    let status_code = get_optional(record, header_map, "status")
        .or_else(|| get_optional(record, header_map, "status_code"))
        .unwrap_or("")
        .to_string();

    Ok(PriceRow {
        price,
        year,
        status_code,
    })
}

fn get_required<'a>(
    record: &'a StringRecord,
    header_map: &HashMap<String, usize>,
    name: &str,
) -> Result<&'a str, String> {
    get_optional(record, header_map, name).ok_or_else(|| format!("Missing required value: `{name}`"))
}

fn get_optional<'a>(record: &'a StringRecord, header_map: &HashMap<String, usize>, name: &str) -> Option<&'a str> {
    let idx = header_map.get(name)?;
    record.get(*idx).map(str::trim).filter(|s| !s.is_empty())
}

fn parse_int<T: std::str::FromStr>(s: &str, name: &str) -> Result<T, String> {
    s.parse::<T>().map_err(|_| format!("Invalid `{name}` value '{s}'."))
}

/// Numbers may carry thousands separators.
fn parse_number(s: &str, name: &str) -> Result<f64, String> {
    let cleaned: String = s.chars().filter(|c| *c != ',').collect();
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(format!("Invalid `{name}` value '{s}'.")),
    }
}
