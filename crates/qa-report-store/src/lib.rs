//! Loading boundary for observation data.
//!
//! Source files use spreadsheet column names (`Sn`, `Date Range`, `Modules`,
//! ...). They are mapped onto [`Observation`] here and nowhere else.

mod classifier;
mod hyperlinks;

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Reader};
use once_cell::sync::Lazy;
use qa_report_core::{MonthKey, Observation, RowStore};
use regex_lite::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

pub use classifier::{
    classify_observation, CATEGORY_FUNCTIONALITY, CATEGORY_LOGIC, CATEGORY_PERFORMANCE,
    CATEGORY_UI, CATEGORY_UX, IMPACT_CRITICAL, IMPACT_LOW, IMPACT_MAJOR, IMPACT_MINOR,
};

pub const FIELD_SEQUENCE: &str = "Sn";
pub const FIELD_DATE_RANGE: &str = "Date Range";
pub const FIELD_MODULE: &str = "Modules";
pub const FIELD_SUB_MODULE: &str = "Sub-Modules";
pub const FIELD_OBSERVATION: &str = "Observations";
pub const FIELD_CATEGORY: &str = "Error Category";
pub const FIELD_IMPACT: &str = "Error Impact";
pub const FIELD_LINK: &str = "Links";
pub const FIELD_STATUS: &str = "Status";
pub const FIELD_MONTH: &str = "_month";

static REPORT_DATA_DECLARATION: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?:const|let|var)\s+REPORT_DATA\s*=\s*").ok());

pub type RawRow = Map<String, Value>;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid observation JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("observation data must be a JSON array of objects")]
    NotAnArray,
    #[error("could not find REPORT_DATA in script")]
    MissingReportData,
    #[error("spreadsheet error: {0}")]
    Spreadsheet(String),
    #[error("workbook has no worksheets")]
    EmptyWorkbook,
    #[error("unsupported data file extension `{0}`")]
    UnsupportedFormat(String),
}

/// What happened while normalizing raw rows.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ImportStats {
    pub row_count: usize,
    pub auto_classified: usize,
    pub skipped_blank_rows: usize,
    pub months: Vec<MonthKey>,
}

#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub store: RowStore,
    pub stats: ImportStats,
    pub snapshot_id: String,
    pub source: PathBuf,
}

/// Load observations from `.json`, `.js` (`const REPORT_DATA = [...]`), or a
/// spreadsheet (`.xlsx`, `.xlsm`, `.xls`, `.ods`).
///
/// # Errors
/// Returns a [`LoadError`] when the file cannot be read or parsed.
pub fn load_path(path: &Path) -> Result<LoadedDataset, LoadError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let raw_rows = match extension.as_str() {
        "json" => parse_json_rows(&read_text(path)?)?,
        "js" => parse_script_rows(&read_text(path)?)?,
        "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => read_workbook_rows(path)?,
        other => return Err(LoadError::UnsupportedFormat(other.to_string())),
    };

    let (rows, stats) = normalize_rows(raw_rows);
    let snapshot_id = snapshot_id(&rows)?;
    tracing::info!(
        path = %path.display(),
        rows = stats.row_count,
        auto_classified = stats.auto_classified,
        skipped_blank_rows = stats.skipped_blank_rows,
        %snapshot_id,
        "loaded observation data"
    );
    Ok(LoadedDataset { store: RowStore::new(rows), stats, snapshot_id, source: path.to_path_buf() })
}

fn read_text(path: &Path) -> Result<String, LoadError> {
    fs::read_to_string(path).map_err(|source| LoadError::Io { path: path.to_path_buf(), source })
}

/// Parse a JSON array of row objects.
///
/// # Errors
/// Returns a [`LoadError`] when `body` is not a JSON array of objects.
pub fn parse_json_rows(body: &str) -> Result<Vec<RawRow>, LoadError> {
    let value: Value = serde_json::from_str(body)?;
    rows_from_value(value)
}

/// Extract the `REPORT_DATA` array from a generated `data.js` script.
///
/// # Errors
/// Returns [`LoadError::MissingReportData`] when no declaration is found.
pub fn parse_script_rows(script: &str) -> Result<Vec<RawRow>, LoadError> {
    let declaration = REPORT_DATA_DECLARATION
        .as_ref()
        .and_then(|pattern| pattern.find(script))
        .ok_or(LoadError::MissingReportData)?;
    let mut values = serde_json::Deserializer::from_str(&script[declaration.end()..]).into_iter();
    match values.next() {
        Some(value) => rows_from_value(value?),
        None => Err(LoadError::MissingReportData),
    }
}

fn rows_from_value(value: Value) -> Result<Vec<RawRow>, LoadError> {
    let Value::Array(items) = value else {
        return Err(LoadError::NotAnArray);
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::Object(object) => Ok(object),
            _ => Err(LoadError::NotAnArray),
        })
        .collect()
}

/// Read the first worksheet; the first row holds the column names.
fn read_workbook_rows(path: &Path) -> Result<Vec<RawRow>, LoadError> {
    let mut workbook =
        open_workbook_auto(path).map_err(|err| LoadError::Spreadsheet(err.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(LoadError::EmptyWorkbook)?
        .map_err(|err| LoadError::Spreadsheet(err.to_string()))?;

    let mut sheet_rows = range.rows();
    let Some(header_row) = sheet_rows.next() else {
        return Ok(Vec::new());
    };
    let headers = header_row.iter().map(cell_text).collect::<Vec<_>>();
    let links = workbook_hyperlinks(path);
    let (first_row, first_column) = range.start().unwrap_or((0, 0));

    let mut rows = Vec::new();
    for (row_index, cells) in (first_row + 1..).zip(sheet_rows) {
        let mut row = RawRow::new();
        for ((column_index, header), cell) in (first_column..).zip(&headers).zip(cells) {
            let Some(header) = header else {
                continue;
            };
            let target = if is_link_header(header) {
                links.get(&(row_index, column_index))
            } else {
                None
            };
            let text = target.cloned().or_else(|| cell_text(cell)).unwrap_or_default();
            row.insert(header.clone(), Value::String(text));
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Hyperlink targets for `.xlsx`/`.xlsm` packages; other formats carry none.
fn workbook_hyperlinks(path: &Path) -> HashMap<hyperlinks::CellPosition, String> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if !matches!(extension.as_str(), "xlsx" | "xlsm") {
        return HashMap::new();
    }
    hyperlinks::first_sheet_hyperlinks(path).unwrap_or_else(|err| {
        tracing::warn!(path = %path.display(), error = %err, "hyperlink targets unavailable");
        HashMap::new()
    })
}

fn is_link_header(header: &str) -> bool {
    let header = normalize_header(header);
    header == normalize_header(FIELD_LINK) || header == "link"
}

/// Keep only absolute http(s) links; display text such as "View" is dropped.
fn web_link(value: Option<String>) -> Option<String> {
    value.filter(|link| {
        let lower = link.to_ascii_lowercase();
        lower.starts_with("http://") || lower.starts_with("https://")
    })
}

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        other => {
            let text = other.to_string().trim().to_string();
            (!text.is_empty()).then_some(text)
        }
    }
}

fn value_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(text) => text.trim().to_string(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

fn normalize_header(header: &str) -> String {
    header.trim().to_ascii_lowercase().replace(['_', '-'], " ")
}

/// Find a field by any of `names`, ignoring case, separators, and padding.
fn field<'a>(row: &'a RawRow, names: &[&str]) -> Option<&'a Value> {
    row.iter().find_map(|(key, value)| {
        let key = normalize_header(key);
        names.iter().any(|name| key == normalize_header(name)).then_some(value)
    })
}

fn field_text(row: &RawRow, names: &[&str]) -> Option<String> {
    field(row, names).and_then(value_text)
}

fn field_containing(row: &RawRow, needle: &str) -> Option<String> {
    row.iter()
        .find(|(key, _)| !key.starts_with('_') && key.to_ascii_lowercase().contains(needle))
        .and_then(|(_, value)| value_text(value))
}

fn parse_sequence(value: Option<String>) -> Option<u32> {
    let text = value?;
    let digits = text.strip_suffix(".0").unwrap_or(&text);
    digits.parse::<u32>().ok().filter(|number| *number > 0)
}

fn is_blank(row: &RawRow) -> bool {
    row.values().all(|value| value_text(value).is_none())
}

/// Map raw rows onto observations.
///
/// Blank rows are dropped. Missing category or impact is filled in from the
/// observation text. A missing sequence number becomes the 1-based position.
#[must_use]
pub fn normalize_rows(raw_rows: Vec<RawRow>) -> (Vec<Observation>, ImportStats) {
    let mut rows = Vec::with_capacity(raw_rows.len());
    let mut auto_classified = 0_usize;
    let mut skipped_blank_rows = 0_usize;

    for raw in raw_rows {
        if is_blank(&raw) {
            skipped_blank_rows += 1;
            continue;
        }

        let ordinal = u32::try_from(rows.len() + 1).unwrap_or(u32::MAX);
        let date_range = field_text(&raw, &[FIELD_DATE_RANGE]).unwrap_or_default();
        let period_month = field_text(&raw, &[FIELD_MONTH])
            .and_then(|month| MonthKey::parse(&month))
            .unwrap_or_else(|| MonthKey::from_date_range(&date_range));
        let observation_text =
            field_text(&raw, &[FIELD_OBSERVATION, "Observation"]).unwrap_or_default();
        let mut category = field_text(&raw, &[FIELD_CATEGORY, "Category"])
            .or_else(|| field_containing(&raw, "category"));
        let mut impact = field_text(&raw, &[FIELD_IMPACT, "Impact"])
            .or_else(|| field_containing(&raw, "impact"));

        if !observation_text.is_empty() && (category.is_none() || impact.is_none()) {
            let (auto_category, auto_impact) = classify_observation(&observation_text);
            category.get_or_insert_with(|| auto_category.to_string());
            impact.get_or_insert_with(|| auto_impact.to_string());
            auto_classified += 1;
        }

        rows.push(Observation {
            sequence_number: parse_sequence(field_text(&raw, &[FIELD_SEQUENCE, "S.No", "#"]))
                .unwrap_or(ordinal),
            date_range,
            period_month,
            module: field_text(&raw, &[FIELD_MODULE, "Module"]),
            sub_module: field_text(&raw, &[FIELD_SUB_MODULE, "Sub-Module", "Submodule"]),
            observation_text,
            category,
            impact,
            link: web_link(field_text(&raw, &[FIELD_LINK, "Link"])),
            status: field_text(&raw, &[FIELD_STATUS]),
        });
    }

    let months = rows
        .iter()
        .map(|row| row.period_month)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let stats = ImportStats { row_count: rows.len(), auto_classified, skipped_blank_rows, months };
    (rows, stats)
}

/// Stable content hash of the normalized rows, `sha256:<hex>`.
///
/// # Errors
/// Returns an error when the rows cannot be serialized.
pub fn snapshot_id(rows: &[Observation]) -> Result<String, LoadError> {
    let bytes = serde_json::to_vec(rows)?;
    Ok(format!("sha256:{}", hex::encode(Sha256::digest(bytes))))
}

/// Rows in the spreadsheet column layout, ready to be written back out as
/// `data.json`.
#[must_use]
pub fn export_rows(rows: &[Observation]) -> Vec<RawRow> {
    rows.iter()
        .map(|row| {
            let mut raw = RawRow::new();
            raw.insert(FIELD_SEQUENCE.to_string(), Value::from(row.sequence_number));
            raw.insert(FIELD_DATE_RANGE.to_string(), Value::from(row.date_range.clone()));
            let optional = [
                (FIELD_MODULE, &row.module),
                (FIELD_SUB_MODULE, &row.sub_module),
            ];
            for (key, value) in optional {
                raw.insert(key.to_string(), Value::from(value.clone().unwrap_or_default()));
            }
            raw.insert(FIELD_OBSERVATION.to_string(), Value::from(row.observation_text.clone()));
            let optional = [
                (FIELD_CATEGORY, &row.category),
                (FIELD_IMPACT, &row.impact),
                (FIELD_LINK, &row.link),
                (FIELD_STATUS, &row.status),
            ];
            for (key, value) in optional {
                raw.insert(key.to_string(), Value::from(value.clone().unwrap_or_default()));
            }
            raw.insert(FIELD_MONTH.to_string(), Value::from(row.period_month.to_string()));
            raw
        })
        .collect()
}

/// Write rows as a pretty JSON array in the spreadsheet column layout.
///
/// # Errors
/// Returns a [`LoadError`] when serialization or the write fails.
pub fn write_json(path: &Path, rows: &[Observation]) -> Result<(), LoadError> {
    let body = serde_json::to_string_pretty(&export_rows(rows))?;
    fs::write(path, body).map_err(|source| LoadError::Io { path: path.to_path_buf(), source })
}
