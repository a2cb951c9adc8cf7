//! Price-list ingestion: tabular rows in, validated [`Catalog`] out.
//!
//! The upload contract is a sheet with four reserved columns —
//! `DESCRIPTION`, `CODE`, `GROUP`, `PRICE` — where every additional column
//! name is taken to be an insurer and its cells that insurer's negotiated
//! rates. A structurally wrong file fails with
//! [`IngestError::MalformedCatalog`], distinct from an unreadable one, so
//! callers can tell the operator "fix the sheet" rather than "fix the file".
//!
//! Cell policies, applied uniformly at this single site:
//! - a row with an empty description is skipped, not an error;
//! - a row with an empty `CODE` is skipped and logged (codes are the
//!   cart and exception keys, so a record without one is unusable);
//! - numeric codes lose a spurious fractional tail (`101.0` → `"101"`);
//! - an unparseable or missing `PRICE` defaults to 0;
//! - an unparseable, empty, or missing insurer cell is `None` (no rate).

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use examquote_types::ExamCode;

use crate::catalog::{Catalog, ExamRecord, PARTICULAR};

/// Column names reserved by the upload contract; everything else is an
/// insurer name.
pub const RESERVED_COLUMNS: [&str; 4] = ["DESCRIPTION", "CODE", "GROUP", "PRICE"];

const DESCRIPTION_COLUMN: &str = "DESCRIPTION";
const CODE_COLUMN: &str = "CODE";
const GROUP_COLUMN: &str = "GROUP";
const PRICE_COLUMN: &str = "PRICE";

/// One sheet row: column name to cell value, `None` for an empty cell.
pub type Row = BTreeMap<String, Option<String>>;

/// Errors that can occur while ingesting a price file.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The file was readable but does not have the expected structure.
    /// User-correctable; surfaced distinctly from a read failure.
    #[error("price file has the wrong structure: {0}")]
    MalformedCatalog(String),
    /// The file could not be read at all.
    #[error("failed to read price file: {0}")]
    Unreadable(#[from] csv::Error),
}

pub type IngestResult<T> = std::result::Result<T, IngestError>;

/// Parses already-decoded sheet rows into a [`Catalog`].
///
/// This is the single ingestion site: every front-end (CSV file, HTTP
/// upload payload) decodes to [`Row`]s and comes through here. The result
/// carries no name or logo; those belong to the admin upload flow, not to
/// ingestion.
///
/// # Errors
///
/// Returns [`IngestError::MalformedCatalog`] when there are no data rows or
/// the first row is missing any reserved column.
pub fn parse_rows(rows: &[Row]) -> IngestResult<Catalog> {
    let first = rows.first().ok_or_else(|| {
        IngestError::MalformedCatalog("the file contains no data rows".into())
    })?;

    let missing: Vec<&str> = RESERVED_COLUMNS
        .iter()
        .copied()
        .filter(|col| !first.contains_key(*col))
        .collect();
    if !missing.is_empty() {
        return Err(IngestError::MalformedCatalog(format!(
            "missing required columns: {}",
            missing.join(", ")
        )));
    }

    // Insurer set: union of every non-reserved column name encountered,
    // Particular always first.
    let mut insurer_names: Vec<String> = vec![PARTICULAR.to_string()];
    for row in rows {
        for key in row.keys() {
            if !RESERVED_COLUMNS.contains(&key.as_str())
                && !insurer_names.iter().any(|n| n == key)
            {
                insurer_names.push(key.clone());
            }
        }
    }

    let mut seen_codes: BTreeSet<ExamCode> = BTreeSet::new();
    let mut exams = Vec::new();
    for row in rows {
        let description = match cell(row, DESCRIPTION_COLUMN) {
            Some(d) => d.trim().to_string(),
            None => continue, // rows without a description are padding, skip
        };

        let code = match normalize_code(cell(row, CODE_COLUMN).unwrap_or_default()) {
            Some(code) => code,
            None => {
                tracing::warn!(description = %description, "row without an exam code in price file, skipping");
                continue;
            }
        };
        if !seen_codes.insert(code.clone()) {
            tracing::warn!(code = %code, "duplicate exam code in price file, keeping first");
            continue;
        }

        let group = cell(row, GROUP_COLUMN)
            .map(|g| g.trim().to_string())
            .unwrap_or_default();
        let list_price = parse_amount(cell(row, PRICE_COLUMN)).unwrap_or(0.0);

        let mut insurer_rates = BTreeMap::new();
        for (key, value) in row {
            if RESERVED_COLUMNS.contains(&key.as_str()) {
                continue;
            }
            let rate = parse_amount(value.as_deref());
            insurer_rates.insert(key.clone(), rate);
        }

        exams.push(ExamRecord {
            code,
            description,
            group,
            list_price,
            insurer_rates,
        });
    }

    Ok(Catalog {
        insurers: insurer_names,
        exams,
    })
}

/// Reads a CSV price file and ingests it.
///
/// # Errors
///
/// Returns [`IngestError::Unreadable`] when the file cannot be opened or
/// decoded, and [`IngestError::MalformedCatalog`] on structural problems.
pub fn read_price_file(path: &Path) -> IngestResult<Catalog> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)?;
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut row = Row::new();
        for (i, header) in headers.iter().enumerate() {
            let value = record.get(i).map(str::trim).filter(|c| !c.is_empty());
            row.insert(header.clone(), value.map(str::to_string));
        }
        rows.push(row);
    }
    parse_rows(&rows)
}

fn cell<'a>(row: &'a Row, column: &str) -> Option<&'a str> {
    row.get(column)
        .and_then(|v| v.as_deref())
        .filter(|v| !v.trim().is_empty())
}

/// Coerces a raw code cell to its canonical string form.
///
/// Spreadsheet tooling renders numeric code cells with a fractional tail
/// (`101.0`); when the whole cell parses as a number the tail is dropped.
/// Non-numeric codes pass through verbatim. Returns `None` for cells that
/// end up empty.
fn normalize_code(raw: &str) -> Option<ExamCode> {
    let trimmed = raw.trim();
    let canonical = if trimmed.contains('.') && trimmed.parse::<f64>().is_ok() {
        trimmed.split('.').next().unwrap_or(trimmed)
    } else {
        trimmed
    };
    ExamCode::new(canonical).ok()
}

/// Parses a currency cell. Unparseable, empty, and missing cells are all
/// `None`; negative values clamp to zero (prices are non-negative by
/// contract).
fn parse_amount(value: Option<&str>) -> Option<f64> {
    let parsed = value?.trim().parse::<f64>().ok()?;
    if parsed.is_finite() {
        Some(parsed.max(0.0))
    } else {
        None
    }
}
