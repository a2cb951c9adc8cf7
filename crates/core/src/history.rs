//! Append-only history of completed quotations.
//!
//! One record per successful export: who quoted, for whom, under which
//! insurer, and the engine's figures verbatim — the log never recomputes
//! pricing. The log exports as delimited text with standard CSV quoting
//! (fields containing commas, quotes, or newlines are quoted; embedded
//! quotes are doubled).

use chrono::{DateTime, Utc};

use crate::pricing::format_amount;
use crate::storage::{JsonStore, StorageError};

const HISTORY_KEY: &str = "quote_history";

/// One completed-quotation record.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    /// Username of the advisor who produced the quotation.
    pub advisor: String,
    /// The patient the quotation was for.
    pub patient: String,
    pub insurer: String,
    pub subtotal: f64,
    /// The applied coverage percentage; `None` for the self-pay case.
    pub coverage: Option<f64>,
    pub total: f64,
}

/// Errors that can occur exporting the history log.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("failed to encode history export: {0}")]
    Export(#[from] csv::Error),
}

/// The persistent quotation history.
#[derive(Debug)]
pub struct HistoryLog {
    storage: JsonStore,
    entries: Vec<HistoryEntry>,
}

impl HistoryLog {
    /// Loads the history from durable storage; corrupt stored state resets
    /// to an empty log.
    pub fn open(storage: JsonStore) -> Self {
        let entries: Vec<HistoryEntry> = storage.read_or_default(HISTORY_KEY);
        Self { storage, entries }
    }

    /// Appends a record.
    ///
    /// # Errors
    ///
    /// Returns a storage error if persisting fails.
    pub fn append(&mut self, entry: HistoryEntry) -> Result<(), StorageError> {
        self.entries.push(entry);
        self.storage.write(HISTORY_KEY, &self.entries)
    }

    /// All records, oldest first.
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Renders the log as CSV text with a header row. Amounts are
    /// formatted with two decimals; a self-pay record has an empty
    /// coverage field.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::Export`] if encoding fails.
    pub fn export_csv(&self) -> Result<String, HistoryError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record([
            "Date",
            "Advisor",
            "Patient",
            "Insurer",
            "Subtotal",
            "Coverage(%)",
            "Total",
        ])?;
        for entry in &self.entries {
            writer.write_record([
                entry.timestamp.to_rfc3339(),
                entry.advisor.clone(),
                entry.patient.clone(),
                entry.insurer.clone(),
                format_amount(entry.subtotal),
                entry
                    .coverage
                    .map(|c| c.to_string())
                    .unwrap_or_default(),
                format_amount(entry.total),
            ])?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| HistoryError::Export(csv::Error::from(e.into_error())))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(patient: &str, insurer: &str, coverage: Option<f64>) -> HistoryEntry {
        HistoryEntry {
            timestamp: "2024-05-01T12:00:00Z".parse().unwrap(),
            advisor: "advisor1".into(),
            patient: patient.into(),
            insurer: insurer.into(),
            subtotal: 80.0,
            coverage,
            total: 16.0,
        }
    }

    fn open_log(temp: &TempDir) -> HistoryLog {
        HistoryLog::open(JsonStore::open(temp.path()).unwrap())
    }

    #[test]
    fn test_append_persists_across_reopen() {
        let temp = TempDir::new().unwrap();
        {
            let mut log = open_log(&temp);
            log.append(entry("Jane Roe", "InsurerA", Some(80.0))).unwrap();
        }
        let log = open_log(&temp);
        assert_eq!(log.len(), 1);
        assert_eq!(log.entries()[0].patient, "Jane Roe");
    }

    #[test]
    fn test_export_has_header_and_rows() {
        let temp = TempDir::new().unwrap();
        let mut log = open_log(&temp);
        log.append(entry("Jane Roe", "InsurerA", Some(80.0))).unwrap();
        let csv_text = log.export_csv().unwrap();
        let mut lines = csv_text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Date,Advisor,Patient,Insurer,Subtotal,Coverage(%),Total"
        );
        let row = lines.next().unwrap();
        assert!(row.contains("Jane Roe"));
        assert!(row.contains("80.00"));
        assert!(row.contains("16.00"));
    }

    #[test]
    fn test_export_quotes_fields_with_commas() {
        let temp = TempDir::new().unwrap();
        let mut log = open_log(&temp);
        log.append(entry("Roe, Jane", "InsurerA", Some(80.0))).unwrap();
        let csv_text = log.export_csv().unwrap();
        assert!(csv_text.contains("\"Roe, Jane\""));
    }

    #[test]
    fn test_export_doubles_embedded_quotes() {
        let temp = TempDir::new().unwrap();
        let mut log = open_log(&temp);
        log.append(entry("Jane \"JJ\" Roe", "InsurerA", None)).unwrap();
        let csv_text = log.export_csv().unwrap();
        assert!(csv_text.contains("\"Jane \"\"JJ\"\" Roe\""));
    }

    #[test]
    fn test_self_pay_record_has_empty_coverage_field() {
        let temp = TempDir::new().unwrap();
        let mut log = open_log(&temp);
        log.append(entry("Jane Roe", "Particular", None)).unwrap();
        let csv_text = log.export_csv().unwrap();
        let row = csv_text.lines().nth(1).unwrap();
        assert!(row.contains(",Particular,80.00,,16.00"));
    }

    #[test]
    fn test_corrupt_history_resets_to_empty() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("quote_history.json"), "nope").unwrap();
        let log = open_log(&temp);
        assert!(log.is_empty());
    }
}
