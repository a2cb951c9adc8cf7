//! Quotation assembly: validation, reference number, validity window.
//!
//! A [`Quotation`] is the exportable artifact: the pricing engine's output
//! plus the client and document metadata around it. Validation failures
//! here are user-facing corrections ("enter the client's name"), reported
//! as values and never panics; the operation simply does not proceed.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

use examquote_types::{CoveragePercent, ExamCode};

use crate::cart::Cart;
use crate::catalog::PARTICULAR;
use crate::history::HistoryEntry;
use crate::identity::validate_cedula;
use crate::pricing::{price, Quote};

/// Days a quotation remains valid after issue.
const VALIDITY_DAYS: i64 = 30;

/// Rejected quotation input. Always surfaced as a message to the operator.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("enter the client's name")]
    MissingClientName,
    #[error("enter a valid identity number")]
    InvalidIdentityNumber,
    #[error("add at least one exam")]
    EmptyCart,
}

/// A complete, exportable quotation.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Quotation {
    /// Six-digit reference number printed on the document.
    pub number: u32,
    pub issued: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub client_name: String,
    pub client_cedula: String,
    pub insurer: String,
    /// The engine's output, consumed verbatim by every downstream surface.
    pub quote: Quote,
}

/// Validates the request and assembles a quotation from the current cart.
///
/// Pricing goes through the engine exactly once; the document exporter and
/// the history log both read the resulting [`Quotation::quote`] without
/// recomputing anything.
///
/// # Errors
///
/// Returns a [`ValidationError`] when the client name is blank, the
/// identity number fails its checksum, or the cart is empty.
pub fn build_quotation(
    cart: &Cart,
    insurer: &str,
    coverage: CoveragePercent,
    exceptions: &BTreeSet<ExamCode>,
    client_name: &str,
    client_cedula: &str,
) -> Result<Quotation, ValidationError> {
    let client_name = client_name.trim();
    if client_name.is_empty() {
        return Err(ValidationError::MissingClientName);
    }
    if !validate_cedula(client_cedula) {
        return Err(ValidationError::InvalidIdentityNumber);
    }
    if cart.is_empty() {
        return Err(ValidationError::EmptyCart);
    }

    let quote = price(cart.lines(), insurer, coverage, exceptions);
    let issued = Utc::now();

    Ok(Quotation {
        number: rand::thread_rng().gen_range(100_000u32..1_000_000),
        issued,
        valid_until: issued + Duration::days(VALIDITY_DAYS),
        client_name: client_name.to_string(),
        client_cedula: client_cedula.trim().to_string(),
        insurer: insurer.to_string(),
        quote,
    })
}

impl Quotation {
    /// The history record for this quotation. Coverage is logged as absent
    /// for the self-pay case, where no split was applied.
    pub fn history_entry(&self, advisor: &str) -> HistoryEntry {
        let coverage = if self.insurer == PARTICULAR {
            None
        } else {
            Some(self.quote.coverage_percent)
        };
        HistoryEntry {
            timestamp: self.issued,
            advisor: advisor.to_string(),
            patient: self.client_name.clone(),
            insurer: self.insurer.clone(),
            subtotal: self.quote.subtotal,
            coverage,
            total: self.quote.total,
        }
    }
}
