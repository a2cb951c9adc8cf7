//! Priced exam catalog model and rate resolution.
//!
//! A [`Catalog`] is one validated price list: the set of insurers it knows
//! about and an ordered sequence of [`ExamRecord`]s. The sentinel insurer
//! [`PARTICULAR`] is always a member of the insurer set and names the
//! self-pay case.
//!
//! Rate resolution — "what does exam E cost under insurer X" — lives here
//! because every consumer (cart, pricing engine, display) must answer it
//! identically.

use std::collections::BTreeMap;

use examquote_types::ExamCode;

/// The sentinel insurer name for the self-pay (no insurance) case.
pub const PARTICULAR: &str = "Particular";

/// One priced medical exam as it appears in a price list.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ExamRecord {
    /// Stable identifier, unique within a catalog.
    pub code: ExamCode,
    /// Human-readable label.
    pub description: String,
    /// Optional categorical tag (imaging, laboratory, ...). Empty when the
    /// source file left the cell blank.
    #[serde(default)]
    pub group: String,
    /// The cash ("Particular") price. Non-negative.
    pub list_price: f64,
    /// Insurer-negotiated rates, keyed by insurer name. A missing key or a
    /// `None` value both mean "no special rate for this insurer" and fall
    /// back to [`ExamRecord::list_price`] during resolution.
    #[serde(default)]
    pub insurer_rates: BTreeMap<String, Option<f64>>,
}

/// The outcome of resolving a price for a given insurer.
///
/// `used_fallback` is true when the insurer had no negotiated rate and the
/// list price was substituted. The amount still fuels coverage math either
/// way; the flag exists so displays and audits can tell a real negotiated
/// rate from a default.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct RateResolution {
    pub amount: f64,
    pub used_fallback: bool,
}

impl ExamRecord {
    /// Resolves the unit price of this exam for `insurer`.
    ///
    /// For [`PARTICULAR`] the list price applies and is never considered a
    /// fallback. For any other insurer, a present numeric rate wins and an
    /// absent or null rate falls back to the list price with
    /// `used_fallback` set.
    pub fn rate_for(&self, insurer: &str) -> RateResolution {
        if insurer == PARTICULAR {
            return RateResolution {
                amount: self.list_price,
                used_fallback: false,
            };
        }
        match self.insurer_rates.get(insurer) {
            Some(Some(rate)) => RateResolution {
                amount: *rate,
                used_fallback: false,
            },
            _ => RateResolution {
                amount: self.list_price,
                used_fallback: true,
            },
        }
    }

    /// The negotiated rate for `insurer`, if one exists. Display-only;
    /// pricing always goes through [`ExamRecord::rate_for`].
    pub fn negotiated_rate(&self, insurer: &str) -> Option<f64> {
        if insurer == PARTICULAR {
            return Some(self.list_price);
        }
        self.insurer_rates.get(insurer).copied().flatten()
    }
}

/// A validated, insurer-indexed price list.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Catalog {
    /// All insurer names this catalog prices for, [`PARTICULAR`] included.
    /// Order follows the source file's column order, `Particular` first.
    pub insurers: Vec<String>,
    /// Ordered exam records; codes are unique within the catalog.
    pub exams: Vec<ExamRecord>,
}

impl Catalog {
    /// Looks up an exam by its code.
    pub fn find_by_code(&self, code: &ExamCode) -> Option<&ExamRecord> {
        self.exams.iter().find(|e| &e.code == code)
    }

    /// Case-insensitive substring search over codes and descriptions,
    /// capped at `limit` results. This backs the operator's
    /// search-as-you-type box; resolution is synchronous against the
    /// current catalog so the last query always wins.
    pub fn search(&self, query: &str, limit: usize) -> Vec<&ExamRecord> {
        let q = query.trim().to_lowercase();
        if q.is_empty() {
            return Vec::new();
        }
        self.exams
            .iter()
            .filter(|e| {
                e.code.as_str().to_lowercase().contains(&q)
                    || e.description.to_lowercase().contains(&q)
            })
            .take(limit)
            .collect()
    }
}
