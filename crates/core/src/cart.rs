//! The in-progress quotation cart.
//!
//! A cart belongs to one quoting session: it lives in memory, is discarded
//! on navigation away, and is never partially persisted. Prices are
//! snapshotted from the catalog at add time and re-resolved as a whole
//! whenever the selected insurer changes, so the displayed and exported
//! PVA always reflects the current selection.

use examquote_types::ExamCode;

use crate::catalog::{Catalog, ExamRecord};

/// One cart entry. At most one line exists per exam code; adding a
/// duplicate increments the quantity instead.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CartLine {
    pub code: ExamCode,
    pub description: String,
    /// The cash price (PVP), always the catalog's list price.
    pub unit_price_particular: f64,
    /// The insurer rate (PVA) under the insurer selected when the line was
    /// added or last re-resolved. `None` when that insurer has no
    /// negotiated rate; pricing falls back to the particular price.
    pub unit_price_insurer: Option<f64>,
    /// Always at least 1.
    pub quantity: u32,
}

/// An ordered collection of cart lines built by search-and-add.
#[derive(Debug, Clone, Default)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Adds an exam under the given insurer selection, or increments the
    /// quantity when a line with the same code already exists. On an
    /// increment the price fields are left untouched; they only move when
    /// the insurer selection changes (see
    /// [`Cart::recalculate_for_insurer`]).
    pub fn add_or_increment(&mut self, exam: &ExamRecord, insurer: &str) {
        if let Some(line) = self.lines.iter_mut().find(|l| l.code == exam.code) {
            line.quantity += 1;
            return;
        }
        self.lines.push(CartLine {
            code: exam.code.clone(),
            description: exam.description.clone(),
            unit_price_particular: exam.list_price,
            unit_price_insurer: exam.negotiated_rate(insurer),
            quantity: 1,
        });
    }

    /// Sets the quantity of the line with `code`, clamping to a minimum
    /// of 1. Quantities below 1 are a local input correction, not an
    /// error. Returns whether a line was updated.
    pub fn set_quantity(&mut self, code: &ExamCode, quantity: u32) -> bool {
        match self.lines.iter_mut().find(|l| &l.code == code) {
            Some(line) => {
                line.quantity = quantity.max(1);
                true
            }
            None => false,
        }
    }

    /// Removes the line with `code`. Returns whether a line was removed.
    pub fn remove(&mut self, code: &ExamCode) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| &l.code != code);
        self.lines.len() != before
    }

    /// Discards all lines. The session does this when the operator
    /// navigates away or the active catalog changes.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Re-resolves every line's prices from `catalog` under `insurer`.
    ///
    /// Must be invoked whenever the selected insurer changes so the PVA
    /// column tracks the current selection rather than staying frozen at
    /// add time. A line whose code no longer exists in the catalog keeps
    /// its frozen prices; the session discards carts on catalog switches,
    /// so that case is defensive only.
    pub fn recalculate_for_insurer(&mut self, insurer: &str, catalog: &Catalog) {
        for line in &mut self.lines {
            if let Some(exam) = catalog.find_by_code(&line.code) {
                line.unit_price_particular = exam.list_price;
                line.unit_price_insurer = exam.negotiated_rate(insurer);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::PARTICULAR;

    fn exam(code: &str, list_price: f64, rates: &[(&str, Option<f64>)]) -> ExamRecord {
        ExamRecord {
            code: ExamCode::new(code).unwrap(),
            description: format!("Exam {code}"),
            group: String::new(),
            list_price,
            insurer_rates: rates.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        }
    }

    #[test]
    fn test_duplicate_add_increments_quantity() {
        let mut cart = Cart::new();
        let xray = exam("101", 50.0, &[("InsurerA", Some(40.0))]);
        cart.add_or_increment(&xray, "InsurerA");
        cart.add_or_increment(&xray, "InsurerA");
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.lines()[0].quantity, 2);
    }

    #[test]
    fn test_add_snapshots_prices_for_insurer() {
        let mut cart = Cart::new();
        cart.add_or_increment(&exam("101", 50.0, &[("InsurerA", Some(40.0))]), "InsurerA");
        let line = &cart.lines()[0];
        assert_eq!(line.unit_price_particular, 50.0);
        assert_eq!(line.unit_price_insurer, Some(40.0));
    }

    #[test]
    fn test_add_without_negotiated_rate_has_no_insurer_price() {
        let mut cart = Cart::new();
        cart.add_or_increment(&exam("101", 50.0, &[]), "InsurerA");
        assert_eq!(cart.lines()[0].unit_price_insurer, None);
    }

    #[test]
    fn test_set_quantity_clamps_to_one() {
        let mut cart = Cart::new();
        cart.add_or_increment(&exam("101", 50.0, &[]), PARTICULAR);
        assert!(cart.set_quantity(&ExamCode::new("101").unwrap(), 0));
        assert_eq!(cart.lines()[0].quantity, 1);
    }

    #[test]
    fn test_set_quantity_missing_code_is_untouched() {
        let mut cart = Cart::new();
        assert!(!cart.set_quantity(&ExamCode::new("404").unwrap(), 3));
    }

    #[test]
    fn test_remove_line() {
        let mut cart = Cart::new();
        cart.add_or_increment(&exam("101", 50.0, &[]), PARTICULAR);
        assert!(cart.remove(&ExamCode::new("101").unwrap()));
        assert!(cart.is_empty());
        assert!(!cart.remove(&ExamCode::new("101").unwrap()));
    }

    #[test]
    fn test_recalculate_tracks_new_insurer() {
        let catalog = Catalog {
            insurers: vec![
                PARTICULAR.to_string(),
                "InsurerA".to_string(),
                "InsurerB".to_string(),
            ],
            exams: vec![exam(
                "101",
                50.0,
                &[("InsurerA", Some(40.0)), ("InsurerB", Some(30.0))],
            )],
        };
        let mut cart = Cart::new();
        cart.add_or_increment(&catalog.exams[0], "InsurerA");
        assert_eq!(cart.lines()[0].unit_price_insurer, Some(40.0));

        cart.recalculate_for_insurer("InsurerB", &catalog);
        assert_eq!(cart.lines()[0].unit_price_insurer, Some(30.0));

        cart.recalculate_for_insurer(PARTICULAR, &catalog);
        assert_eq!(cart.lines()[0].unit_price_insurer, Some(50.0));
    }

    #[test]
    fn test_recalculate_keeps_lines_missing_from_catalog() {
        let catalog = Catalog {
            insurers: vec![PARTICULAR.to_string()],
            exams: vec![],
        };
        let mut cart = Cart::new();
        cart.add_or_increment(&exam("101", 50.0, &[]), PARTICULAR);
        cart.recalculate_for_insurer(PARTICULAR, &catalog);
        assert_eq!(cart.lines()[0].unit_price_particular, 50.0);
    }
}
