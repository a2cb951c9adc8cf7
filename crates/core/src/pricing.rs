//! The pricing engine: one pure function from a cart snapshot to money.
//!
//! Every consumer — the live summary, the exported document, the history
//! log — calls [`price`] and reads its output verbatim. Nothing downstream
//! recomputes pricing; that is the entire point of this module existing
//! once instead of per call site.
//!
//! The reference currency for coverage math is always the insurer-resolved
//! amount: the negotiated rate when one exists, the list price as fallback
//! when it does not. Accumulation happens at full floating precision;
//! rounding to two decimals is a presentation concern (see [`round2`] and
//! [`format_amount`]).

use std::collections::BTreeSet;

use examquote_types::{CoveragePercent, ExamCode};

use crate::cart::CartLine;
use crate::catalog::PARTICULAR;

/// One priced cart line as it appears in a quotation.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct QuoteLine {
    pub code: ExamCode,
    pub description: String,
    /// The cash price (PVP) per unit.
    pub unit_price_particular: f64,
    /// The negotiated insurer rate (PVA) per unit, when one exists.
    pub unit_price_insurer: Option<f64>,
    /// The amount coverage math actually ran on, per unit.
    pub resolved_unit_price: f64,
    /// True when no negotiated rate existed and the list price was
    /// substituted as the coverage base.
    pub used_fallback_rate: bool,
    pub quantity: u32,
    /// `resolved_unit_price * quantity`, full precision.
    pub amount: f64,
    /// Whether coverage applied to this line (false for self-pay and for
    /// codes in the exception set).
    pub covered: bool,
}

/// The computed result of pricing a cart snapshot.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Quote {
    /// Sum of all resolved line amounts, full precision.
    pub subtotal: f64,
    /// The coverage percentage the computation used (already clamped).
    pub coverage_percent: f64,
    /// The patient's out-of-pocket percentage. Reported as 0 for the
    /// self-pay case, where a coverage split is meaningless.
    pub copay_percent: f64,
    /// The amount the patient pays, full precision.
    pub copay_amount: f64,
    /// Always equal to `copay_amount`: the insurer's covered portion is
    /// never collected from the patient and is not part of the total.
    pub total: f64,
    pub lines: Vec<QuoteLine>,
}

/// Prices a cart snapshot under an insurer, coverage percentage, and
/// exception set.
///
/// Total over its whole input domain: percentages arrive clamped, prices
/// are non-negative by catalog contract, and there is no error path. Pure
/// and deterministic — identical inputs yield bit-identical output.
pub fn price(
    lines: &[CartLine],
    insurer: &str,
    coverage: CoveragePercent,
    exceptions: &BTreeSet<ExamCode>,
) -> Quote {
    let self_pay = insurer == PARTICULAR;
    let mut subtotal = 0.0_f64;
    let mut copay_amount = 0.0_f64;
    let mut quote_lines = Vec::with_capacity(lines.len());

    for line in lines {
        let resolved_unit_price = line
            .unit_price_insurer
            .unwrap_or(line.unit_price_particular);
        let used_fallback_rate = !self_pay && line.unit_price_insurer.is_none();
        let amount = resolved_unit_price * f64::from(line.quantity);
        subtotal += amount;

        let covered = !self_pay && !exceptions.contains(&line.code);
        if covered {
            copay_amount += amount * coverage.copay() / 100.0;
        } else {
            // Self-pay or an excluded code: the patient pays it in full.
            copay_amount += amount;
        }

        quote_lines.push(QuoteLine {
            code: line.code.clone(),
            description: line.description.clone(),
            unit_price_particular: line.unit_price_particular,
            unit_price_insurer: line.unit_price_insurer,
            resolved_unit_price,
            used_fallback_rate,
            quantity: line.quantity,
            amount,
            covered,
        });
    }

    let copay_percent = if self_pay { 0.0 } else { coverage.copay() };

    Quote {
        subtotal,
        coverage_percent: coverage.value(),
        copay_percent,
        copay_amount,
        total: copay_amount,
        lines: quote_lines,
    }
}

/// Rounds a currency amount to two decimals. Presentation only — never
/// feed the result back into accumulation.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Formats a currency amount with two decimals for display and export.
pub fn format_amount(value: f64) -> String {
    format!("{value:.2}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(
        code: &str,
        particular: f64,
        insurer: Option<f64>,
        quantity: u32,
    ) -> CartLine {
        CartLine {
            code: ExamCode::new(code).unwrap(),
            description: format!("Exam {code}"),
            unit_price_particular: particular,
            unit_price_insurer: insurer,
            quantity,
        }
    }

    fn codes(items: &[&str]) -> BTreeSet<ExamCode> {
        items.iter().map(|c| ExamCode::new(c).unwrap()).collect()
    }

    #[test]
    fn test_insured_cart_splits_copay() {
        let cart = vec![line("101", 50.0, Some(40.0), 2)];
        let quote = price(&cart, "InsurerA", CoveragePercent::clamped(80.0), &codes(&[]));
        assert_eq!(quote.subtotal, 80.0);
        assert_eq!(quote.copay_percent, 20.0);
        assert_eq!(quote.copay_amount, 16.0);
        assert_eq!(quote.total, 16.0);
        assert!(quote.lines[0].covered);
        assert!(!quote.lines[0].used_fallback_rate);
    }

    #[test]
    fn test_exception_code_pays_in_full() {
        let cart = vec![line("101", 50.0, Some(40.0), 2)];
        let quote = price(
            &cart,
            "InsurerA",
            CoveragePercent::clamped(80.0),
            &codes(&["101"]),
        );
        assert_eq!(quote.subtotal, 80.0);
        assert_eq!(quote.copay_amount, 80.0);
        assert_eq!(quote.total, 80.0);
        assert!(!quote.lines[0].covered);
    }

    #[test]
    fn test_particular_pays_full_subtotal() {
        let cart = vec![line("101", 50.0, Some(50.0), 1), line("102", 30.0, Some(30.0), 2)];
        let quote = price(&cart, PARTICULAR, CoveragePercent::clamped(80.0), &codes(&[]));
        assert_eq!(quote.subtotal, 110.0);
        assert_eq!(quote.copay_amount, quote.subtotal);
        assert_eq!(quote.copay_percent, 0.0);
    }

    #[test]
    fn test_missing_rate_falls_back_to_list_price() {
        let cart = vec![line("101", 50.0, None, 1)];
        let quote = price(&cart, "InsurerA", CoveragePercent::clamped(80.0), &codes(&[]));
        assert_eq!(quote.subtotal, 50.0);
        assert!(quote.lines[0].used_fallback_rate);
        assert_eq!(quote.lines[0].resolved_unit_price, 50.0);
        assert_eq!(quote.copay_amount, 10.0);
    }

    #[test]
    fn test_fallback_flag_not_set_for_particular() {
        let cart = vec![line("101", 50.0, None, 1)];
        let quote = price(&cart, PARTICULAR, CoveragePercent::clamped(80.0), &codes(&[]));
        assert!(!quote.lines[0].used_fallback_rate);
    }

    #[test]
    fn test_empty_cart_prices_to_zero() {
        let quote = price(&[], "InsurerA", CoveragePercent::clamped(80.0), &codes(&[]));
        assert_eq!(quote.subtotal, 0.0);
        assert_eq!(quote.total, 0.0);
        assert!(quote.lines.is_empty());
    }

    #[test]
    fn test_pricing_is_idempotent() {
        let cart = vec![
            line("101", 50.0, Some(40.0), 2),
            line("102", 33.33, None, 3),
        ];
        let coverage = CoveragePercent::clamped(72.5);
        let exceptions = codes(&["102"]);
        let first = price(&cart, "InsurerA", coverage, &exceptions);
        let second = price(&cart, "InsurerA", coverage, &exceptions);
        assert_eq!(first, second);
    }

    #[test]
    fn test_accumulation_keeps_full_precision() {
        // Three lines of 0.1 each must not pick up per-line rounding.
        let cart = vec![
            line("1", 0.1, None, 1),
            line("2", 0.1, None, 1),
            line("3", 0.1, None, 1),
        ];
        let quote = price(&cart, PARTICULAR, CoveragePercent::clamped(0.0), &codes(&[]));
        assert_eq!(round2(quote.subtotal), 0.3);
    }

    #[test]
    fn test_round2_and_format() {
        assert_eq!(round2(16.004), 16.0);
        assert_eq!(round2(16.006), 16.01);
        assert_eq!(format_amount(16.0), "16.00");
        assert_eq!(format_amount(0.1 + 0.2), "0.30");
    }
}
