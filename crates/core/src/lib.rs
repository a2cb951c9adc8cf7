//! # Examquote Core
//!
//! Core business logic for the medical exam quoting system.
//!
//! This crate contains the priced catalog and the quoting pipeline:
//! - Price-list ingestion and validation ([`ingest`])
//! - The catalog store with its single active designation ([`store`])
//! - Coverage exceptions ([`exceptions`])
//! - The quoting cart ([`cart`]) and the pure pricing engine ([`pricing`])
//! - Quotation assembly, history, accounts, identity checks
//! - Branding for quotation documents ([`insurer_logos`])
//!
//! **No API concerns**: HTTP surfaces and CLI plumbing belong in
//! `examquote-run` and `examquote-cli`. State persists through the
//! JSON-file store in [`storage`], which recovers from corruption by
//! resetting the damaged key to its default.

pub mod cart;
pub mod catalog;
pub mod exceptions;
pub mod history;
pub mod identity;
pub mod ingest;
pub mod insurer_logos;
pub mod pricing;
pub mod quote;
pub mod storage;
pub mod store;
pub mod users;

pub use examquote_types::{CodeError, CoveragePercent, ExamCode};

pub use cart::{Cart, CartLine};
pub use catalog::{Catalog, ExamRecord, RateResolution, PARTICULAR};
pub use exceptions::ExceptionSet;
pub use history::{HistoryEntry, HistoryError, HistoryLog};
pub use identity::validate_cedula;
pub use ingest::{parse_rows, read_price_file, IngestError, Row, RESERVED_COLUMNS};
pub use insurer_logos::InsurerLogos;
pub use pricing::{format_amount, price, round2, Quote, QuoteLine};
pub use quote::{build_quotation, Quotation, ValidationError};
pub use storage::{JsonStore, StorageError};
pub use store::{ActiveCatalog, CatalogEntry, CatalogStore, StoreError};
pub use users::{Role, UserError, UserRecord, UserStore};
