//! Coverage exceptions: exam codes the insurer never covers.
//!
//! The set is independent of any single catalog — codes persist across
//! catalog switches, and a code with no match in the active catalog is
//! simply inert. The pricing engine treats membership here exactly like
//! the self-pay case: the patient pays the full resolved amount for that
//! line.

use std::collections::BTreeSet;

use examquote_types::ExamCode;

use crate::storage::{JsonStore, StorageError};

const EXCEPTIONS_KEY: &str = "exceptions";

/// The set of exam codes with coverage forcibly disabled.
#[derive(Debug)]
pub struct ExceptionSet {
    storage: JsonStore,
    codes: BTreeSet<ExamCode>,
}

impl ExceptionSet {
    /// Loads the exception set from durable storage. Corrupt stored state
    /// resets to an empty set (logged, never an error).
    pub fn open(storage: JsonStore) -> Self {
        let codes: BTreeSet<ExamCode> = storage.read_or_default(EXCEPTIONS_KEY);
        Self { storage, codes }
    }

    /// Adds a code to the set. Adding an already-present code is a no-op.
    ///
    /// # Errors
    ///
    /// Returns a storage error if persisting fails.
    pub fn add(&mut self, code: ExamCode) -> Result<(), StorageError> {
        if self.codes.insert(code) {
            self.persist()?;
        }
        Ok(())
    }

    /// Removes a code from the set. Removing an absent code is a no-op.
    ///
    /// # Errors
    ///
    /// Returns a storage error if persisting fails.
    pub fn remove(&mut self, code: &ExamCode) -> Result<(), StorageError> {
        if self.codes.remove(code) {
            self.persist()?;
        }
        Ok(())
    }

    /// Whether coverage is disabled for `code`.
    pub fn contains(&self, code: &ExamCode) -> bool {
        self.codes.contains(code)
    }

    /// All excluded codes, in sorted order.
    pub fn list(&self) -> impl Iterator<Item = &ExamCode> {
        self.codes.iter()
    }

    /// The underlying code set. The pricing engine takes this plain set so
    /// it stays a pure function with no storage handle in its inputs.
    pub fn codes(&self) -> &BTreeSet<ExamCode> {
        &self.codes
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    fn persist(&self) -> Result<(), StorageError> {
        self.storage.write(EXCEPTIONS_KEY, &self.codes)
    }
}
