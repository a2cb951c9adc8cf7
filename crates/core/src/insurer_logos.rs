//! Per-insurer logos for quotation documents.
//!
//! Stored independently of any catalog: the map is keyed by insurer name,
//! so a logo survives catalog switches and applies to every catalog that
//! lists that insurer. An entry for an insurer no catalog currently names
//! is simply inert. Values are base64-encoded image data, the same
//! encoding the catalog logo uses.

use std::collections::BTreeMap;

use crate::storage::{JsonStore, StorageError};

const INSURER_LOGOS_KEY: &str = "insurer_logos";

/// Durable insurer-name-to-logo mapping.
#[derive(Debug)]
pub struct InsurerLogos {
    storage: JsonStore,
    logos: BTreeMap<String, String>,
}

impl InsurerLogos {
    /// Loads the logo map from durable storage. Corrupt stored state
    /// resets to an empty map (logged, never an error).
    pub fn open(storage: JsonStore) -> Self {
        let logos: BTreeMap<String, String> = storage.read_or_default(INSURER_LOGOS_KEY);
        Self { storage, logos }
    }

    /// Stores or replaces the logo for `insurer`. Setting the value
    /// already stored is a no-op.
    ///
    /// # Errors
    ///
    /// Returns a storage error if persisting fails.
    pub fn set(&mut self, insurer: &str, logo: String) -> Result<(), StorageError> {
        if self.logos.get(insurer) == Some(&logo) {
            return Ok(());
        }
        self.logos.insert(insurer.to_string(), logo);
        self.persist()
    }

    /// Removes the logo for `insurer`. Removing an absent entry is a no-op.
    ///
    /// # Errors
    ///
    /// Returns a storage error if persisting fails.
    pub fn remove(&mut self, insurer: &str) -> Result<(), StorageError> {
        if self.logos.remove(insurer).is_some() {
            self.persist()?;
        }
        Ok(())
    }

    /// The stored logo for `insurer`, if any.
    pub fn get(&self, insurer: &str) -> Option<&str> {
        self.logos.get(insurer).map(String::as_str)
    }

    /// Insurer names with a stored logo, in sorted order.
    pub fn insurers(&self) -> impl Iterator<Item = &str> {
        self.logos.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.logos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.logos.is_empty()
    }

    fn persist(&self) -> Result<(), StorageError> {
        self.storage.write(INSURER_LOGOS_KEY, &self.logos)
    }
}
