//! The catalog store: named price lists plus the single "active" designation.
//!
//! This is the one source of truth for which catalog drives search and
//! pricing. Consumers take the store by reference and read
//! [`CatalogStore::active`]; there is no ambient global. Every mutation
//! fixes up the active index *before* persisting, so no read can ever
//! observe an active index pointing at the wrong (or a vanished) entry.

use examquote_types::ExamCode;

use crate::catalog::Catalog;
use crate::storage::{JsonStore, StorageError};

const CATALOGS_KEY: &str = "catalogs";
const ACTIVE_KEY: &str = "active_catalog";

/// A named price list as held by the store. The logo is presentational
/// only (an encoded image string) and has no pricing effect.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    pub catalog: Catalog,
    #[serde(default)]
    pub logo: Option<String>,
}

/// Errors that can occur operating on the catalog store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Index-based lookup miss. Normal UI flow never produces this; it is
    /// an internal precondition violation and fails loudly.
    #[error("no catalog at index {0}")]
    NotFound(usize),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A consistent view of the active catalog: the index and the entry it
/// designates, read in one operation.
#[derive(Debug, Clone, Copy)]
pub struct ActiveCatalog<'a> {
    pub index: usize,
    pub entry: &'a CatalogEntry,
}

/// Holds zero or more named catalogs and the active designation.
#[derive(Debug)]
pub struct CatalogStore {
    storage: JsonStore,
    entries: Vec<CatalogEntry>,
    active: Option<usize>,
}

impl CatalogStore {
    /// Loads the store from durable storage. A stored active index that no
    /// longer designates an existing entry is repaired on load: index 0
    /// when any catalogs remain, none otherwise.
    pub fn open(storage: JsonStore) -> Self {
        let entries: Vec<CatalogEntry> = storage.read_or_default(CATALOGS_KEY);
        let stored_active: Option<usize> = storage.read_or_default(ACTIVE_KEY);
        let active = match stored_active {
            Some(i) if i < entries.len() => Some(i),
            _ if !entries.is_empty() => Some(0),
            _ => None,
        };
        Self {
            storage,
            entries,
            active,
        }
    }

    /// All stored catalogs, in insertion order.
    pub fn list(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The active catalog and its index, or `None` when no catalogs exist.
    pub fn active(&self) -> Option<ActiveCatalog<'_>> {
        self.active.map(|index| ActiveCatalog {
            index,
            entry: &self.entries[index],
        })
    }

    /// Convenience view over the active catalog's data.
    pub fn active_catalog(&self) -> Option<&Catalog> {
        self.active().map(|a| &a.entry.catalog)
    }

    /// Appends a catalog and returns its index. The first catalog added to
    /// an empty store becomes active; otherwise activation is the caller's
    /// separate decision.
    ///
    /// # Errors
    ///
    /// Returns a storage error if persisting fails.
    pub fn add(&mut self, entry: CatalogEntry) -> StoreResult<usize> {
        self.entries.push(entry);
        let index = self.entries.len() - 1;
        if self.active.is_none() {
            self.active = Some(index);
        }
        self.persist()?;
        Ok(index)
    }

    /// Removes the catalog at `index`.
    ///
    /// If the removed catalog was active, the store falls back to index 0
    /// when any catalogs remain (and to "none" otherwise) in the same
    /// operation — subsequent reads see the fallback's data immediately.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if `index` is out of range.
    pub fn remove(&mut self, index: usize) -> StoreResult<CatalogEntry> {
        if index >= self.entries.len() {
            return Err(StoreError::NotFound(index));
        }
        let removed = self.entries.remove(index);
        self.active = match self.active {
            Some(a) if a == index => {
                if self.entries.is_empty() {
                    None
                } else {
                    Some(0)
                }
            }
            // The active entry sits after the removed one; keep designating it.
            Some(a) if a > index => Some(a - 1),
            other => other,
        };
        self.persist()?;
        Ok(removed)
    }

    /// Marks the catalog at `index` as active.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if `index` is out of range.
    pub fn set_active(&mut self, index: usize) -> StoreResult<()> {
        if index >= self.entries.len() {
            return Err(StoreError::NotFound(index));
        }
        self.active = Some(index);
        self.persist()?;
        Ok(())
    }

    /// Replaces the logo of the catalog at `index`. Presentation only.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if `index` is out of range.
    pub fn replace_logo(&mut self, index: usize, logo: Option<String>) -> StoreResult<()> {
        let entry = self
            .entries
            .get_mut(index)
            .ok_or(StoreError::NotFound(index))?;
        entry.logo = logo;
        self.persist()?;
        Ok(())
    }

    /// Looks up an exam by code in the active catalog.
    pub fn find_exam(&self, code: &ExamCode) -> Option<&crate::catalog::ExamRecord> {
        self.active_catalog().and_then(|c| c.find_by_code(code))
    }

    fn persist(&self) -> Result<(), StorageError> {
        self.storage.write(CATALOGS_KEY, &self.entries)?;
        self.storage.write(ACTIVE_KEY, &self.active)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::PARTICULAR;
    use tempfile::TempDir;

    fn entry(name: &str) -> CatalogEntry {
        CatalogEntry {
            name: name.to_string(),
            catalog: Catalog {
                insurers: vec![PARTICULAR.to_string()],
                exams: vec![crate::catalog::ExamRecord {
                    code: ExamCode::new(format!("{name}-1")).unwrap(),
                    description: format!("Exam of {name}"),
                    group: String::new(),
                    list_price: 10.0,
                    insurer_rates: Default::default(),
                }],
            },
            logo: None,
        }
    }

    fn open_store(temp: &TempDir) -> CatalogStore {
        CatalogStore::open(JsonStore::open(temp.path()).unwrap())
    }

    #[test]
    fn test_empty_store_has_no_active_catalog() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        assert!(store.active().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_first_add_becomes_active() {
        let temp = TempDir::new().unwrap();
        let mut store = open_store(&temp);
        let index = store.add(entry("a")).unwrap();
        assert_eq!(index, 0);
        assert_eq!(store.active().unwrap().index, 0);
    }

    #[test]
    fn test_second_add_does_not_steal_active() {
        let temp = TempDir::new().unwrap();
        let mut store = open_store(&temp);
        store.add(entry("a")).unwrap();
        store.add(entry("b")).unwrap();
        assert_eq!(store.active().unwrap().entry.name, "a");
    }

    #[test]
    fn test_remove_active_promotes_index_zero() {
        let temp = TempDir::new().unwrap();
        let mut store = open_store(&temp);
        store.add(entry("a")).unwrap();
        store.add(entry("b")).unwrap();
        store.set_active(1).unwrap();

        store.remove(1).unwrap();

        let active = store.active().unwrap();
        assert_eq!(active.index, 0);
        assert_eq!(active.entry.name, "a");
        // The promoted catalog's exam data is what reads now return.
        assert_eq!(
            store.active_catalog().unwrap().exams[0].code.as_str(),
            "a-1"
        );
    }

    #[test]
    fn test_remove_last_catalog_leaves_no_active() {
        let temp = TempDir::new().unwrap();
        let mut store = open_store(&temp);
        store.add(entry("a")).unwrap();
        store.remove(0).unwrap();
        assert!(store.active().is_none());
        assert!(store.active_catalog().is_none());
    }

    #[test]
    fn test_remove_before_active_keeps_designated_entry() {
        let temp = TempDir::new().unwrap();
        let mut store = open_store(&temp);
        store.add(entry("a")).unwrap();
        store.add(entry("b")).unwrap();
        store.set_active(1).unwrap();

        store.remove(0).unwrap();

        assert_eq!(store.active().unwrap().entry.name, "b");
    }

    #[test]
    fn test_remove_out_of_range_is_not_found() {
        let temp = TempDir::new().unwrap();
        let mut store = open_store(&temp);
        assert!(matches!(store.remove(0), Err(StoreError::NotFound(0))));
    }

    #[test]
    fn test_set_active_out_of_range_is_not_found() {
        let temp = TempDir::new().unwrap();
        let mut store = open_store(&temp);
        store.add(entry("a")).unwrap();
        assert!(matches!(store.set_active(5), Err(StoreError::NotFound(5))));
    }

    #[test]
    fn test_state_survives_reopen() {
        let temp = TempDir::new().unwrap();
        {
            let mut store = open_store(&temp);
            store.add(entry("a")).unwrap();
            store.add(entry("b")).unwrap();
            store.set_active(1).unwrap();
        }
        let store = open_store(&temp);
        assert_eq!(store.len(), 2);
        assert_eq!(store.active().unwrap().entry.name, "b");
    }

    #[test]
    fn test_corrupt_active_index_repairs_on_load() {
        let temp = TempDir::new().unwrap();
        {
            let mut store = open_store(&temp);
            store.add(entry("a")).unwrap();
        }
        std::fs::write(temp.path().join("active_catalog.json"), "99").unwrap();
        let store = open_store(&temp);
        assert_eq!(store.active().unwrap().index, 0);
    }

    #[test]
    fn test_replace_logo_keeps_pricing_data() {
        let temp = TempDir::new().unwrap();
        let mut store = open_store(&temp);
        store.add(entry("a")).unwrap();
        store
            .replace_logo(0, Some("data:image/png;base64,AAAA".into()))
            .unwrap();
        assert_eq!(
            store.list()[0].logo.as_deref(),
            Some("data:image/png;base64,AAAA")
        );
        assert_eq!(store.active_catalog().unwrap().exams.len(), 1);
    }
}
