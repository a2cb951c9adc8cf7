//! User accounts for the quoting tool.
//!
//! Two roles exist: administrators manage price lists, users, and
//! exceptions; advisors build quotations. Accounts persist in the durable
//! store and the store seeds a default admin and advisor account the first
//! time it opens against empty storage, so a fresh deployment is always
//! reachable.
//!
//! This is deliberately minimal credential handling for a single-operator
//! desk tool; it is not an authentication system.

use std::collections::BTreeMap;

use crate::storage::{JsonStore, StorageError};

const USERS_KEY: &str = "users";

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Advisor,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Advisor => write!(f, "advisor"),
        }
    }
}

/// One stored account.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct UserRecord {
    pub password: String,
    pub role: Role,
}

/// Errors that can occur managing accounts.
#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("username and password are required")]
    MissingCredentials,
    #[error("user {0} already exists")]
    AlreadyExists(String),
    #[error("user {0} not found")]
    NotFound(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type UserResult<T> = std::result::Result<T, UserError>;

/// The persistent account store.
#[derive(Debug)]
pub struct UserStore {
    storage: JsonStore,
    users: BTreeMap<String, UserRecord>,
}

impl UserStore {
    /// Loads accounts from durable storage, seeding the defaults when no
    /// accounts exist (first run or corrupt-state recovery). A failed seed
    /// write is logged and the defaults stay in memory.
    pub fn open(storage: JsonStore) -> Self {
        let mut users: BTreeMap<String, UserRecord> = storage.read_or_default(USERS_KEY);
        if users.is_empty() {
            users = Self::default_users();
            if let Err(e) = storage.write(USERS_KEY, &users) {
                tracing::warn!(error = %e, "failed to persist seeded default users");
            }
        }
        Self { storage, users }
    }

    fn default_users() -> BTreeMap<String, UserRecord> {
        BTreeMap::from([
            (
                "admin".to_string(),
                UserRecord {
                    password: "admin123".to_string(),
                    role: Role::Admin,
                },
            ),
            (
                "advisor".to_string(),
                UserRecord {
                    password: "advisor123".to_string(),
                    role: Role::Advisor,
                },
            ),
        ])
    }

    /// Checks credentials, returning the account role on success.
    pub fn authenticate(&self, username: &str, password: &str) -> Option<Role> {
        self.users
            .get(username)
            .filter(|record| record.password == password)
            .map(|record| record.role)
    }

    /// Adds an account.
    ///
    /// # Errors
    ///
    /// Returns [`UserError::MissingCredentials`] when username or password
    /// is blank, and [`UserError::AlreadyExists`] for a duplicate username.
    pub fn add(&mut self, username: &str, password: &str, role: Role) -> UserResult<()> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(UserError::MissingCredentials);
        }
        if self.users.contains_key(username) {
            return Err(UserError::AlreadyExists(username.to_string()));
        }
        self.users.insert(
            username.to_string(),
            UserRecord {
                password: password.to_string(),
                role,
            },
        );
        self.persist()?;
        Ok(())
    }

    /// Removes an account.
    ///
    /// # Errors
    ///
    /// Returns [`UserError::NotFound`] when no such account exists.
    pub fn remove(&mut self, username: &str) -> UserResult<()> {
        if self.users.remove(username).is_none() {
            return Err(UserError::NotFound(username.to_string()));
        }
        self.persist()?;
        Ok(())
    }

    /// All accounts as `(username, role)`, sorted by username.
    pub fn list(&self) -> Vec<(&str, Role)> {
        self.users
            .iter()
            .map(|(name, record)| (name.as_str(), record.role))
            .collect()
    }

    fn persist(&self) -> Result<(), StorageError> {
        self.storage.write(USERS_KEY, &self.users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store(temp: &TempDir) -> UserStore {
        UserStore::open(JsonStore::open(temp.path()).unwrap())
    }

    #[test]
    fn test_fresh_store_seeds_defaults() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        assert_eq!(store.authenticate("admin", "admin123"), Some(Role::Admin));
        assert_eq!(
            store.authenticate("advisor", "advisor123"),
            Some(Role::Advisor)
        );
    }

    #[test]
    fn test_authenticate_rejects_wrong_password() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        assert_eq!(store.authenticate("admin", "wrong"), None);
        assert_eq!(store.authenticate("ghost", "admin123"), None);
    }

    #[test]
    fn test_add_and_authenticate_new_user() {
        let temp = TempDir::new().unwrap();
        let mut store = open_store(&temp);
        store.add("jperez", "s3cret", Role::Advisor).unwrap();
        assert_eq!(store.authenticate("jperez", "s3cret"), Some(Role::Advisor));
    }

    #[test]
    fn test_add_duplicate_is_rejected() {
        let temp = TempDir::new().unwrap();
        let mut store = open_store(&temp);
        let err = store.add("admin", "x", Role::Admin).unwrap_err();
        assert!(matches!(err, UserError::AlreadyExists(name) if name == "admin"));
    }

    #[test]
    fn test_add_blank_credentials_rejected() {
        let temp = TempDir::new().unwrap();
        let mut store = open_store(&temp);
        assert!(matches!(
            store.add("  ", "pw", Role::Advisor),
            Err(UserError::MissingCredentials)
        ));
        assert!(matches!(
            store.add("name", "", Role::Advisor),
            Err(UserError::MissingCredentials)
        ));
    }

    #[test]
    fn test_remove_missing_user_is_not_found() {
        let temp = TempDir::new().unwrap();
        let mut store = open_store(&temp);
        assert!(matches!(
            store.remove("ghost"),
            Err(UserError::NotFound(name)) if name == "ghost"
        ));
    }

    #[test]
    fn test_accounts_survive_reopen() {
        let temp = TempDir::new().unwrap();
        {
            let mut store = open_store(&temp);
            store.add("jperez", "s3cret", Role::Advisor).unwrap();
        }
        let store = open_store(&temp);
        assert_eq!(store.authenticate("jperez", "s3cret"), Some(Role::Advisor));
        assert_eq!(store.list().len(), 3);
    }
}
