//! Pluggable local storage.
//!
//! One trait per collection, all satisfied by every backend, so services
//! and the migration routine depend only on the contracts. Methods
//! return `impl Future` but every backend completes synchronously under
//! its own mutex; see the crate docs for the concurrency model.
//!
//! Contract shared by all write operations: creating an entity whose id
//! is already present returns `Ok(false)` and leaves the stored copy
//! untouched; updating or deleting an absent id returns `Ok(false)`.
//! `Err` is reserved for genuine backend faults, and a failed write is
//! never reported as success.

mod file;
mod memory;
mod sqlite;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::models::{AccountId, BankAccount, Category, CategoryId, Transaction, TransactionId};

/// Local persistence for transactions.
pub trait TransactionStore: core::fmt::Debug + Send + Sync {
    /// Returns all stored transactions, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SyncError::Storage`] if the backend fails.
    fn transactions(&self) -> impl Future<Output = Result<Vec<Transaction>>> + Send;

    /// Inserts a transaction. Returns `false` (without overwriting) if
    /// one with the same id already exists.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SyncError::Storage`] if the backend fails.
    fn create_transaction(
        &self,
        transaction: &Transaction,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Replaces the stored transaction with the same id. Returns `false`
    /// if no such transaction exists.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SyncError::Storage`] if the backend fails.
    fn update_transaction(
        &self,
        transaction: &Transaction,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Removes a transaction by id. Returns `false` if it was absent.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SyncError::Storage`] if the backend fails.
    fn delete_transaction(&self, id: TransactionId) -> impl Future<Output = Result<bool>> + Send;
}

/// Local persistence for bank accounts.
pub trait AccountStore: core::fmt::Debug + Send + Sync {
    /// Returns all stored accounts, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SyncError::Storage`] if the backend fails.
    fn accounts(&self) -> impl Future<Output = Result<Vec<BankAccount>>> + Send;

    /// Inserts an account. Returns `false` (without overwriting) if one
    /// with the same id already exists.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SyncError::Storage`] if the backend fails.
    fn create_account(&self, account: &BankAccount) -> impl Future<Output = Result<bool>> + Send;

    /// Replaces the stored account with the same id. Returns `false` if
    /// no such account exists.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SyncError::Storage`] if the backend fails.
    fn update_account(&self, account: &BankAccount) -> impl Future<Output = Result<bool>> + Send;

    /// Removes an account by id. Returns `false` if it was absent.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SyncError::Storage`] if the backend fails.
    fn delete_account(&self, id: AccountId) -> impl Future<Output = Result<bool>> + Send;
}

/// Local persistence for categories.
pub trait CategoryStore: core::fmt::Debug + Send + Sync {
    /// Returns all stored categories, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SyncError::Storage`] if the backend fails.
    fn categories(&self) -> impl Future<Output = Result<Vec<Category>>> + Send;

    /// Inserts a category. Returns `false` (without overwriting) if one
    /// with the same id already exists.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SyncError::Storage`] if the backend fails.
    fn create_category(&self, category: &Category) -> impl Future<Output = Result<bool>> + Send;

    /// Replaces the stored category with the same id. Returns `false` if
    /// no such category exists.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SyncError::Storage`] if the backend fails.
    fn update_category(&self, category: &Category) -> impl Future<Output = Result<bool>> + Send;

    /// Removes a category by id. Returns `false` if it was absent.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SyncError::Storage`] if the backend fails.
    fn delete_category(&self, id: CategoryId) -> impl Future<Output = Result<bool>> + Send;

    /// Replaces the whole stored set. Categories are server-owned
    /// reference data, so refresh is clear-then-insert.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SyncError::Storage`] if the backend fails.
    fn replace_categories(
        &self,
        categories: &[Category],
    ) -> impl Future<Output = Result<()>> + Send;
}

// ── Shared collection helpers ───────────────────────────────────────
//
// The document-style backends (memory, file) all operate on plain
// entity vectors keyed by integer id.

/// Appends `entity` unless an element with the same key exists.
pub(crate) fn insert_new<T: Clone>(
    items: &mut Vec<T>,
    entity: &T,
    key_of: impl Fn(&T) -> i64,
) -> bool {
    let key = key_of(entity);
    if items.iter().any(|item| key_of(item) == key) {
        return false;
    }
    items.push(entity.clone());
    true
}

/// Replaces the element with the same key, if any.
pub(crate) fn replace_existing<T: Clone>(
    items: &mut [T],
    entity: &T,
    key_of: impl Fn(&T) -> i64,
) -> bool {
    let key = key_of(entity);
    match items.iter_mut().find(|item| key_of(item) == key) {
        Some(slot) => {
            *slot = entity.clone();
            true
        }
        None => false,
    }
}

/// Removes the element with the given key, if any.
pub(crate) fn remove_by_key<T>(items: &mut Vec<T>, key: i64, key_of: impl Fn(&T) -> i64) -> bool {
    match items.iter().position(|item| key_of(item) == key) {
        Some(index) => {
            items.remove(index);
            true
        }
        None => false,
    }
}
