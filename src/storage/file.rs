//! Document-style file storage backend.
//!
//! One pretty-printed JSON file per collection inside a single
//! directory. Writes go to a temporary file in the same directory and
//! are renamed into place, so readers never observe a torn file.
//! Concurrent access is serialized twice: an in-process [`Mutex`] for
//! tasks sharing the store, and an advisory lock on a sidecar file for
//! other processes pointed at the same directory.

use std::fs::{self, File};
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Result, SyncError};
use crate::models::{AccountId, BankAccount, Category, CategoryId, Transaction, TransactionId};

use super::{
    AccountStore, CategoryStore, TransactionStore, insert_new, remove_by_key, replace_existing,
};

/// Collection file for transactions.
const TRANSACTIONS_FILE: &str = "transactions.json";
/// Collection file for bank accounts.
const ACCOUNTS_FILE: &str = "accounts.json";
/// Collection file for categories.
const CATEGORIES_FILE: &str = "categories.json";
/// Sidecar file carrying the cross-process advisory lock.
const LOCK_FILE: &str = ".lock";

/// Wraps a backend fault into the storage error variant.
fn storage_err(err: impl core::error::Error + Send + Sync + 'static) -> SyncError {
    SyncError::Storage(Box::new(err))
}

/// Durable storage backend keeping each collection in a JSON file.
#[derive(Debug)]
pub struct FileStore {
    /// Directory holding the collection files.
    dir: PathBuf,
    /// Serializes access among tasks sharing this instance.
    guard: Mutex<()>,
}

impl FileStore {
    /// Opens (creating if needed) a store rooted at `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Storage`] if the directory cannot be created.
    #[tracing::instrument(skip_all)]
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(storage_err)?;
        tracing::debug!(dir = %dir.display(), "opened file store");
        Ok(Self {
            dir,
            guard: Mutex::new(()),
        })
    }

    /// Returns the platform-conventional data directory for this crate,
    /// or `None` when the platform exposes no such location.
    #[inline]
    #[must_use]
    pub fn default_dir() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("finsync"))
    }

    /// Opens the sidecar lock file, creating it on first use.
    fn lock_file(&self) -> Result<File> {
        File::options()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.dir.join(LOCK_FILE))
            .map_err(storage_err)
    }

    /// Reads a whole collection under shared locks. A missing file is an
    /// empty collection.
    fn read_all<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>> {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        let lock = self.lock_file()?;
        lock.lock_shared().map_err(storage_err)?;
        self.read_unlocked(name)
    }

    /// Reads a collection file; callers hold the locks.
    fn read_unlocked<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>> {
        let raw = match fs::read(self.dir.join(name)) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(storage_err(err)),
        };
        serde_json::from_slice(&raw).map_err(storage_err)
    }

    /// Writes a collection atomically; callers hold the locks.
    fn write_unlocked<T: Serialize>(&self, name: &str, items: &[T]) -> Result<()> {
        let raw = serde_json::to_vec_pretty(items).map_err(storage_err)?;
        let tmp = self.dir.join(format!("{name}.tmp"));
        fs::write(&tmp, raw).map_err(storage_err)?;
        fs::rename(&tmp, self.dir.join(name)).map_err(storage_err)
    }

    /// Read-modify-write under exclusive locks. The file is rewritten
    /// only when `f` reports a change.
    fn mutate<T>(&self, name: &str, f: impl FnOnce(&mut Vec<T>) -> bool) -> Result<bool>
    where
        T: Serialize + DeserializeOwned,
    {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        let lock = self.lock_file()?;
        lock.lock().map_err(storage_err)?;
        let mut items = self.read_unlocked(name)?;
        let changed = f(&mut items);
        if changed {
            self.write_unlocked(name, &items)?;
        }
        Ok(changed)
    }

    /// Replaces a whole collection under exclusive locks.
    fn replace_all<T: Serialize>(&self, name: &str, items: &[T]) -> Result<()> {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        let lock = self.lock_file()?;
        lock.lock().map_err(storage_err)?;
        self.write_unlocked(name, items)
    }
}

impl TransactionStore for FileStore {
    #[inline]
    fn transactions(&self) -> impl Future<Output = Result<Vec<Transaction>>> + Send {
        core::future::ready(self.read_all(TRANSACTIONS_FILE))
    }

    #[inline]
    fn create_transaction(
        &self,
        transaction: &Transaction,
    ) -> impl Future<Output = Result<bool>> + Send {
        core::future::ready(self.mutate(TRANSACTIONS_FILE, |items| {
            insert_new(items, transaction, |tx: &Transaction| tx.id.into_inner())
        }))
    }

    #[inline]
    fn update_transaction(
        &self,
        transaction: &Transaction,
    ) -> impl Future<Output = Result<bool>> + Send {
        core::future::ready(self.mutate(TRANSACTIONS_FILE, |items| {
            replace_existing(items, transaction, |tx: &Transaction| tx.id.into_inner())
        }))
    }

    #[inline]
    fn delete_transaction(&self, id: TransactionId) -> impl Future<Output = Result<bool>> + Send {
        core::future::ready(self.mutate(TRANSACTIONS_FILE, |items| {
            remove_by_key(items, id.into_inner(), |tx: &Transaction| {
                tx.id.into_inner()
            })
        }))
    }
}

impl AccountStore for FileStore {
    #[inline]
    fn accounts(&self) -> impl Future<Output = Result<Vec<BankAccount>>> + Send {
        core::future::ready(self.read_all(ACCOUNTS_FILE))
    }

    #[inline]
    fn create_account(&self, account: &BankAccount) -> impl Future<Output = Result<bool>> + Send {
        core::future::ready(self.mutate(ACCOUNTS_FILE, |items| {
            insert_new(items, account, |acc: &BankAccount| acc.id.into_inner())
        }))
    }

    #[inline]
    fn update_account(&self, account: &BankAccount) -> impl Future<Output = Result<bool>> + Send {
        core::future::ready(self.mutate(ACCOUNTS_FILE, |items| {
            replace_existing(items, account, |acc: &BankAccount| acc.id.into_inner())
        }))
    }

    #[inline]
    fn delete_account(&self, id: AccountId) -> impl Future<Output = Result<bool>> + Send {
        core::future::ready(self.mutate(ACCOUNTS_FILE, |items| {
            remove_by_key(items, id.into_inner(), |acc: &BankAccount| {
                acc.id.into_inner()
            })
        }))
    }
}

impl CategoryStore for FileStore {
    #[inline]
    fn categories(&self) -> impl Future<Output = Result<Vec<Category>>> + Send {
        core::future::ready(self.read_all(CATEGORIES_FILE))
    }

    #[inline]
    fn create_category(&self, category: &Category) -> impl Future<Output = Result<bool>> + Send {
        core::future::ready(self.mutate(CATEGORIES_FILE, |items| {
            insert_new(items, category, |cat: &Category| cat.id.into_inner())
        }))
    }

    #[inline]
    fn update_category(&self, category: &Category) -> impl Future<Output = Result<bool>> + Send {
        core::future::ready(self.mutate(CATEGORIES_FILE, |items| {
            replace_existing(items, category, |cat: &Category| cat.id.into_inner())
        }))
    }

    #[inline]
    fn delete_category(&self, id: CategoryId) -> impl Future<Output = Result<bool>> + Send {
        core::future::ready(self.mutate(CATEGORIES_FILE, |items| {
            remove_by_key(items, id.into_inner(), |cat: &Category| cat.id.into_inner())
        }))
    }

    #[inline]
    fn replace_categories(
        &self,
        categories: &[Category],
    ) -> impl Future<Output = Result<()>> + Send {
        core::future::ready(self.replace_all(CATEGORIES_FILE, categories))
    }
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;
    use rust_decimal::Decimal;

    use crate::models::{AccountBrief, Direction, UserId};

    use super::*;

    fn transaction(id: i64, amount: &str) -> Transaction {
        let at = DateTime::from_timestamp(1_750_000_000, 0).unwrap();
        Transaction {
            id: TransactionId::new(id),
            account: AccountBrief {
                id: AccountId::new(1),
                name: "Main".to_owned(),
                balance: Decimal::from(100),
                currency: "RUB".to_owned(),
            },
            category: Category {
                id: CategoryId::new(2),
                name: "Taxi".to_owned(),
                emoji: "🚕".to_owned(),
                direction: Direction::Outcome,
            },
            amount: amount.parse().unwrap(),
            transaction_date: at,
            comment: "airport".to_owned(),
            created_at: at,
            updated_at: at,
        }
    }

    #[tokio::test]
    async fn empty_directory_reads_as_empty_collections() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        assert!(store.transactions().await.unwrap().is_empty());
        assert!(store.accounts().await.unwrap().is_empty());
        assert!(store.categories().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn writes_survive_reopening() {
        let dir = tempfile::tempdir().unwrap();
        let tx = transaction(7, "40.00");
        {
            let store = FileStore::new(dir.path()).unwrap();
            assert!(store.create_transaction(&tx).await.unwrap());
        }
        let reopened = FileStore::new(dir.path()).unwrap();
        assert_eq!(reopened.transactions().await.unwrap(), vec![tx]);
    }

    #[tokio::test]
    async fn create_does_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        let original = transaction(7, "40.00");
        assert!(store.create_transaction(&original).await.unwrap());
        assert!(!store.create_transaction(&transaction(7, "99.00")).await.unwrap());
        assert_eq!(store.transactions().await.unwrap(), vec![original]);
    }

    #[tokio::test]
    async fn update_and_delete_report_absence() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        assert!(!store.update_transaction(&transaction(7, "40.00")).await.unwrap());
        assert!(!store.delete_transaction(TransactionId::new(7)).await.unwrap());

        assert!(store.create_transaction(&transaction(7, "40.00")).await.unwrap());
        assert!(store.update_transaction(&transaction(7, "45.00")).await.unwrap());
        let stored = store.transactions().await.unwrap();
        assert_eq!(stored[0].amount, "45.00".parse::<Decimal>().unwrap());
        assert!(store.delete_transaction(TransactionId::new(7)).await.unwrap());
        assert!(store.transactions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn collections_are_independent_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        let account = BankAccount {
            id: AccountId::new(1),
            user_id: UserId::new(10),
            name: "Main".to_owned(),
            balance: Decimal::from(100),
            currency: "RUB".to_owned(),
            created_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            updated_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        };
        assert!(store.create_account(&account).await.unwrap());
        assert!(dir.path().join(ACCOUNTS_FILE).exists());
        assert!(!dir.path().join(TRANSACTIONS_FILE).exists());
    }
}
