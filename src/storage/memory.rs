//! In-memory storage backend.
//!
//! Zero-setup backend for unit tests and throwaway sessions; nothing
//! survives the process.

use std::sync::{Mutex, PoisonError};

use crate::error::Result;
use crate::models::{AccountId, BankAccount, Category, CategoryId, Transaction, TransactionId};

use super::{
    AccountStore, CategoryStore, TransactionStore, insert_new, remove_by_key, replace_existing,
};

/// Collections guarded by the store mutex.
#[derive(Debug, Default)]
struct Inner {
    /// Stored transactions.
    transactions: Vec<Transaction>,
    /// Stored bank accounts.
    accounts: Vec<BankAccount>,
    /// Stored categories.
    categories: Vec<Category>,
}

/// Volatile storage backend holding everything in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// All collections behind one lock.
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` with the collections locked.
    fn with_lock<T>(&self, f: impl FnOnce(&mut Inner) -> T) -> T {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut inner)
    }
}

impl TransactionStore for MemoryStore {
    #[inline]
    fn transactions(&self) -> impl Future<Output = Result<Vec<Transaction>>> + Send {
        core::future::ready(Ok(self.with_lock(|inner| inner.transactions.clone())))
    }

    #[inline]
    fn create_transaction(
        &self,
        transaction: &Transaction,
    ) -> impl Future<Output = Result<bool>> + Send {
        core::future::ready(Ok(self.with_lock(|inner| {
            insert_new(&mut inner.transactions, transaction, |tx| tx.id.into_inner())
        })))
    }

    #[inline]
    fn update_transaction(
        &self,
        transaction: &Transaction,
    ) -> impl Future<Output = Result<bool>> + Send {
        core::future::ready(Ok(self.with_lock(|inner| {
            replace_existing(&mut inner.transactions, transaction, |tx| {
                tx.id.into_inner()
            })
        })))
    }

    #[inline]
    fn delete_transaction(&self, id: TransactionId) -> impl Future<Output = Result<bool>> + Send {
        core::future::ready(Ok(self.with_lock(|inner| {
            remove_by_key(&mut inner.transactions, id.into_inner(), |tx| {
                tx.id.into_inner()
            })
        })))
    }
}

impl AccountStore for MemoryStore {
    #[inline]
    fn accounts(&self) -> impl Future<Output = Result<Vec<BankAccount>>> + Send {
        core::future::ready(Ok(self.with_lock(|inner| inner.accounts.clone())))
    }

    #[inline]
    fn create_account(&self, account: &BankAccount) -> impl Future<Output = Result<bool>> + Send {
        core::future::ready(Ok(self.with_lock(|inner| {
            insert_new(&mut inner.accounts, account, |acc| acc.id.into_inner())
        })))
    }

    #[inline]
    fn update_account(&self, account: &BankAccount) -> impl Future<Output = Result<bool>> + Send {
        core::future::ready(Ok(self.with_lock(|inner| {
            replace_existing(&mut inner.accounts, account, |acc| acc.id.into_inner())
        })))
    }

    #[inline]
    fn delete_account(&self, id: AccountId) -> impl Future<Output = Result<bool>> + Send {
        core::future::ready(Ok(self.with_lock(|inner| {
            remove_by_key(&mut inner.accounts, id.into_inner(), |acc| {
                acc.id.into_inner()
            })
        })))
    }
}

impl CategoryStore for MemoryStore {
    #[inline]
    fn categories(&self) -> impl Future<Output = Result<Vec<Category>>> + Send {
        core::future::ready(Ok(self.with_lock(|inner| inner.categories.clone())))
    }

    #[inline]
    fn create_category(&self, category: &Category) -> impl Future<Output = Result<bool>> + Send {
        core::future::ready(Ok(self.with_lock(|inner| {
            insert_new(&mut inner.categories, category, |cat| cat.id.into_inner())
        })))
    }

    #[inline]
    fn update_category(&self, category: &Category) -> impl Future<Output = Result<bool>> + Send {
        core::future::ready(Ok(self.with_lock(|inner| {
            replace_existing(&mut inner.categories, category, |cat| cat.id.into_inner())
        })))
    }

    #[inline]
    fn delete_category(&self, id: CategoryId) -> impl Future<Output = Result<bool>> + Send {
        core::future::ready(Ok(self.with_lock(|inner| {
            remove_by_key(&mut inner.categories, id.into_inner(), |cat| {
                cat.id.into_inner()
            })
        })))
    }

    #[inline]
    fn replace_categories(
        &self,
        categories: &[Category],
    ) -> impl Future<Output = Result<()>> + Send {
        core::future::ready(Ok(self.with_lock(|inner| {
            inner.categories = categories.to_vec();
        })))
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::models::Direction;

    use super::*;

    fn category(id: i64, direction: Direction) -> Category {
        Category {
            id: CategoryId::new(id),
            name: format!("category {id}"),
            emoji: "🧾".to_owned(),
            direction,
        }
    }

    fn account(id: i64, balance: &str) -> BankAccount {
        use chrono::DateTime;

        use crate::models::UserId;

        BankAccount {
            id: AccountId::new(id),
            user_id: UserId::new(1),
            name: "Main".to_owned(),
            balance: balance.parse().unwrap(),
            currency: "RUB".to_owned(),
            created_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            updated_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn create_is_insert_only() {
        let store = MemoryStore::new();
        let original = account(1, "100");
        assert!(store.create_account(&original).await.unwrap());

        let mut conflicting = account(1, "999");
        conflicting.name = "Other".to_owned();
        assert!(!store.create_account(&conflicting).await.unwrap());

        let stored = store.accounts().await.unwrap();
        assert_eq!(stored, vec![original]);
    }

    #[tokio::test]
    async fn update_requires_presence() {
        let store = MemoryStore::new();
        let mut acc = account(1, "100");
        assert!(!store.update_account(&acc).await.unwrap());

        assert!(store.create_account(&acc).await.unwrap());
        acc.balance = Decimal::from(60);
        assert!(store.update_account(&acc).await.unwrap());
        assert_eq!(store.accounts().await.unwrap()[0].balance, Decimal::from(60));
    }

    #[tokio::test]
    async fn delete_reports_absence() {
        let store = MemoryStore::new();
        assert!(!store.delete_account(AccountId::new(1)).await.unwrap());
        assert!(store.create_account(&account(1, "100")).await.unwrap());
        assert!(store.delete_account(AccountId::new(1)).await.unwrap());
        assert!(store.accounts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn replace_categories_is_wholesale() {
        let store = MemoryStore::new();
        assert!(
            store
                .create_category(&category(1, Direction::Income))
                .await
                .unwrap()
        );

        let fresh = vec![category(2, Direction::Outcome), category(3, Direction::Income)];
        store.replace_categories(&fresh).await.unwrap();
        assert_eq!(store.categories().await.unwrap(), fresh);
    }
}
