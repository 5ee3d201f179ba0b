//! Relational storage backend on SQLite.
//!
//! One table per collection; the denormalized account and category
//! snapshots carried on a transaction are flattened to columns. Amounts
//! are stored as decimal strings to keep exact arithmetic, timestamps
//! as RFC 3339 text. The connection lives behind a [`Mutex`], matching
//! the synchronous-under-lock model of the other backends.

use std::path::Path;
use std::sync::{Mutex, PoisonError};

use rusqlite::types::Type;
use rusqlite::{Connection, Row, params};
use rust_decimal::Decimal;

use crate::error::{Result, SyncError};
use crate::models::{
    AccountBrief, AccountId, BankAccount, Category, CategoryId, Direction, Transaction,
    TransactionId, UserId,
};

use super::{AccountStore, CategoryStore, TransactionStore};

/// Schema applied on every open; idempotent.
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS transactions (
    id                 INTEGER PRIMARY KEY,
    account_id         INTEGER NOT NULL,
    account_name       TEXT    NOT NULL,
    account_balance    TEXT    NOT NULL,
    account_currency   TEXT    NOT NULL,
    category_id        INTEGER NOT NULL,
    category_name      TEXT    NOT NULL,
    category_emoji     TEXT    NOT NULL,
    category_direction TEXT    NOT NULL,
    amount             TEXT    NOT NULL,
    transaction_date   TEXT    NOT NULL,
    comment            TEXT    NOT NULL,
    created_at         TEXT    NOT NULL,
    updated_at         TEXT    NOT NULL
);
CREATE TABLE IF NOT EXISTS accounts (
    id         INTEGER PRIMARY KEY,
    user_id    INTEGER NOT NULL,
    name       TEXT    NOT NULL,
    balance    TEXT    NOT NULL,
    currency   TEXT    NOT NULL,
    created_at TEXT    NOT NULL,
    updated_at TEXT    NOT NULL
);
CREATE TABLE IF NOT EXISTS categories (
    id        INTEGER PRIMARY KEY,
    name      TEXT    NOT NULL,
    emoji     TEXT    NOT NULL,
    direction TEXT    NOT NULL
);
";

/// Wraps a backend fault into the storage error variant.
fn storage_err(err: rusqlite::Error) -> SyncError {
    SyncError::Storage(Box::new(err))
}

/// Reads a decimal-string column.
fn get_decimal(row: &Row<'_>, column: &str) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(column)?;
    raw.parse().map_err(|err: rust_decimal::Error| {
        rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(err))
    })
}

/// Reads a direction column stored as its canonical lowercase string.
fn get_direction(row: &Row<'_>, column: &str) -> rusqlite::Result<Direction> {
    let raw: String = row.get(column)?;
    raw.parse()
        .map_err(|err: String| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, err.into()))
}

/// Maps a `transactions` row back into the domain model.
fn map_transaction(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    Ok(Transaction {
        id: TransactionId::new(row.get("id")?),
        account: AccountBrief {
            id: AccountId::new(row.get("account_id")?),
            name: row.get("account_name")?,
            balance: get_decimal(row, "account_balance")?,
            currency: row.get("account_currency")?,
        },
        category: Category {
            id: CategoryId::new(row.get("category_id")?),
            name: row.get("category_name")?,
            emoji: row.get("category_emoji")?,
            direction: get_direction(row, "category_direction")?,
        },
        amount: get_decimal(row, "amount")?,
        transaction_date: row.get("transaction_date")?,
        comment: row.get("comment")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

/// Maps an `accounts` row back into the domain model.
fn map_account(row: &Row<'_>) -> rusqlite::Result<BankAccount> {
    Ok(BankAccount {
        id: AccountId::new(row.get("id")?),
        user_id: UserId::new(row.get("user_id")?),
        name: row.get("name")?,
        balance: get_decimal(row, "balance")?,
        currency: row.get("currency")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

/// Maps a `categories` row back into the domain model.
fn map_category(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: CategoryId::new(row.get("id")?),
        name: row.get("name")?,
        emoji: row.get("emoji")?,
        direction: get_direction(row, "direction")?,
    })
}

/// Durable storage backend on a SQLite database.
#[derive(Debug)]
pub struct SqliteStore {
    /// Database connection, serialized behind a lock.
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (creating if needed) a database at `path` and applies the
    /// schema.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Storage`] if the database cannot be opened
    /// or the schema cannot be applied.
    #[tracing::instrument(skip_all)]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(storage_err)?;
        Self::with_schema(conn)
    }

    /// Opens a private in-memory database; handy for tests.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Storage`] if the database cannot be opened.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(storage_err)?;
        Self::with_schema(conn)
    }

    /// Applies the schema and wraps the connection.
    fn with_schema(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA).map_err(storage_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Runs `f` with the connection locked, translating backend errors.
    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> rusqlite::Result<T>) -> Result<T> {
        let mut conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut conn).map_err(storage_err)
    }

    /// Collects all rows of a single-table query.
    fn select_all<T>(
        &self,
        sql: &str,
        map: impl FnMut(&Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Vec<T>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt.query_map([], map)?;
            rows.collect()
        })
    }
}

impl TransactionStore for SqliteStore {
    #[inline]
    fn transactions(&self) -> impl Future<Output = Result<Vec<Transaction>>> + Send {
        core::future::ready(self.select_all(
            "SELECT id, account_id, account_name, account_balance, account_currency,
                    category_id, category_name, category_emoji, category_direction,
                    amount, transaction_date, comment, created_at, updated_at
             FROM transactions",
            map_transaction,
        ))
    }

    fn create_transaction(
        &self,
        transaction: &Transaction,
    ) -> impl Future<Output = Result<bool>> + Send {
        core::future::ready(self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO transactions (
                    id, account_id, account_name, account_balance, account_currency,
                    category_id, category_name, category_emoji, category_direction,
                    amount, transaction_date, comment, created_at, updated_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                 ON CONFLICT(id) DO NOTHING",
                params![
                    transaction.id.into_inner(),
                    transaction.account.id.into_inner(),
                    transaction.account.name,
                    transaction.account.balance.to_string(),
                    transaction.account.currency,
                    transaction.category.id.into_inner(),
                    transaction.category.name,
                    transaction.category.emoji,
                    transaction.category.direction.as_str(),
                    transaction.amount.to_string(),
                    transaction.transaction_date,
                    transaction.comment,
                    transaction.created_at,
                    transaction.updated_at,
                ],
            )?;
            Ok(inserted == 1)
        }))
    }

    fn update_transaction(
        &self,
        transaction: &Transaction,
    ) -> impl Future<Output = Result<bool>> + Send {
        core::future::ready(self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE transactions SET
                    account_id = ?2, account_name = ?3, account_balance = ?4,
                    account_currency = ?5, category_id = ?6, category_name = ?7,
                    category_emoji = ?8, category_direction = ?9, amount = ?10,
                    transaction_date = ?11, comment = ?12, created_at = ?13,
                    updated_at = ?14
                 WHERE id = ?1",
                params![
                    transaction.id.into_inner(),
                    transaction.account.id.into_inner(),
                    transaction.account.name,
                    transaction.account.balance.to_string(),
                    transaction.account.currency,
                    transaction.category.id.into_inner(),
                    transaction.category.name,
                    transaction.category.emoji,
                    transaction.category.direction.as_str(),
                    transaction.amount.to_string(),
                    transaction.transaction_date,
                    transaction.comment,
                    transaction.created_at,
                    transaction.updated_at,
                ],
            )?;
            Ok(updated == 1)
        }))
    }

    #[inline]
    fn delete_transaction(&self, id: TransactionId) -> impl Future<Output = Result<bool>> + Send {
        core::future::ready(self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM transactions WHERE id = ?1",
                params![id.into_inner()],
            )?;
            Ok(deleted == 1)
        }))
    }
}

impl AccountStore for SqliteStore {
    #[inline]
    fn accounts(&self) -> impl Future<Output = Result<Vec<BankAccount>>> + Send {
        core::future::ready(self.select_all(
            "SELECT id, user_id, name, balance, currency, created_at, updated_at
             FROM accounts",
            map_account,
        ))
    }

    fn create_account(&self, account: &BankAccount) -> impl Future<Output = Result<bool>> + Send {
        core::future::ready(self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO accounts (id, user_id, name, balance, currency, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO NOTHING",
                params![
                    account.id.into_inner(),
                    account.user_id.into_inner(),
                    account.name,
                    account.balance.to_string(),
                    account.currency,
                    account.created_at,
                    account.updated_at,
                ],
            )?;
            Ok(inserted == 1)
        }))
    }

    fn update_account(&self, account: &BankAccount) -> impl Future<Output = Result<bool>> + Send {
        core::future::ready(self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE accounts SET
                    user_id = ?2, name = ?3, balance = ?4, currency = ?5,
                    created_at = ?6, updated_at = ?7
                 WHERE id = ?1",
                params![
                    account.id.into_inner(),
                    account.user_id.into_inner(),
                    account.name,
                    account.balance.to_string(),
                    account.currency,
                    account.created_at,
                    account.updated_at,
                ],
            )?;
            Ok(updated == 1)
        }))
    }

    #[inline]
    fn delete_account(&self, id: AccountId) -> impl Future<Output = Result<bool>> + Send {
        core::future::ready(self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM accounts WHERE id = ?1",
                params![id.into_inner()],
            )?;
            Ok(deleted == 1)
        }))
    }
}

impl CategoryStore for SqliteStore {
    #[inline]
    fn categories(&self) -> impl Future<Output = Result<Vec<Category>>> + Send {
        core::future::ready(self.select_all(
            "SELECT id, name, emoji, direction FROM categories",
            map_category,
        ))
    }

    #[inline]
    fn create_category(&self, category: &Category) -> impl Future<Output = Result<bool>> + Send {
        core::future::ready(self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO categories (id, name, emoji, direction)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO NOTHING",
                params![
                    category.id.into_inner(),
                    category.name,
                    category.emoji,
                    category.direction.as_str(),
                ],
            )?;
            Ok(inserted == 1)
        }))
    }

    #[inline]
    fn update_category(&self, category: &Category) -> impl Future<Output = Result<bool>> + Send {
        core::future::ready(self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE categories SET name = ?2, emoji = ?3, direction = ?4 WHERE id = ?1",
                params![
                    category.id.into_inner(),
                    category.name,
                    category.emoji,
                    category.direction.as_str(),
                ],
            )?;
            Ok(updated == 1)
        }))
    }

    #[inline]
    fn delete_category(&self, id: CategoryId) -> impl Future<Output = Result<bool>> + Send {
        core::future::ready(self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM categories WHERE id = ?1",
                params![id.into_inner()],
            )?;
            Ok(deleted == 1)
        }))
    }

    fn replace_categories(
        &self,
        categories: &[Category],
    ) -> impl Future<Output = Result<()>> + Send {
        core::future::ready(self.with_conn(|conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM categories", [])?;
            for category in categories {
                tx.execute(
                    "INSERT INTO categories (id, name, emoji, direction)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        category.id.into_inner(),
                        category.name,
                        category.emoji,
                        category.direction.as_str(),
                    ],
                )?;
            }
            tx.commit()
        }))
    }
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;

    use super::*;

    fn transaction(id: i64, amount: &str, direction: Direction) -> Transaction {
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
                direction,
            },
            amount: amount.parse().unwrap(),
            transaction_date: at,
            comment: "airport".to_owned(),
            created_at: at,
            updated_at: at,
        }
    }

    #[tokio::test]
    async fn transaction_round_trips_through_columns() {
        let store = SqliteStore::in_memory().unwrap();
        let tx = transaction(7, "40.55", Direction::Outcome);
        assert!(store.create_transaction(&tx).await.unwrap());
        assert_eq!(store.transactions().await.unwrap(), vec![tx]);
    }

    #[tokio::test]
    async fn create_reports_conflict_without_overwrite() {
        let store = SqliteStore::in_memory().unwrap();
        let original = transaction(7, "40.00", Direction::Outcome);
        assert!(store.create_transaction(&original).await.unwrap());
        assert!(
            !store
                .create_transaction(&transaction(7, "99.00", Direction::Income))
                .await
                .unwrap()
        );
        assert_eq!(store.transactions().await.unwrap(), vec![original]);
    }

    #[tokio::test]
    async fn update_and_delete_report_absence() {
        let store = SqliteStore::in_memory().unwrap();
        let tx = transaction(7, "40.00", Direction::Outcome);
        assert!(!store.update_transaction(&tx).await.unwrap());
        assert!(!store.delete_transaction(tx.id).await.unwrap());

        assert!(store.create_transaction(&tx).await.unwrap());
        let mut edited = tx.clone();
        edited.comment = "office".to_owned();
        assert!(store.update_transaction(&edited).await.unwrap());
        assert_eq!(store.transactions().await.unwrap()[0].comment, "office");
        assert!(store.delete_transaction(tx.id).await.unwrap());
    }

    #[tokio::test]
    async fn replace_categories_is_wholesale() {
        let store = SqliteStore::in_memory().unwrap();
        let stale = Category {
            id: CategoryId::new(1),
            name: "Old".to_owned(),
            emoji: "🗑".to_owned(),
            direction: Direction::Income,
        };
        assert!(store.create_category(&stale).await.unwrap());

        let fresh = vec![
            Category {
                id: CategoryId::new(2),
                name: "Taxi".to_owned(),
                emoji: "🚕".to_owned(),
                direction: Direction::Outcome,
            },
            Category {
                id: CategoryId::new(3),
                name: "Salary".to_owned(),
                emoji: "💰".to_owned(),
                direction: Direction::Income,
            },
        ];
        store.replace_categories(&fresh).await.unwrap();
        assert_eq!(store.categories().await.unwrap(), fresh);
    }

    #[tokio::test]
    async fn accounts_round_trip() {
        let store = SqliteStore::in_memory().unwrap();
        let at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let account = BankAccount {
            id: AccountId::new(1),
            user_id: UserId::new(10),
            name: "Main".to_owned(),
            balance: "100.50".parse().unwrap(),
            currency: "RUB".to_owned(),
            created_at: at,
            updated_at: at,
        };
        assert!(store.create_account(&account).await.unwrap());
        assert_eq!(store.accounts().await.unwrap(), vec![account]);
    }
}
