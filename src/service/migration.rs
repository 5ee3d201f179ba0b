//! Storage migration.
//!
//! Copies everything from one backend to another when the user switches
//! storage, so no local data is lost. Triggering the migration once per
//! switch is the caller's responsibility.

use crate::error::Result;
use crate::storage::{AccountStore, CategoryStore, TransactionStore};

/// Outcome of a [`migrate_all`] run.
///
/// Each field holds the number of entities copied for that kind, or
/// `None` when that kind's copy failed; the corresponding error
/// messages are collected in `failures`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Transactions inserted into the target, if the kind succeeded.
    pub transactions: Option<usize>,
    /// Accounts inserted into the target, if the kind succeeded.
    pub accounts: Option<usize>,
    /// Categories in the target after wholesale replacement, if the
    /// kind succeeded.
    pub categories: Option<usize>,
    /// Messages of the per-kind failures, empty on full success.
    pub failures: Vec<String>,
}

impl MigrationReport {
    /// Whether every entity kind migrated.
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Copies all local data from `from` into `to`.
///
/// Transactions and accounts are inserted through the create contract,
/// so entities already present in the target are left untouched;
/// categories are replaced wholesale, matching the refresh semantics.
/// Each entity kind is attempted independently: a failure in one kind
/// is recorded in the report and does not abort the others.
#[tracing::instrument(skip_all)]
pub async fn migrate_all<F, T>(from: &F, to: &T) -> MigrationReport
where
    F: TransactionStore + AccountStore + CategoryStore,
    T: TransactionStore + AccountStore + CategoryStore,
{
    let mut report = MigrationReport::default();

    match copy_transactions(from, to).await {
        Ok(copied) => report.transactions = Some(copied),
        Err(err) => {
            tracing::error!(error = %err, "transaction migration failed");
            report.failures.push(format!("transactions: {err}"));
        }
    }
    match copy_accounts(from, to).await {
        Ok(copied) => report.accounts = Some(copied),
        Err(err) => {
            tracing::error!(error = %err, "account migration failed");
            report.failures.push(format!("accounts: {err}"));
        }
    }
    match copy_categories(from, to).await {
        Ok(copied) => report.categories = Some(copied),
        Err(err) => {
            tracing::error!(error = %err, "category migration failed");
            report.failures.push(format!("categories: {err}"));
        }
    }

    tracing::debug!(
        transactions = ?report.transactions,
        accounts = ?report.accounts,
        categories = ?report.categories,
        "migration finished"
    );
    report
}

/// Inserts every source transaction into the target.
async fn copy_transactions<F, T>(from: &F, to: &T) -> Result<usize>
where
    F: TransactionStore,
    T: TransactionStore,
{
    let mut copied = 0;
    for transaction in from.transactions().await? {
        if to.create_transaction(&transaction).await? {
            copied += 1;
        }
    }
    Ok(copied)
}

/// Inserts every source account into the target.
async fn copy_accounts<F, T>(from: &F, to: &T) -> Result<usize>
where
    F: AccountStore,
    T: AccountStore,
{
    let mut copied = 0;
    for account in from.accounts().await? {
        if to.create_account(&account).await? {
            copied += 1;
        }
    }
    Ok(copied)
}

/// Replaces the target's category set with the source's.
async fn copy_categories<F, T>(from: &F, to: &T) -> Result<usize>
where
    F: CategoryStore,
    T: CategoryStore,
{
    let categories = from.categories().await?;
    to.replace_categories(&categories).await?;
    Ok(categories.len())
}
