//! Balance consistency.
//!
//! Account balances are persisted running totals, so every transaction
//! mutation carries a balance side effect: income adds the amount,
//! outcome subtracts it. Applying an effect and then reversing it is an
//! exact-decimal no-op.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;

use crate::error::{Result, SyncError};
use crate::models::{AccountBrief, AccountId, BankAccount, Transaction, UserId};
use crate::outbox::Outbox;
use crate::storage::AccountStore;

use super::BankAccountsService;

/// Keeps account balances consistent with transaction mutations.
#[derive(Debug)]
pub struct BalanceService<S, O> {
    /// Accounts service effects are persisted through.
    accounts: Arc<BankAccountsService<S, O>>,
}

impl<S, O> BalanceService<S, O>
where
    S: AccountStore,
    O: Outbox<AccountId, BankAccount>,
{
    /// Creates the service on top of the accounts service.
    #[inline]
    pub const fn new(accounts: Arc<BankAccountsService<S, O>>) -> Self {
        Self { accounts }
    }

    /// Applies a transaction's effect to its account balance and
    /// persists the account.
    ///
    /// # Errors
    ///
    /// Surfaces account lookup and persist failures to the caller.
    #[tracing::instrument(skip_all, fields(transaction = %transaction.id))]
    pub async fn apply_effect(&self, transaction: &Transaction) -> Result<()> {
        match transaction.category.direction.effect(transaction.amount) {
            Some(delta) => self.shift(transaction.account.id, delta).await,
            None => Ok(()),
        }
    }

    /// Reverses a previously applied effect; the exact inverse of
    /// [`Self::apply_effect`].
    ///
    /// # Errors
    ///
    /// Surfaces account lookup and persist failures to the caller.
    #[tracing::instrument(skip_all, fields(transaction = %transaction.id))]
    pub async fn reverse_effect(&self, transaction: &Transaction) -> Result<()> {
        match transaction.category.direction.effect(transaction.amount) {
            Some(delta) => self.shift(transaction.account.id, -delta).await,
            None => Ok(()),
        }
    }

    /// Adds `delta` to the stored balance and persists through the
    /// accounts service.
    async fn shift(&self, id: AccountId, delta: Decimal) -> Result<()> {
        let mut account = self.accounts.get(id).await?;
        account.balance += delta;
        self.accounts.update(&account).await?;
        Ok(())
    }

    /// Computes the would-be account state after applying the
    /// transaction's effect, without persisting anything. `None` when
    /// the transaction has no balance effect.
    ///
    /// Used by the compensating-queue path when a transaction write
    /// fails.
    pub(crate) async fn project_effect(
        &self,
        transaction: &Transaction,
    ) -> Result<Option<BankAccount>> {
        let Some(delta) = transaction.category.direction.effect(transaction.amount) else {
            return Ok(None);
        };
        let mut account = self.local_or_snapshot(transaction).await?;
        account.balance += delta;
        Ok(Some(account))
    }

    /// Like [`Self::project_effect`], but for the inverse effect.
    pub(crate) async fn project_reversal(
        &self,
        transaction: &Transaction,
    ) -> Result<Option<BankAccount>> {
        let Some(delta) = transaction.category.direction.effect(transaction.amount) else {
            return Ok(None);
        };
        let mut account = self.local_or_snapshot(transaction).await?;
        account.balance -= delta;
        Ok(Some(account))
    }

    /// Projects the net effect of replacing `previous` with `updated`.
    ///
    /// When both touch the same account the two deltas compose on one
    /// base state; otherwise each account is projected independently.
    pub(crate) async fn project_transition(
        &self,
        previous: &Transaction,
        updated: &Transaction,
    ) -> Result<Vec<BankAccount>> {
        if previous.account.id == updated.account.id {
            let old_delta = previous
                .category
                .direction
                .effect(previous.amount)
                .unwrap_or_default();
            let new_delta = updated
                .category
                .direction
                .effect(updated.amount)
                .unwrap_or_default();
            if old_delta == new_delta {
                return Ok(Vec::new());
            }
            let mut account = self.local_or_snapshot(updated).await?;
            account.balance += new_delta - old_delta;
            return Ok(vec![account]);
        }

        let mut projected = Vec::new();
        if let Some(account) = self.project_reversal(previous).await? {
            projected.push(account);
        }
        if let Some(account) = self.project_effect(updated).await? {
            projected.push(account);
        }
        Ok(projected)
    }

    /// Resolves the base account state for a projection.
    ///
    /// A compensating state already queued for the account takes
    /// precedence, so that successive offline writes accumulate their
    /// deltas; otherwise the local store is consulted, falling back to
    /// the denormalized snapshot carried on the transaction when the
    /// account is not cached.
    async fn local_or_snapshot(&self, transaction: &Transaction) -> Result<BankAccount> {
        if let Some(pending) = self.accounts.pending_state(transaction.account.id).await? {
            return Ok(pending);
        }
        match self.accounts.get(transaction.account.id).await {
            Ok(account) => Ok(account),
            Err(SyncError::NotFound { .. }) => Ok(from_snapshot(&transaction.account)),
            Err(err) => Err(err),
        }
    }
}

/// Builds a full account from the snapshot carried on a transaction.
/// The snapshot carries no owner or timestamps; the server will supply
/// authoritative values when the queued state is replayed.
fn from_snapshot(brief: &AccountBrief) -> BankAccount {
    let now = Utc::now();
    BankAccount {
        id: brief.id,
        user_id: UserId::new(0),
        name: brief.name.clone(),
        balance: brief.balance,
        currency: brief.currency.clone(),
        created_at: now,
        updated_at: now,
    }
}
