//! Transactions service.

use std::sync::Arc;

use chrono::NaiveDate;

use crate::client::ApiClient;
use crate::error::Result;
use crate::models::{
    AccountId, BankAccount, CategoryId, Direction, Transaction, TransactionId, TransactionRequest,
};
use crate::outbox::{ActionKind, Outbox, PendingAction};
use crate::storage::{AccountStore, TransactionStore};

use super::{BalanceService, BankAccountsService};

/// Composable in-memory filter over fetched transactions.
///
/// The period and account are pushed down to the remote query; the
/// direction and category are applied locally after the fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionFilter {
    /// Account whose transactions are requested.
    account: AccountId,
    /// First day of the window, inclusive.
    start: NaiveDate,
    /// Last day of the window, inclusive.
    end: NaiveDate,
    /// Direction to keep; [`Direction::All`] matches everything.
    direction: Direction,
    /// Category to keep, if narrowing to one.
    category: Option<CategoryId>,
}

impl TransactionFilter {
    /// Creates a filter for an account over a day-granularity window.
    #[inline]
    #[must_use]
    pub const fn for_period(account: AccountId, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            account,
            start,
            end,
            direction: Direction::All,
            category: None,
        }
    }

    /// Narrows the filter to one direction.
    #[inline]
    #[must_use]
    pub const fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Narrows the filter to one category.
    #[inline]
    #[must_use]
    pub const fn category(mut self, category: CategoryId) -> Self {
        self.category = Some(category);
        self
    }

    /// Whether a transaction passes every criterion.
    fn matches(&self, transaction: &Transaction) -> bool {
        let day = transaction.transaction_date.date_naive();
        transaction.account.id == self.account
            && day >= self.start
            && day <= self.end
            && (self.direction == Direction::All
                || transaction.category.direction == self.direction)
            && self
                .category
                .is_none_or(|category| transaction.category.id == category)
    }
}

/// Offline-first access to transactions.
///
/// Mutations are remote-first: the local store mirrors only what the
/// server confirmed. A failed mutation is queued together with the
/// compensating would-be account state, since a transaction and its
/// balance effect are logically one write.
#[derive(Debug)]
pub struct TransactionsService<S, O, A, AO> {
    /// Remote API client.
    client: ApiClient,
    /// Local transaction store.
    store: Arc<S>,
    /// Queue of transaction mutations awaiting replay.
    outbox: Arc<O>,
    /// Accounts service, for compensating queue entries.
    accounts: Arc<BankAccountsService<A, AO>>,
    /// Balance side effects of every mutation.
    balance: BalanceService<A, AO>,
}

impl<S, O, A, AO> TransactionsService<S, O, A, AO>
where
    S: TransactionStore,
    O: Outbox<TransactionId, Transaction>,
    A: AccountStore,
    AO: Outbox<AccountId, BankAccount>,
{
    /// Creates the service from its collaborators.
    #[inline]
    pub fn new(
        client: ApiClient,
        store: Arc<S>,
        outbox: Arc<O>,
        accounts: Arc<BankAccountsService<A, AO>>,
    ) -> Self {
        let balance = BalanceService::new(Arc::clone(&accounts));
        Self {
            client,
            store,
            outbox,
            accounts,
            balance,
        }
    }

    /// Returns an account's transactions for a day-granularity window,
    /// sorted by transaction date.
    ///
    /// # Errors
    ///
    /// Returns the remote failure when nothing matching is cached
    /// locally, or a storage error.
    #[inline]
    pub async fn get_for_period(
        &self,
        account: AccountId,
        start: NaiveDate,
        end: NaiveDate,
        refresh: bool,
    ) -> Result<Vec<Transaction>> {
        self.get_filtered(&TransactionFilter::for_period(account, start, end), refresh)
            .await
    }

    /// Returns the transactions passing `filter`, sorted by transaction
    /// date.
    ///
    /// Serves the local store unless nothing matches or `refresh` is
    /// set; then fetches the filter's window from the remote, mirrors
    /// every fetched transaction, and filters in memory. When the
    /// remote is unreachable the cached subset is served instead, and
    /// the call errors only if there is nothing to serve.
    ///
    /// # Errors
    ///
    /// Returns the remote failure when nothing matching is cached
    /// locally, or a storage error.
    #[tracing::instrument(skip_all, fields(account = %filter.account, refresh))]
    pub async fn get_filtered(
        &self,
        filter: &TransactionFilter,
        refresh: bool,
    ) -> Result<Vec<Transaction>> {
        let mut cached: Vec<Transaction> = self
            .store
            .transactions()
            .await?
            .into_iter()
            .filter(|transaction| filter.matches(transaction))
            .collect();
        if !refresh && !cached.is_empty() {
            cached.sort_by_key(|transaction| transaction.transaction_date);
            return Ok(cached);
        }

        match self
            .client
            .transactions_for_period(filter.account, filter.start, filter.end)
            .await
        {
            Ok(fetched) => {
                for transaction in &fetched {
                    self.upsert(transaction).await?;
                }
                let mut matching: Vec<Transaction> = fetched
                    .into_iter()
                    .filter(|transaction| filter.matches(transaction))
                    .collect();
                matching.sort_by_key(|transaction| transaction.transaction_date);
                Ok(matching)
            }
            Err(err) if !cached.is_empty() => {
                tracing::warn!(error = %err, "refresh failed, serving cached transactions");
                cached.sort_by_key(|transaction| transaction.transaction_date);
                Ok(cached)
            }
            Err(err) => Err(err),
        }
    }

    /// Creates a transaction from a locally assembled draft.
    ///
    /// On success the server copy (authoritative id and timestamps) is
    /// mirrored locally and the balance effect applied. On a transient
    /// failure the draft and the compensating would-be account state
    /// are queued, the local store stays untouched, and the error
    /// propagates.
    ///
    /// # Errors
    ///
    /// Returns the remote failure, or a storage error.
    #[tracing::instrument(skip_all, fields(transaction = %draft.id))]
    pub async fn create(&self, draft: &Transaction) -> Result<Transaction> {
        let request = TransactionRequest::from(draft);
        match self.client.create_transaction(&request).await {
            Ok(created) => {
                self.upsert(&created).await?;
                self.outbox.remove(&created.id).await?;
                // A prior failed attempt queued under the draft id; the
                // server may have assigned a different one.
                if created.id != draft.id {
                    self.outbox.remove(&draft.id).await?;
                }
                self.balance.apply_effect(&created).await?;
                Ok(created)
            }
            Err(err) => {
                if err.should_queue() {
                    tracing::warn!(transaction = %draft.id, error = %err, "transaction creation queued");
                    self.outbox
                        .add(PendingAction::create(draft.id, draft.clone()))
                        .await?;
                    if let Some(projected) = self.balance.project_effect(draft).await? {
                        self.accounts.queue_update(projected).await?;
                    }
                }
                Err(err)
            }
        }
    }

    /// Updates a transaction.
    ///
    /// On success the server copy is mirrored, the previous effect is
    /// reversed, and the new effect applied. On a transient failure the
    /// updated value and the net compensating account states are
    /// queued, the local copy is left as it was, and the error
    /// propagates.
    ///
    /// # Errors
    ///
    /// Returns the remote failure, or a storage error.
    #[tracing::instrument(skip_all, fields(transaction = %updated.id))]
    pub async fn update(&self, updated: &Transaction) -> Result<Transaction> {
        let previous = self.find_local(updated.id).await?;
        let request = TransactionRequest::from(updated);
        match self.client.update_transaction(updated.id, &request).await {
            Ok(saved) => {
                self.upsert(&saved).await?;
                self.outbox.remove(&saved.id).await?;
                if let Some(previous) = previous {
                    self.balance.reverse_effect(&previous).await?;
                }
                self.balance.apply_effect(&saved).await?;
                Ok(saved)
            }
            Err(err) => {
                if err.should_queue() {
                    tracing::warn!(transaction = %updated.id, error = %err, "transaction update queued");
                    self.outbox
                        .add(PendingAction::update(updated.id, updated.clone()))
                        .await?;
                    let projected = match previous {
                        Some(previous) => {
                            self.balance.project_transition(&previous, updated).await?
                        }
                        None => self.balance.project_effect(updated).await?.into_iter().collect(),
                    };
                    for account in projected {
                        self.accounts.queue_update(account).await?;
                    }
                }
                Err(err)
            }
        }
    }

    /// Deletes a transaction.
    ///
    /// On success the local copy is removed and its effect reversed. On
    /// a transient failure the deletion and the compensating account
    /// state are queued, the local copy is kept, and the error
    /// propagates.
    ///
    /// # Errors
    ///
    /// Returns the remote failure, or a storage error.
    #[tracing::instrument(skip_all, fields(transaction = %id))]
    pub async fn delete(&self, id: TransactionId) -> Result<()> {
        let previous = self.find_local(id).await?;
        match self.client.delete_transaction(id).await {
            Ok(()) => {
                self.store.delete_transaction(id).await?;
                self.outbox.remove(&id).await?;
                if let Some(previous) = previous {
                    self.balance.reverse_effect(&previous).await?;
                }
                Ok(())
            }
            Err(err) => {
                if err.should_queue() {
                    tracing::warn!(transaction = %id, error = %err, "transaction deletion queued");
                    self.outbox.add(PendingAction::delete(id)).await?;
                    if let Some(previous) = previous
                        && let Some(projected) = self.balance.project_reversal(&previous).await?
                    {
                        self.accounts.queue_update(projected).await?;
                    }
                }
                Err(err)
            }
        }
    }

    /// Replays queued transaction actions in failure-time order,
    /// stopping at the first transient failure. Returns how many were
    /// replayed.
    ///
    /// Balance effects are not re-derived here: the compensating
    /// account states were queued alongside and replay through
    /// [`BankAccountsService::flush_pending`].
    ///
    /// # Errors
    ///
    /// Returns a storage error if the queue or the store fails.
    #[tracing::instrument(skip_all)]
    pub async fn flush_pending(&self) -> Result<usize> {
        let mut pending = self.outbox.get_all().await?;
        pending.sort_by_key(|action| action.failed_at);

        let mut replayed = 0;
        for action in pending {
            let attempt = match (action.kind, &action.payload) {
                (ActionKind::Delete, _) => {
                    self.client.delete_transaction(action.id).await.map(|()| None)
                }
                (ActionKind::Create, Some(draft)) => self
                    .client
                    .create_transaction(&TransactionRequest::from(draft))
                    .await
                    .map(Some),
                (ActionKind::Update, Some(updated)) => self
                    .client
                    .update_transaction(action.id, &TransactionRequest::from(updated))
                    .await
                    .map(Some),
                (ActionKind::Create | ActionKind::Update, None) => {
                    tracing::warn!(transaction = %action.id, kind = ?action.kind, "dropping pending action without payload");
                    self.outbox.remove(&action.id).await?;
                    continue;
                }
            };
            match attempt {
                Ok(Some(saved)) => {
                    self.upsert(&saved).await?;
                    self.outbox.remove(&action.id).await?;
                    replayed += 1;
                }
                Ok(None) => {
                    self.store.delete_transaction(action.id).await?;
                    self.outbox.remove(&action.id).await?;
                    replayed += 1;
                }
                Err(err) if err.should_queue() => {
                    tracing::debug!(transaction = %action.id, error = %err, "remote still unavailable");
                    break;
                }
                Err(err) => {
                    tracing::warn!(transaction = %action.id, error = %err, "dropping rejected transaction action");
                    self.outbox.remove(&action.id).await?;
                }
            }
        }
        Ok(replayed)
    }

    /// Looks up a transaction in the local store.
    async fn find_local(&self, id: TransactionId) -> Result<Option<Transaction>> {
        Ok(self
            .store
            .transactions()
            .await?
            .into_iter()
            .find(|transaction| transaction.id == id))
    }

    /// Update-then-create through the store contract; inserting an
    /// already-present entity twice is a no-op.
    async fn upsert(&self, transaction: &Transaction) -> Result<()> {
        if !self.store.update_transaction(transaction).await? {
            self.store.create_transaction(transaction).await?;
        }
        Ok(())
    }
}
