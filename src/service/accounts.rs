//! Bank accounts service.

use std::sync::Arc;

use crate::client::ApiClient;
use crate::error::{Result, SyncError};
use crate::models::{AccountId, AccountUpdateRequest, BankAccount};
use crate::outbox::{ActionKind, Outbox, PendingAction};
use crate::storage::AccountStore;

/// Offline-first access to bank accounts.
///
/// Reads prefer the local store; updates are optimistic (the new value
/// is applied locally before the remote attempt and rolled back if the
/// attempt fails). Failed updates land in the account outbox, which
/// also receives compensating balance projections from the
/// transactions service.
#[derive(Debug)]
pub struct BankAccountsService<S, O> {
    /// Remote API client.
    client: ApiClient,
    /// Local account store.
    store: Arc<S>,
    /// Queue of account updates awaiting replay.
    outbox: Arc<O>,
}

impl<S, O> BankAccountsService<S, O>
where
    S: AccountStore,
    O: Outbox<AccountId, BankAccount>,
{
    /// Creates the service from its three collaborators.
    #[inline]
    pub const fn new(client: ApiClient, store: Arc<S>, outbox: Arc<O>) -> Self {
        Self {
            client,
            store,
            outbox,
        }
    }

    /// Returns all accounts.
    ///
    /// Serves the local store unless it is empty or `refresh` is set;
    /// then fetches from the remote, mirrors the result, and prunes
    /// cached accounts the server no longer returns. When the remote is
    /// unreachable the locally stored accounts are served instead, and
    /// the call errors only if there is nothing to serve.
    ///
    /// # Errors
    ///
    /// Returns the remote failure when the local store is empty, or a
    /// storage error.
    #[tracing::instrument(skip_all, fields(refresh))]
    pub async fn get_all(&self, refresh: bool) -> Result<Vec<BankAccount>> {
        let local = self.store.accounts().await?;
        if !refresh && !local.is_empty() {
            return Ok(local);
        }
        match self.client.accounts().await {
            Ok(fetched) => {
                for account in &fetched {
                    self.upsert(account).await?;
                }
                for stale in &local {
                    if !fetched.iter().any(|account| account.id == stale.id) {
                        tracing::debug!(account = %stale.id, "pruning account absent from refresh");
                        self.store.delete_account(stale.id).await?;
                    }
                }
                Ok(fetched)
            }
            Err(err) if !local.is_empty() => {
                tracing::warn!(error = %err, "refresh failed, serving cached accounts");
                Ok(local)
            }
            Err(err) => Err(err),
        }
    }

    /// Returns one account from the local store.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotFound`] if the account is not cached, or
    /// a storage error.
    #[tracing::instrument(skip_all, fields(account = %id))]
    pub async fn get(&self, id: AccountId) -> Result<BankAccount> {
        self.store
            .accounts()
            .await?
            .into_iter()
            .find(|account| account.id == id)
            .ok_or(SyncError::NotFound {
                entity: "bank account",
                id: id.into_inner(),
            })
    }

    /// Updates an account.
    ///
    /// The new value is applied locally first so the caller observes it
    /// immediately, then pushed to the remote. On success the server
    /// copy replaces the optimistic one; on failure the previous local
    /// state is restored, the update is queued when the failure is
    /// transient, and the error propagates.
    ///
    /// # Errors
    ///
    /// Returns the remote failure, or a storage error.
    #[tracing::instrument(skip_all, fields(account = %account.id))]
    pub async fn update(&self, account: &BankAccount) -> Result<BankAccount> {
        let snapshot = self
            .store
            .accounts()
            .await?
            .into_iter()
            .find(|stored| stored.id == account.id);
        self.upsert(account).await?;

        let request = AccountUpdateRequest::from(account);
        match self.client.update_account(account.id, &request).await {
            Ok(saved) => {
                self.upsert(&saved).await?;
                self.outbox.remove(&saved.id).await?;
                Ok(saved)
            }
            Err(err) => {
                match snapshot {
                    Some(previous) => self.upsert(&previous).await?,
                    None => {
                        self.store.delete_account(account.id).await?;
                    }
                }
                if err.should_queue() {
                    tracing::warn!(account = %account.id, error = %err, "account update queued");
                    self.outbox
                        .add(PendingAction::update(account.id, account.clone()))
                        .await?;
                }
                Err(err)
            }
        }
    }

    /// Replays queued account actions in failure-time order, stopping
    /// at the first transient failure. Returns how many were replayed.
    ///
    /// Accounts expose no remote create or delete endpoint, so queued
    /// creations replay as updates and queued deletions are dropped.
    /// Actions the server rejects outright are dropped as well.
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
            if action.kind == ActionKind::Delete {
                tracing::warn!(account = %action.id, "dropping queued account deletion, no remote endpoint");
                self.outbox.remove(&action.id).await?;
                continue;
            }
            let Some(account) = action.payload else {
                tracing::warn!(account = %action.id, kind = ?action.kind, "dropping pending action without payload");
                self.outbox.remove(&action.id).await?;
                continue;
            };
            let request = AccountUpdateRequest::from(&account);
            match self.client.update_account(action.id, &request).await {
                Ok(saved) => {
                    self.upsert(&saved).await?;
                    self.outbox.remove(&saved.id).await?;
                    replayed += 1;
                }
                Err(err) if err.should_queue() => {
                    tracing::debug!(account = %action.id, error = %err, "remote still unavailable");
                    break;
                }
                Err(err) => {
                    tracing::warn!(account = %action.id, error = %err, "dropping rejected account action");
                    self.outbox.remove(&action.id).await?;
                }
            }
        }
        Ok(replayed)
    }

    /// Returns the queued would-be state for an account, if any.
    ///
    /// Balance projections start from this state when present, so
    /// successive offline writes against one account accumulate
    /// instead of each superseding entry restarting from the stored
    /// balance.
    pub(crate) async fn pending_state(&self, id: AccountId) -> Result<Option<BankAccount>> {
        Ok(self
            .outbox
            .get_all()
            .await?
            .into_iter()
            .find(|action| action.id == id)
            .and_then(|action| action.payload))
    }

    /// Queues a would-be account state without touching the local copy.
    ///
    /// Used by the transactions service to keep a failed transaction
    /// write and its balance effect together in the queue.
    pub(crate) async fn queue_update(&self, account: BankAccount) -> Result<()> {
        tracing::debug!(account = %account.id, "queueing compensating account state");
        self.outbox
            .add(PendingAction::update(account.id, account))
            .await
    }

    /// Update-then-create through the store contract; inserting an
    /// already-present entity twice is a no-op.
    pub(crate) async fn upsert(&self, account: &BankAccount) -> Result<()> {
        if !self.store.update_account(account).await? {
            self.store.create_account(account).await?;
        }
        Ok(())
    }
}
