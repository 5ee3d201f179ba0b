//! Durable outbox for failed remote writes.
//!
//! When a mutation cannot reach the server, the attempted action is
//! recorded here so it can be replayed later. The queue is a passive
//! log: it never schedules anything itself, replay is driven by the
//! services' `flush_pending` operations.
//!
//! At most one action is kept per entity id; recording a new action for
//! an id supersedes the previous one, so the queue always holds the
//! latest intent.

use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

/// What the failed mutation was trying to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// The entity was being created.
    Create,
    /// The entity was being updated.
    Update,
    /// The entity was being deleted.
    Delete,
}

/// A mutation that failed against the remote and awaits replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingAction<K, T> {
    /// Id of the affected entity.
    pub id: K,
    /// Kind of mutation that failed.
    pub kind: ActionKind,
    /// Snapshot of the attempted state; `None` for deletions.
    pub payload: Option<T>,
    /// When the remote attempt failed; replay preserves this order.
    #[serde(with = "crate::models::datetime::timestamp")]
    pub failed_at: DateTime<Utc>,
}

impl<K, T> PendingAction<K, T> {
    /// Records a failed creation.
    #[inline]
    #[must_use]
    pub fn create(id: K, payload: T) -> Self {
        Self {
            id,
            kind: ActionKind::Create,
            payload: Some(payload),
            failed_at: Utc::now(),
        }
    }

    /// Records a failed update.
    #[inline]
    #[must_use]
    pub fn update(id: K, payload: T) -> Self {
        Self {
            id,
            kind: ActionKind::Update,
            payload: Some(payload),
            failed_at: Utc::now(),
        }
    }

    /// Records a failed deletion. Deletions carry no payload.
    #[inline]
    #[must_use]
    pub fn delete(id: K) -> Self {
        Self {
            id,
            kind: ActionKind::Delete,
            payload: None,
            failed_at: Utc::now(),
        }
    }
}

/// Queue of pending actions keyed by entity id.
pub trait Outbox<K, T>: core::fmt::Debug + Send + Sync {
    /// Records an action, superseding any existing action for the same
    /// id.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Storage`] if the backend fails.
    fn add(&self, action: PendingAction<K, T>) -> impl Future<Output = Result<()>> + Send;

    /// Returns all pending actions, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Storage`] if the backend fails.
    fn get_all(&self) -> impl Future<Output = Result<Vec<PendingAction<K, T>>>> + Send;

    /// Drops the pending action for `id`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Storage`] if the backend fails.
    fn remove(&self, id: &K) -> impl Future<Output = Result<()>> + Send;

    /// Drops every pending action.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Storage`] if the backend fails.
    fn clear(&self) -> impl Future<Output = Result<()>> + Send;
}

/// Inserts an action into a plain vector, superseding by id.
fn supersede<K: PartialEq, T>(items: &mut Vec<PendingAction<K, T>>, action: PendingAction<K, T>) {
    items.retain(|existing| existing.id != action.id);
    items.push(action);
}

// ── Durable file-backed queue ───────────────────────────────────────

/// Wraps a backend fault into the storage error variant.
fn storage_err(err: impl core::error::Error + Send + Sync + 'static) -> SyncError {
    SyncError::Storage(Box::new(err))
}

/// Outbox persisted as a single JSON file.
///
/// Every mutation rewrites the file atomically (write to a sibling
/// temporary file, then rename), so the log survives restarts and
/// crashes mid-write. Independent of the local-store backend choice.
#[derive(Debug)]
pub struct FileOutbox<K, T> {
    /// Path of the JSON log.
    path: PathBuf,
    /// Serializes access among tasks sharing this instance.
    guard: Mutex<()>,
    /// Ties the queue to one key/payload pair without storing either.
    _marker: PhantomData<fn() -> (K, T)>,
}

impl<K, T> FileOutbox<K, T> {
    /// Opens (creating parent directories if needed) a queue persisted
    /// at `path`. A missing file is an empty queue.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Storage`] if the parent directory cannot be
    /// created.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(storage_err)?;
        }
        Ok(Self {
            path,
            guard: Mutex::new(()),
            _marker: PhantomData,
        })
    }
}

impl<K, T> FileOutbox<K, T>
where
    K: Serialize + DeserializeOwned,
    T: Serialize + DeserializeOwned,
{
    /// Reads the whole log; callers hold the lock.
    fn load(&self) -> Result<Vec<PendingAction<K, T>>> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(storage_err(err)),
        };
        serde_json::from_slice(&raw).map_err(storage_err)
    }

    /// Rewrites the whole log atomically; callers hold the lock.
    fn save(&self, items: &[PendingAction<K, T>]) -> Result<()> {
        let raw = serde_json::to_vec_pretty(items).map_err(storage_err)?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, raw).map_err(storage_err)?;
        std::fs::rename(&tmp, &self.path).map_err(storage_err)
    }

    /// Read-modify-write under the lock.
    fn mutate(&self, f: impl FnOnce(&mut Vec<PendingAction<K, T>>)) -> Result<()> {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        let mut items = self.load()?;
        f(&mut items);
        self.save(&items)
    }
}

impl<K, T> Outbox<K, T> for FileOutbox<K, T>
where
    K: Serialize + DeserializeOwned + PartialEq + core::fmt::Debug + Send + Sync,
    T: Serialize + DeserializeOwned + core::fmt::Debug + Send + Sync,
{
    #[inline]
    fn add(&self, action: PendingAction<K, T>) -> impl Future<Output = Result<()>> + Send {
        core::future::ready(self.mutate(|items| supersede(items, action)))
    }

    #[inline]
    fn get_all(&self) -> impl Future<Output = Result<Vec<PendingAction<K, T>>>> + Send {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        core::future::ready(self.load())
    }

    #[inline]
    fn remove(&self, id: &K) -> impl Future<Output = Result<()>> + Send {
        core::future::ready(self.mutate(|items| items.retain(|action| action.id != *id)))
    }

    #[inline]
    fn clear(&self) -> impl Future<Output = Result<()>> + Send {
        core::future::ready(self.mutate(Vec::clear))
    }
}

// ── Volatile in-memory queue ────────────────────────────────────────

/// Outbox holding its log in process memory; nothing survives the
/// process. Useful in tests.
#[derive(Debug)]
pub struct MemoryOutbox<K, T> {
    /// Pending actions behind the lock.
    inner: Mutex<Vec<PendingAction<K, T>>>,
}

impl<K, T> MemoryOutbox<K, T> {
    /// Creates an empty queue.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Vec::new()),
        }
    }

    /// Runs `f` with the log locked.
    fn with_lock<R>(&self, f: impl FnOnce(&mut Vec<PendingAction<K, T>>) -> R) -> R {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut inner)
    }
}

impl<K, T> Default for MemoryOutbox<K, T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T> Outbox<K, T> for MemoryOutbox<K, T>
where
    K: PartialEq + Clone + core::fmt::Debug + Send + Sync,
    T: Clone + core::fmt::Debug + Send + Sync,
{
    #[inline]
    fn add(&self, action: PendingAction<K, T>) -> impl Future<Output = Result<()>> + Send {
        self.with_lock(|items| supersede(items, action));
        core::future::ready(Ok(()))
    }

    #[inline]
    fn get_all(&self) -> impl Future<Output = Result<Vec<PendingAction<K, T>>>> + Send {
        core::future::ready(Ok(self.with_lock(|items| items.clone())))
    }

    #[inline]
    fn remove(&self, id: &K) -> impl Future<Output = Result<()>> + Send {
        self.with_lock(|items| items.retain(|action| action.id != *id));
        core::future::ready(Ok(()))
    }

    #[inline]
    fn clear(&self) -> impl Future<Output = Result<()>> + Send {
        self.with_lock(Vec::clear);
        core::future::ready(Ok(()))
    }
}
