//! Offline-first synchronization engine for a personal-finance ledger.
//!
//! The crate keeps a local mirror of a remote ledger (bank accounts,
//! transactions, categories) and lets the application keep working when
//! the network does not. The pieces compose in layers:
//!
//! - [`client`]: typed async HTTP client for the remote API;
//! - [`storage`]: swappable local stores (JSON files, SQLite, memory)
//!   behind one trait per collection;
//! - [`outbox`]: durable queue of mutations that failed against the
//!   remote and await replay;
//! - [`service`]: per-entity services wiring the three together,
//!   including balance consistency and storage migration.
//!
//! Reads serve the local mirror first and degrade to it when the remote
//! is unreachable. Writes are remote-first: the mirror only ever holds
//! server-confirmed state, and a failed write is queued together with
//! the compensating account-balance projection.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use finsync::client::ApiClient;
//! use finsync::outbox::FileOutbox;
//! use finsync::service::BankAccountsService;
//! use finsync::storage::FileStore;
//!
//! # async fn demo() -> finsync::Result<()> {
//! let dir = FileStore::default_dir().ok_or(finsync::SyncError::Config("no data directory"))?;
//! let client = ApiClient::builder().token("secret").build()?;
//! let store = Arc::new(FileStore::new(&dir)?);
//! let outbox = Arc::new(FileOutbox::new(dir.join("accounts.outbox.json"))?);
//!
//! let accounts = BankAccountsService::new(client, store, outbox);
//! let _all = accounts.get_all(true).await?;
//! accounts.flush_pending().await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod models;
pub mod outbox;
pub mod service;
pub mod storage;

pub use client::ApiClient;
pub use error::{Result, SyncError};
