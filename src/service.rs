//! Entity services: the offline-first orchestration layer.
//!
//! Each service owns one entity kind and composes the remote client,
//! a local store, and (for mutating services) an outbox. All mutating
//! calls follow the same state machine:
//!
//! 1. attempt the remote write;
//! 2. on success, mirror the server result into the local store and
//!    drop any pending action for the entity;
//! 3. on failure, record a pending action snapshotting the attempted
//!    mutation when the failure is transient (offline or server 5xx),
//!    then propagate the original error.
//!
//! Reads serve the local store first and degrade to it when a refresh
//! cannot reach the server.

mod accounts;
mod balance;
mod categories;
mod migration;
mod transactions;

pub use accounts::BankAccountsService;
pub use balance::BalanceService;
pub use categories::CategoriesService;
pub use migration::{MigrationReport, migrate_all};
pub use transactions::{TransactionFilter, TransactionsService};
