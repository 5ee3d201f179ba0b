//! Domain models and wire types.
//!
//! All bodies use camelCase field names on the wire; amounts are exact
//! decimals serialized as strings, timestamps are RFC 3339 with
//! millisecond precision (see [`datetime`]).

mod account;
mod category;
pub mod datetime;
mod enums;
mod ids;
mod transaction;

pub use account::{AccountBrief, AccountUpdateRequest, BankAccount};
pub use category::Category;
pub use enums::Direction;
pub use ids::{AccountId, CategoryId, TransactionId, UserId};
pub use transaction::{Transaction, TransactionRequest};
