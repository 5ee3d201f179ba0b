//! Category model.

use serde::{Deserialize, Serialize};

use super::{CategoryId, Direction};

/// A transaction category.
///
/// Categories are immutable reference data: the server owns the set and
/// clients replace their cached copy wholesale on refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    /// Unique identifier.
    pub id: CategoryId,
    /// Display name.
    pub name: String,
    /// Single-glyph emoji shown next to the name.
    pub emoji: String,
    /// Whether transactions in this category add to or subtract from
    /// the account balance.
    pub direction: Direction,
}
