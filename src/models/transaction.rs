//! Transaction model and its wire bodies.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{AccountBrief, AccountId, Category, CategoryId, TransactionId};

/// A single ledger transaction.
///
/// `amount` is always non-negative; whether it adds to or subtracts
/// from the account balance is determined by the category's direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Unique, server-assigned identifier.
    pub id: TransactionId,
    /// Snapshot of the affected account.
    pub account: AccountBrief,
    /// Category the transaction belongs to.
    pub category: Category,
    /// Non-negative amount, serialized as a decimal string.
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    /// When the transaction took place.
    #[serde(with = "super::datetime::timestamp")]
    pub transaction_date: DateTime<Utc>,
    /// Free-text comment.
    pub comment: String,
    /// Creation timestamp.
    #[serde(with = "super::datetime::timestamp")]
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp. Touched by every mutation.
    #[serde(with = "super::datetime::timestamp")]
    pub updated_at: DateTime<Utc>,
}

/// Outbound body for `POST /transactions` and `PUT /transactions/{id}`.
///
/// Only the editable fields are sent; the server derives the rest
/// (denormalized account snapshot, category payload, timestamps).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    /// Affected account.
    pub account_id: AccountId,
    /// Category identifier.
    pub category_id: CategoryId,
    /// Non-negative amount, serialized as a decimal string.
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    /// When the transaction took place.
    #[serde(with = "super::datetime::timestamp")]
    pub transaction_date: DateTime<Utc>,
    /// Free-text comment.
    pub comment: String,
}

impl From<&Transaction> for TransactionRequest {
    #[inline]
    fn from(transaction: &Transaction) -> Self {
        Self {
            account_id: transaction.account.id,
            category_id: transaction.category.id,
            amount: transaction.amount,
            transaction_date: transaction.transaction_date,
            comment: transaction.comment.clone(),
        }
    }
}
