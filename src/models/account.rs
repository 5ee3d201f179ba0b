//! Bank account model and its wire bodies.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{AccountId, UserId};

/// A user's bank account.
///
/// The balance is a derived, persisted running total: initial balance
/// plus the signed sum of all income/outcome transactions for this
/// account. The balance service keeps it consistent; amounts use exact
/// decimal arithmetic throughout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankAccount {
    /// Unique identifier.
    pub id: AccountId,
    /// Owning user.
    pub user_id: UserId,
    /// Display name.
    pub name: String,
    /// Current balance, serialized as a decimal string.
    #[serde(with = "rust_decimal::serde::str")]
    pub balance: Decimal,
    /// ISO currency code, e.g. `"RUB"`.
    pub currency: String,
    /// Creation timestamp.
    #[serde(with = "super::datetime::timestamp")]
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    #[serde(with = "super::datetime::timestamp")]
    pub updated_at: DateTime<Utc>,
}

/// Denormalized account snapshot carried on a transaction.
///
/// This is a copy taken when the transaction was produced, not a live
/// join; the authoritative state lives in the accounts collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountBrief {
    /// Account identifier.
    pub id: AccountId,
    /// Display name at snapshot time.
    pub name: String,
    /// Balance at snapshot time, serialized as a decimal string.
    #[serde(with = "rust_decimal::serde::str")]
    pub balance: Decimal,
    /// ISO currency code.
    pub currency: String,
}

/// Outbound body for `PUT /accounts/{id}`.
///
/// The server derives everything else (ids, timestamps) itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountUpdateRequest {
    /// New display name.
    pub name: String,
    /// New balance, serialized as a decimal string.
    #[serde(with = "rust_decimal::serde::str")]
    pub balance: Decimal,
    /// New currency code.
    pub currency: String,
}

impl From<&BankAccount> for AccountUpdateRequest {
    #[inline]
    fn from(account: &BankAccount) -> Self {
        Self {
            name: account.name.clone(),
            balance: account.balance,
            currency: account.currency.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_account() {
        let json = r#"{
            "id": 1,
            "userId": 10,
            "name": "Main",
            "balance": "100.50",
            "currency": "RUB",
            "createdAt": "2025-01-01T00:00:00.000Z",
            "updatedAt": "2025-06-15T10:30:00.000Z"
        }"#;
        let account: BankAccount = serde_json::from_str(json).unwrap();
        assert_eq!(account.id, AccountId::new(1));
        assert_eq!(account.balance, "100.50".parse::<Decimal>().unwrap());
        assert_eq!(account.currency, "RUB");
    }

    #[test]
    fn balance_serializes_as_string() {
        let account = BankAccount {
            id: AccountId::new(1),
            user_id: UserId::new(10),
            name: "Main".to_owned(),
            balance: "60".parse().unwrap(),
            currency: "RUB".to_owned(),
            created_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            updated_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        };
        let json = serde_json::to_value(&account).unwrap();
        assert_eq!(json["balance"], "60");
    }

    #[test]
    fn update_request_copies_editable_fields() {
        let account = BankAccount {
            id: AccountId::new(1),
            user_id: UserId::new(10),
            name: "Main".to_owned(),
            balance: "60".parse().unwrap(),
            currency: "RUB".to_owned(),
            created_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            updated_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        };
        let request = AccountUpdateRequest::from(&account);
        assert_eq!(request.name, "Main");
        assert_eq!(request.balance, account.balance);
        assert_eq!(request.currency, "RUB");
    }
}
