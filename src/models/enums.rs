//! Shared enumerations.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Direction of a category's effect on an account balance.
///
/// `All` is a filter wildcard: it is used when querying ("show both
/// income and outcome") and is never stored on a transaction's category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Money flowing into the account.
    Income,
    /// Money flowing out of the account.
    Outcome,
    /// Filter wildcard matching both directions; never affects a balance.
    All,
}

impl Direction {
    /// Returns the canonical lowercase string used on the wire and in
    /// relational storage.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Outcome => "outcome",
            Self::All => "all",
        }
    }

    /// Returns the signed balance delta this direction assigns to a
    /// non-negative amount, or `None` for the wildcard.
    #[inline]
    #[must_use]
    pub(crate) fn effect(self, amount: Decimal) -> Option<Decimal> {
        match self {
            Self::Income => Some(amount),
            Self::Outcome => Some(-amount),
            Self::All => None,
        }
    }
}

impl core::str::FromStr for Direction {
    type Err = String;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "income" => Ok(Self::Income),
            "outcome" => Ok(Self::Outcome),
            "all" => Ok(Self::All),
            other => Err(format!("unknown direction: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_uses_lowercase() {
        assert_eq!(serde_json::to_string(&Direction::Income).unwrap(), "\"income\"");
        let parsed: Direction = serde_json::from_str("\"outcome\"").unwrap();
        assert_eq!(parsed, Direction::Outcome);
    }

    #[test]
    fn effect_signs_follow_direction() {
        let amount = Decimal::from(40);
        assert_eq!(Direction::Income.effect(amount), Some(amount));
        assert_eq!(Direction::Outcome.effect(amount), Some(-amount));
        assert_eq!(Direction::All.effect(amount), None);
    }

    #[test]
    fn round_trips_through_str() {
        for direction in [Direction::Income, Direction::Outcome, Direction::All] {
            assert_eq!(direction.as_str().parse::<Direction>().unwrap(), direction);
        }
    }
}
