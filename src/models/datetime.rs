//! Wire date and time formats.
//!
//! Request/response bodies carry full timestamps in RFC 3339 with
//! millisecond precision (`2025-06-15T10:30:00.000Z`); query parameters
//! carry day-granularity dates (`2025-06-15`).

use chrono::NaiveDate;

/// Day-granularity format used in query parameters.
const DAY_FORMAT: &str = "%Y-%m-%d";

/// Formats a date the way period-query endpoints expect it.
#[inline]
#[must_use]
pub fn format_day(date: NaiveDate) -> String {
    date.format(DAY_FORMAT).to_string()
}

/// Serde adapter for body timestamps.
///
/// Use with `#[serde(with = "crate::models::datetime::timestamp")]`.
pub mod timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serializes a timestamp as RFC 3339 with millisecond precision.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying serializer fails.
    #[inline]
    pub fn serialize<S: Serializer>(
        value: &DateTime<Utc>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    /// Deserializes an RFC 3339 timestamp, accepting any UTC offset.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid RFC 3339 timestamp.
    #[inline]
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|parsed| parsed.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
