//! Duration fields as integer milliseconds
//!
//! Config files and environment variables carry timeouts and TTLs as plain
//! millisecond counts.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

type SerializeResult<S> = Result<<S as Serializer>::Ok, <S as Serializer>::Error>;

/// `#[serde(with = "duration_millis")]` for `Duration`
pub mod duration_millis {
    use super::*;

    /// Write the duration as whole milliseconds
    pub fn serialize<S>(duration: &Duration, serializer: S) -> SerializeResult<S>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    /// Read whole milliseconds
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
