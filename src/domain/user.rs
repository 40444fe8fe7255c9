use crate::domain::conversation::SEPARATOR;
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier issued by the identity provider.
///
/// Never empty and never contains the conversation key separator, so any
/// pair of ids maps to exactly one conversation key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Validates and wraps a raw identifier.
    ///
    /// # Errors
    /// Returns `AppError::InvalidArgument` if the id is blank or contains the conversation separator.
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(AppError::InvalidArgument("user id must not be empty".to_string()));
        }
        if raw.contains(SEPARATOR) {
            return Err(AppError::InvalidArgument(format!("user id must not contain '{SEPARATOR}'")));
        }
        Ok(Self(raw))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for UserId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_blank_ids() {
        assert!(matches!(UserId::parse(""), Err(AppError::InvalidArgument(_))));
        assert!(matches!(UserId::parse("   "), Err(AppError::InvalidArgument(_))));
    }

    #[test]
    fn test_rejects_separator() {
        assert!(matches!(UserId::parse("vendor_42"), Err(AppError::InvalidArgument(_))));
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: UserId = serde_json::from_str("\"alice\"").unwrap();
        assert_eq!(ok.as_str(), "alice");
        assert!(serde_json::from_str::<UserId>("\"\"").is_err());
    }
}
