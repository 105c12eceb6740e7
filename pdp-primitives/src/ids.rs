//! Identifier types.

use std::borrow::Borrow;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

/// Key under which a policy document is published in an index.
///
/// Keys are opaque, non-blank strings (typically a file path or a
/// repository-assigned name) and order lexicographically.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentKey(String);

impl DocumentKey {
    /// Creates a document key after validating it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDocumentKey`] when the key is blank.
    pub fn new(key: impl Into<String>) -> crate::Result<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(Error::InvalidDocumentKey {
                key,
                reason: "document key cannot be empty".into(),
            });
        }
        Ok(Self(key))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for DocumentKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for DocumentKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DocumentKey {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DocumentKey> for String {
    fn from(value: DocumentKey) -> Self {
        value.0
    }
}

impl FromStr for DocumentKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Identifier of one subscription inside a multi-subscription.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Generates a random subscription identifier.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an identifier from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::random()
    }
}

impl Display for SubscriptionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl From<Uuid> for SubscriptionId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl FromStr for SubscriptionId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = Uuid::parse_str(s).map_err(Error::from)?;
        Ok(Self::from_uuid(uuid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_document_keys_are_rejected() {
        assert!(DocumentKey::new("policies/read.policy").is_ok());
        let err = DocumentKey::new("  ").unwrap_err();
        assert!(matches!(err, Error::InvalidDocumentKey { .. }));
    }

    #[test]
    fn document_key_deserialization_validates() {
        let key: DocumentKey = serde_json::from_str("\"a\"").unwrap();
        assert_eq!(key.as_str(), "a");
        assert!(serde_json::from_str::<DocumentKey>("\"\"").is_err());
    }

    #[test]
    fn subscription_id_parses_display_output() {
        let id = SubscriptionId::random();
        let parsed = id.to_string().parse::<SubscriptionId>().expect("parse");
        assert_eq!(id, parsed);
        assert!("not-a-uuid".parse::<SubscriptionId>().is_err());
    }
}
