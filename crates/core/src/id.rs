//! Strongly-typed identifiers used across the domain.
//!
//! Backend identifiers are opaque strings. They are interpolated into request
//! paths, so parsing rejects anything that could change the path shape.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Identifier of a user account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

/// Identifier of an article.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArticleId(String);

/// Identifier of a role record as the backend stores it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoleId(String);

fn validate_id(name: &str, raw: &str) -> Result<(), DomainError> {
    if raw.is_empty() {
        return Err(DomainError::invalid_id(format!("{name}: empty")));
    }
    if raw
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#' | '%'))
    {
        return Err(DomainError::invalid_id(format!(
            "{name}: '{raw}' contains reserved characters"
        )));
    }
    Ok(())
}

macro_rules! impl_string_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Parse and validate an identifier.
            pub fn parse(raw: impl Into<String>) -> Result<Self, DomainError> {
                let raw = raw.into();
                validate_id($name, &raw)?;
                Ok(Self(raw))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<$t> for String {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl TryFrom<String> for $t {
            type Error = DomainError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(value)
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

impl_string_newtype!(UserId, "UserId");
impl_string_newtype!(ArticleId, "ArticleId");
impl_string_newtype!(RoleId, "RoleId");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_backend_object_ids() {
        let id: ArticleId = "68569868a2f65688c5e0c95c".parse().unwrap();
        assert_eq!(id.as_str(), "68569868a2f65688c5e0c95c");
        assert_eq!(id.to_string(), "68569868a2f65688c5e0c95c");
    }

    #[test]
    fn rejects_ids_that_would_alter_the_path() {
        assert!(UserId::parse("").is_err());
        assert!(UserId::parse("abc/../admin").is_err());
        assert!(UserId::parse("abc?x=1").is_err());
        assert!(UserId::parse("a b").is_err());
    }

    #[test]
    fn wire_form_is_a_bare_string_and_is_validated() {
        let id: UserId = serde_json::from_str("\"u1\"").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"u1\"");
        assert!(serde_json::from_str::<UserId>("\"../x\"").is_err());
    }
}
