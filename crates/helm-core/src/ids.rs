use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! branded_id {
    ($name:ident, $prefix:expr) => {
        #[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new() -> Self {
                Self(format!("{}_{}", $prefix, Uuid::now_v7()))
            }

            pub fn from_raw(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::convert::Infallible;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.to_owned()))
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

// Surrogate key assigned by the document store on insert. Distinct from any
// business code an entity carries; join and query logic must never mix the two.
branded_id!(DocId, "doc");

// Business identifier for users; orders reference users by this, not by DocId.
branded_id!(UserId, "usr");

#[derive(Debug, thiserror::Error)]
#[error("malformed store key: {0:?}")]
pub struct InvalidDocId(pub String);

impl DocId {
    /// Strict parse of the store key format (`doc_<uuid>`). Handlers that
    /// address entities by surrogate key validate inbound identifiers with
    /// this before issuing any lookup.
    pub fn parse(s: &str) -> Result<Self, InvalidDocId> {
        let suffix = s
            .strip_prefix("doc_")
            .ok_or_else(|| InvalidDocId(s.to_owned()))?;
        Uuid::parse_str(suffix).map_err(|_| InvalidDocId(s.to_owned()))?;
        Ok(Self(s.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doc_id_has_prefix() {
        let id = DocId::new();
        assert!(id.as_str().starts_with("doc_"), "got: {id}");
    }

    #[test]
    fn user_id_has_prefix() {
        let id = UserId::new();
        assert!(id.as_str().starts_with("usr_"), "got: {id}");
    }

    #[test]
    fn ids_are_unique() {
        let a = DocId::new();
        let b = DocId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn parse_accepts_generated_keys() {
        let id = DocId::new();
        let parsed = DocId::parse(id.as_str()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn parse_rejects_foreign_formats() {
        assert!(DocId::parse("not-a-key").is_err());
        assert!(DocId::parse("doc_").is_err());
        assert!(DocId::parse("doc_zzz").is_err());
        assert!(DocId::parse("usr_018f3a2b-0000-7000-8000-000000000000").is_err());
    }

    #[test]
    fn serde_roundtrip() {
        let id = DocId::new();
        let json = serde_json::to_string(&id).unwrap();
        let parsed: DocId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn from_raw_preserves_value() {
        let id = UserId::from_raw("legacy-user-7");
        assert_eq!(id.as_str(), "legacy-user-7");
    }
}
