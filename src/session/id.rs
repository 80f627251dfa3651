//! Terminal session identifier type.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

/// Unique identifier for an interactive terminal session.
///
/// Identifiers are handed out by [`SessionRegistry`](super::SessionRegistry),
/// which owns the counter. The ID is displayed as `term-XXXXXXXX` where X is
/// a hexadecimal digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    /// Get the raw u64 value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Create a SessionId from a raw u64 value.
    pub fn from_raw(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "term-{:08x}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = crate::error::RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix("term-")
            .and_then(|hex| u64::from_str_radix(hex, 16).ok())
            .map(SessionId)
            .ok_or_else(|| crate::error::RelayError::SessionNotFound(s.into()))
    }
}

impl Serialize for SessionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_display_format() {
        assert_eq!(SessionId::from_raw(255).to_string(), "term-000000ff");
        assert_eq!(SessionId::from_raw(0x12345678).to_string(), "term-12345678");
    }

    #[test]
    fn test_parse() {
        let id: SessionId = "term-000000ff".parse().unwrap();
        assert_eq!(id.as_u64(), 255);

        assert!("000000ff".parse::<SessionId>().is_err());
        assert!("sess-000000ff".parse::<SessionId>().is_err());
        assert!("term-zz".parse::<SessionId>().is_err());
        assert!("".parse::<SessionId>().is_err());
    }

    #[test]
    fn test_serializes_as_display_string() {
        let json = serde_json::to_string(&SessionId::from_raw(16)).unwrap();
        assert_eq!(json, "\"term-00000010\"");
    }

    #[test]
    fn test_hash_eq() {
        let mut set = HashSet::new();
        set.insert(SessionId::from_raw(42));
        assert!(set.contains(&SessionId::from_raw(42)));
        assert!(!set.contains(&SessionId::from_raw(43)));
    }
}
