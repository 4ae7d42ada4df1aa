use serde::{Deserialize, Serialize};
use std::fmt;

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Short hex id used to tag transport calls in logs.
pub fn new_call_id() -> CallId {
    let uuid = uuid::Uuid::new_v4();
    let bytes = uuid.as_bytes();
    CallId(format!(
        "{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5]
    ))
}

/// Identifier of one transport call (a single dial or inbound answer).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CallId(String);

impl CallId {
    pub fn new() -> Self {
        new_call_id()
    }

    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_id_is_valid_uuid() {
        let id = new_id();
        let parsed = uuid::Uuid::parse_str(&id);
        assert!(parsed.is_ok());
        assert_eq!(parsed.unwrap().get_version_num(), 4);
    }

    #[test]
    fn new_id_is_unique() {
        assert_ne!(new_id(), new_id());
    }

    #[test]
    fn call_id_is_short_hex() {
        let cid = new_call_id();
        assert_eq!(cid.as_str().len(), 12);
        assert!(cid.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn call_id_display_matches_str() {
        let cid = CallId::new();
        assert_eq!(cid.to_string(), cid.as_str());
    }

    #[test]
    fn call_id_from_string_roundtrips_equality() {
        let a = CallId::from_string("call-1");
        let b = CallId::from_string(String::from("call-1"));
        assert_eq!(a, b);
        assert_ne!(a, CallId::new());
    }
}
