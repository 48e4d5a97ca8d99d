//! Connection identifiers.

use std::fmt;

use uuid::Uuid;

/// Identifies one TCP connection for its whole lifetime.
///
/// The receiver loop and the write path carry the id of the connection they
/// were bound to, so work belonging to a torn-down connection can never touch
/// a newer one.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Create a new time-ordered id.
    #[must_use]
    pub fn new() -> Self {
        Self(format!("conn_{}", Uuid::now_v7()))
    }

    /// Return the inner string as a slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn prefix_and_display() {
        let id = ConnectionId::new();
        assert!(id.as_str().starts_with("conn_"));
        assert_eq!(id.to_string(), id.as_str());
    }
}
