//! Branded ID newtypes.
//!
//! Connections and envelopes get distinct ID types so a connection ID can
//! never be passed where an envelope ID is expected.
//!
//! - [`ConnectionId`] is a random UUID v4, so its leading characters are
//!   uniformly distributed and safe to truncate into a [`ShortId`].
//! - [`EnvelopeId`] is a UUID v7: a millisecond timestamp prefix followed by
//!   random bits, so ids sort by creation time and collisions need two
//!   envelopes in the same millisecond to also draw the same 74 random bits.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Number of characters kept when deriving a [`ShortId`].
pub const SHORT_ID_LEN: usize = 8;

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident, $generate:expr) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Generate a fresh ID.
            #[must_use]
            pub fn new() -> Self {
                Self($generate)
            }

            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

branded_id! {
    /// Process-unique identifier of one live client connection.
    ConnectionId,
    Uuid::new_v4().to_string()
}

branded_id! {
    /// Unique identifier of a relayed envelope.
    EnvelopeId,
    Uuid::now_v7().to_string()
}

/// Truncated, human-legible form of a [`ConnectionId`].
///
/// Display attribution only; two connections may share a short id.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShortId(String);

impl ShortId {
    /// Derive the short id of a connection.
    #[must_use]
    pub fn of(id: &ConnectionId) -> Self {
        let s = id.as_str();
        let end = s
            .char_indices()
            .nth(SHORT_ID_LEN)
            .map_or(s.len(), |(idx, _)| idx);
        Self(s[..end].to_owned())
    }

    /// Return the inner string as a slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&ConnectionId> for ShortId {
    fn from(id: &ConnectionId) -> Self {
        Self::of(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn connection_id_is_uuid_v4() {
        let id = ConnectionId::new();
        let parsed = Uuid::parse_str(id.as_str()).expect("should be valid UUID");
        assert_eq!(parsed.get_version(), Some(uuid::Version::Random));
    }

    #[test]
    fn envelope_id_is_uuid_v7() {
        let id = EnvelopeId::new();
        let parsed = Uuid::parse_str(id.as_str()).expect("should be valid UUID");
        assert_eq!(parsed.get_version(), Some(uuid::Version::SortRand));
    }

    #[test]
    fn envelope_ids_sort_by_creation() {
        let a = EnvelopeId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = EnvelopeId::new();
        assert!(a < b);
    }

    #[test]
    fn short_id_truncates_to_eight_chars() {
        let id = ConnectionId::from("abcdef0123456789");
        assert_eq!(ShortId::of(&id).as_str(), "abcdef01");
    }

    #[test]
    fn short_id_of_short_input_is_whole_input() {
        let id = ConnectionId::from("abc");
        assert_eq!(ShortId::of(&id).as_str(), "abc");
    }

    #[test]
    fn short_id_respects_char_boundaries() {
        let id = ConnectionId::from("ééééééééééé");
        assert_eq!(ShortId::of(&id).as_str().chars().count(), SHORT_ID_LEN);
    }

    #[test]
    fn short_id_is_prefix_of_connection_id() {
        let id = ConnectionId::new();
        assert!(id.as_str().starts_with(ShortId::of(&id).as_str()));
    }

    #[test]
    fn serde_is_transparent() {
        let id = EnvelopeId::from("env-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"env-1\"");
        let short = ShortId::of(&ConnectionId::from("0123456789"));
        assert_eq!(serde_json::to_string(&short).unwrap(), "\"01234567\"");
    }

    #[test]
    fn display() {
        let id = ConnectionId::from("display-me");
        assert_eq!(format!("{id}"), "display-me");
    }

    #[test]
    fn into_inner() {
        let id = EnvelopeId::from("inner");
        assert_eq!(id.into_inner(), "inner");
    }

    proptest! {
        #[test]
        fn envelope_ids_never_collide(n in 1usize..2000) {
            let ids: HashSet<EnvelopeId> = (0..n).map(|_| EnvelopeId::new()).collect();
            prop_assert_eq!(ids.len(), n);
        }
    }

    #[test]
    fn connection_ids_unique_across_threads() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| (0..500).map(|_| ConnectionId::new()).collect::<Vec<_>>()))
            .collect();
        let mut all = HashSet::new();
        for h in handles {
            for id in h.join().unwrap() {
                assert!(all.insert(id));
            }
        }
        assert_eq!(all.len(), 4000);
    }
}
