use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of characters kept from a freshly generated UUID.
///
/// Short ids are easier to type on the command line; collisions within one
/// namespace are unlikely enough at this scale.
const SHORT_ID_LEN: usize = 8;

fn short_id() -> String {
    let full = uuid::Uuid::new_v4().to_string();
    full[..SHORT_ID_LEN].to_string()
}

macro_rules! opaque_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Generate a fresh 8-character identifier.
            pub fn generate() -> Self {
                Self(short_id())
            }

            pub fn as_str(&self) -> &str {
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
                Self(s.to_string())
            }
        }
    };
}

opaque_id!(
    /// Opaque identifier shared by every scheduled unit of one task.
    ///
    /// Generated once at submission and stored as the `task-id` label; it is
    /// the only durable handle for status queries, log tailing and stop.
    TaskId
);

opaque_id!(
    /// Opaque identifier stored as the `volume-id` label on a storage claim.
    VolumeId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_short_and_unique() {
        let a = TaskId::generate();
        let b = TaskId::generate();
        assert_eq!(a.as_str().len(), 8);
        assert_ne!(a, b);
    }

    #[test]
    fn serde_transparent() {
        let id = TaskId::from("abc12345");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, r#""abc12345""#);

        let back: TaskId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
