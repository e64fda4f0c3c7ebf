// Identifier generation
//
// Files, pages, notifications and binary resources are all addressed by opaque
// string ids. Each kind gets its own newtype so a page id can never be passed
// where a file id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Produce a fresh, collision-resistant identifier string.
///
/// Uses a random (v4) UUID in its compact 32-character hex form.
pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Generate a new unique id
            pub fn generate() -> Self {
                Self(generate_id())
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

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Identifies one uploaded [`SourceDocument`](crate::models::SourceDocument)
    FileId
);

string_id!(
    /// Identifies one [`PageRef`](crate::models::PageRef) in the edited sequence.
    ///
    /// Never equal to any [`FileId`]; a page stays addressable after it is moved.
    PageId
);

string_id!(
    /// Identifies one entry in the [`NotificationQueue`](crate::models::NotificationQueue)
    NotificationId
);

string_id!(
    /// Handle to a binary resource held by the [`ResourceRegistry`](crate::resources::ResourceRegistry)
    ResourceHandle
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_id_is_compact_hex() {
        let id = generate_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let ids: HashSet<String> = (0..1000).map(|_| generate_id()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_typed_ids_round_trip_as_plain_strings() {
        let id = PageId::from("page-1");
        assert_eq!(id.as_str(), "page-1");
        assert_eq!(id.to_string(), "page-1");

        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"page-1\"");
    }
}
