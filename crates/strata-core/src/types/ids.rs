//! Identifiers for allocation records and the projects that own them.
//!
//! Both are random UUIDs. They serialize as bare UUID strings, so stored
//! records and log fields carry the same text.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// A fresh random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

uuid_id! {
    /// Key of a storage or access allocation record.
    ///
    /// Storage and access allocations share one ID space so a parent link
    /// or a quota record can point at either without a tag.
    AllocationId
}

uuid_id! {
    /// The project an allocation is billed to. Projects are owned
    /// elsewhere; here the ID only scopes lookups.
    ProjectId
}
