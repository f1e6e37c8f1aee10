//! Strongly-typed identifiers for onboarding entities
//!
//! Supplier ids are the insertion-ordered primary key of the supplier table;
//! references into collaborator systems are opaque strings wrapped in
//! newtypes so they cannot be mixed up.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a supplier record (insertion order)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SupplierId(i64);

impl SupplierId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for SupplierId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "supplier:{}", self.0)
    }
}

macro_rules! string_ref {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
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
    };
}

string_ref!(
    /// Messaging channel provisioned for a supplier
    ChannelRef
);

string_ref!(
    /// Workspace member resolved from a contact e-mail
    UserRef
);

string_ref!(
    /// Document issued by the e-signature platform
    DocumentRef
);
