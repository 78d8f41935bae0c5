//! Branded integer IDs.
//!
//! Projects, chats, and users are identified by database row IDs. Newtypes
//! keep them from being swapped at call sites that take more than one.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! branded_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Raw integer value.
            pub fn value(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(v: i64) -> Self {
                Self(v)
            }
        }
    };
}

branded_id!(
    /// Identifies a project (and therefore its sandbox and orchestrator).
    ProjectId
);
branded_id!(
    /// Identifies one chat within a project.
    ChatId
);
branded_id!(
    /// Identifies the user a chat session belongs to.
    UserId
);
