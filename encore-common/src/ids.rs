//! Identifier newtypes
//!
//! Tenants, voice endpoints and text endpoints are opaque strings owned by
//! the chat platform. Wrapping them keeps the three from being mixed up at
//! call sites.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
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

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Isolated community context; owns at most one playback session
    TenantId
);

string_id!(
    /// Voice endpoint the audio transport is bound to
    VoiceTarget
);

string_id!(
    /// Text endpoint that receives notifications for a tenant
    TextTarget
);
