//! Newtype IDs for type-safe entity references.
//!
//! The hosted backend issues opaque string identifiers (UUIDs in practice),
//! so every ID here wraps a `String`. Use the `define_id!` macro to create
//! wrappers that prevent accidentally mixing IDs from different entity
//! types.
//!
//! [`LineId`] is special: cart lines can be minted while the remote store is
//! unreachable, and those locally minted identifiers carry a reserved
//! namespace prefix so the two ID spaces never collide.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Macro to define a type-safe string ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`
/// - Conversion methods: `new()`, `as_str()`, `into_inner()`
/// - `From<String>` and `From<&str>` implementations
///
/// # Example
///
/// ```rust
/// # use farmlink_core::define_id;
/// define_id!(UserId);
/// define_id!(ProductId);
///
/// let user_id = UserId::new("9f1c");
/// let product_id = ProductId::new("9f1c");
///
/// // These are different types, so this won't compile:
/// // let _: UserId = product_id;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new ID from a string value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the underlying string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the ID and return its inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

// Standard entity IDs
define_id!(UserId);
define_id!(ProductId);

/// Identifier of a cart line.
///
/// A line ID lives in one of two disjoint namespaces:
/// - **remote-space**: a plain UUID, minted while the remote store serves
///   the cart (and accepted by it as the row key on upsert);
/// - **local-space**: a UUID prefixed with [`LineId::LOCAL_PREFIX`], minted
///   while the cart is operating against local storage only.
///
/// The prefix guarantees a locally minted line can never collide with a
/// remote row, whatever the remote store issues later.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineId(String);

impl LineId {
    /// Reserved namespace marker for locally minted line IDs.
    pub const LOCAL_PREFIX: &'static str = "local-";

    /// Wrap an identifier issued by (or destined for) the remote store.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint a fresh remote-space identifier.
    #[must_use]
    pub fn mint_remote() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Mint a fresh local-space identifier.
    #[must_use]
    pub fn mint_local() -> Self {
        Self(format!("{}{}", Self::LOCAL_PREFIX, Uuid::new_v4()))
    }

    /// Whether this ID belongs to the local namespace.
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.0.starts_with(Self::LOCAL_PREFIX)
    }

    /// Get the underlying string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for LineId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for LineId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for LineId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}
