//! Core types for FarmLink.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod price;
pub mod records;
pub mod role;

pub use email::{Email, EmailError};
pub use id::*;
pub use price::{CurrencyCode, Price};
pub use records::{CartLine, ProductSnapshot, ProfileRecord, SessionRecord};
pub use role::Role;
