//! FarmLink Core - Shared types library.
//!
//! This crate provides the domain types used across all FarmLink components:
//! - `sync` - The resilient cart/session state-synchronization layer
//! - downstream consumers (catalog, checkout, admin surfaces)
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no network access, no
//! storage. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, email, price, role, and the synchronized
//!   record types (cart lines, session, profile)

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
