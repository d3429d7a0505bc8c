//! FarmLink Sync - resilient client-side state synchronization.
//!
//! This crate backs the shopping cart and the authenticated-session/profile
//! state of the FarmLink marketplace with a single failover policy:
//! read-through/write-through access to the hosted backend, transparent
//! fallback to a local durable store when the backend is unreachable, and a
//! per-domain latch that prevents thrashing between the two modes.
//!
//! # Architecture
//!
//! - [`store`] - durable local shadow store over an abstract storage medium
//! - [`remote`] - row-level REST and auth bindings for the hosted backend
//! - [`latch`] - per-domain REMOTE/LOCAL mode latch
//! - [`guard`] - de-duplication of concurrent fetches for the same owner
//! - [`coordinator`] - the failover policy, defined once for both domains
//! - [`cart`] / [`session`] - the two synchronized domains
//! - [`stack`] - wiring, in the shape consumers hold
//!
//! Consumers only ever see the uniform read/mutate surface of [`cart`] and
//! [`session`]; which backing store served a call is invisible to them.
//!
//! # Example
//!
//! ```rust,ignore
//! use farmlink_sync::{notify::TracingNotifier, stack::SyncStack, config::SyncConfig};
//!
//! let config = SyncConfig::from_env()?;
//! let stack = SyncStack::new(config, std::sync::Arc::new(TracingNotifier))?;
//!
//! let session = stack.session().sign_in("buyer@example.org", "hunter2").await?;
//! stack.cart().add(&session.user_id, &snapshot, 2).await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod guard;
pub mod latch;
pub mod notify;
pub mod remote;
pub mod session;
pub mod stack;
pub mod store;
