//! Delegated session lifecycle
//!
//! A session binds a locally held ephemeral key to the wallet's primary
//! address through a SIWE delegation signed once by custody. The record is
//! reused until it comes within five minutes of expiry, then replaced.

mod manager;
mod record;
mod store;

pub use manager::{DelegationSettings, SessionManager};
pub use record::{RENEWAL_BUFFER_MS, SessionRecord};
pub use store::{FileSessionStore, MemorySessionStore, SessionStore};

#[cfg(test)]
mod manager_tests;
