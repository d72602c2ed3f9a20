//! agentpay: an x402 payment client for agents whose wallet lives in a
//! remote custody gateway.
//!
//! The wallet's primary key never leaves custody. Custody signs one SIWE
//! delegation that binds a locally generated session key to the wallet;
//! afterwards every gateway call is authenticated with that session key and
//! every 402 payment is signed by custody through the session.

pub mod config;
pub mod crypto;
pub mod custody;
pub mod delegation;
pub mod error;
pub mod http;
pub mod session;
pub mod wallet;
pub mod x402;

#[cfg(test)]
mod test_support;

pub use config::Config;
pub use error::{Error, Result};
pub use x402::{FetchOutcome, GuardAbort, GuardContext, PaymentClient, PaymentReceipt, RequestInit};
