//! x402 payment protocol client
//!
//! A request that comes back `402 Payment Required` is paid once and
//! retried with an `X-PAYMENT` header:
//! 1. Pick the first `exact` EVM requirement the server accepts
//! 2. Check its cost against the caller's cap, before anything is signed
//! 3. Build an EIP-3009 TransferWithAuthorization and have custody sign its
//!    EIP-712 hash through the delegated session
//! 4. Resend the original request with the base64 payload attached

pub mod authorization;
mod client;
pub mod guard;
pub mod requirements;

pub use client::{FetchOutcome, PaymentClient, PaymentReceipt, RequestInit};
pub use guard::{GuardAbort, GuardContext};
pub use requirements::{SelectedRequirement, select_requirement};
