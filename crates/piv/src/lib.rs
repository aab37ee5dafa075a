//! Host-side client for the PIV application of a smart card
//!
//! The crate is layered the same way a card conversation is:
//!
//! - [`Session`] owns the transport, selects the PIV application and tracks the
//!   management key authentication state, including retry lockout.
//! - [`PivClient`] exposes slot addressed certificate and signing operations on
//!   top of a session, with a per-session certificate cache.
//! - [`SharedClient`] lets several threads take turns on one client.
//!
//! The transport itself is any [`pivkit_apdu_core::CardTransport`]; no platform
//! driver is bundled.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]

mod client;
mod commands;
mod config;
mod constants;
mod crypto;
mod error;
mod session;
mod shared;
mod tlv;
mod types;

#[cfg(test)]
mod testing;

pub use client::PivClient;
pub use commands::*;
pub use config::SessionConfig;
pub use constants::*;
pub use crypto::{ManagementKey, ManagementKeyType};
pub use error::{Error, Result};
pub use session::{AuthState, Session, SessionState};
pub use shared::SharedClient;
pub use types::{Certificate, Signature, SignatureAlgorithm, Slot, Version};
