//! Core traits and types for APDU (Application Protocol Data Unit) operations
//!
//! This crate provides the foundational types and traits for working with smart card
//! APDU commands and responses according to ISO/IEC 7816-4.
//!
//! ## Overview
//!
//! APDU (Application Protocol Data Unit) is the communication format used by smart cards.
//! This crate provides abstractions for:
//!
//! - Creating and parsing APDU commands and responses, including extended length framing
//! - Communicating with smart cards through caller supplied transports
//! - Following `61xx` response chains with GET RESPONSE
//! - Error handling and status word interpretation
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

// Re-export bytes for convenience
pub use bytes::{Bytes, BytesMut};

// Main modules
pub mod command;
pub mod executor;
pub mod processor;
pub mod response;
pub mod transport;

// Core error types
mod error;
pub use error::{Error, Result, ResultExt};

// Re-exports for common types
pub use command::{ApduCommand, Command, ExpectedLength, encode};
pub use executor::{CardExecutor, Executor};
pub use processor::{CommandProcessor, GetResponseProcessor};
pub use response::status::StatusWord;
pub use response::{ApduResponse, Response, decode, utils};
pub use transport::{CardTransport, TransportError};

/// Prelude module containing commonly used traits and types
pub mod prelude {
    pub use crate::{
        Bytes, BytesMut, Command, Error, Response, Result, ResultExt,
        command::{ApduCommand, ExpectedLength},
        executor::{CardExecutor, Executor},
        processor::CommandProcessor,
        response::status::{StatusWord, common as status},
        response::{ApduResponse, error::ResponseError},
        transport::{CardTransport, TransportError},
    };
}
