//! Command processors for APDU transformations
//!
//! This module provides abstractions for processing APDU commands before
//! sending them to a card transport. The only processor a plain PIV session
//! needs is [`GetResponseProcessor`], which follows `61xx` response chains.

use bytes::{Bytes, BytesMut};
use core::fmt;
use tracing::{debug, trace};

use crate::command::{ApduCommand, Command, ExpectedLength};
use crate::response::{ApduResponse, Response};
use crate::transport::CardTransport;
use crate::{Error, Result, ResultExt};

/// Trait for command processors which transform commands
/// before sending them to the transport
pub trait CommandProcessor: Send + fmt::Debug {
    /// Process a command through this processor
    ///
    /// This method takes a command, potentially transforms it, sends it through
    /// the transport, and potentially transforms the response.
    fn process_command(
        &mut self,
        command: &Command,
        transport: &mut dyn CardTransport,
    ) -> Result<Response> {
        trace!(
            command = ?command,
            processor = std::any::type_name::<Self>(),
            "Processing command"
        );

        let result = self.do_process_command(command, transport);

        match &result {
            Ok(response) => {
                trace!(status = %response.status(), "Processed response");
            }
            Err(e) => {
                debug!(error = ?e, "Error during command processing");
            }
        }

        result
    }

    /// Internal implementation of process_command
    fn do_process_command(
        &mut self,
        command: &Command,
        transport: &mut dyn CardTransport,
    ) -> Result<Response>;

    /// Check if this processor is active/ready
    fn is_active(&self) -> bool {
        true
    }
}

/// GET RESPONSE instruction
const INS_GET_RESPONSE: u8 = 0xC0;

/// GET RESPONSE processor that handles automatic response chaining
#[derive(Debug, Clone, Copy)]
pub struct GetResponseProcessor {
    /// Maximum number of response chains to follow
    max_chains: usize,
}

impl GetResponseProcessor {
    /// Create a new GET RESPONSE processor with the given maximum chain count
    pub const fn new(max_chains: usize) -> Self {
        Self { max_chains }
    }
}

impl Default for GetResponseProcessor {
    fn default() -> Self {
        Self::new(10)
    }
}

impl CommandProcessor for GetResponseProcessor {
    fn do_process_command(
        &mut self,
        command: &Command,
        transport: &mut dyn CardTransport,
    ) -> Result<Response> {
        let command_bytes = command.to_bytes()?;
        let response_bytes = transport
            .transmit_raw(&command_bytes)
            .context("Failed to transmit command")?;
        let mut response = Response::from_bytes(&response_bytes)?;

        if !response.status().is_more_data_available() {
            return Ok(response);
        }

        let mut buffer = BytesMut::from(response.payload());
        let mut chains = 0;

        while let Some(remaining) = response.status().remaining_bytes() {
            if chains >= self.max_chains {
                return Err(Error::ChainLimitExceeded);
            }

            let get_response =
                Command::new_with_le(
                0x00,
                INS_GET_RESPONSE,
                0x00,
                0x00,
                remaining as ExpectedLength,
            );

            trace!(
                remaining,
                chain_count = chains + 1,
                "Sending GET RESPONSE command"
            );

            let response_bytes = transport
                .transmit_raw(&get_response.to_bytes()?)
                .context("Failed to transmit GET RESPONSE command")?;
            response = Response::from_bytes(&response_bytes)?;
            buffer.extend_from_slice(response.payload());
            chains += 1;
        }

        trace!(
            total_data_len = buffer.len(),
            final_sw = %response.status(),
            "Completed response chaining"
        );

        Ok(Response::new(Bytes::from(buffer), response.status()))
    }
}
