//! Executor for APDU command execution
//!
//! This module provides executors that combine card transports with
//! command processors to handle APDU command execution.

use core::fmt;
use tracing::{debug, instrument, trace};

use crate::command::{ApduCommand, Command};
use crate::processor::CommandProcessor;
use crate::response::{ApduResponse, Response};
use crate::transport::CardTransport;
use crate::{Error, Result};

/// Trait for APDU command execution
pub trait Executor: Send + fmt::Debug {
    /// Transmit an APDU command
    ///
    /// This method handles protocol details including routing through
    /// command processors.
    #[instrument(
        level = "trace",
        skip_all,
        fields(executor = std::any::type_name::<Self>(), ins = command.ins)
    )]
    fn transmit(&mut self, command: &Command) -> Result<Response> {
        let response = self.do_transmit(command);
        match &response {
            Ok(response) => {
                trace!(
                    status = %response.status(),
                    payload_len = response.payload().len(),
                    "Received response"
                );
            }
            Err(err) => {
                debug!(error = ?err, "Error during transmission");
            }
        }
        response
    }

    /// Internal implementation of transmit
    fn do_transmit(&mut self, command: &Command) -> Result<Response>;

    /// Execute a typed APDU command
    fn execute<C: ApduCommand>(&mut self, command: &C) -> core::result::Result<C::Success, C::Error>
    where
        Self: Sized,
        C::Error: From<Error>,
    {
        let response = self.transmit(&command.to_command())?;
        C::parse_response(response)
    }

    /// Release the transport
    fn close(&mut self) -> Result<()>;
}

/// Card executor implementation that combines a transport with optional command processors
#[derive(Debug)]
pub struct CardExecutor<T: CardTransport> {
    /// The transport used for communication
    transport: T,
    /// Command processors chain (last one processes first)
    processors: Vec<Box<dyn CommandProcessor>>,
}

impl<T: CardTransport> CardExecutor<T> {
    /// Create a new card executor with the given transport
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            processors: Vec::new(),
        }
    }

    /// Get a reference to the underlying transport
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Add a command processor to the chain
    pub fn add_processor(&mut self, processor: Box<dyn CommandProcessor>) {
        self.processors.push(processor);
    }
}

impl<T: CardTransport> Executor for CardExecutor<T> {
    fn do_transmit(&mut self, command: &Command) -> Result<Response> {
        // Process through the last active processor, if any
        match self.processors.iter_mut().rev().find(|p| p.is_active()) {
            Some(processor) => processor.process_command(command, &mut self.transport),
            None => {
                let command_bytes = command.to_bytes()?;
                let response_bytes = self.transport.transmit_raw(&command_bytes)?;
                Ok(Response::from_bytes(&response_bytes)?)
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        self.transport.close()?;
        Ok(())
    }
}
