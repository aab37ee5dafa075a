use std::collections::VecDeque;

use bytes::Bytes;
use pivkit_apdu_core::{CardTransport, TransportError};

/// Transport that replays a fixed script of responses and records commands
///
/// Once the script is exhausted every transmit fails, which is how tests
/// simulate a card being pulled.
#[derive(Debug, Default)]
pub(crate) struct ScriptedTransport {
    responses: VecDeque<Bytes>,
    sent: Vec<Vec<u8>>,
    closed: bool,
}

impl ScriptedTransport {
    pub(crate) fn new(responses: &[&[u8]]) -> Self {
        Self {
            responses: responses
                .iter()
                .map(|r| Bytes::copy_from_slice(r))
                .collect(),
            ..Default::default()
        }
    }

    pub(crate) fn push(&mut self, response: &[u8]) {
        self.responses.push_back(Bytes::copy_from_slice(response));
    }

    pub(crate) fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.clone()
    }
}

impl CardTransport for ScriptedTransport {
    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.sent.push(command.to_vec());
        self.responses.pop_front().ok_or(TransportError::Transmission)
    }

    fn is_connected(&self) -> bool {
        !self.closed
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.closed = true;
        Ok(())
    }
}
