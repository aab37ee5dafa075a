//! Session management for the PIV application
//!
//! A [`Session`] owns the transport for its whole lifetime, selects the PIV
//! application, and tracks management key authentication. Wrong keys are
//! counted per session and lock it once the configured threshold is reached;
//! a locked session refuses further attempts without contacting the card.

use std::collections::HashMap;

use bytes::Bytes;
use pivkit_apdu_core::{
    ApduCommand, CardExecutor, CardTransport, Command, Executor, GetResponseProcessor, Response,
};
use tracing::{debug, instrument, trace, warn};
use zeroize::Zeroizing;

use crate::commands::{GeneralAuthenticateCommand, SelectCommand};
use crate::config::SessionConfig;
use crate::constants::{ins, tags};
use crate::crypto::{self, ManagementKey};
use crate::tlv;
use crate::types::{Certificate, Slot};
use crate::{Error, Result};

/// Management key authentication state of a selected application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// No management key has been verified yet
    Unauthenticated,
    /// The management key was verified
    Authenticated,
    /// Too many wrong keys; no further attempts in this session
    Locked,
}

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// The transport has been released
    Disconnected,
    /// SELECT is in flight
    Selecting,
    /// The PIV application is selected
    Selected(AuthState),
}

/// A live connection to the PIV application of one card
#[derive(Debug)]
pub struct Session<T: CardTransport> {
    executor: Option<CardExecutor<T>>,
    state: SessionState,
    config: SessionConfig,
    failed_attempts: u8,
    certificates: HashMap<Slot, Certificate>,
}

impl<T: CardTransport> Session<T> {
    /// Take ownership of `transport` and select the PIV application
    #[instrument(level = "debug", skip_all, fields(aid = %hex::encode(&config.aid)))]
    pub fn connect(transport: T, config: SessionConfig) -> Result<Self> {
        let mut executor = CardExecutor::new(transport);
        executor.add_processor(Box::new(GetResponseProcessor::new(
            config.max_response_chain,
        )));

        let mut session = Self {
            executor: Some(executor),
            state: SessionState::Disconnected,
            config,
            failed_attempts: 0,
            certificates: HashMap::new(),
        };

        match session.select() {
            Ok(()) => Ok(session),
            Err(err) => {
                debug!(error = %err, "Selecting the PIV application failed");
                session.release();
                Err(err)
            }
        }
    }

    /// Current lifecycle state
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the management key has been verified in this session
    pub const fn is_authenticated(&self) -> bool {
        matches!(self.state, SessionState::Selected(AuthState::Authenticated))
    }

    /// Consecutive wrong management keys since the last success
    pub const fn failed_attempts(&self) -> u8 {
        self.failed_attempts
    }

    /// Wrong keys still allowed before the session locks
    pub const fn retries_remaining(&self) -> u8 {
        self.config.lockout_threshold.saturating_sub(self.failed_attempts)
    }

    /// Selected application identifier
    pub fn aid(&self) -> &[u8] {
        &self.config.aid
    }

    /// Session configuration
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Underlying transport, while connected
    pub fn transport(&self) -> Option<&T> {
        self.executor.as_ref().map(CardExecutor::transport)
    }

    /// Authenticate with the card management key
    ///
    /// Runs the GENERAL AUTHENTICATE witness/challenge exchange against key
    /// reference `9B` and verifies the card's answer to the host challenge.
    #[instrument(level = "debug", skip_all, fields(key_type = ?key.key_type()))]
    pub fn authenticate(&mut self, key: &ManagementKey) -> Result<()> {
        match self.state {
            SessionState::Disconnected | SessionState::Selecting => {
                return Err(Error::SessionClosed);
            }
            SessionState::Selected(AuthState::Locked) => {
                warn!("Management key authentication refused, session is locked");
                return Err(Error::Locked);
            }
            SessionState::Selected(_) => {}
        }

        // Any attempt resets the card side security status
        self.state = SessionState::Selected(AuthState::Unauthenticated);

        let key_type = key.key_type();
        let algorithm = key_type.algorithm_id();

        let template =
            self.authentication_step(&GeneralAuthenticateCommand::request_witness(algorithm))?;
        let encrypted_witness = tlv::require(&template, tags::WITNESS.into())?;
        let witness = Zeroizing::new(key.decrypt_block(encrypted_witness)?);

        let challenge = Zeroizing::new(crypto::random_challenge(key_type));
        let template = self.authentication_step(
            &GeneralAuthenticateCommand::respond_to_witness(algorithm, &witness, &challenge),
        )?;
        let card_response = tlv::require(&template, tags::RESPONSE.into())?;

        let expected = Zeroizing::new(key.encrypt_block(&challenge)?);
        if expected.as_slice() != card_response {
            warn!("Card response to host challenge does not verify");
            return Err(Error::CardAuthenticationFailed);
        }

        debug!("Management key authenticated");
        self.failed_attempts = 0;
        self.state = SessionState::Selected(AuthState::Authenticated);
        Ok(())
    }

    /// Send a raw command and return the card's response uninterpreted
    ///
    /// Transport failures close the session. A response too short to hold a
    /// status word fails only this call.
    ///
    /// The card may have changed in ways the session cannot see, so cached
    /// certificates are dropped after every exchange. A raw SELECT also resets
    /// the card's security status, and the session follows it.
    pub fn execute(&mut self, command: &Command) -> Result<Response> {
        let response = self.transmit(command)?;

        self.certificates.clear();
        if command.ins == ins::SELECT {
            debug!("Raw SELECT sent, dropping authentication");
            self.drop_authentication();
        }
        Ok(response)
    }

    /// Select the application again
    ///
    /// Cards drop their security status on select, so an authenticated session
    /// falls back to unauthenticated. A lock persists.
    #[instrument(level = "debug", skip(self))]
    pub fn reselect(&mut self) -> Result<()> {
        if self.executor.is_none() {
            return Err(Error::SessionClosed);
        }

        self.select().inspect_err(|err| {
            debug!(error = %err, "Reselect failed, releasing the session");
            self.release();
        })
    }

    /// Release the transport
    ///
    /// Calling this more than once is harmless; every later operation fails
    /// with [`Error::SessionClosed`].
    pub fn disconnect(&mut self) -> Result<()> {
        let Some(mut executor) = self.executor.take() else {
            return Ok(());
        };

        debug!("Disconnecting session");
        self.clear();
        executor.close().map_err(Error::Transport)
    }

    fn select(&mut self) -> Result<()> {
        let locked = matches!(self.state, SessionState::Selected(AuthState::Locked));
        self.state = SessionState::Selecting;
        self.certificates.clear();

        let command = SelectCommand::with_aid(self.config.aid.clone());
        self.dispatch(&command)?;

        let auth = if locked {
            AuthState::Locked
        } else {
            AuthState::Unauthenticated
        };
        debug!(?auth, "PIV application selected");
        self.state = SessionState::Selected(auth);
        Ok(())
    }

    /// Run one GENERAL AUTHENTICATE step, accounting for wrong key answers
    fn authentication_step(&mut self, command: &GeneralAuthenticateCommand) -> Result<Bytes> {
        match self.dispatch(command) {
            Err(Error::AuthenticationRequired) => Err(self.record_failure()),
            Err(Error::Locked) => {
                self.lock();
                Err(Error::Locked)
            }
            other => other,
        }
    }

    fn record_failure(&mut self) -> Error {
        self.failed_attempts = self.failed_attempts.saturating_add(1);
        let retries_remaining = self.retries_remaining();

        if retries_remaining == 0 {
            warn!(
                failed_attempts = self.failed_attempts,
                "Wrong management key, session locked"
            );
            self.state = SessionState::Selected(AuthState::Locked);
            Error::Locked
        } else {
            warn!(
                failed_attempts = self.failed_attempts,
                retries_remaining, "Wrong management key"
            );
            Error::WrongManagementKey { retries_remaining }
        }
    }

    /// Check the session may run an operation that needs the management key
    pub(crate) const fn require_authenticated(&self) -> Result<()> {
        match self.state {
            SessionState::Selected(AuthState::Authenticated) => Ok(()),
            SessionState::Disconnected | SessionState::Selecting => Err(Error::SessionClosed),
            SessionState::Selected(_) => Err(Error::AuthenticationRequired),
        }
    }

    /// Record that the card blocked the management key
    pub(crate) fn lock(&mut self) {
        if matches!(self.state, SessionState::Selected(_)) {
            warn!("Card reports the management key blocked, session locked");
            self.state = SessionState::Selected(AuthState::Locked);
        }
    }

    /// Record that the card no longer considers the session authenticated
    pub(crate) fn drop_authentication(&mut self) {
        if self.is_authenticated() {
            debug!("Card rejected security status, dropping authentication");
            self.state = SessionState::Selected(AuthState::Unauthenticated);
        }
    }

    pub(crate) fn cached_certificate(&self, slot: Slot) -> Option<&Certificate> {
        self.certificates.get(&slot)
    }

    pub(crate) fn cache_certificate(&mut self, certificate: Certificate) {
        self.certificates.insert(certificate.slot(), certificate);
    }

    pub(crate) fn invalidate_certificate(&mut self, slot: Slot) {
        self.certificates.remove(&slot);
    }

    /// Send a typed command and interpret its response
    pub(crate) fn dispatch<C>(&mut self, command: &C) -> Result<C::Success>
    where
        C: ApduCommand<Error = Error>,
    {
        let response = self.transmit(&command.to_command())?;
        C::parse_response(response)
    }

    fn transmit(&mut self, command: &Command) -> Result<Response> {
        let executor = self.executor.as_mut().ok_or(Error::SessionClosed)?;
        trace!(
            ins = format_args!("{:#04x}", command.ins),
            "Dispatching command"
        );

        match executor.transmit(command) {
            Ok(response) => Ok(response),
            Err(err) if err.is_transport() => {
                warn!(error = %err, "Transport failed, closing session");
                self.release();
                Err(Error::Transport(err))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Drop the transport after a failure, closing it on a best effort basis
    fn release(&mut self) {
        if let Some(mut executor) = self.executor.take() {
            if let Err(err) = executor.close() {
                debug!(error = %err, "Error closing transport");
            }
        }
        self.clear();
    }

    fn clear(&mut self) {
        self.state = SessionState::Disconnected;
        self.certificates.clear();
    }
}
