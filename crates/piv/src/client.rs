//! PIV client
//!
//! Slot addressed certificate and signing operations on top of a [`Session`].

use bytes::Bytes;
use pivkit_apdu_core::CardTransport;
use tracing::{debug, instrument};

use crate::commands::{
    GeneralAuthenticateCommand, GetDataCommand, GetVersionCommand, PutDataCommand,
};
use crate::config::SessionConfig;
use crate::constants::tags;
use crate::crypto::ManagementKey;
use crate::session::Session;
use crate::tlv;
use crate::types::{Certificate, Signature, SignatureAlgorithm, Slot, Version};
use crate::{Error, Result};

/// Client for the PIV application
#[derive(Debug)]
pub struct PivClient<T: CardTransport> {
    session: Session<T>,
}

impl<T: CardTransport> PivClient<T> {
    /// Connect to the PIV application over `transport`
    pub fn connect(transport: T, config: SessionConfig) -> Result<Self> {
        Session::connect(transport, config).map(Self::new)
    }

    /// Wrap an existing session
    pub const fn new(session: Session<T>) -> Self {
        Self { session }
    }

    /// Underlying session
    pub const fn session(&self) -> &Session<T> {
        &self.session
    }

    /// Underlying session, mutably
    pub const fn session_mut(&mut self) -> &mut Session<T> {
        &mut self.session
    }

    /// Unwrap the session
    pub fn into_session(self) -> Session<T> {
        self.session
    }

    /// Read the certificate stored in `slot`
    ///
    /// Certificates are cached for the lifetime of the connection, so repeated
    /// reads of one slot reach the card only once.
    #[instrument(level = "debug", skip(self), fields(slot = %slot))]
    pub fn get_certificate(&mut self, slot: Slot) -> Result<Certificate> {
        if let Some(certificate) = self.session.cached_certificate(slot) {
            debug!("Certificate served from cache");
            return Ok(certificate.clone());
        }

        let object = self
            .session
            .dispatch(&GetDataCommand::new(slot.object_tag()))?
            .ok_or(Error::CertificateNotFound(slot))?;
        let certificate = Certificate::from_object(slot, &object)?;

        debug!(len = certificate.der().len(), "Certificate read from card");
        self.session.cache_certificate(certificate.clone());
        Ok(certificate)
    }

    /// Store a certificate in `slot`
    #[instrument(level = "debug", skip(self, der), fields(slot = %slot))]
    pub fn put_certificate(
        &mut self,
        slot: Slot,
        der: impl Into<Bytes>,
        compressed: bool,
    ) -> Result<()> {
        self.session.require_authenticated()?;

        let certificate = Certificate::new(slot, der).with_compressed(compressed);
        if certificate.der().is_empty() {
            return Err(Error::InvalidData("Certificate is empty"));
        }

        self.session.invalidate_certificate(slot);
        let command = PutDataCommand::new(slot.object_tag(), &certificate.to_object());
        self.authenticated_dispatch(&command)?;

        self.session.cache_certificate(certificate);
        Ok(())
    }

    /// Remove the certificate from `slot`
    #[instrument(level = "debug", skip(self), fields(slot = %slot))]
    pub fn delete_certificate(&mut self, slot: Slot) -> Result<()> {
        self.session.require_authenticated()?;

        self.session.invalidate_certificate(slot);
        self.authenticated_dispatch(&PutDataCommand::delete(slot.object_tag()))
    }

    /// Sign `input` with the private key in `slot`
    ///
    /// ECC algorithms take the digest itself; RSA algorithms take a block of
    /// the modulus length that the caller has already padded.
    #[instrument(level = "debug", skip(self, input), fields(slot = %slot, algorithm = %algorithm))]
    pub fn sign(
        &mut self,
        slot: Slot,
        algorithm: SignatureAlgorithm,
        input: &[u8],
    ) -> Result<Signature> {
        self.session.require_authenticated()?;

        if input.len() != algorithm.input_len() {
            return Err(Error::InvalidDigestLength {
                algorithm,
                expected: algorithm.input_len(),
                actual: input.len(),
            });
        }

        let command = GeneralAuthenticateCommand::sign(algorithm, slot, input);
        let template = self.authenticated_dispatch(&command)?;
        let signature = tlv::require(&template, tags::RESPONSE.into())?;
        if signature.is_empty() {
            return Err(Error::MalformedResponse("empty signature".to_string()));
        }

        Ok(Signature::from(template.slice_ref(signature)))
    }

    /// Authenticate with the card management key
    pub fn authenticate_management_key(&mut self, key: &ManagementKey) -> Result<()> {
        self.session.authenticate(key)
    }

    /// Run `op`, re-authenticating and retrying once if it needs authentication
    ///
    /// `key_provider` is asked for a key at most once; returning `None` gives
    /// up with the original [`Error::AuthenticationRequired`].
    pub fn with_reauthentication<R, K, F>(&mut self, key_provider: K, mut op: F) -> Result<R>
    where
        K: FnOnce() -> Option<ManagementKey>,
        F: FnMut(&mut Self) -> Result<R>,
    {
        match op(self) {
            Err(Error::AuthenticationRequired) => {
                let Some(key) = key_provider() else {
                    return Err(Error::AuthenticationRequired);
                };
                debug!("Re-authenticating before retrying operation");
                self.authenticate_management_key(&key)?;
                op(self)
            }
            other => other,
        }
    }

    /// Read the applet firmware version
    pub fn version(&mut self) -> Result<Version> {
        self.session.dispatch(&GetVersionCommand)
    }

    /// Release the transport
    pub fn disconnect(&mut self) -> Result<()> {
        self.session.disconnect()
    }

    /// Dispatch a command that needs authentication, downgrading the session
    /// when the card refuses it
    fn authenticated_dispatch<C>(&mut self, command: &C) -> Result<C::Success>
    where
        C: pivkit_apdu_core::ApduCommand<Error = Error>,
    {
        self.session.dispatch(command).inspect_err(|err| match err {
            Error::AuthenticationRequired => self.session.drop_authentication(),
            Error::Locked => self.session.lock(),
            _ => {}
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTransport;
    use hex_literal::hex;

    fn client(responses: &[&[u8]]) -> PivClient<ScriptedTransport> {
        let mut transport = ScriptedTransport::new(&[&hex!("90 00")]);
        for response in responses {
            transport.push(response);
        }
        PivClient::connect(transport, SessionConfig::default()).unwrap()
    }

    fn sent(client: &PivClient<ScriptedTransport>) -> usize {
        client.session().transport().map_or(0, |t| t.sent().len())
    }

    #[test]
    fn test_get_certificate_is_cached() {
        let mut client = client(&[&hex!("53 07 70 03 AA BB CC 71 00 90 00")]);

        let first = client.get_certificate(Slot::Authentication).unwrap();
        let second = client.get_certificate(Slot::Authentication).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.der(), &hex!("AA BB CC"));
        // SELECT plus one GET DATA
        assert_eq!(sent(&client), 2);
    }

    #[test]
    fn test_get_certificate_not_found() {
        let mut client = client(&[&hex!("6A 82")]);
        assert!(matches!(
            client.get_certificate(Slot::CardAuthentication),
            Err(Error::CertificateNotFound(Slot::CardAuthentication))
        ));
    }

    #[test]
    fn test_sign_requires_authentication() {
        let mut client = client(&[]);
        let before = sent(&client);
        assert!(matches!(
            client.sign(Slot::Signature, SignatureAlgorithm::EccP256, &[0u8; 32]),
            Err(Error::AuthenticationRequired)
        ));
        assert!(matches!(
            client.put_certificate(Slot::Signature, vec![0x30], false),
            Err(Error::AuthenticationRequired)
        ));
        assert_eq!(sent(&client), before);
    }

    #[test]
    fn test_reauthentication_declined() {
        let mut client = client(&[]);
        let mut calls = 0;
        let result = client.with_reauthentication(
            || None,
            |client| {
                calls += 1;
                client.sign(Slot::Signature, SignatureAlgorithm::EccP256, &[0u8; 32])
            },
        );
        assert!(matches!(result, Err(Error::AuthenticationRequired)));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_raw_put_data_invalidates_cache() {
        let mut client = client(&[
            &hex!("53 07 70 03 AA BB CC 71 00 90 00"),
            &hex!("90 00"),
            &hex!("53 07 70 03 11 22 33 71 00 90 00"),
        ]);
        assert_eq!(
            client.get_certificate(Slot::Authentication).unwrap().der(),
            &hex!("AA BB CC")
        );

        let put = pivkit_apdu_core::Command::new_with_data(
            0x00,
            0xDB,
            0x3F,
            0xFF,
            hex!("5C 03 5F C1 05 53 07 70 03 11 22 33 71 00").to_vec(),
        );
        client.session_mut().execute(&put).unwrap();

        assert_eq!(
            client.get_certificate(Slot::Authentication).unwrap().der(),
            &hex!("11 22 33")
        );
        // SELECT, GET DATA, raw PUT DATA, GET DATA
        assert_eq!(sent(&client), 4);
    }

    #[test]
    fn test_version() {
        let mut client = client(&[&hex!("05 04 03 90 00")]);
        assert_eq!(client.version().unwrap().to_string(), "5.4.3");
    }
}
