use bytes::{Bytes, BytesMut};
use pivkit_apdu_core::{ApduCommand, ApduResponse, ExpectedLength, Response};

use super::CLA_ISO;
use crate::constants::{MANAGEMENT_KEY_REFERENCE, ins, tags};
use crate::tlv;
use crate::types::{SignatureAlgorithm, Slot};
use crate::{Error, Result};

/// GENERAL AUTHENTICATE with a dynamic authentication template
///
/// Used both for the management key witness/challenge exchange and for
/// private key operations in a slot.
#[derive(Debug, Clone)]
pub struct GeneralAuthenticateCommand {
    algorithm: u8,
    key_reference: u8,
    data: Bytes,
}

impl GeneralAuthenticateCommand {
    /// Build a command whose data is `7C` wrapping `template`
    pub fn new(algorithm: u8, key_reference: u8, template: &[u8]) -> Self {
        Self {
            algorithm,
            key_reference,
            data: tlv::encode(tags::DYNAMIC_AUTH_TEMPLATE.into(), template).freeze(),
        }
    }

    /// Ask the card for an encrypted witness: `7C 02 80 00`
    pub fn request_witness(algorithm: u8) -> Self {
        let mut template = BytesMut::with_capacity(2);
        tlv::put_tlv(&mut template, tags::WITNESS.into(), &[]);
        Self::new(algorithm, MANAGEMENT_KEY_REFERENCE, &template)
    }

    /// Return the decrypted witness together with a host challenge
    pub fn respond_to_witness(algorithm: u8, witness: &[u8], challenge: &[u8]) -> Self {
        let mut template = BytesMut::with_capacity(witness.len() + challenge.len() + 4);
        tlv::put_tlv(&mut template, tags::WITNESS.into(), witness);
        tlv::put_tlv(&mut template, tags::CHALLENGE.into(), challenge);
        Self::new(algorithm, MANAGEMENT_KEY_REFERENCE, &template)
    }

    /// Sign `input` with the key in `slot`: `7C { 82 00, 81 input }`
    pub fn sign(algorithm: SignatureAlgorithm, slot: Slot, input: &[u8]) -> Self {
        let mut template = BytesMut::with_capacity(input.len() + 8);
        tlv::put_tlv(&mut template, tags::RESPONSE.into(), &[]);
        tlv::put_tlv(&mut template, tags::CHALLENGE.into(), input);
        Self::new(algorithm.id(), slot.id(), &template)
    }

    /// Key reference addressed by the command
    pub const fn key_reference(&self) -> u8 {
        self.key_reference
    }
}

impl ApduCommand for GeneralAuthenticateCommand {
    /// Contents of the `7C` template in the response
    type Success = Bytes;
    type Error = Error;

    fn class(&self) -> u8 {
        CLA_ISO
    }

    fn instruction(&self) -> u8 {
        ins::GENERAL_AUTHENTICATE
    }

    fn p1(&self) -> u8 {
        self.algorithm
    }

    fn p2(&self) -> u8 {
        self.key_reference
    }

    fn data(&self) -> Option<&[u8]> {
        Some(&self.data)
    }

    fn expected_length(&self) -> Option<ExpectedLength> {
        Some(0)
    }

    fn parse_response(response: Response) -> Result<Bytes> {
        let status = response.status();
        if !status.is_success() {
            return Err(Error::from_status(status));
        }

        let payload = response.into_payload();
        let template = tlv::unwrap(&payload, tags::DYNAMIC_AUTH_TEMPLATE.into())?;
        Ok(payload.slice_ref(template))
    }
}
