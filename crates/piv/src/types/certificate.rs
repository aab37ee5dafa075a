use bytes::{Bytes, BytesMut};

use crate::constants::{CERT_INFO_COMPRESSED, tags};
use crate::tlv;
use crate::types::Slot;
use crate::{Error, Result};

/// An X.509 certificate as stored in a PIV slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    slot: Slot,
    der: Bytes,
    compressed: bool,
}

impl Certificate {
    /// Create a certificate bound to `slot`
    pub fn new(slot: Slot, der: impl Into<Bytes>) -> Self {
        Self {
            slot,
            der: der.into(),
            compressed: false,
        }
    }

    /// Mark the stored bytes as gzip compressed
    pub const fn with_compressed(mut self, compressed: bool) -> Self {
        self.compressed = compressed;
        self
    }

    /// Slot the certificate belongs to
    pub const fn slot(&self) -> Slot {
        self.slot
    }

    /// Certificate bytes as stored on the card
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Consume and return the certificate bytes
    pub fn into_der(self) -> Bytes {
        self.der
    }

    /// Whether CertInfo flags the bytes as compressed
    pub const fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// Decode the contents of a certificate data object (inside `53`)
    pub(crate) fn from_object(slot: Slot, object: &[u8]) -> Result<Self> {
        if object.is_empty() {
            return Err(Error::CertificateNotFound(slot));
        }

        let der = tlv::require(object, tags::CERTIFICATE.into())?;
        let compressed = match tlv::find(object, tags::CERT_INFO.into())? {
            Some(info) => info.first().is_some_and(|b| b & CERT_INFO_COMPRESSED != 0),
            None => false,
        };

        Ok(Self {
            slot,
            der: Bytes::copy_from_slice(der),
            compressed,
        })
    }

    /// Encode the contents of the certificate data object
    pub(crate) fn to_object(&self) -> Bytes {
        let cert_info = if self.compressed {
            CERT_INFO_COMPRESSED
        } else {
            0x00
        };

        let mut buf = BytesMut::with_capacity(self.der.len() + 12);
        tlv::put_tlv(&mut buf, tags::CERTIFICATE.into(), &self.der);
        tlv::put_tlv(&mut buf, tags::CERT_INFO.into(), &[cert_info]);
        tlv::put_tlv(&mut buf, tags::ERROR_DETECTION.into(), &[]);
        buf.freeze()
    }
}

impl AsRef<[u8]> for Certificate {
    fn as_ref(&self) -> &[u8] {
        &self.der
    }
}
