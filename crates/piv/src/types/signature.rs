use bytes::Bytes;
use derive_more::{Display, From, Into};

use crate::Error;

/// Asymmetric algorithm of a slot key, as used in P1 of GENERAL AUTHENTICATE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[repr(u8)]
pub enum SignatureAlgorithm {
    /// RSA with a 1024 bit modulus
    #[display("RSA-1024")]
    Rsa1024 = 0x06,
    /// RSA with a 2048 bit modulus
    #[display("RSA-2048")]
    Rsa2048 = 0x07,
    /// ECDSA over P-256
    #[display("ECC P-256")]
    EccP256 = 0x11,
    /// ECDSA over P-384
    #[display("ECC P-384")]
    EccP384 = 0x14,
}

impl SignatureAlgorithm {
    /// Algorithm identifier
    pub const fn id(self) -> u8 {
        self as u8
    }

    /// Number of bytes the card expects to sign
    ///
    /// RSA takes a block of the modulus length, already padded by the caller.
    /// ECC takes the raw digest.
    pub const fn input_len(self) -> usize {
        match self {
            Self::Rsa1024 => 128,
            Self::Rsa2048 => 256,
            Self::EccP256 => 32,
            Self::EccP384 => 48,
        }
    }

    /// Whether the input is a padded RSA block rather than a digest
    pub const fn is_rsa(self) -> bool {
        matches!(self, Self::Rsa1024 | Self::Rsa2048)
    }
}

impl TryFrom<u8> for SignatureAlgorithm {
    type Error = Error;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        match id {
            0x06 => Ok(Self::Rsa1024),
            0x07 => Ok(Self::Rsa2048),
            0x11 => Ok(Self::EccP256),
            0x14 => Ok(Self::EccP384),
            _ => Err(Error::InvalidData("Unknown signature algorithm")),
        }
    }
}

/// Raw signature bytes returned by the card
///
/// RSA signatures are the raw modular exponentiation result; ECC signatures
/// are DER encoded `ECDSA-Sig-Value` structures.
#[derive(Debug, Clone, PartialEq, Eq, From, Into)]
pub struct Signature(Bytes);

impl Signature {
    /// Signature bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Number of signature bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the card returned an empty signature
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for Signature {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
