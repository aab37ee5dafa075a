//! Management key handling for the PIV witness/challenge protocol
//!
//! Management key authentication encrypts exactly one cipher block at a time in
//! ECB mode, so only single block helpers are exposed.

use core::fmt;

use aes::{Aes128, Aes192, Aes256};
use cipher::{Block, BlockDecrypt, BlockEncrypt, KeyInit};
use des::TdesEde3;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::constants::DEFAULT_MANAGEMENT_KEY;
use crate::{Error, Result};

/// Symmetric algorithm of the card management key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ManagementKeyType {
    /// Three key Triple-DES (24 bytes)
    #[default]
    TripleDes,
    /// AES-128
    Aes128,
    /// AES-192
    Aes192,
    /// AES-256
    Aes256,
}

impl ManagementKeyType {
    /// Algorithm identifier used in P1 of GENERAL AUTHENTICATE
    pub const fn algorithm_id(self) -> u8 {
        match self {
            Self::TripleDes => 0x03,
            Self::Aes128 => 0x08,
            Self::Aes192 => 0x0A,
            Self::Aes256 => 0x0C,
        }
    }

    /// Required key length in bytes
    pub const fn key_len(self) -> usize {
        match self {
            Self::TripleDes | Self::Aes192 => 24,
            Self::Aes128 => 16,
            Self::Aes256 => 32,
        }
    }

    /// Cipher block length, which is also the witness and challenge length
    pub const fn block_len(self) -> usize {
        match self {
            Self::TripleDes => 8,
            Self::Aes128 | Self::Aes192 | Self::Aes256 => 16,
        }
    }
}

/// Card management key
///
/// Key bytes are wiped when the value is dropped and never printed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ManagementKey {
    #[zeroize(skip)]
    key_type: ManagementKeyType,
    bytes: Vec<u8>,
}

impl ManagementKey {
    /// Create a management key, checking the length against the algorithm
    pub fn new(key_type: ManagementKeyType, bytes: &[u8]) -> Result<Self> {
        if bytes.len() != key_type.key_len() {
            return Err(Error::InvalidManagementKey("key length does not match algorithm"));
        }
        Ok(Self {
            key_type,
            bytes: bytes.to_vec(),
        })
    }

    /// Create a Triple-DES management key
    pub fn triple_des(bytes: &[u8]) -> Result<Self> {
        Self::new(ManagementKeyType::TripleDes, bytes)
    }

    /// Parse a management key from hex, ignoring surrounding whitespace
    pub fn from_hex(key_type: ManagementKeyType, hex_key: &str) -> Result<Self> {
        let mut bytes = hex::decode(hex_key.trim())
            .map_err(|_| Error::InvalidManagementKey("key is not valid hex"))?;
        let key = Self::new(key_type, &bytes);
        bytes.zeroize();
        key
    }

    /// Key algorithm
    pub const fn key_type(&self) -> ManagementKeyType {
        self.key_type
    }

    /// Encrypt one block (ECB)
    pub fn encrypt_block(&self, block: &[u8]) -> Result<Vec<u8>> {
        match self.key_type {
            ManagementKeyType::TripleDes => crypt_block::<TdesEde3>(&self.bytes, block, true),
            ManagementKeyType::Aes128 => crypt_block::<Aes128>(&self.bytes, block, true),
            ManagementKeyType::Aes192 => crypt_block::<Aes192>(&self.bytes, block, true),
            ManagementKeyType::Aes256 => crypt_block::<Aes256>(&self.bytes, block, true),
        }
    }

    /// Decrypt one block (ECB)
    pub fn decrypt_block(&self, block: &[u8]) -> Result<Vec<u8>> {
        match self.key_type {
            ManagementKeyType::TripleDes => crypt_block::<TdesEde3>(&self.bytes, block, false),
            ManagementKeyType::Aes128 => crypt_block::<Aes128>(&self.bytes, block, false),
            ManagementKeyType::Aes192 => crypt_block::<Aes192>(&self.bytes, block, false),
            ManagementKeyType::Aes256 => crypt_block::<Aes256>(&self.bytes, block, false),
        }
    }
}

impl Default for ManagementKey {
    fn default() -> Self {
        Self {
            key_type: ManagementKeyType::TripleDes,
            bytes: DEFAULT_MANAGEMENT_KEY.to_vec(),
        }
    }
}

impl fmt::Debug for ManagementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagementKey")
            .field("key_type", &self.key_type)
            .field("bytes", &"<redacted>")
            .finish()
    }
}

fn crypt_block<C>(key: &[u8], input: &[u8], encrypt: bool) -> Result<Vec<u8>>
where
    C: BlockEncrypt + BlockDecrypt + KeyInit,
{
    let cipher =
        C::new_from_slice(key).map_err(|_| Error::InvalidManagementKey("invalid key length"))?;
    if input.len() != C::block_size() {
        return Err(Error::MalformedResponse(format!(
            "expected a {} byte block, got {}",
            C::block_size(),
            input.len()
        )));
    }

    let mut block = Block::<C>::clone_from_slice(input);
    if encrypt {
        cipher.encrypt_block(&mut block);
    } else {
        cipher.decrypt_block(&mut block);
    }
    Ok(block.to_vec())
}

/// Generate a random host challenge of one block
pub(crate) fn random_challenge(key_type: ManagementKeyType) -> Vec<u8> {
    let mut challenge = vec![0u8; key_type.block_len()];
    rand::rng().fill_bytes(&mut challenge);
    challenge
}
