use derive_more::{Display, From, Into};

/// Firmware version reported by GET VERSION
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, From, Into)]
#[display("{}.{}.{}", major, minor, patch)]
pub struct Version {
    /// Major version
    pub major: u8,
    /// Minor version
    pub minor: u8,
    /// Patch level
    pub patch: u8,
}

impl TryFrom<&[u8]> for Version {
    type Error = crate::Error;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        match *bytes {
            [major, minor, patch] => Ok(Self {
                major,
                minor,
                patch,
            }),
            _ => Err(Self::Error::MalformedResponse(format!(
                "version must be 3 bytes, got {}",
                bytes.len()
            ))),
        }
    }
}
