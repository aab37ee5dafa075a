use std::str::FromStr;

use derive_more::Display;

use crate::Error;

/// A PIV key slot
///
/// Each slot pairs a private key reference with the data object holding its
/// certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[repr(u8)]
pub enum Slot {
    /// PIV Authentication
    #[display("Slot 9A")]
    Authentication = 0x9A,
    /// Digital Signature
    #[display("Slot 9C")]
    Signature = 0x9C,
    /// Key Management
    #[display("Slot 9D")]
    KeyManagement = 0x9D,
    /// Card Authentication
    #[display("Slot 9E")]
    CardAuthentication = 0x9E,
}

impl Slot {
    /// All slots, in key reference order
    pub const ALL: [Self; 4] = [
        Self::Authentication,
        Self::Signature,
        Self::KeyManagement,
        Self::CardAuthentication,
    ];

    /// Key reference used as P2 of GENERAL AUTHENTICATE
    pub const fn id(self) -> u8 {
        self as u8
    }

    /// Human readable name of the slot's purpose
    pub const fn name(self) -> &'static str {
        match self {
            Self::Authentication => "PIV Authentication",
            Self::Signature => "Digital Signature",
            Self::KeyManagement => "Key Management",
            Self::CardAuthentication => "Card Authentication",
        }
    }

    /// Tag of the data object holding the slot's certificate
    pub const fn object_tag(self) -> u32 {
        match self {
            Self::Authentication => 0x5FC105,
            Self::Signature => 0x5FC10A,
            Self::KeyManagement => 0x5FC10B,
            Self::CardAuthentication => 0x5FC101,
        }
    }
}

impl TryFrom<u8> for Slot {
    type Error = Error;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|slot| slot.id() == id)
            .ok_or(Error::InvalidData("Unknown slot"))
    }
}

impl From<Slot> for u8 {
    fn from(slot: Slot) -> Self {
        slot.id()
    }
}

impl FromStr for Slot {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .trim()
            .trim_start_matches("0x")
            .trim_start_matches("0X");
        let id = u8::from_str_radix(digits, 16).map_err(|_| Error::InvalidData("Invalid slot"))?;
        Self::try_from(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_attributes() {
        assert_eq!(Slot::Authentication.id(), 0x9A);
        assert_eq!(Slot::CardAuthentication.object_tag(), 0x5FC101);
        assert_eq!(Slot::KeyManagement.to_string(), "Slot 9D");
        assert_eq!(Slot::Signature.name(), "Digital Signature");
    }

    #[test]
    fn test_slot_conversions() {
        for slot in Slot::ALL {
            assert_eq!(Slot::try_from(slot.id()).unwrap(), slot);
        }
        assert!(Slot::try_from(0x9B).is_err());

        assert_eq!("9a".parse::<Slot>().unwrap(), Slot::Authentication);
        assert_eq!("9C".parse::<Slot>().unwrap(), Slot::Signature);
        assert_eq!("0x9e".parse::<Slot>().unwrap(), Slot::CardAuthentication);
        assert!("zz".parse::<Slot>().is_err());
        assert!("82".parse::<Slot>().is_err());
    }
}
