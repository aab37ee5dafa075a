use bytes::Bytes;
use pivkit_apdu_core::{ApduCommand, ApduResponse, ExpectedLength, Response};

use super::CLA_ISO;
use crate::constants::{PIV_AID, ins};
use crate::{Error, Result};

/// SELECT by application identifier
#[derive(Debug, Clone)]
pub struct SelectCommand {
    aid: Bytes,
}

impl SelectCommand {
    /// Select the application with the given AID
    pub fn with_aid(aid: impl Into<Bytes>) -> Self {
        Self { aid: aid.into() }
    }

    /// Select the PIV application
    pub fn piv() -> Self {
        Self::with_aid(Bytes::from_static(PIV_AID))
    }

    /// AID being selected
    pub fn aid(&self) -> &[u8] {
        &self.aid
    }
}

impl ApduCommand for SelectCommand {
    /// Application property template returned by the card, possibly empty
    type Success = Bytes;
    type Error = Error;

    fn class(&self) -> u8 {
        CLA_ISO
    }

    fn instruction(&self) -> u8 {
        ins::SELECT
    }

    fn p1(&self) -> u8 {
        0x04
    }

    fn p2(&self) -> u8 {
        0x00
    }

    fn data(&self) -> Option<&[u8]> {
        Some(&self.aid)
    }

    fn expected_length(&self) -> Option<ExpectedLength> {
        Some(0)
    }

    fn parse_response(response: Response) -> Result<Bytes> {
        let status = response.status();
        if status.is_success() {
            Ok(response.into_payload())
        } else if status.is_file_not_found() {
            Err(Error::ApplicationNotFound)
        } else {
            Err(Error::from_status(status))
        }
    }
}
