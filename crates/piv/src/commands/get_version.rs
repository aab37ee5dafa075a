use pivkit_apdu_core::{ApduCommand, ApduResponse, ExpectedLength, Response};

use super::CLA_ISO;
use crate::constants::ins;
use crate::types::Version;
use crate::{Error, Result};

/// GET VERSION (vendor extension reporting the applet firmware version)
#[derive(Debug, Clone, Copy, Default)]
pub struct GetVersionCommand;

impl ApduCommand for GetVersionCommand {
    type Success = Version;
    type Error = Error;

    fn class(&self) -> u8 {
        CLA_ISO
    }

    fn instruction(&self) -> u8 {
        ins::GET_VERSION
    }

    fn p1(&self) -> u8 {
        0x00
    }

    fn p2(&self) -> u8 {
        0x00
    }

    fn data(&self) -> Option<&[u8]> {
        None
    }

    fn expected_length(&self) -> Option<ExpectedLength> {
        None
    }

    fn parse_response(response: Response) -> Result<Version> {
        let status = response.status();
        if !status.is_success() {
            return Err(Error::from_status(status));
        }
        Version::try_from(response.payload())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_get_version() {
        assert_eq!(
            GetVersionCommand.to_bytes().unwrap().as_ref(),
            &hex!("00 FD 00 00")
        );

        let version =
            GetVersionCommand::parse_response(Response::success(hex!("05 07 02").to_vec()))
                .unwrap();
        assert_eq!(version, Version::from((5, 7, 2)));
    }
}
