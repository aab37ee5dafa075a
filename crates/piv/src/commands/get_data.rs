use bytes::Bytes;
use pivkit_apdu_core::{ApduCommand, ApduResponse, ExpectedLength, Response};

use super::{CLA_ISO, tag_list};
use crate::constants::{ins, tags};
use crate::tlv;
use crate::{Error, Result};

/// GET DATA for a PIV data object
#[derive(Debug, Clone)]
pub struct GetDataCommand {
    object_tag: u32,
    data: Bytes,
}

impl GetDataCommand {
    /// Read the data object with the given tag
    pub fn new(object_tag: u32) -> Self {
        Self {
            object_tag,
            data: tag_list(object_tag).freeze(),
        }
    }

    /// Tag of the requested object
    pub const fn object_tag(&self) -> u32 {
        self.object_tag
    }
}

impl ApduCommand for GetDataCommand {
    /// Contents of the `53` wrapper, or `None` when the object does not exist
    type Success = Option<Bytes>;
    type Error = Error;

    fn class(&self) -> u8 {
        CLA_ISO
    }

    fn instruction(&self) -> u8 {
        ins::GET_DATA
    }

    fn p1(&self) -> u8 {
        0x3F
    }

    fn p2(&self) -> u8 {
        0xFF
    }

    fn data(&self) -> Option<&[u8]> {
        Some(&self.data)
    }

    fn expected_length(&self) -> Option<ExpectedLength> {
        Some(0)
    }

    fn parse_response(response: Response) -> Result<Option<Bytes>> {
        let status = response.status();
        if status.is_file_not_found() {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Error::from_status(status));
        }

        let payload = response.into_payload();
        let object = tlv::unwrap(&payload, tags::DATA_OBJECT.into())?;
        Ok(Some(payload.slice_ref(object)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Slot;
    use hex_literal::hex;

    #[test]
    fn test_get_data_encoding() {
        let cmd = GetDataCommand::new(Slot::Authentication.object_tag());
        assert_eq!(
            cmd.to_bytes().unwrap().as_ref(),
            &hex!("00 CB 3F FF 05 5C 03 5F C1 05 00")
        );
    }

    #[test]
    fn test_get_data_response() {
        let ok = Response::new(hex!("53 05 70 03 AA BB CC").to_vec(), (0x90, 0x00));
        let object = GetDataCommand::parse_response(ok).unwrap().unwrap();
        assert_eq!(object.as_ref(), &hex!("70 03 AA BB CC"));

        let missing = Response::error((0x6A, 0x82));
        assert!(GetDataCommand::parse_response(missing).unwrap().is_none());

        let garbage = Response::new(hex!("70 05 AA").to_vec(), (0x90, 0x00));
        assert!(matches!(
            GetDataCommand::parse_response(garbage),
            Err(Error::MalformedResponse(_))
        ));

        let denied = Response::error((0x69, 0x82));
        assert!(matches!(
            GetDataCommand::parse_response(denied),
            Err(Error::AuthenticationRequired)
        ));
    }
}
