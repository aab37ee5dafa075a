use bytes::Bytes;
use pivkit_apdu_core::{ApduCommand, ApduResponse, ExpectedLength, Response};

use super::{CLA_ISO, tag_list};
use crate::constants::{ins, tags};
use crate::tlv;
use crate::{Error, Result};

/// PUT DATA for a PIV data object
///
/// Large objects such as certificates are sent with extended length framing.
#[derive(Debug, Clone)]
pub struct PutDataCommand {
    object_tag: u32,
    data: Bytes,
}

impl PutDataCommand {
    /// Replace the data object with `contents` (the value of the `53` wrapper)
    pub fn new(object_tag: u32, contents: &[u8]) -> Self {
        let mut data = tag_list(object_tag);
        tlv::put_tlv(&mut data, tags::DATA_OBJECT.into(), contents);
        Self {
            object_tag,
            data: data.freeze(),
        }
    }

    /// Clear the data object
    pub fn delete(object_tag: u32) -> Self {
        Self::new(object_tag, &[])
    }

    /// Tag of the object being written
    pub const fn object_tag(&self) -> u32 {
        self.object_tag
    }
}

impl ApduCommand for PutDataCommand {
    type Success = ();
    type Error = Error;

    fn class(&self) -> u8 {
        CLA_ISO
    }

    fn instruction(&self) -> u8 {
        ins::PUT_DATA
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
        None
    }

    fn parse_response(response: Response) -> Result<()> {
        match response.status() {
            status if status.is_success() => Ok(()),
            status => Err(Error::from_status(status)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Slot;
    use hex_literal::hex;

    #[test]
    fn test_delete_encoding() {
        let cmd = PutDataCommand::delete(Slot::Signature.object_tag());
        assert_eq!(
            cmd.to_bytes().unwrap().as_ref(),
            &hex!("00 DB 3F FF 07 5C 03 5F C1 0A 53 00")
        );
    }

    #[test]
    fn test_large_object_uses_extended_length() {
        let contents = vec![0x42; 600];
        let cmd = PutDataCommand::new(Slot::KeyManagement.object_tag(), &contents);
        let bytes = cmd.to_bytes().unwrap();

        // 5C 03 xx xx xx 53 82 02 58 + contents
        let data_len = 5 + 4 + 600;
        assert_eq!(&bytes[..4], &hex!("00 DB 3F FF"));
        assert_eq!(bytes[4], 0x00);
        assert_eq!(u16::from_be_bytes([bytes[5], bytes[6]]) as usize, data_len);
        assert_eq!(&bytes[7..16], &hex!("5C 03 5F C1 0B 53 82 02 58"));
        assert_eq!(bytes.len(), 7 + data_len);
    }

    #[test]
    fn test_put_data_response() {
        assert!(PutDataCommand::parse_response(Response::success(Bytes::new())).is_ok());
        assert!(matches!(
            PutDataCommand::parse_response(Response::error((0x69, 0x82))),
            Err(Error::AuthenticationRequired)
        ));
        assert!(matches!(
            PutDataCommand::parse_response(Response::error((0x6A, 0x80))),
            Err(Error::IncorrectParameters)
        ));
    }
}
