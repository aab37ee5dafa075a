//! Typed PIV commands
//!
//! Each command knows its APDU encoding and how to interpret the card's
//! status word and payload.

pub mod general_authenticate;
pub mod get_data;
pub mod get_version;
pub mod put_data;
pub mod select;

pub use general_authenticate::GeneralAuthenticateCommand;
pub use get_data::GetDataCommand;
pub use get_version::GetVersionCommand;
pub use put_data::PutDataCommand;
pub use select::SelectCommand;

use bytes::BytesMut;

use crate::constants::tags;
use crate::tlv;

/// Class byte used for all PIV commands
pub const CLA_ISO: u8 = 0x00;

/// Build the `5C` tag list naming a data object
fn tag_list(object_tag: u32) -> BytesMut {
    let mut tag_bytes = BytesMut::with_capacity(3);
    tlv::put_tag(&mut tag_bytes, object_tag);
    tlv::encode(tags::TAG_LIST.into(), &tag_bytes)
}
