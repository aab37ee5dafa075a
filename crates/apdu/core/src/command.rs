//! APDU command definitions and traits
//!
//! This module provides types and traits for working with APDU commands
//! according to ISO/IEC 7816-4, covering both short and extended length
//! framing.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::{Error, Response, Result};

/// Expected length type for APDU commands
///
/// `0` requests the maximum the card can return (256 bytes in short form,
/// 65536 in extended form). Values above 255 force extended framing.
pub type ExpectedLength = u16;

/// Largest data field that fits a short Lc byte
pub const SHORT_MAX_DATA: usize = 0xFF;

/// Largest data field that fits an extended Lc field
pub const EXTENDED_MAX_DATA: usize = 0xFFFF;

/// Core trait for APDU commands
pub trait ApduCommand {
    /// Success response type
    type Success;

    /// Error response type
    type Error: fmt::Debug;

    /// Command class (CLA)
    fn class(&self) -> u8;

    /// Instruction code (INS)
    fn instruction(&self) -> u8;

    /// First parameter (P1)
    fn p1(&self) -> u8;

    /// Second parameter (P2)
    fn p2(&self) -> u8;

    /// Command payload data (optional)
    fn data(&self) -> Option<&[u8]>;

    /// Expected response length (optional)
    fn expected_length(&self) -> Option<ExpectedLength>;

    /// Whether this command needs extended length framing
    fn is_extended(&self) -> bool {
        let data_len = self.data().map_or(0, <[u8]>::len);
        data_len > SHORT_MAX_DATA || self.expected_length().is_some_and(|le| le > 0xFF)
    }

    /// Convert to raw APDU bytes
    fn to_bytes(&self) -> Result<Bytes> {
        let data = self.data().filter(|d| !d.is_empty());
        if let Some(data) = data {
            if data.len() > EXTENDED_MAX_DATA {
                return Err(Error::InvalidCommandLength(data.len()));
            }
        }

        let extended = self.is_extended();
        let mut buffer = BytesMut::with_capacity(self.command_length());

        // Header: CLA, INS, P1, P2
        buffer.put_u8(self.class());
        buffer.put_u8(self.instruction());
        buffer.put_u8(self.p1());
        buffer.put_u8(self.p2());

        if extended {
            // Extended length: a single 00 marker precedes the first length field
            match data {
                Some(data) => {
                    buffer.put_u8(0x00);
                    buffer.put_u16(data.len() as u16);
                    buffer.put_slice(data);
                    if let Some(le) = self.expected_length() {
                        buffer.put_u16(le);
                    }
                }
                None => {
                    if let Some(le) = self.expected_length() {
                        buffer.put_u8(0x00);
                        buffer.put_u16(le);
                    }
                }
            }
        } else {
            if let Some(data) = data {
                buffer.put_u8(data.len() as u8);
                buffer.put_slice(data);
            }
            if let Some(le) = self.expected_length() {
                buffer.put_u8(le as u8);
            }
        }

        Ok(buffer.freeze())
    }

    /// Calculate length of serialized command
    fn command_length(&self) -> usize {
        // Header (CLA, INS, P1, P2) is always 4 bytes
        let mut length = 4;
        let data_len = self.data().map_or(0, <[u8]>::len);
        let has_le = self.expected_length().is_some();

        if self.is_extended() {
            if data_len > 0 {
                length += 3 + data_len;
                if has_le {
                    length += 2;
                }
            } else if has_le {
                length += 3;
            }
        } else {
            if data_len > 0 {
                length += 1 + data_len;
            }
            if has_le {
                length += 1;
            }
        }

        length
    }

    /// Convert to a generic Command
    fn to_command(&self) -> Command {
        Command {
            cla: self.class(),
            ins: self.instruction(),
            p1: self.p1(),
            p2: self.p2(),
            data: self.data().map(Bytes::copy_from_slice),
            le: self.expected_length(),
        }
    }

    /// Parse response into the command's response type
    fn parse_response(response: Response) -> std::result::Result<Self::Success, Self::Error>;
}

/// Generic APDU command structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Command class byte
    pub cla: u8,
    /// Instruction byte
    pub ins: u8,
    /// Parameter 1
    pub p1: u8,
    /// Parameter 2
    pub p2: u8,
    /// Command data (optional)
    pub data: Option<Bytes>,
    /// Expected length (optional)
    pub le: Option<ExpectedLength>,
}

impl Command {
    /// Create a new command with just the header bytes
    pub const fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: None,
            le: None,
        }
    }

    /// Create a new command with expected response length (Le)
    pub const fn new_with_le(cla: u8, ins: u8, p1: u8, p2: u8, le: ExpectedLength) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: None,
            le: Some(le),
        }
    }

    /// Create a new command with data payload
    pub fn new_with_data<T: Into<Bytes>>(cla: u8, ins: u8, p1: u8, p2: u8, data: T) -> Self {
        Self::new(cla, ins, p1, p2).with_data(data)
    }

    /// Set the data field
    pub fn with_data<T: Into<Bytes>>(mut self, data: T) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Set the expected length field
    pub const fn with_le(mut self, le: ExpectedLength) -> Self {
        self.le = Some(le);
        self
    }

    /// Parse a command from raw bytes
    ///
    /// Accepts all four ISO 7816-4 cases in both short and extended form.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < 4 {
            return Err(Error::InvalidCommandLength(data.len()));
        }

        let mut command = Self::new(data[0], data[1], data[2], data[3]);
        let body = &data[4..];

        match body.len() {
            // Case 1: header only
            0 => {}
            // Case 2S: Le only
            1 => command.le = Some(body[0] as ExpectedLength),
            _ if body[0] != 0x00 => {
                let lc = body[0] as usize;
                match body.len() - 1 {
                    n if n == lc => {}
                    n if n == lc + 1 => command.le = Some(body[1 + lc] as ExpectedLength),
                    _ => return Err(Error::InvalidCommandLength(data.len())),
                }
                command.data = Some(Bytes::copy_from_slice(&body[1..1 + lc]));
            }
            // Case 2E: 00 Le1 Le2
            3 => command.le = Some(u16::from_be_bytes([body[1], body[2]])),
            n if n > 3 => {
                let lc = u16::from_be_bytes([body[1], body[2]]) as usize;
                if lc == 0 {
                    return Err(Error::InvalidCommandData("extended Lc of zero"));
                }
                match n - 3 {
                    m if m == lc => {}
                    m if m == lc + 2 => {
                        command.le = Some(u16::from_be_bytes([body[3 + lc], body[4 + lc]]))
                    }
                    _ => return Err(Error::InvalidCommandLength(data.len())),
                }
                command.data = Some(Bytes::copy_from_slice(&body[3..3 + lc]));
            }
            _ => return Err(Error::InvalidCommandLength(data.len())),
        }

        Ok(command)
    }
}

impl ApduCommand for Command {
    type Success = Response;
    type Error = Error;

    fn class(&self) -> u8 {
        self.cla
    }

    fn instruction(&self) -> u8 {
        self.ins
    }

    fn p1(&self) -> u8 {
        self.p1
    }

    fn p2(&self) -> u8 {
        self.p2
    }

    fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    fn expected_length(&self) -> Option<ExpectedLength> {
        self.le
    }

    fn parse_response(response: Response) -> Result<Self::Success> {
        Ok(response)
    }
}

/// Encode an interindustry (CLA `00`) command with an optional data field
///
/// An `Le` of `00` is appended so the card may return as much as it has.
pub fn encode(instruction: u8, p1: u8, p2: u8, data: &[u8]) -> Result<Bytes> {
    let mut command = Command::new_with_le(0x00, instruction, p1, p2, 0);
    if !data.is_empty() {
        command = command.with_data(Bytes::copy_from_slice(data));
    }
    command.to_bytes()
}
