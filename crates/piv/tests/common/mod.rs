//! In-memory PIV card used by the integration tests
//!
//! The card keeps its state behind a shared handle so tests can inspect and
//! tamper with it while a session owns the transport.

#![allow(dead_code, unreachable_pub)]

use std::collections::HashMap;
use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use parking_lot::Mutex;
use pivkit_apdu_core::{ApduCommand, CardTransport, Command, TransportError};
use pivkit_piv::{ManagementKey, PIV_AID, Slot, tags};

/// Largest payload returned before switching to `61xx` chaining
const CHUNK: usize = 0xF0;

const SW_OK: u16 = 0x9000;
const SW_SECURITY: u16 = 0x6982;
const SW_BLOCKED: u16 = 0x6983;
const SW_CONDITIONS: u16 = 0x6985;
const SW_WRONG_DATA: u16 = 0x6A80;
const SW_NOT_FOUND: u16 = 0x6A82;
const SW_INS: u16 = 0x6D00;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug)]
pub struct CardState {
    pub management_key: ManagementKey,
    /// Wrong key answers left before the card blocks the key
    pub key_retries: u8,
    pub authenticated: bool,
    pub selected: bool,
    pub objects: HashMap<u32, Vec<u8>>,
    pub version: [u8; 3],
    /// Every command the card received, decoded
    pub commands: Vec<Command>,
    /// Fail the next transmit at the transport level
    pub fail_next: bool,
    /// Corrupt the card's answer to the host challenge
    pub tamper_challenge: bool,
    /// Answer slot key operations with `6983`
    pub block_slot_keys: bool,
    pub closed: bool,
    witness: Option<Vec<u8>>,
    pending: Vec<u8>,
}

impl Default for CardState {
    fn default() -> Self {
        Self {
            management_key: ManagementKey::default(),
            key_retries: 10,
            authenticated: false,
            selected: false,
            objects: HashMap::new(),
            version: [5, 4, 3],
            commands: Vec::new(),
            fail_next: false,
            tamper_challenge: false,
            block_slot_keys: false,
            closed: false,
            witness: None,
            pending: Vec::new(),
        }
    }
}

/// Transport backed by an emulated PIV applet
#[derive(Debug, Clone, Default)]
pub struct VirtualPivCard {
    state: Arc<Mutex<CardState>>,
}

impl VirtualPivCard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_management_key(key: ManagementKey) -> Self {
        let card = Self::new();
        card.state().management_key = key;
        card
    }

    /// Store a certificate the way a provisioning tool would
    pub fn with_certificate(self, slot: Slot, der: &[u8]) -> Self {
        let mut object = BytesMut::new();
        put_tlv(&mut object, tags::CERTIFICATE.into(), der);
        put_tlv(&mut object, tags::CERT_INFO.into(), &[0x00]);
        put_tlv(&mut object, tags::ERROR_DETECTION.into(), &[]);
        self.state()
            .objects
            .insert(slot.object_tag(), object.to_vec());
        self
    }

    pub fn state(&self) -> parking_lot::MutexGuard<'_, CardState> {
        self.state.lock()
    }

    /// Number of commands received so far
    pub fn command_count(&self) -> usize {
        self.state().commands.len()
    }

    /// Instructions received so far
    pub fn instructions(&self) -> Vec<u8> {
        self.state().commands.iter().map(|c| c.ins).collect()
    }

    /// Signature the card produces for `input` in `slot`
    pub fn expected_signature(slot: Slot, input: &[u8]) -> Vec<u8> {
        let mut signature = vec![0x30, slot.id()];
        signature.extend(input.iter().rev().map(|b| b ^ 0x5A));
        signature
    }
}

impl CardTransport for VirtualPivCard {
    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(TransportError::Closed);
        }
        if state.fail_next {
            state.fail_next = false;
            return Err(TransportError::Transmission);
        }

        let command =
            Command::from_bytes(command).map_err(|e| TransportError::other(e.to_string()))?;
        if command.ins != 0xC0 {
            state.pending.clear();
        }
        state.commands.push(command.clone());
        let (data, sw) = state.process(&command);
        Ok(state.respond(data, sw))
    }

    fn is_connected(&self) -> bool {
        !self.state.lock().closed
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.state.lock().closed = true;
        Ok(())
    }
}

impl CardState {
    fn process(&mut self, command: &Command) -> (Vec<u8>, u16) {
        let data = command.data().unwrap_or_default();
        match command.ins {
            0xA4 => self.select(data),
            0xC0 => {
                let take = self.pending.len().min(CHUNK);
                (self.pending.drain(..take).collect(), SW_OK)
            }
            _ if !self.selected => (Vec::new(), SW_CONDITIONS),
            0xCB => self.get_data(data),
            0xDB => self.put_data(data),
            0x87 => self.general_authenticate(command.p1, command.p2, data),
            0xFD => (self.version.to_vec(), SW_OK),
            _ => (Vec::new(), SW_INS),
        }
    }

    /// Split long answers into `61xx` chunks
    fn respond(&mut self, mut data: Vec<u8>, sw: u16) -> Bytes {
        if data.len() > CHUNK {
            self.pending = data.split_off(CHUNK);
        }

        let mut out = BytesMut::from(data.as_slice());
        if self.pending.is_empty() {
            out.put_u16(sw);
        } else {
            out.put_u8(0x61);
            out.put_u8(self.pending.len().min(0xFF) as u8);
        }
        out.freeze()
    }

    fn select(&mut self, aid: &[u8]) -> (Vec<u8>, u16) {
        self.authenticated = false;
        self.witness = None;
        if aid == PIV_AID {
            self.selected = true;
            (vec![0x61, 0x03, 0x4F, 0x01, 0x00], SW_OK)
        } else {
            self.selected = false;
            (Vec::new(), SW_NOT_FOUND)
        }
    }

    fn get_data(&self, data: &[u8]) -> (Vec<u8>, u16) {
        let Some(tag) = object_tag(data) else {
            return (Vec::new(), SW_WRONG_DATA);
        };
        match self.objects.get(&tag) {
            Some(object) => {
                let mut out = BytesMut::new();
                put_tlv(&mut out, tags::DATA_OBJECT.into(), object);
                (out.to_vec(), SW_OK)
            }
            None => (Vec::new(), SW_NOT_FOUND),
        }
    }

    fn put_data(&mut self, data: &[u8]) -> (Vec<u8>, u16) {
        if !self.authenticated {
            return (Vec::new(), SW_SECURITY);
        }
        let Some(tag) = object_tag(data) else {
            return (Vec::new(), SW_WRONG_DATA);
        };
        let Some((0x53, object, _)) = read_tlv(&data[5..]) else {
            return (Vec::new(), SW_WRONG_DATA);
        };
        if object.is_empty() {
            self.objects.remove(&tag);
        } else {
            self.objects.insert(tag, object.to_vec());
        }
        (Vec::new(), SW_OK)
    }

    fn general_authenticate(&mut self, p1: u8, p2: u8, data: &[u8]) -> (Vec<u8>, u16) {
        let Some((0x7C, template, _)) = read_tlv(data) else {
            return (Vec::new(), SW_WRONG_DATA);
        };
        let fields = read_all(template);

        if p2 == 0x9B {
            return self.authenticate_management_key(p1, &fields);
        }

        // Slot key operation
        if self.block_slot_keys {
            return (Vec::new(), SW_BLOCKED);
        }
        if !self.authenticated {
            return (Vec::new(), SW_SECURITY);
        }
        let (Some(_), Some(input)) = (fields.get(&0x82), fields.get(&0x81)) else {
            return (Vec::new(), SW_WRONG_DATA);
        };
        let Ok(slot) = Slot::try_from(p2) else {
            return (Vec::new(), SW_NOT_FOUND);
        };

        let signature = VirtualPivCard::expected_signature(slot, input);
        let mut inner = BytesMut::new();
        put_tlv(&mut inner, 0x82, &signature);
        let mut out = BytesMut::new();
        put_tlv(&mut out, 0x7C, &inner);
        (out.to_vec(), SW_OK)
    }

    fn authenticate_management_key(
        &mut self,
        algorithm: u8,
        fields: &HashMap<u32, Vec<u8>>,
    ) -> (Vec<u8>, u16) {
        if self.key_retries == 0 {
            return (Vec::new(), SW_BLOCKED);
        }
        if algorithm != self.management_key.key_type().algorithm_id() {
            return (Vec::new(), SW_WRONG_DATA);
        }
        let block = self.management_key.key_type().block_len();

        match (fields.get(&0x80), fields.get(&0x81)) {
            // Step 1: hand out an encrypted witness
            (Some(witness), None) if witness.is_empty() => {
                let plain: Vec<u8> = (0..block as u8).map(|i| i.wrapping_mul(37) ^ 0xA5).collect();
                let Ok(encrypted) = self.management_key.encrypt_block(&plain) else {
                    return (Vec::new(), SW_WRONG_DATA);
                };
                self.witness = Some(plain);
                let mut inner = BytesMut::new();
                put_tlv(&mut inner, 0x80, &encrypted);
                let mut out = BytesMut::new();
                put_tlv(&mut out, 0x7C, &inner);
                (out.to_vec(), SW_OK)
            }
            // Step 2: check the witness, answer the host challenge
            (Some(witness), Some(challenge)) => {
                let expected = self.witness.take();
                if expected.as_ref() != Some(witness) {
                    self.authenticated = false;
                    self.key_retries -= 1;
                    let sw = if self.key_retries == 0 { SW_BLOCKED } else { SW_SECURITY };
                    return (Vec::new(), sw);
                }
                let Ok(mut answer) = self.management_key.encrypt_block(challenge) else {
                    return (Vec::new(), SW_WRONG_DATA);
                };
                if self.tamper_challenge {
                    answer[0] ^= 0xFF;
                }
                self.authenticated = true;
                let mut inner = BytesMut::new();
                put_tlv(&mut inner, 0x82, &answer);
                let mut out = BytesMut::new();
                put_tlv(&mut out, 0x7C, &inner);
                (out.to_vec(), SW_OK)
            }
            _ => (Vec::new(), SW_WRONG_DATA),
        }
    }
}

/// Tag named by a `5C 03 xx xx xx` tag list
fn object_tag(data: &[u8]) -> Option<u32> {
    match data {
        [0x5C, 0x03, a, b, c, ..] => {
            Some((u32::from(*a) << 16) | (u32::from(*b) << 8) | u32::from(*c))
        }
        _ => None,
    }
}

/// Read one single-byte-tag TLV with BER length
fn read_tlv(data: &[u8]) -> Option<(u8, &[u8], &[u8])> {
    let (&tag, rest) = data.split_first()?;
    let (&first, rest) = rest.split_first()?;
    let (len, rest) = match first {
        0x00..=0x7F => (usize::from(first), rest),
        0x81 => (usize::from(*rest.first()?), rest.get(1..)?),
        0x82 => (
            usize::from(u16::from_be_bytes([*rest.first()?, *rest.get(1)?])),
            rest.get(2..)?,
        ),
        _ => return None,
    };
    let value = rest.get(..len)?;
    Some((tag, value, &rest[len..]))
}

fn read_all(mut data: &[u8]) -> HashMap<u32, Vec<u8>> {
    let mut fields = HashMap::new();
    while let Some((tag, value, rest)) = read_tlv(data) {
        fields.insert(u32::from(tag), value.to_vec());
        data = rest;
    }
    fields
}

fn put_tlv(buf: &mut BytesMut, tag: u32, value: &[u8]) {
    if tag > 0xFFFF {
        buf.put_uint(u64::from(tag), 3);
    } else if tag > 0xFF {
        buf.put_u16(tag as u16);
    } else {
        buf.put_u8(tag as u8);
    }
    match value.len() {
        len @ 0..=0x7F => buf.put_u8(len as u8),
        len @ 0x80..=0xFF => {
            buf.put_u8(0x81);
            buf.put_u8(len as u8);
        }
        len => {
            buf.put_u8(0x82);
            buf.put_u16(len as u16);
        }
    }
    buf.extend_from_slice(value);
}
