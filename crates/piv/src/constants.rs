/// PIV application identifier (NIST SP 800-73-4, truncated form accepted by all cards)
pub const PIV_AID: &[u8] = b"\xA0\x00\x00\x03\x08";

/// Key reference of the card management key
pub const MANAGEMENT_KEY_REFERENCE: u8 = 0x9B;

/// Factory default management key shipped on most PIV cards
pub const DEFAULT_MANAGEMENT_KEY: [u8; 24] = [
    0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07,
    0x08, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08,
];

/// Instruction bytes
pub mod ins {
    /// SELECT
    pub const SELECT: u8 = 0xA4;
    /// GET DATA
    pub const GET_DATA: u8 = 0xCB;
    /// PUT DATA
    pub const PUT_DATA: u8 = 0xDB;
    /// GENERAL AUTHENTICATE
    pub const GENERAL_AUTHENTICATE: u8 = 0x87;
    /// GET VERSION (vendor extension)
    pub const GET_VERSION: u8 = 0xFD;
}

/// BER-TLV tags used by the PIV application
pub mod tags {
    /// Dynamic authentication template wrapping GENERAL AUTHENTICATE data
    pub const DYNAMIC_AUTH_TEMPLATE: u8 = 0x7C;
    /// Witness
    pub const WITNESS: u8 = 0x80;
    /// Challenge
    pub const CHALLENGE: u8 = 0x81;
    /// Response
    pub const RESPONSE: u8 = 0x82;

    /// Tag list naming the data object for GET DATA / PUT DATA
    pub const TAG_LIST: u8 = 0x5C;
    /// Data object wrapper
    pub const DATA_OBJECT: u8 = 0x53;

    /// Certificate (DER)
    pub const CERTIFICATE: u8 = 0x70;
    /// CertInfo (compression flag)
    pub const CERT_INFO: u8 = 0x71;
    /// Error detection code, always empty
    pub const ERROR_DETECTION: u8 = 0xFE;
}

/// CertInfo value marking a gzip compressed certificate
pub const CERT_INFO_COMPRESSED: u8 = 0x01;
