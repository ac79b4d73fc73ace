use bincode::Options;
use serde::{Deserialize, Serialize};

use crate::util;

pub const ECHO_REQUEST: u8 = 8;
pub const ECHO_REPLY: u8 = 0;
pub const DESTINATION_UNREACHABLE: u8 = 3;
pub const TIME_EXCEEDED: u8 = 11;

pub const ICMP_HEADER_LEN: usize = 8;
pub const IPV4_HEADER_LEN: usize = 20;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct EchoHeader {
    pub message_type: u8,
    pub message_code: u8,
    pub checksum: u16,
    pub identifier: u16,
    pub sequence_num: u16,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct Ipv4Header {
    pub version_and_header_len: u8,
    pub type_of_service: u8,
    pub datagram_length: u16,
    pub ip_identifier: u16,
    pub flags_and_frag_offset: u16,
    pub ttl: u8,
    pub protocol: u8,
    pub checksum: u16,
    pub source_ip: u32,
    pub destination_ip: u32,
}

impl Ipv4Header {
    /// Header length in bytes, decoded from the IHL nibble (32 bit words).
    pub fn header_len(&self) -> usize {
        4 * (self.version_and_header_len & 0x0F) as usize
    }
}

/// ICMP and IP headers are big endian with fixed width fields.
pub fn coder() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_big_endian()
        .allow_trailing_bytes()
}

/// Assemble a wire-ready echo request: 8 byte header, `size` zero bytes of
/// payload, checksum over the whole buffer.
pub fn build_echo_request(identifier: u16, sequence_num: u16, size: usize) -> Vec<u8> {
    let header = EchoHeader {
        message_type: ECHO_REQUEST,
        message_code: 0,
        checksum: 0,
        identifier,
        sequence_num,
    };

    let mut data = coder()
        .serialize(&header)
        .expect("fixed width header always encodes");
    data.resize(ICMP_HEADER_LEN + size, 0);

    util::set_checksum(&mut data, 1);
    data
}

pub fn parse_echo_header(data: &[u8]) -> Option<EchoHeader> {
    if data.len() < ICMP_HEADER_LEN {
        return None;
    }
    coder().deserialize(data).ok()
}

pub fn parse_ipv4_header(data: &[u8]) -> Option<Ipv4Header> {
    if data.len() < IPV4_HEADER_LEN {
        return None;
    }
    let header: Ipv4Header = coder().deserialize(data).ok()?;
    if header.version_and_header_len >> 4 != 4 || header.header_len() < IPV4_HEADER_LEN {
        return None;
    }
    Some(header)
}
