use std::net::{Ipv4Addr, IpAddr, ToSocketAddrs};

use crate::error::{PingError, Result};

/// Resolve a host name or dotted address to the first IPv4 address the
/// system resolver hands back.
pub fn resolve_dest(dest: &str) -> Result<Ipv4Addr> {
    let resolve_err = |source| PingError::Resolve { host: dest.to_string(), source };

    let addrs = format!("{}:0", dest).to_socket_addrs().map_err(resolve_err)?;
    for addr in addrs {
        if let IpAddr::V4(ip) = addr.ip() {
            return Ok(ip);
        }
    }

    Err(resolve_err(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        "no IPv4 address for host",
    )))
}

/// Zero the 16 bit word at word offset `location`, then write the checksum
/// of the whole buffer into it (big endian).
pub fn set_checksum(data: &mut [u8], location: usize) {
    data[location * 2] = 0;
    data[location * 2 + 1] = 0;

    let sum = checksum(data);
    data[location * 2..location * 2 + 2].copy_from_slice(&sum.to_be_bytes());
}

/// Internet checksum (RFC 1071). A trailing odd byte is added as-is, not
/// padded into the high half of a word.
pub fn checksum(data: &[u8]) -> u16 {
    let mut sum = sum_be_words(data);

    // Two folds are enough for any 32 bit accumulator.
    sum = (sum >> 16) + (sum & 0xFFFF);
    sum = (sum >> 16) + (sum & 0xFFFF);

    !(sum as u16)
}

/// Sum all words (16 bit chunks) in the given data, each treated as big endian.
fn sum_be_words(data: &[u8]) -> u32 {
    data.chunks(2)
        .map(|word| match *word {
            [w] => w as u16,
            [wh, wl] => u16::from_be_bytes([wh, wl]),
            _ => unreachable!(),
        })
        .fold(0, |acc, w| acc.wrapping_add(w as u32))
}
