use std::io::{ErrorKind, Result};
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Instant;

use socket2::{Domain, Protocol, SockAddr, Socket};

use crate::packet::{self, ICMP_HEADER_LEN, IPV4_HEADER_LEN};

const ICMP_PROTOCOL: u8 = 1;

// Large enough for any IPv4 datagram.
const RECV_BUFFER_LEN: usize = 65535;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ReplyType {
    EchoReply,
    DestinationUnreachable,
    TimeExceeded,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Pong {
    pub from: Ipv4Addr,
    pub kind: ReplyType,
    pub ttl: u8,
    /// Datagram length minus the 20 byte IP and 8 byte ICMP headers.
    pub size: usize,
}

/// One request goes out, at most one matching answer comes back.
pub trait Transport {
    fn send(&mut self, packet: &[u8]) -> Result<()>;

    /// Wait until a reply for (`identifier`, `sequence`) arrives or `deadline`
    /// passes. `Ok(None)` means the deadline passed.
    fn receive(&mut self, identifier: u16, sequence: u16, deadline: Instant) -> Result<Option<Pong>>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send(&mut self, packet: &[u8]) -> Result<()> {
        (**self).send(packet)
    }

    fn receive(&mut self, identifier: u16, sequence: u16, deadline: Instant) -> Result<Option<Pong>> {
        (**self).receive(identifier, sequence, deadline)
    }
}

/// Raw IPv4 ICMP socket bound to a single destination. The socket is closed
/// when the `Pinger` is dropped.
pub struct Pinger {
    socket: Socket,
    sock_addr: SockAddr,
    buf: Vec<u8>,
}

impl Pinger {
    pub fn new(address: Ipv4Addr) -> Result<Self> {
        let stype = socket2::Type::raw().cloexec();
        let socket = Socket::new(Domain::ipv4(), stype, Some(Protocol::icmpv4()))?;
        tracing::debug!("opened raw ICMP socket for {}", address);

        Ok(Pinger {
            socket,
            sock_addr: SockAddr::from(SocketAddr::from((address, 0))),
            buf: vec![0; RECV_BUFFER_LEN],
        })
    }
}

impl Transport for Pinger {
    fn send(&mut self, packet: &[u8]) -> Result<()> {
        let n = self.socket.send_to(packet, &self.sock_addr)?;
        tracing::trace!("sent {} of {} bytes", n, packet.len());
        Ok(())
    }

    fn receive(&mut self, identifier: u16, sequence: u16, deadline: Instant) -> Result<Option<Pong>> {
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            self.socket.set_read_timeout(Some(deadline - now))?;

            let n = match classify_read(self.socket.recv_from(&mut self.buf).map(|(n, _)| n)) {
                Read::Data(n) => n,
                Read::Retry => {
                    tracing::trace!("read interrupted, waiting out the remaining time");
                    continue;
                }
                Read::Expired => return Ok(None),
                Read::Failed(e) => return Err(e),
            };

            match parse_reply(&self.buf[..n], identifier, sequence) {
                Some(pong) => return Ok(Some(pong)),
                None => tracing::trace!("ignoring {} byte datagram not meant for us", n),
            }
        }
    }
}

#[derive(Debug)]
enum Read {
    Data(usize),
    /// A signal cut the read short. The deadline still holds.
    Retry,
    Expired,
    Failed(std::io::Error),
}

// SO_RCVTIMEO reads fail with EINTR on a signal even under SA_RESTART.
fn classify_read(result: Result<usize>) -> Read {
    match result {
        Ok(n) => Read::Data(n),
        Err(e) if e.kind() == ErrorKind::Interrupted => Read::Retry,
        Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => Read::Expired,
        Err(e) => Read::Failed(e),
    }
}

/// Classify a raw IPv4 datagram. Returns `None` for anything that is not an
/// answer to the request identified by (`identifier`, `sequence`), which
/// includes our own requests looping back on the loopback interface.
pub fn parse_reply(datagram: &[u8], identifier: u16, sequence: u16) -> Option<Pong> {
    let ip = packet::parse_ipv4_header(datagram)?;
    if ip.protocol != ICMP_PROTOCOL {
        return None;
    }
    let icmp = datagram.get(ip.header_len()..)?;
    let header = packet::parse_echo_header(icmp)?;

    let kind = match header.message_type {
        packet::ECHO_REPLY => {
            if header.identifier != identifier || header.sequence_num != sequence {
                return None;
            }
            ReplyType::EchoReply
        }
        packet::DESTINATION_UNREACHABLE | packet::TIME_EXCEEDED => {
            // The error body quotes the IP header and first 8 bytes of our request.
            if !quotes_request(&icmp[ICMP_HEADER_LEN..], identifier, sequence) {
                return None;
            }
            if header.message_type == packet::TIME_EXCEEDED {
                ReplyType::TimeExceeded
            } else {
                ReplyType::DestinationUnreachable
            }
        }
        _ => return None,
    };

    Some(Pong {
        from: Ipv4Addr::from(ip.source_ip),
        kind,
        ttl: ip.ttl,
        size: datagram.len().saturating_sub(IPV4_HEADER_LEN + ICMP_HEADER_LEN),
    })
}

fn quotes_request(quoted: &[u8], identifier: u16, sequence: u16) -> bool {
    let inner_ip = match packet::parse_ipv4_header(quoted) {
        Some(h) if h.protocol == ICMP_PROTOCOL => h,
        _ => return false,
    };
    match quoted.get(inner_ip.header_len()..).and_then(packet::parse_echo_header) {
        Some(inner) => {
            inner.message_type == packet::ECHO_REQUEST
                && inner.identifier == identifier
                && inner.sequence_num == sequence
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util;

    fn ipv4_datagram(source: [u8; 4], ttl: u8, protocol: u8, payload: &[u8]) -> Vec<u8> {
        let mut data = vec![0u8; IPV4_HEADER_LEN];
        data[0] = 0x45;
        data[2..4].copy_from_slice(&((IPV4_HEADER_LEN + payload.len()) as u16).to_be_bytes());
        data[8] = ttl;
        data[9] = protocol;
        data[12..16].copy_from_slice(&source);
        data[16..20].copy_from_slice(&[127, 0, 0, 1]);
        util::set_checksum(&mut data, 5);
        data.extend_from_slice(payload);
        data
    }

    fn echo_reply(identifier: u16, sequence: u16, size: usize) -> Vec<u8> {
        let mut icmp = packet::build_echo_request(identifier, sequence, size);
        icmp[0] = packet::ECHO_REPLY;
        util::set_checksum(&mut icmp, 1);
        icmp
    }

    fn error_reply(message_type: u8, identifier: u16, sequence: u16) -> Vec<u8> {
        let request = packet::build_echo_request(identifier, sequence, 32);
        let quoted = ipv4_datagram([127, 0, 0, 1], 1, ICMP_PROTOCOL, &request[..ICMP_HEADER_LEN]);
        let mut icmp = vec![message_type, 0, 0, 0, 0, 0, 0, 0];
        icmp.extend_from_slice(&quoted);
        util::set_checksum(&mut icmp, 1);
        icmp
    }

    #[test]
    fn interrupted_read_is_retried() {
        let read = classify_read(Err(std::io::Error::from(ErrorKind::Interrupted)));
        assert!(matches!(read, Read::Retry));
    }

    #[test]
    fn read_timeouts_expire() {
        assert!(matches!(classify_read(Err(std::io::Error::from(ErrorKind::WouldBlock))), Read::Expired));
        assert!(matches!(classify_read(Err(std::io::Error::from(ErrorKind::TimedOut))), Read::Expired));
    }

    #[test]
    fn other_read_errors_fail() {
        let read = classify_read(Err(std::io::Error::from(ErrorKind::ConnectionRefused)));
        assert!(matches!(read, Read::Failed(e) if e.kind() == ErrorKind::ConnectionRefused));
        assert!(matches!(classify_read(Ok(84)), Read::Data(84)));
    }

    #[test]
    fn echo_reply_is_parsed() {
        let datagram = ipv4_datagram([10, 1, 2, 3], 57, ICMP_PROTOCOL, &echo_reply(7, 1, 32));
        let pong = parse_reply(&datagram, 7, 1).unwrap();
        assert_eq!(pong.from, Ipv4Addr::new(10, 1, 2, 3));
        assert_eq!(pong.kind, ReplyType::EchoReply);
        assert_eq!(pong.ttl, 57);
        assert_eq!(pong.size, 32);
    }

    #[test]
    fn byte_count_is_length_minus_28() {
        let datagram = ipv4_datagram([10, 1, 2, 3], 64, ICMP_PROTOCOL, &echo_reply(7, 1, 0));
        assert_eq!(datagram.len(), 28);
        assert_eq!(parse_reply(&datagram, 7, 1).unwrap().size, 0);
    }

    #[test]
    fn foreign_identifier_is_ignored() {
        let datagram = ipv4_datagram([10, 1, 2, 3], 64, ICMP_PROTOCOL, &echo_reply(8, 1, 32));
        assert!(parse_reply(&datagram, 7, 1).is_none());
    }

    #[test]
    fn wrong_sequence_is_ignored() {
        let datagram = ipv4_datagram([10, 1, 2, 3], 64, ICMP_PROTOCOL, &echo_reply(7, 2, 32));
        assert!(parse_reply(&datagram, 7, 1).is_none());
    }

    #[test]
    fn own_request_is_ignored() {
        let request = packet::build_echo_request(7, 1, 32);
        let datagram = ipv4_datagram([127, 0, 0, 1], 64, ICMP_PROTOCOL, &request);
        assert!(parse_reply(&datagram, 7, 1).is_none());
    }

    #[test]
    fn non_icmp_protocol_is_ignored() {
        let datagram = ipv4_datagram([10, 1, 2, 3], 64, 17, &echo_reply(7, 1, 32));
        assert!(parse_reply(&datagram, 7, 1).is_none());
    }

    #[test]
    fn truncated_datagram_is_ignored() {
        let datagram = ipv4_datagram([10, 1, 2, 3], 64, ICMP_PROTOCOL, &[0, 0, 0]);
        assert!(parse_reply(&datagram, 7, 1).is_none());
    }

    #[test]
    fn time_exceeded_is_matched_by_quoted_request() {
        let body = error_reply(packet::TIME_EXCEEDED, 7, 1);
        let datagram = ipv4_datagram([192, 168, 0, 1], 250, ICMP_PROTOCOL, &body);
        let pong = parse_reply(&datagram, 7, 1).unwrap();
        assert_eq!(pong.kind, ReplyType::TimeExceeded);
        assert_eq!(pong.from, Ipv4Addr::new(192, 168, 0, 1));

        assert!(parse_reply(&datagram, 9, 1).is_none());
    }

    #[test]
    fn destination_unreachable_is_classified() {
        let body = error_reply(packet::DESTINATION_UNREACHABLE, 7, 1);
        let datagram = ipv4_datagram([192, 168, 0, 1], 64, ICMP_PROTOCOL, &body);
        assert_eq!(parse_reply(&datagram, 7, 1).unwrap().kind, ReplyType::DestinationUnreachable);
    }
}
