use byteorder::{BigEndian, ByteOrder, WriteBytesExt};

use crate::error::PingError;
use crate::icmp::IcmpType;

pub const ICMP_ECHO_REQUEST: u8 = 8;
pub const ICMP_ECHO_REPLY: u8 = 0;

pub const ICMP_HEADER_LEN: usize = 8;
pub const DEFAULT_PAYLOAD_LEN: usize = 56;
pub const IPV4_MIN_HEADER_LEN: usize = 20;
pub const IPV4_MAX_HEADER_LEN: usize = 60;

const TYPE_OFFSET: usize = 0;
const CODE_OFFSET: usize = 1;
const CHECKSUM_OFFSET: usize = 2;
const IDENTIFIER_OFFSET: usize = 4;
const SEQUENCE_OFFSET: usize = 6;
const IPV4_TTL_OFFSET: usize = 8;
const IPV4_PROTOCOL_OFFSET: usize = 9;
const IPPROTO_ICMP: u8 = 1;

/// Header fields of a received ICMP message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedIcmp {
    pub icmp_type: u8,
    pub code: u8,
    pub identifier: u16,
    pub sequence: u16,
    /// TTL of the carrying IPv4 header, when the socket delivered one.
    pub ttl: Option<u8>,
    /// Length of the ICMP message, header included.
    pub len: usize,
    /// For error messages quoting one of our echo requests, that request's identifier.
    pub embedded_identifier: Option<u16>,
}

impl DecodedIcmp {
    pub fn kind(&self) -> IcmpType {
        IcmpType::from(self.icmp_type)
    }

    pub fn is_echo_reply(&self) -> bool {
        self.icmp_type == ICMP_ECHO_REPLY
    }
}

/// Internet checksum over `data`.
///
/// Words are taken as big-endian byte pairs with a trailing odd byte padded
/// with zero. The running sum is folded twice and complemented. Storing the
/// result big-endian gives the same wire bytes as a native-order computation.
pub fn compute_checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;

    let mut words = data.chunks_exact(2);
    for word in &mut words {
        sum += BigEndian::read_u16(word) as u32;
    }
    if let [last] = words.remainder() {
        sum += (*last as u32) << 8;
    }

    sum = (sum >> 16) + (sum & 0xFFFF);
    sum += sum >> 16;
    !(sum as u16)
}

/// True when `data`, checksum field included, sums to all ones.
pub fn verify_checksum(data: &[u8]) -> bool {
    compute_checksum(data) == 0
}

/// Builds a checksummed Echo Request: 8-byte header followed by `payload`.
pub fn encode_echo_request(identifier: u16, sequence: u16, payload: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(ICMP_HEADER_LEN + payload.len());
    // Writes into a Vec cannot fail.
    let _ = bytes.write_u8(ICMP_ECHO_REQUEST);
    let _ = bytes.write_u8(0);
    let _ = bytes.write_u16::<BigEndian>(0);
    let _ = bytes.write_u16::<BigEndian>(identifier);
    let _ = bytes.write_u16::<BigEndian>(sequence);
    bytes.extend_from_slice(payload);

    let checksum = compute_checksum(&bytes);
    BigEndian::write_u16(&mut bytes[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 2], checksum);
    bytes
}

/// Parses the ICMP header out of a received datagram.
///
/// Raw IPv4 sockets hand back the IP header too; `from_raw_socket` skips it
/// using the IHL nibble and keeps its TTL.
pub fn decode_received(bytes: &[u8], from_raw_socket: bool) -> Result<DecodedIcmp, PingError> {
    let (offset, ttl) = if from_raw_socket {
        let header_len = ipv4_header_len(bytes)?;
        (header_len, Some(bytes[IPV4_TTL_OFFSET]))
    } else {
        (0, None)
    };

    let icmp = &bytes[offset..];
    if icmp.len() < ICMP_HEADER_LEN {
        return Err(PingError::MalformedPacket(format!(
            "{} bytes after offset {}, need at least {}",
            icmp.len(),
            offset,
            ICMP_HEADER_LEN
        )));
    }

    let embedded_identifier = match IcmpType::from(icmp[TYPE_OFFSET]) {
        IcmpType::DestinationUnreachable
        | IcmpType::SourceQuench
        | IcmpType::Redirect
        | IcmpType::TimeExceeded
        | IcmpType::ParameterProblem => quoted_echo_identifier(&icmp[ICMP_HEADER_LEN..]),
        _ => None,
    };

    Ok(DecodedIcmp {
        icmp_type: icmp[TYPE_OFFSET],
        code: icmp[CODE_OFFSET],
        identifier: BigEndian::read_u16(&icmp[IDENTIFIER_OFFSET..]),
        sequence: BigEndian::read_u16(&icmp[SEQUENCE_OFFSET..]),
        ttl,
        len: icmp.len(),
        embedded_identifier,
    })
}

/// ICMP errors quote the offending IPv4 header plus 8 bytes of its payload.
fn quoted_echo_identifier(quoted: &[u8]) -> Option<u16> {
    let header_len = ipv4_header_len(quoted).ok()?;
    if quoted[IPV4_PROTOCOL_OFFSET] != IPPROTO_ICMP {
        return None;
    }
    let original = quoted.get(header_len..header_len + ICMP_HEADER_LEN)?;
    if original[TYPE_OFFSET] != ICMP_ECHO_REQUEST {
        return None;
    }
    Some(BigEndian::read_u16(&original[IDENTIFIER_OFFSET..]))
}

fn ipv4_header_len(bytes: &[u8]) -> Result<usize, PingError> {
    let first = *bytes
        .first()
        .ok_or_else(|| PingError::MalformedPacket("empty datagram".to_string()))?;

    let header_len = (first & 0x0F) as usize * 4;
    if header_len < IPV4_MIN_HEADER_LEN {
        return Err(PingError::MalformedPacket(format!(
            "IPv4 header length {} below minimum",
            header_len
        )));
    }
    if bytes.len() < header_len {
        return Err(PingError::MalformedPacket(format!(
            "{} bytes cannot hold a {}-byte IPv4 header",
            bytes.len(),
            header_len
        )));
    }
    Ok(header_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ipv4_header(ihl_words: u8, ttl: u8) -> Vec<u8> {
        let mut header = vec![0u8; ihl_words as usize * 4];
        header[0] = 0x40 | ihl_words;
        header[IPV4_TTL_OFFSET] = ttl;
        header[9] = 1;
        header
    }

    #[test]
    fn test_checksum_known_vector() {
        let data = [0x00, 0x01, 0xf2, 0x03, 0xf4, 0xf5, 0xf6, 0xf7];
        assert_eq!(compute_checksum(&data), 0x220d);
    }

    #[test]
    fn test_checksum_odd_length_pads_with_zero() {
        assert_eq!(compute_checksum(&[0x01]), compute_checksum(&[0x01, 0x00]));
        assert_eq!(compute_checksum(&[0x01]), 0xfeff);
    }

    #[test]
    fn test_checksum_all_zero_and_all_ones() {
        assert_eq!(compute_checksum(&[0u8; 64]), 0xFFFF);
        assert_eq!(compute_checksum(&[0xFFu8; 64]), 0);
    }

    #[test]
    fn test_echo_request_layout() {
        let bytes = encode_echo_request(0x1234, 1, &[0u8; DEFAULT_PAYLOAD_LEN]);
        assert_eq!(bytes.len(), 64);
        assert_eq!(bytes[0], ICMP_ECHO_REQUEST);
        assert_eq!(bytes[1], 0);
        assert_eq!(&bytes[2..4], &[0xe5, 0xca]);
        assert_eq!(&bytes[4..6], &[0x12, 0x34]);
        assert_eq!(&bytes[6..8], &[0x00, 0x01]);
    }

    #[test]
    fn test_encoded_request_verifies() {
        let payload: Vec<u8> = (0..DEFAULT_PAYLOAD_LEN as u8).collect();
        for (id, seq) in [(1u16, 1u16), (0xFFFF, 0xFFFF), (4321, 77)] {
            let bytes = encode_echo_request(id, seq, &payload);
            assert!(verify_checksum(&bytes), "id={} seq={}", id, seq);
        }

        let odd = encode_echo_request(9, 9, &[0xAB; 7]);
        assert!(verify_checksum(&odd));
    }

    #[test]
    fn test_decode_without_ip_header() {
        let bytes = encode_echo_request(4242, 17, &[0u8; DEFAULT_PAYLOAD_LEN]);
        let decoded = decode_received(&bytes, false).unwrap();

        assert_eq!(decoded.icmp_type, ICMP_ECHO_REQUEST);
        assert_eq!(decoded.kind(), IcmpType::EchoRequest);
        assert_eq!(decoded.code, 0);
        assert_eq!(decoded.identifier, 4242);
        assert_eq!(decoded.sequence, 17);
        assert_eq!(decoded.ttl, None);
        assert_eq!(decoded.len, 64);
    }

    #[test]
    fn test_decode_skips_ip_header_with_options() {
        let mut reply = encode_echo_request(7, 3, &[0u8; 8]);
        reply[0] = ICMP_ECHO_REPLY;

        for ihl in [5u8, 6, 15] {
            let mut datagram = ipv4_header(ihl, 57);
            datagram.extend_from_slice(&reply);

            let decoded = decode_received(&datagram, true).unwrap();
            assert!(decoded.is_echo_reply());
            assert_eq!(decoded.identifier, 7);
            assert_eq!(decoded.sequence, 3);
            assert_eq!(decoded.ttl, Some(57));
            assert_eq!(decoded.len, 16);
        }
    }

    #[test]
    fn test_decode_short_buffers_are_malformed() {
        assert!(matches!(
            decode_received(&[0u8, 0, 0], false),
            Err(PingError::MalformedPacket(_))
        ));
        assert!(matches!(decode_received(&[], true), Err(PingError::MalformedPacket(_))));

        let mut truncated = ipv4_header(5, 64);
        truncated.extend_from_slice(&[0, 0, 0, 0]);
        assert!(matches!(
            decode_received(&truncated, true),
            Err(PingError::MalformedPacket(_))
        ));

        let header_only = ipv4_header(6, 64);
        assert!(matches!(
            decode_received(&header_only[..20], true),
            Err(PingError::MalformedPacket(_))
        ));
    }

    #[test]
    fn test_decode_rejects_bogus_ihl() {
        let mut datagram = vec![0x42u8];
        datagram.extend_from_slice(&[0u8; 40]);
        assert!(matches!(
            decode_received(&datagram, true),
            Err(PingError::MalformedPacket(_))
        ));
    }

    fn unreachable_quoting(request: &[u8]) -> Vec<u8> {
        let mut message = vec![3u8, 1, 0, 0, 0, 0, 0, 0];
        message.extend_from_slice(&ipv4_header(5, 63));
        message.extend_from_slice(&request[..ICMP_HEADER_LEN]);
        message
    }

    #[test]
    fn test_error_quoting_our_request_carries_identifier() {
        let request = encode_echo_request(0x4242, 9, &[0u8; DEFAULT_PAYLOAD_LEN]);
        let mut datagram = ipv4_header(5, 250);
        datagram.extend_from_slice(&unreachable_quoting(&request));

        let decoded = decode_received(&datagram, true).unwrap();
        assert_eq!(decoded.kind(), IcmpType::DestinationUnreachable);
        assert_eq!(decoded.code, 1);
        assert_eq!(decoded.embedded_identifier, Some(0x4242));
    }

    #[test]
    fn test_error_without_quoted_echo_has_no_identifier() {
        let request = encode_echo_request(0x4242, 9, &[]);

        let mut truncated = unreachable_quoting(&request);
        truncated.truncate(ICMP_HEADER_LEN + IPV4_MIN_HEADER_LEN + 4);
        assert_eq!(decode_received(&truncated, false).unwrap().embedded_identifier, None);

        let mut udp = unreachable_quoting(&request);
        udp[ICMP_HEADER_LEN + IPV4_PROTOCOL_OFFSET] = 17;
        assert_eq!(decode_received(&udp, false).unwrap().embedded_identifier, None);

        let mut reply = request.clone();
        reply[0] = ICMP_ECHO_REPLY;
        assert_eq!(decode_received(&reply, false).unwrap().embedded_identifier, None);
    }
}
