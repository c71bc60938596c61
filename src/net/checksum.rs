use std::net::Ipv4Addr;

use super::tcp::CHECKSUM_OFFSET;

/// IANA protocol number for TCP.
pub const TCP_PROTOCOL_NUM: u8 = 6;

/// One's complement sum of 16-bit big-endian words, carries folded back in.
/// An odd trailing byte is the high byte of a final word padded with zero.
fn ones_complement_sum(mut sum: u32, buffer: &[u8]) -> u32 {
    let mut words = buffer.chunks_exact(2);
    for word in &mut words {
        sum += u16::from_be_bytes([word[0], word[1]]) as u32;
    }
    if let [last] = words.remainder() {
        sum += (*last as u32) << 8;
    }
    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    sum
}

/// RFC 1071 internet checksum of `buffer`.
pub fn rfc1071_checksum(buffer: &[u8]) -> u16 {
    !(ones_complement_sum(0, buffer) as u16)
}

/// The 12-byte TCP pseudo-header: source, destination, zero, protocol, length.
pub fn pseudo_header(source: Ipv4Addr, destination: Ipv4Addr, tcp_length: u16) -> [u8; 12] {
    let mut header = [0u8; 12];
    header[0..4].copy_from_slice(&source.octets());
    header[4..8].copy_from_slice(&destination.octets());
    header[9] = TCP_PROTOCOL_NUM;
    header[10..12].copy_from_slice(&tcp_length.to_be_bytes());
    header
}

fn pseudo_header_sum(segment: &[u8], source: Ipv4Addr, destination: Ipv4Addr) -> u32 {
    ones_complement_sum(0, &pseudo_header(source, destination, segment.len() as u16))
}

/// TCP checksum of a serialized segment, computed as if its checksum field
/// were zero.
pub fn tcp_checksum(segment: &[u8], source: Ipv4Addr, destination: Ipv4Addr) -> u16 {
    let mut sum = pseudo_header_sum(segment, source, destination);
    if segment.len() >= CHECKSUM_OFFSET + 2 {
        // Both halves start on an even offset, so word alignment holds.
        sum = ones_complement_sum(sum, &segment[..CHECKSUM_OFFSET]);
        sum = ones_complement_sum(sum, &segment[CHECKSUM_OFFSET + 2..]);
    } else {
        sum = ones_complement_sum(sum, segment);
    }
    !(sum as u16)
}

/// Whether a segment's stored checksum is consistent with its contents and
/// the address pair.
pub fn verify_tcp_checksum(segment: &[u8], source: Ipv4Addr, destination: Ipv4Addr) -> bool {
    let sum = ones_complement_sum(pseudo_header_sum(segment, source, destination), segment);
    !(sum as u16) == 0
}
