use std::ops::BitOr;
use thiserror::Error;

/// Length of a TCP header without options.
pub const MIN_HEADER_LEN: usize = 20;
/// Data offset, in 32-bit words, of a header without options.
pub const MIN_DATA_OFFSET: u8 = 5;
/// Byte offset of the checksum field inside the header.
pub const CHECKSUM_OFFSET: usize = 16;

const MAX_DATA_OFFSET: u8 = 15;

/// The 9 TCP control bits, stored the way they sit on the wire: NS is bit 8
/// (the low bit of byte 12), CWR..FIN are bits 7..0 (byte 13).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TcpFlags(u16);

impl TcpFlags {
    pub const FIN: TcpFlags = TcpFlags(1 << 0);
    pub const SYN: TcpFlags = TcpFlags(1 << 1);
    pub const RST: TcpFlags = TcpFlags(1 << 2);
    pub const PSH: TcpFlags = TcpFlags(1 << 3);
    pub const ACK: TcpFlags = TcpFlags(1 << 4);
    pub const URG: TcpFlags = TcpFlags(1 << 5);
    pub const ECE: TcpFlags = TcpFlags(1 << 6);
    pub const CWR: TcpFlags = TcpFlags(1 << 7);
    pub const NS: TcpFlags = TcpFlags(1 << 8);

    pub const fn empty() -> Self {
        TcpFlags(0)
    }

    /// Builds a flag set from raw bits, dropping anything above bit 8.
    pub const fn from_bits_truncate(bits: u16) -> Self {
        TcpFlags(bits & 0x01ff)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn contains(self, other: TcpFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for TcpFlags {
    type Output = TcpFlags;

    fn bitor(self, rhs: TcpFlags) -> TcpFlags {
        TcpFlags(self.0 | rhs.0)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SegmentError {
    #[error("segment too short: need at least 20 bytes, got {0}")]
    Truncated(usize),

    #[error("invalid data offset {0}, must be at least 5")]
    BadDataOffset(u8),

    #[error("{0} bytes of options do not fit in a TCP header (max 40)")]
    OptionsTooLong(usize),
}

/// One TCP header, without payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpHeader {
    pub source_port: u16,
    pub destination_port: u16,
    pub sequence_number: u32,
    pub ack_number: u32,
    /// Header length in 32-bit words (4 bits).
    pub data_offset: u8,
    /// Reserved bits (3 bits), always zero on the segments built here.
    pub reserved: u8,
    pub flags: TcpFlags,
    pub window: u16,
    pub checksum: u16,
    pub urgent_pointer: u16,
    /// Raw option bytes following the fixed header.
    pub options: Vec<u8>,
}

impl TcpHeader {
    /// A bare SYN: no options, ack 0, checksum left at 0 for the caller to fill.
    pub fn syn(source_port: u16, destination_port: u16, sequence_number: u32, window: u16) -> Self {
        TcpHeader {
            source_port,
            destination_port,
            sequence_number,
            ack_number: 0,
            data_offset: MIN_DATA_OFFSET,
            reserved: 0,
            flags: TcpFlags::SYN,
            window,
            checksum: 0,
            urgent_pointer: 0,
            options: Vec::new(),
        }
    }

    /// Replaces the options, zero-padding them to a 32-bit boundary and
    /// updating `data_offset` to match. Fails if the padded options would
    /// push the data offset past its 4-bit maximum.
    pub fn with_options(mut self, mut options: Vec<u8>) -> Result<Self, SegmentError> {
        let padded = options.len().div_ceil(4) * 4;
        let words = MIN_DATA_OFFSET as usize + padded / 4;
        if words > MAX_DATA_OFFSET as usize {
            return Err(SegmentError::OptionsTooLong(options.len()));
        }
        options.resize(padded, 0);
        self.data_offset = words as u8;
        self.options = options;
        Ok(self)
    }

    pub fn has_flag(&self, flag: TcpFlags) -> bool {
        self.flags.contains(flag)
    }

    /// Serializes the header in network byte order: the 20 fixed bytes
    /// followed by the raw option bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(MIN_HEADER_LEN + self.options.len());

        buffer.extend_from_slice(&self.source_port.to_be_bytes());
        buffer.extend_from_slice(&self.destination_port.to_be_bytes());
        buffer.extend_from_slice(&self.sequence_number.to_be_bytes());
        buffer.extend_from_slice(&self.ack_number.to_be_bytes());

        // data offset (4) | reserved (3) | NS (1)
        let flag_bits = self.flags.bits();
        buffer.push(
            (self.data_offset << 4) | ((self.reserved & 0x07) << 1) | ((flag_bits >> 8) as u8 & 0x01),
        );
        buffer.push((flag_bits & 0xff) as u8);

        buffer.extend_from_slice(&self.window.to_be_bytes());
        buffer.extend_from_slice(&self.checksum.to_be_bytes());
        buffer.extend_from_slice(&self.urgent_pointer.to_be_bytes());
        buffer.extend_from_slice(&self.options);

        buffer
    }

    /// Parses a captured segment. Option bytes are taken from what
    /// `data_offset` announces, clipped to what was actually captured;
    /// anything past the header (payload) is ignored.
    pub fn decode(bytes: &[u8]) -> Result<Self, SegmentError> {
        if bytes.len() < MIN_HEADER_LEN {
            return Err(SegmentError::Truncated(bytes.len()));
        }

        let data_offset = bytes[12] >> 4;
        if data_offset < MIN_DATA_OFFSET {
            return Err(SegmentError::BadDataOffset(data_offset));
        }
        let header_len = (data_offset as usize * 4).min(bytes.len());

        Ok(TcpHeader {
            source_port: u16::from_be_bytes([bytes[0], bytes[1]]),
            destination_port: u16::from_be_bytes([bytes[2], bytes[3]]),
            sequence_number: u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            ack_number: u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
            data_offset,
            reserved: (bytes[12] >> 1) & 0x07,
            flags: TcpFlags::from_bits_truncate(((bytes[12] as u16 & 0x01) << 8) | bytes[13] as u16),
            window: u16::from_be_bytes([bytes[14], bytes[15]]),
            checksum: u16::from_be_bytes([bytes[16], bytes[17]]),
            urgent_pointer: u16::from_be_bytes([bytes[18], bytes[19]]),
            options: bytes[MIN_HEADER_LEN..header_len].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // SYN captured in Wireshark, 44 bytes with 24 bytes of options:
    //   [0-1]   Source Port:       0xcf4a        (53066)
    //   [2-3]   Destination Port:  0x240d        (9229)
    //   [4-7]   Sequence Number:   0x0c08a8b4
    //   [8-11]  Ack Number:        0x00000000
    //   [12]    Data Offset:       11 (0xb0)
    //   [13]    Flags:             0x02          (SYN)
    //   [14-15] Window:            0xffff
    //   [16-17] Checksum:          0xfe34
    //   [18-19] Urgent Pointer:    0x0000
    const CAPTURED_SYN: [u8; 44] = [
        0xcf, 0x4a, 0x24, 0x0d, 0x0c, 0x08, 0xa8, 0xb4, 0x00, 0x00, 0x00, 0x00, 0xb0, 0x02, 0xff,
        0xff, 0xfe, 0x34, 0x00, 0x00, // fixed header
        0x02, 0x04, 0x3f, 0xd8, 0x01, 0x03, 0x03, 0x06, 0x01, 0x01, 0x08, 0x0a, 0x03, 0x6f, 0x18,
        0x6b, 0x00, 0x00, 0x00, 0x00, 0x04, 0x02, 0x00, 0x00, // options
    ];

    fn captured_header() -> TcpHeader {
        let mut header = TcpHeader::syn(53066, 9229, 0x0c08a8b4, 0xffff)
            .with_options(CAPTURED_SYN[MIN_HEADER_LEN..].to_vec())
            .unwrap();
        header.checksum = 0xfe34;
        header
    }

    #[test]
    fn encode_matches_capture() {
        assert_eq!(captured_header().encode(), CAPTURED_SYN.to_vec());
    }

    #[test]
    fn decode_reads_capture_with_options() {
        let header = TcpHeader::decode(&CAPTURED_SYN).unwrap();
        assert_eq!(header, captured_header());
        assert_eq!(header.data_offset, 11);
        assert_eq!(header.options.len(), 24);
    }

    #[test]
    fn syn_encodes_to_minimal_header() {
        let bytes = TcpHeader::syn(0xaa47, 80, 0x01020304, 0xaaaa).encode();
        assert_eq!(bytes.len(), MIN_HEADER_LEN);
        assert_eq!(bytes[12], 0x50);
        assert_eq!(bytes[13], 0x02);
    }

    #[test]
    fn syn_only_reports_syn() {
        let header = TcpHeader::syn(1, 2, 3, 4);
        assert!(header.has_flag(TcpFlags::SYN));
        assert!(!header.has_flag(TcpFlags::ACK));
        assert!(!header.has_flag(TcpFlags::RST));
    }

    #[test]
    fn ns_flag_lives_in_offset_byte() {
        let mut header = TcpHeader::syn(1, 2, 3, 4);
        header.flags = TcpFlags::NS | TcpFlags::ACK;
        let bytes = header.encode();
        assert_eq!(bytes[12], 0x51);
        assert_eq!(bytes[13], 0x10);

        let decoded = TcpHeader::decode(&bytes).unwrap();
        assert!(decoded.has_flag(TcpFlags::NS));
        assert!(decoded.has_flag(TcpFlags::ACK));
        assert!(!decoded.has_flag(TcpFlags::SYN));
    }

    #[test]
    fn with_options_pads_to_word() {
        let header = TcpHeader::syn(1, 2, 3, 4)
            .with_options(vec![0x02, 0x04, 0x05])
            .unwrap();
        assert_eq!(header.data_offset, 6);
        assert_eq!(header.options, vec![0x02, 0x04, 0x05, 0x00]);
        assert_eq!(header.encode().len(), header.data_offset as usize * 4);
    }

    #[test]
    fn with_options_accepts_forty_bytes() {
        let header = TcpHeader::syn(1, 2, 3, 4).with_options(vec![0x01; 40]).unwrap();
        assert_eq!(header.data_offset, 15);
        assert_eq!(header.encode().len(), 60);
        assert_eq!(TcpHeader::decode(&header.encode()).unwrap(), header);
    }

    #[test]
    fn with_options_rejects_overflowing_offset() {
        assert_eq!(
            TcpHeader::syn(1, 2, 3, 4).with_options(vec![0x01; 41]),
            Err(SegmentError::OptionsTooLong(41))
        );
        // 37 bytes pad to 40 and still fit
        assert_eq!(
            TcpHeader::syn(1, 2, 3, 4).with_options(vec![0x01; 37]).unwrap().data_offset,
            15
        );
    }

    #[test]
    fn decode_rejects_short_input() {
        assert_eq!(
            TcpHeader::decode(&CAPTURED_SYN[..19]),
            Err(SegmentError::Truncated(19))
        );
    }

    #[test]
    fn decode_rejects_small_data_offset() {
        let mut bytes = CAPTURED_SYN;
        bytes[12] = 0x40;
        assert_eq!(TcpHeader::decode(&bytes), Err(SegmentError::BadDataOffset(4)));
    }

    #[test]
    fn decode_clips_options_to_captured_bytes() {
        let header = TcpHeader::decode(&CAPTURED_SYN[..30]).unwrap();
        assert_eq!(header.data_offset, 11);
        assert_eq!(header.options, CAPTURED_SYN[20..30].to_vec());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn decode_inverts_encode(
            source_port in any::<u16>(),
            destination_port in any::<u16>(),
            sequence_number in any::<u32>(),
            ack_number in any::<u32>(),
            reserved in 0u8..8,
            flag_bits in 0u16..0x200,
            window in any::<u16>(),
            checksum in any::<u16>(),
            urgent_pointer in any::<u16>(),
        ) {
            let header = TcpHeader {
                source_port,
                destination_port,
                sequence_number,
                ack_number,
                data_offset: MIN_DATA_OFFSET,
                reserved,
                flags: TcpFlags::from_bits_truncate(flag_bits),
                window,
                checksum,
                urgent_pointer,
                options: Vec::new(),
            };
            let decoded = TcpHeader::decode(&header.encode()).unwrap();
            prop_assert_eq!(decoded, header);
        }
    }
}
