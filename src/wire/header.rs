//! AVTP common header + AAF-specific header codec.
//!
//! Pure functions over a 24-byte buffer: 12-byte AVTP v0 common header
//! followed by 12 bytes of AAF-specific fields. All multi-byte
//! integers are big-endian on the wire. Bytes 4-11 (stream ID /
//! reserved) belong to the lower layer and are never touched here.

use crate::config::{AafFormat, AafRate, EventField};

pub const HEADER_LEN: usize = 24;

/// AAF subtype value, IEEE 1722-2016.
pub const AAF_SUBTYPE: u8 = 2;

/// Decoded view of one AAF packet's header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AafHeader {
    pub sequence: u8,
    /// Timestamp-valid flag.
    pub tv: bool,
    /// Timestamp-uncertain flag.
    pub tu: bool,
    /// Sparse-timestamp flag.
    pub sp: bool,
    /// AVTP presentation timestamp. Zero and meaningless when `tv` is false.
    pub timestamp: u32,
    pub format: AafFormat,
    pub nominal_rate: AafRate,
    /// Channel count, 12-bit field (0-4095).
    pub channels: u16,
    pub bit_depth: u8,
    pub payload_length: u16,
    pub event_field: EventField,
}

impl AafHeader {
    /// Write subtype, flags, sequence, timestamp, format and packet-info
    /// fields into `buf[0..24]`. Leaves bytes 4-11 untouched.
    pub fn encode(&self, buf: &mut [u8]) {
        assert!(buf.len() >= HEADER_LEN, "header buffer too small");

        buf[0] = AAF_SUBTYPE;
        buf[1] = self.tv as u8;
        buf[2] = self.sequence;
        buf[3] = self.tu as u8;

        let timestamp = if self.tv { self.timestamp } else { 0 };
        buf[12..16].copy_from_slice(&timestamp.to_be_bytes());

        let format_word = ((self.format as u32) << 24)
            | ((self.nominal_rate as u32) << 20)
            | (((self.channels as u32) & 0x0FFF) << 8)
            | (self.bit_depth as u32 & 0xFF);
        buf[16..20].copy_from_slice(&format_word.to_be_bytes());

        let packet_info = ((self.payload_length as u32) << 16)
            | ((self.event_field as u32) << 8)
            | ((self.sp as u32) << 12);
        buf[20..24].copy_from_slice(&packet_info.to_be_bytes());
    }

    /// Parse a 24-byte header. Returns `None` if the buffer is too short
    /// or the subtype byte is not AAF's.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_LEN {
            return None;
        }
        if buf[0] != AAF_SUBTYPE {
            return None;
        }

        let tv = buf[1] & 0x01 != 0;
        let sequence = buf[2];
        let tu = buf[3] & 0x01 != 0;
        let timestamp = u32::from_be_bytes(buf[12..16].try_into().unwrap());

        let format_word = u32::from_be_bytes(buf[16..20].try_into().unwrap());
        let format = AafFormat::from_wire(((format_word >> 24) & 0xFF) as u8);
        let nominal_rate = AafRate::from_wire(((format_word >> 20) & 0x0F) as u8);
        let channels = ((format_word >> 8) & 0x0FFF) as u16;
        let bit_depth = (format_word & 0xFF) as u8;

        let packet_info = u32::from_be_bytes(buf[20..24].try_into().unwrap());
        let payload_length = ((packet_info >> 16) & 0xFFFF) as u16;
        let event_byte = ((packet_info >> 8) & 0xFF) as u8;
        let event_field = EventField::from_wire(event_byte);
        let sp = event_byte & 0x10 != 0;

        Some(Self {
            sequence,
            tv,
            tu,
            sp,
            timestamp,
            format,
            nominal_rate,
            channels,
            bit_depth,
            payload_length,
            event_field,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> AafHeader {
        AafHeader {
            sequence: 5,
            tv: true,
            tu: false,
            sp: false,
            timestamp: 0xDEADBEEF,
            format: AafFormat::Int16,
            nominal_rate: AafRate::Hz48000,
            channels: 2,
            bit_depth: 16,
            payload_length: 192,
            event_field: EventField::StaticChannelsLayout,
        }
    }

    #[test]
    fn s1_encode_matches_fixed_bytes() {
        let h = sample_header();
        let mut buf = [0u8; HEADER_LEN];
        h.encode(&mut buf);

        assert_eq!(&buf[12..16], &[0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(&buf[16..20], &[0x04, 0x30, 0x02, 0x10]);
        assert_eq!(&buf[20..24], &[0x00, 0xC0, 0x00, 0x00]);
        assert_eq!(buf[22] & 0x10, 0);
    }

    #[test]
    fn s2_sparse_clears_timestamp_and_sets_sp() {
        let mut h = sample_header();
        h.tv = false;
        h.sp = true;
        h.timestamp = 0xDEADBEEF; // must be ignored on encode since tv=false
        let mut buf = [0u8; HEADER_LEN];
        h.encode(&mut buf);

        assert_eq!(buf[1] & 0x01, 0);
        assert_eq!(&buf[12..16], &[0, 0, 0, 0]);
        assert_eq!(buf[22] & 0x10, 0x10);
    }

    #[test]
    fn header_round_trip() {
        let h = sample_header();
        let mut buf = [0u8; HEADER_LEN];
        // simulate the lower layer owning bytes 4-11
        buf[4..12].copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        h.encode(&mut buf);
        let decoded = AafHeader::decode(&buf).expect("decode");
        assert_eq!(decoded, h);
        // untouched by the codec
        assert_eq!(&buf[4..12], &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn byte_order_is_big_endian_regardless_of_host() {
        let h = sample_header();
        let mut buf = [0u8; HEADER_LEN];
        h.encode(&mut buf);
        let ts = u32::from_be_bytes(buf[12..16].try_into().unwrap());
        assert_eq!(ts, 0xDEADBEEF);
    }

    #[test]
    fn decode_rejects_wrong_subtype() {
        let h = sample_header();
        let mut buf = [0u8; HEADER_LEN];
        h.encode(&mut buf);
        buf[0] = 0x00;
        assert!(AafHeader::decode(&buf).is_none());
    }

    #[test]
    fn decode_rejects_short_buffer() {
        assert!(AafHeader::decode(&[0u8; 10]).is_none());
    }

    proptest::proptest! {
        #[test]
        fn header_round_trip_prop(
            sequence in 0u8..=255,
            tv in proptest::bool::ANY,
            tu in proptest::bool::ANY,
            sp in proptest::bool::ANY,
            timestamp in 0u32..=u32::MAX,
            channels in 0u16..=0x0FFF,
            bit_depth in 0u8..=255,
            payload_length in 0u16..=u16::MAX,
            format_idx in 0u8..=4,
            rate_idx in 0u8..=10,
            event_idx in 0u8..=4,
        ) {
            let format = AafFormat::from_wire(format_idx);
            let nominal_rate = AafRate::from_wire(rate_idx);
            let event_field = EventField::from_wire(event_idx);
            let h = AafHeader {
                sequence, tv, tu, sp,
                timestamp: if tv { timestamp } else { 0 },
                format, nominal_rate, channels, bit_depth, payload_length, event_field,
            };
            let mut buf = [0u8; HEADER_LEN];
            h.encode(&mut buf);
            let decoded = AafHeader::decode(&buf).unwrap();
            prop_assert_eq!(decoded, h);
        }
    }
}
