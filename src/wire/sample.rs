//! Integer sample width conversion.
//!
//! Samples are big-endian, most-significant byte first. Widening a
//! sample appends zero bytes after the existing ones (equivalent to a
//! left shift by the added width); narrowing keeps the leading bytes
//! and drops the trailing ones. No float conversion is performed here:
//! `AafFormat::Float32` samples pass through the mapping core
//! untouched.

/// Stateless integer sample width converter.
pub struct SampleConverter;

impl SampleConverter {
    /// Convert one sample from `src` (exactly `src_width` bytes) into
    /// `dst` (exactly `dst_width` bytes).
    pub fn convert(src: &[u8], src_width: usize, dst: &mut [u8], dst_width: usize) {
        assert_eq!(src.len(), src_width);
        assert_eq!(dst.len(), dst_width);

        if dst_width >= src_width {
            dst[..src_width].copy_from_slice(src);
            dst[src_width..].fill(0);
        } else {
            dst.copy_from_slice(&src[..dst_width]);
        }
    }

    /// Convert a buffer of back-to-back samples. `src.len()` must be a
    /// multiple of `src_width`; any remainder frame is dropped.
    pub fn convert_buffer(src: &[u8], src_width: usize, dst_width: usize) -> Vec<u8> {
        if src_width == dst_width {
            return src.to_vec();
        }
        let frame_count = src.len() / src_width;
        let mut out = vec![0u8; frame_count * dst_width];
        for i in 0..frame_count {
            let s = &src[i * src_width..(i + 1) * src_width];
            let d = &mut out[i * dst_width..(i + 1) * dst_width];
            Self::convert(s, src_width, d, dst_width);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s3_widen_16_to_24_zero_pads_low_byte() {
        let src = [0x12, 0x34];
        let mut dst = [0u8; 3];
        SampleConverter::convert(&src, 2, &mut dst, 3);
        assert_eq!(dst, [0x12, 0x34, 0x00]);
    }

    #[test]
    fn s4_narrow_32_to_16_keeps_leading_bytes() {
        let src = [0xAA, 0xBB, 0xCC, 0xDD];
        let mut dst = [0u8; 2];
        SampleConverter::convert(&src, 4, &mut dst, 2);
        assert_eq!(dst, [0xAA, 0xBB]);
    }

    #[test]
    fn same_width_is_a_plain_copy() {
        let src = [0x01, 0x02, 0x03];
        let mut dst = [0u8; 3];
        SampleConverter::convert(&src, 3, &mut dst, 3);
        assert_eq!(dst, src);
    }

    #[test]
    fn widen_then_narrow_back_recovers_original() {
        let src = [0x7F, 0xEE];
        let widened = SampleConverter::convert_buffer(&src, 2, 4);
        let back = SampleConverter::convert_buffer(&widened, 4, 2);
        assert_eq!(back, src);
    }

    #[test]
    fn narrow_then_widen_is_lossy_but_stable() {
        let src = [0x11, 0x22, 0x33, 0x44];
        let narrowed = SampleConverter::convert_buffer(&src, 4, 2);
        let widened = SampleConverter::convert_buffer(&narrowed, 2, 4);
        assert_eq!(widened, [0x11, 0x22, 0x00, 0x00]);
        assert_ne!(widened, src);
    }

    #[test]
    fn buffer_conversion_handles_multiple_frames() {
        let src = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06]; // three Int16 frames
        let out = SampleConverter::convert_buffer(&src, 2, 3);
        assert_eq!(
            out,
            [0x01, 0x02, 0x00, 0x03, 0x04, 0x00, 0x05, 0x06, 0x00]
        );
    }

    proptest::proptest! {
        #[test]
        fn widen_then_narrow_round_trips(bytes in proptest::collection::vec(0u8..=255, 2..=2)) {
            let widened = SampleConverter::convert_buffer(&bytes, 2, 4);
            let back = SampleConverter::convert_buffer(&widened, 4, 2);
            prop_assert_eq!(back, bytes);
        }
    }
}
