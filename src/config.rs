//! Stream configuration, derived sizing, and the one-key-at-a-time
//! configuration surface driven by an external INI reader (out of scope;
//! see the external-interfaces module).

use crate::error::{MapError, Result};

/// AVTP nominal sample rate enumeration (IEEE 1722-2016 Table 7.2 values).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum AafRate {
    #[default]
    Unspec = 0,
    Hz8000 = 1,
    Hz16000 = 2,
    Hz32000 = 3,
    Hz44100 = 4,
    Hz48000 = 5,
    Hz88200 = 6,
    Hz96000 = 7,
    Hz176400 = 8,
    Hz192000 = 9,
    Hz24000 = 10,
}

impl AafRate {
    pub fn from_hz(hz: u32) -> Self {
        match hz {
            8_000 => AafRate::Hz8000,
            16_000 => AafRate::Hz16000,
            24_000 => AafRate::Hz24000,
            32_000 => AafRate::Hz32000,
            44_100 => AafRate::Hz44100,
            48_000 => AafRate::Hz48000,
            88_200 => AafRate::Hz88200,
            96_000 => AafRate::Hz96000,
            176_400 => AafRate::Hz176400,
            192_000 => AafRate::Hz192000,
            _ => AafRate::Unspec,
        }
    }

    /// Decode the 4-bit `nominal_rate` field of the AAF format word.
    pub fn from_wire(nibble: u8) -> Self {
        match nibble & 0x0F {
            1 => AafRate::Hz8000,
            2 => AafRate::Hz16000,
            3 => AafRate::Hz32000,
            4 => AafRate::Hz44100,
            5 => AafRate::Hz48000,
            6 => AafRate::Hz88200,
            7 => AafRate::Hz96000,
            8 => AafRate::Hz176400,
            9 => AafRate::Hz192000,
            10 => AafRate::Hz24000,
            _ => AafRate::Unspec,
        }
    }
}

/// AAF sample format. Discriminant is chosen so that
/// `6 - discriminant` gives the integer sample byte width for the
/// three integer formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum AafFormat {
    #[default]
    Unspec = 0,
    Float32 = 1,
    Int32 = 2,
    Int24 = 3,
    Int16 = 4,
}

impl AafFormat {
    /// Byte width of one sample, for the integer formats this crate converts between.
    pub fn integer_byte_width(self) -> Option<usize> {
        match self {
            AafFormat::Int32 => Some(4),
            AafFormat::Int24 => Some(3),
            AafFormat::Int16 => Some(2),
            AafFormat::Unspec | AafFormat::Float32 => None,
        }
    }

    pub fn is_integer(self) -> bool {
        self.integer_byte_width().is_some()
    }

    /// Byte width of one sample on the wire, including the float format.
    /// `None` only for `Unspec`, which never appears in a valid frame.
    pub fn wire_sample_width(self) -> Option<usize> {
        match self {
            AafFormat::Float32 => Some(4),
            other => other.integer_byte_width(),
        }
    }

    /// Decode the 8-bit `format` field of the AAF format word.
    pub fn from_wire(byte: u8) -> Self {
        match byte {
            1 => AafFormat::Float32,
            2 => AafFormat::Int32,
            3 => AafFormat::Int24,
            4 => AafFormat::Int16,
            _ => AafFormat::Unspec,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SparseMode {
    #[default]
    Disabled,
    Enabled,
}

/// Automotive channel layout passed through transparently in the event field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum EventField {
    #[default]
    StaticChannelsLayout = 0,
    Mono = 1,
    Stereo = 2,
    FiveOne = 3,
    SevenOne = 4,
}

impl EventField {
    /// Decode the low nibble of the AAF packet-info byte at offset 22.
    pub fn from_wire(nibble: u8) -> Self {
        match nibble & 0x0F {
            1 => EventField::Mono,
            2 => EventField::Stereo,
            3 => EventField::FiveOne,
            4 => EventField::SevenOne,
            _ => EventField::StaticChannelsLayout,
        }
    }
}

/// Opaque clock-recovery mode, forwarded to the MCR HAL untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct McrMode(pub u32);

/// Immutable (after `gen_init`) stream configuration.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub audio_rate_hz: u32,
    pub bit_depth: u8,
    pub sample_format: AafFormat,
    pub channels: u16,
    pub event_field: EventField,

    pub item_count: u32,
    pub tx_interval_hz: u32,
    pub packing_factor: u32,
    pub sparse_mode: SparseMode,

    pub audio_mcr: McrMode,
    pub mcr_timestamp_interval: u32,
    pub mcr_recovery_interval: u32,

    pub temporal_redundant_offset_usec: u32,
    pub report_seconds: u32,
    pub max_transit_usec: u32,
    pub presentation_latency_usec: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            audio_rate_hz: 48_000,
            bit_depth: 16,
            sample_format: AafFormat::Int16,
            channels: 2,
            event_field: EventField::StaticChannelsLayout,
            item_count: 4,
            tx_interval_hz: 8_000,
            packing_factor: 1,
            sparse_mode: SparseMode::Disabled,
            audio_mcr: McrMode(0),
            mcr_timestamp_interval: 0,
            mcr_recovery_interval: 0,
            temporal_redundant_offset_usec: 0,
            report_seconds: 10,
            max_transit_usec: 0,
            presentation_latency_usec: 0,
        }
    }
}

impl StreamConfig {
    /// Apply one parsed `map_nv_*` INI key/value pair. Malformed numeric
    /// values are silently ignored, preserving the prior value.
    pub fn apply_cfg_item(&mut self, key: &str, value: &str) {
        macro_rules! set_u32 {
            ($field:expr) => {
                match value.parse::<u32>() {
                    Ok(v) => $field = v,
                    Err(_) => log::warn!("ignoring malformed value for {key}: {value:?}"),
                }
            };
        }

        match key {
            "map_nv_item_count" => set_u32!(self.item_count),
            "map_nv_packing_factor" => set_u32!(self.packing_factor),
            "map_nv_tx_rate" => {
                // rate-style key: packets/sec is the same unit as tx_interval here
                set_u32!(self.tx_interval_hz)
            }
            "map_nv_tx_interval" => set_u32!(self.tx_interval_hz),
            "map_nv_sparse_mode" => match value.parse::<u32>() {
                Ok(0) => self.sparse_mode = SparseMode::Disabled,
                Ok(_) => self.sparse_mode = SparseMode::Enabled,
                Err(_) => log::warn!("ignoring malformed value for {key}: {value:?}"),
            },
            "map_nv_audio_mcr" => set_u32!(self.audio_mcr.0),
            "map_nv_mcr_timestamp_interval" => set_u32!(self.mcr_timestamp_interval),
            "map_nv_mcr_recovery_interval" => set_u32!(self.mcr_recovery_interval),
            "map_nv_temporal_redundant_offset" => {
                set_u32!(self.temporal_redundant_offset_usec)
            }
            "map_nv_max_allowed_dropout_time" => {
                set_u32!(self.temporal_redundant_offset_usec)
            }
            "map_nv_report_seconds" => set_u32!(self.report_seconds),
            _ => log::debug!("ignoring unknown config key {key:?}"),
        }
    }
}

/// Sizes derived from a `StreamConfig`, computed once by `gen_init`.
#[derive(Debug, Clone, Copy)]
pub struct DerivedLayout {
    pub aaf_rate: AafRate,
    pub aaf_format: AafFormat,
    pub aaf_bit_depth: u8,
    pub frames_per_packet: u32,
    pub packet_sample_size_bytes: u32,
    pub packet_frame_size_bytes: u32,
    pub payload_size: u32,
    pub payload_size_max_talker: u32,
    pub payload_size_max_listener: u32,
    pub item_frame_size_bytes: u32,
    pub item_size: u32,
    pub temporal_redundant_offset_samples: u32,
    pub temporal_redundant_offset_packets: u32,
}

pub const HEADER_SIZE: u32 = 24;

impl DerivedLayout {
    pub fn compute(cfg: &StreamConfig) -> Result<Self> {
        if cfg.tx_interval_hz == 0 || cfg.audio_rate_hz == 0 {
            return Err(MapError::NonIntegerInterval {
                audio_rate: cfg.audio_rate_hz,
                tx_interval: cfg.tx_interval_hz,
            });
        }
        if cfg.audio_rate_hz % cfg.tx_interval_hz != 0 {
            log::warn!(
                "tx_interval {} does not evenly divide audio rate {}; rounding frames_per_packet up",
                cfg.tx_interval_hz,
                cfg.audio_rate_hz
            );
        }
        let frames_per_packet =
            (cfg.audio_rate_hz + cfg.tx_interval_hz - 1) / cfg.tx_interval_hz;

        if !validate_packing_factor(cfg.packing_factor, cfg.sparse_mode) {
            return Err(MapError::InvalidPackingFactor(cfg.packing_factor));
        }

        let aaf_format = cfg.sample_format;
        if aaf_format == AafFormat::Unspec {
            return Err(MapError::UnsupportedFormat {
                rate: AafRate::from_hz(cfg.audio_rate_hz),
                bit_depth: cfg.bit_depth,
                format: aaf_format,
            });
        }
        let packet_sample_size_bytes = match aaf_format {
            AafFormat::Float32 => 4,
            other => other
                .integer_byte_width()
                .ok_or(MapError::UnsupportedFormat {
                    rate: AafRate::from_hz(cfg.audio_rate_hz),
                    bit_depth: cfg.bit_depth,
                    format: aaf_format,
                })? as u32,
        };

        let channels = cfg.channels as u32;
        let packet_frame_size_bytes = packet_sample_size_bytes * channels;
        let payload_size = frames_per_packet * packet_frame_size_bytes;

        let madt_enabled = cfg.temporal_redundant_offset_usec > 0;
        let payload_size_max_talker = if madt_enabled {
            payload_size * 2
        } else {
            payload_size
        };

        // Worst case on receive: the widest integer sample (32-bit) arrives
        // regardless of the locally configured width.
        const MAX_INTEGER_SAMPLE_WIDTH: u32 = 4;
        let payload_size_max_incoming = frames_per_packet * MAX_INTEGER_SAMPLE_WIDTH * channels;
        let payload_size_max_listener = if madt_enabled {
            payload_size_max_incoming * 2
        } else {
            payload_size_max_incoming
        };

        let item_frame_size_bytes = packet_frame_size_bytes;
        let item_size = frames_per_packet * cfg.packing_factor * item_frame_size_bytes;

        let temporal_redundant_offset_samples =
            (cfg.temporal_redundant_offset_usec as u64 * cfg.audio_rate_hz as u64 / 1_000_000)
                as u32;
        if madt_enabled && temporal_redundant_offset_samples % frames_per_packet != 0 {
            return Err(MapError::MisalignedRedundantOffset {
                offset_samples: temporal_redundant_offset_samples,
                frames_per_packet,
            });
        }
        let temporal_redundant_offset_packets = if frames_per_packet == 0 {
            0
        } else {
            temporal_redundant_offset_samples / frames_per_packet
        };

        Ok(Self {
            aaf_rate: AafRate::from_hz(cfg.audio_rate_hz),
            aaf_format,
            aaf_bit_depth: cfg.bit_depth,
            frames_per_packet,
            packet_sample_size_bytes,
            packet_frame_size_bytes,
            payload_size,
            payload_size_max_talker,
            payload_size_max_listener,
            item_frame_size_bytes,
            item_size,
            temporal_redundant_offset_samples,
            temporal_redundant_offset_packets,
        })
    }

    pub fn madt_enabled(&self) -> bool {
        self.temporal_redundant_offset_packets > 0 || self.temporal_redundant_offset_samples > 0
    }

    pub fn header_and_payload(&self, madt_enabled: bool) -> u32 {
        let payload = if madt_enabled {
            self.payload_size * 2
        } else {
            self.payload_size
        };
        HEADER_SIZE + payload
    }
}

/// Packing-factor validity: under sparse mode, {1, 2, 4} or
/// any positive multiple of 8; under non-sparse mode, any positive value.
/// 0 is always invalid.
pub fn validate_packing_factor(factor: u32, sparse_mode: SparseMode) -> bool {
    if factor == 0 {
        return false;
    }
    match sparse_mode {
        SparseMode::Disabled => true,
        SparseMode::Enabled => matches!(factor, 1 | 2 | 4) || factor % 8 == 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packing_factor_validator_sparse() {
        for bad in [0, 3, 5, 6, 7, 9, 10] {
            assert!(
                !validate_packing_factor(bad, SparseMode::Enabled),
                "{bad} should be rejected"
            );
        }
        for good in [1, 2, 4, 8, 16, 24, 32] {
            assert!(
                validate_packing_factor(good, SparseMode::Enabled),
                "{good} should be accepted"
            );
        }
    }

    #[test]
    fn packing_factor_validator_non_sparse_accepts_any_positive() {
        assert!(!validate_packing_factor(0, SparseMode::Disabled));
        for v in [1, 2, 3, 5, 7, 100] {
            assert!(validate_packing_factor(v, SparseMode::Disabled));
        }
    }

    #[test]
    fn derived_sizes_basic_48k_stereo_int16() {
        let cfg = StreamConfig {
            audio_rate_hz: 48_000,
            bit_depth: 16,
            sample_format: AafFormat::Int16,
            channels: 2,
            tx_interval_hz: 8_000,
            packing_factor: 1,
            ..Default::default()
        };
        let d = DerivedLayout::compute(&cfg).unwrap();
        assert_eq!(d.frames_per_packet, 6);
        assert_eq!(d.packet_frame_size_bytes, 4);
        assert_eq!(d.payload_size, 24);
        assert_eq!(d.item_size, 24);
    }

    #[test]
    fn non_integer_interval_rounds_up() {
        let cfg = StreamConfig {
            audio_rate_hz: 44_100,
            tx_interval_hz: 8_000,
            sample_format: AafFormat::Int16,
            packing_factor: 1,
            ..Default::default()
        };
        let d = DerivedLayout::compute(&cfg).unwrap();
        // ceil(44100 / 8000) = 6
        assert_eq!(d.frames_per_packet, 6);
    }

    #[test]
    fn misaligned_redundant_offset_is_rejected() {
        let cfg = StreamConfig {
            audio_rate_hz: 48_000,
            tx_interval_hz: 8_000, // frames_per_packet = 6
            sample_format: AafFormat::Int16,
            packing_factor: 1,
            temporal_redundant_offset_usec: 100, // 4.8 samples, rounds to 4 -> not a multiple of 6
            ..Default::default()
        };
        assert!(matches!(
            DerivedLayout::compute(&cfg),
            Err(MapError::MisalignedRedundantOffset { .. })
        ));
    }

    #[test]
    fn apply_cfg_item_ignores_malformed_numeric() {
        let mut cfg = StreamConfig::default();
        let before = cfg.item_count;
        cfg.apply_cfg_item("map_nv_item_count", "not-a-number");
        assert_eq!(cfg.item_count, before);
        cfg.apply_cfg_item("map_nv_item_count", "16");
        assert_eq!(cfg.item_count, 16);
    }

    #[test]
    fn apply_cfg_item_sparse_mode_toggle() {
        let mut cfg = StreamConfig::default();
        cfg.apply_cfg_item("map_nv_sparse_mode", "1");
        assert_eq!(cfg.sparse_mode, SparseMode::Enabled);
        cfg.apply_cfg_item("map_nv_sparse_mode", "0");
        assert_eq!(cfg.sparse_mode, SparseMode::Disabled);
    }
}
