//! Error types for the AAF mapping core.

use thiserror::Error;

/// Errors raised while configuring or running an AAF mapping stream.
///
/// Transient send-side shortages (media queue empty, buffer too small)
/// are not represented here — those are reported as `Ok(false)` /
/// `NOT_READY` and do not mutate state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MapError {
    /// Talker/listener audio rate does not divide evenly by `txInterval`.
    #[error("tx_interval {tx_interval} does not evenly divide audio rate {audio_rate}")]
    NonIntegerInterval { audio_rate: u32, tx_interval: u32 },

    /// `packingFactor` is invalid for the configured sparse mode.
    #[error("packing factor {0} is invalid for the configured sparse mode")]
    InvalidPackingFactor(u32),

    /// MADT offset in samples is not an exact multiple of `framesPerPacket`.
    #[error(
        "temporal redundant offset ({offset_samples} samples) is not a multiple of frames per packet ({frames_per_packet})"
    )]
    MisalignedRedundantOffset {
        offset_samples: u32,
        frames_per_packet: u32,
    },

    /// `gen_init` was called with an unsupported audio rate, bit depth or format.
    #[error("unsupported stream format: rate={rate:?} bit_depth={bit_depth} format={format:?}")]
    UnsupportedFormat {
        rate: crate::config::AafRate,
        bit_depth: u8,
        format: crate::config::AafFormat,
    },

    /// `tx_init`/`rx_init` called after the stream already bound the opposite direction.
    #[error("stream direction already fixed")]
    DirectionAlreadyBound,

    /// Allocation of the media queue or the MADT queues failed.
    #[error("allocation failed: {0}")]
    AllocationFailed(&'static str),

    /// Mapping has not been initialized with `gen_init` yet.
    #[error("gen_init has not been called")]
    NotInitialized,
}

pub type Result<T> = std::result::Result<T, MapError>;
