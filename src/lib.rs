//! IEEE 1722-2016 Clause 7 AVTP Audio Format (AAF) mapping core.
//!
//! Sits between a platform-neutral media queue and a lower layer that
//! emits or receives AVTP Ethernet frames. Owns the wire codec, the
//! integer sample-width converter, the Temporal Redundancy delay line
//! and the talker/listener lifecycle state machine. The media queue,
//! AVTP time abstraction, clock-recovery HAL, configuration reader and
//! transport are all external collaborators represented only by the
//! trait boundaries in [`external`] and [`mcr`].

pub mod config;
pub mod error;
pub mod external;
pub mod map_core;
pub mod mcr;
pub mod queue;
pub mod redundancy;
pub mod wire;

pub use config::{AafFormat, AafRate, DerivedLayout, EventField, McrMode, SparseMode, StreamConfig};
pub use error::{MapError, Result};
pub use map_core::{MapCore, RxOutcome, TxOutcome};
pub use queue::CircularByteQueue;
pub use redundancy::{RecoveredPayload, RedundancyStats, TemporalRedundancyEngine};
pub use wire::{AafHeader, SampleConverter};
