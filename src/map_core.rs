//! Lifecycle and configuration state machine tying the wire codec, the
//! sample converter and the redundancy engine to the external media
//! queue and clock-recovery collaborators.

use std::time::{Duration, Instant};

use crate::config::{validate_packing_factor, DerivedLayout, SparseMode, StreamConfig};
use crate::error::{MapError, Result};
use crate::external::{AvtpTime, MediaQueue, MediaQueueItem};
use crate::mcr::{MediaClockRecovery, NullMcr};
use crate::redundancy::{RedundancyStats, TemporalRedundancyEngine};
use crate::wire::header::{AafHeader, HEADER_LEN};
use crate::wire::sample::SampleConverter;

pub const AAF_SUBTYPE: u8 = 2;
pub const AVTP_VERSION: u8 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutcome {
    NotReady,
    Wrote(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxOutcome {
    Delivered,
    /// Header parsed but disagreed with the configured stream, or the
    /// frame was too short; the stream is now muted.
    Muted,
    /// A valid, matching frame arrived but the media queue had no room.
    Dropped,
}

/// Owns configuration, derived sizes, the redundancy engine and the
/// two external collaborators, and implements the talker/listener
/// callbacks invoked once per packet by the pipeline.
pub struct MapCore<Q: MediaQueue, M: MediaClockRecovery = NullMcr> {
    media_queue: Q,
    mcr: M,
    tre: TemporalRedundancyEngine,
    config: StreamConfig,
    derived: Option<DerivedLayout>,
    is_talker: Option<bool>,
    data_valid: bool,
    media_q_item_sync_ts: bool,
    /// Set once a MADT-configured listener receives a frame too short to
    /// carry both copies; from then on the stream is treated as if MADT
    /// were never configured. Reset by `gen_init`/`gen_end`.
    madt_disabled: bool,
    /// Rate-limits the "queue full" drop log to one `warn!` per outage.
    media_queue_full_warned: bool,
    /// Reserved for future sequencing hooks; never incremented by the
    /// core itself.
    #[allow(dead_code)]
    interval_counter: u32,
    next_report: Option<Instant>,
}

impl<Q: MediaQueue, M: MediaClockRecovery> MapCore<Q, M> {
    pub fn new(media_queue: Q, mcr: M) -> Self {
        Self {
            media_queue,
            mcr,
            tre: TemporalRedundancyEngine::new(),
            config: StreamConfig::default(),
            derived: None,
            is_talker: None,
            data_valid: false,
            media_q_item_sync_ts: false,
            madt_disabled: false,
            media_queue_full_warned: false,
            interval_counter: 0,
            next_report: None,
        }
    }

    fn layout(&self) -> Result<DerivedLayout> {
        self.derived.ok_or(MapError::NotInitialized)
    }

    /// Whether the redundancy engine should still be treated as live:
    /// allocated, and not permanently disabled by MADT starvation.
    fn tre_active(&self) -> bool {
        self.tre.is_active() && !self.madt_disabled
    }

    pub fn subtype(&self) -> u8 {
        AAF_SUBTYPE
    }

    pub fn avtp_version(&self) -> u8 {
        AVTP_VERSION
    }

    pub fn transmit_interval(&self) -> u32 {
        self.config.tx_interval_hz
    }

    pub fn max_data_size(&self) -> Result<u32> {
        let layout = self.layout()?;
        let payload = match self.is_talker {
            Some(true) => layout.payload_size_max_talker,
            _ => layout.payload_size_max_listener,
        };
        Ok(crate::config::HEADER_SIZE + payload)
    }

    /// Compute derived sizes, size the media queue, and mark the stream
    /// valid. Does not yet commit to a direction.
    pub fn gen_init(&mut self, config: StreamConfig) -> Result<()> {
        let layout = DerivedLayout::compute(&config)?;
        self.media_queue
            .set_size(config.item_count as usize, layout.item_size as usize);
        self.media_queue
            .set_max_latency(config.presentation_latency_usec);
        self.config = config;
        self.derived = Some(layout);
        self.data_valid = true;
        self.media_q_item_sync_ts = false;
        self.madt_disabled = false;
        self.media_queue_full_warned = false;
        Ok(())
    }

    pub fn tx_init(&mut self) -> Result<()> {
        if self.is_talker == Some(false) {
            return Err(MapError::DirectionAlreadyBound);
        }
        let layout = self.layout()?;
        self.is_talker = Some(true);
        if layout.madt_enabled() {
            self.tre.allocate_talker(
                layout.payload_size as usize,
                layout.temporal_redundant_offset_packets,
            );
        }
        Ok(())
    }

    pub fn rx_init(&mut self) -> Result<()> {
        if self.is_talker == Some(true) {
            return Err(MapError::DirectionAlreadyBound);
        }
        if !validate_packing_factor(self.config.packing_factor, self.config.sparse_mode) {
            return Err(MapError::InvalidPackingFactor(self.config.packing_factor));
        }
        let layout = self.layout()?;
        self.is_talker = Some(false);
        self.mcr.open(
            self.config.audio_mcr,
            self.config.mcr_timestamp_interval,
            self.config.mcr_recovery_interval,
        );
        if layout.madt_enabled() {
            self.tre.allocate_listener(
                layout.payload_size as usize,
                layout.temporal_redundant_offset_packets,
            );
        }
        Ok(())
    }

    pub fn end(&mut self) {
        self.mcr.close();
    }

    pub fn gen_end(&mut self) {
        self.tre.free();
        self.derived = None;
        self.is_talker = None;
        self.madt_disabled = false;
    }

    /// Produce one outgoing packet at the given sequence number into
    /// `out`. Returns `NotReady` without mutating any state if the
    /// media queue does not yet have a full packet's worth of bytes.
    pub fn tx(&mut self, seq: u8, out: &mut [u8]) -> Result<TxOutcome> {
        let layout = self.layout()?;
        let payload_size = layout.payload_size as usize;
        let madt = layout.madt_enabled();
        let total_len = layout.header_and_payload(madt) as usize;

        if out.len() < total_len {
            return Err(MapError::AllocationFailed("tx buffer smaller than one frame"));
        }
        if !self.media_queue.is_available_bytes(payload_size, false) {
            return Ok(TxOutcome::NotReady);
        }

        let mut fresh_payload = vec![0u8; payload_size];
        let mut tv = false;
        let mut tu = false;
        let mut timestamp = 0u32;

        {
            let item = self
                .media_queue
                .tail_lock(false)
                .ok_or(MapError::AllocationFailed("media queue tail unavailable"))?;
            let available = item.data_len() - item.read_idx();
            let to_copy = payload_size.min(available);
            let start = item.read_idx();
            fresh_payload[..to_copy].copy_from_slice(&item.data()[start..start + to_copy]);
            item.set_read_idx(start + to_copy);

            let sparse_suppressed =
                self.config.sparse_mode == SparseMode::Enabled && seq % 8 != 0;
            if !sparse_suppressed {
                let extra_usec = self.config.max_transit_usec
                    + if madt {
                        self.config.temporal_redundant_offset_usec
                    } else {
                        0
                    };
                let at = item.avtp_time_mut();
                if at.timestamp_is_valid() {
                    at.add_usec(extra_usec);
                    tv = true;
                    tu = at.timestamp_is_uncertain();
                    timestamp = at.get_avtp_timestamp();
                }
            }

            if item.read_idx() >= item.data_len() {
                self.media_queue.tail_pull();
            }
            self.media_queue.tail_unlock();
        }

        let header = AafHeader {
            sequence: seq,
            tv,
            tu,
            sp: self.config.sparse_mode == SparseMode::Enabled,
            timestamp,
            format: layout.aaf_format,
            nominal_rate: layout.aaf_rate,
            channels: self.config.channels,
            bit_depth: layout.aaf_bit_depth,
            payload_length: if madt {
                (payload_size * 2) as u16
            } else {
                payload_size as u16
            },
            event_field: self.config.event_field,
        };
        header.encode(&mut out[..HEADER_LEN]);

        if madt {
            let primary = self.tre.talker_step(&fresh_payload, payload_size);
            out[HEADER_LEN..HEADER_LEN + payload_size].copy_from_slice(&primary);
            out[HEADER_LEN + payload_size..HEADER_LEN + 2 * payload_size]
                .copy_from_slice(&fresh_payload);
        } else {
            out[HEADER_LEN..HEADER_LEN + payload_size].copy_from_slice(&fresh_payload);
        }

        Ok(TxOutcome::Wrote(total_len))
    }

    fn set_invalid(&mut self) {
        if self.data_valid {
            log::warn!("AAF stream header mismatch, muting");
        }
        self.data_valid = false;
    }

    fn set_valid(&mut self) {
        if !self.data_valid {
            log::info!("AAF stream header valid again, unmuting");
        }
        self.data_valid = true;
    }

    /// Parse, validate and deliver one incoming frame.
    pub fn rx(&mut self, frame: &[u8]) -> Result<RxOutcome> {
        let layout = self.layout()?;

        let header = match AafHeader::decode(frame) {
            Some(h) => h,
            None => {
                self.set_invalid();
                return Ok(RxOutcome::Muted);
            }
        };

        let payload_len = header.payload_length as usize;
        if frame.len() < HEADER_LEN + payload_len {
            self.set_invalid();
            return Ok(RxOutcome::Muted);
        }

        let remote_sparse = if header.sp {
            SparseMode::Enabled
        } else {
            SparseMode::Disabled
        };
        if remote_sparse != self.config.sparse_mode {
            log::debug!(
                "remote SP bit disagrees with local sparse mode, following remote ({:?} -> {:?})",
                self.config.sparse_mode,
                remote_sparse
            );
            self.config.sparse_mode = remote_sparse;
        }

        let Some(incoming_width) = header.format.wire_sample_width() else {
            self.set_invalid();
            return Ok(RxOutcome::Muted);
        };
        let expected_single_len =
            layout.frames_per_packet as usize * incoming_width * self.config.channels as usize;
        let madt_incoming = layout.madt_enabled()
            && self.tre_active()
            && payload_len == expected_single_len * 2;
        let stream_matches = header.nominal_rate == layout.aaf_rate
            && header.channels == self.config.channels
            && header.event_field == self.config.event_field
            && (payload_len == expected_single_len || madt_incoming);
        if !stream_matches {
            self.set_invalid();
            return Ok(RxOutcome::Muted);
        }

        let needs_conversion = header.format != layout.aaf_format;
        if needs_conversion && !(header.format.is_integer() && layout.aaf_format.is_integer()) {
            self.set_invalid();
            return Ok(RxOutcome::Muted);
        }

        if layout.madt_enabled() && self.tre_active() && !madt_incoming {
            log::warn!(
                "MADT-configured stream received a single-copy frame, disabling temporal redundancy for the remainder of the stream"
            );
            self.madt_disabled = true;
        }

        let body = &frame[HEADER_LEN..HEADER_LEN + payload_len];
        let (primary_wire, redundant_wire) = if madt_incoming {
            (
                &body[..expected_single_len],
                Some(&body[expected_single_len..2 * expected_single_len]),
            )
        } else {
            (body, None)
        };

        let convert = |wire: &[u8]| {
            if needs_conversion {
                SampleConverter::convert_buffer(
                    wire,
                    header.format.integer_byte_width().unwrap(),
                    layout.aaf_format.integer_byte_width().unwrap(),
                )
            } else {
                wire.to_vec()
            }
        };

        let primary = convert(primary_wire);
        let delivered = self.append_to_head(&primary, Some((header.tv, header.tu, header.timestamp)));

        if let Some(redundant_wire) = redundant_wire {
            let redundant = convert(redundant_wire);
            self.tre
                .listener_step(&redundant, layout.payload_size as usize, layout.aaf_format);
        }
        if self.tre_active() {
            self.tre.note_frame_delivered();
        }

        self.set_valid();
        Ok(if delivered {
            RxOutcome::Delivered
        } else {
            RxOutcome::Dropped
        })
    }

    /// Recover `n` consecutive lost packets from the redundancy delay
    /// line and deliver them with an unknown timestamp.
    pub fn rx_lost(&mut self, n: u32) -> Result<()> {
        if !self.tre_active() {
            return Ok(());
        }
        let layout = self.layout()?;
        let recovered = self
            .tre
            .rx_lost(n, layout.payload_size as usize, layout.aaf_format);
        for r in recovered {
            self.append_to_head(&r.bytes, None);
        }
        Ok(())
    }

    /// Append `payload` to the media queue's head item, pushing it once
    /// full. `timestamp` is `Some((tv, tu, ts))` from a live header, or
    /// `None` for a recovered/synthesised payload whose timestamp is
    /// always unknown. Returns whether the bytes were delivered.
    fn append_to_head(&mut self, payload: &[u8], timestamp: Option<(bool, bool, u32)>) -> bool {
        let Some(item) = self.media_queue.head_lock() else {
            if self.media_queue_full_warned {
                log::debug!("media queue still full, dropping frame");
            } else {
                log::warn!("media queue full, dropping frame");
                self.media_queue_full_warned = true;
            }
            return false;
        };
        self.media_queue_full_warned = false;

        if item.data_len() == 0 {
            match timestamp {
                Some((true, tu, ts)) => {
                    let at = item.avtp_time_mut();
                    at.set_to_timestamp(ts);
                    at.sub_usec(self.config.presentation_latency_usec);
                    at.set_timestamp_valid(true);
                    at.set_timestamp_uncertain(tu);
                    self.media_q_item_sync_ts = true;
                }
                Some((false, _, _)) => {
                    if !self.media_q_item_sync_ts {
                        self.media_queue.head_unlock();
                        return false;
                    }
                    item.avtp_time_mut().set_timestamp_valid(false);
                }
                None => {
                    item.avtp_time_mut().set_timestamp_valid(false);
                }
            }
        }

        let start = item.data_len();
        let room = item.item_size().saturating_sub(start);
        let to_copy = payload.len().min(room);
        item.data_mut()[start..start + to_copy].copy_from_slice(&payload[..to_copy]);
        item.set_data_len(start + to_copy);

        let full = item.data_len() >= item.item_size();
        if full {
            self.media_queue.head_push();
        }
        self.media_queue.head_unlock();
        true
    }

    /// If `report_seconds` have elapsed since the last report (or since
    /// `rx_init`), return and reset the redundancy-engine counters. A
    /// deadline overshot by a long stall re-bases on `now` rather than
    /// firing once per missed interval.
    pub fn report_if_due(&mut self, now: Instant) -> Option<RedundancyStats> {
        let period = Duration::from_secs(self.config.report_seconds.max(1) as u64);
        let deadline = *self.next_report.get_or_insert(now + period);
        if now < deadline {
            return None;
        }
        let mut next = deadline + period;
        while next <= now {
            next += period;
        }
        self.next_report = Some(next);
        Some(self.tre.take_stats())
    }
}
