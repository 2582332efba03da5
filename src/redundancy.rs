//! Temporal Redundancy (MADT): delayed in-band duplication of payloads
//! for send-side insertion and receive-side loss recovery.

use crate::config::AafFormat;
use crate::queue::CircularByteQueue;
use crate::wire::sample::SampleConverter;

/// Running counters for the listener-side loss-recovery path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RedundancyStats {
    pub total_frames: u64,
    pub lost_frames: u64,
    pub needed_available: u64,
    pub needed_not_available: u64,
}

/// One recovered payload handed back to the caller for delivery into
/// the media queue. Its presentation timestamp is always unknown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveredPayload {
    pub bytes: Vec<u8>,
}

/// Wraps the raw delay-line queue and, on the listener side, a
/// parallel one-byte-per-entry format tag queue.
#[derive(Debug, Default)]
pub struct TemporalRedundancyEngine {
    data: CircularByteQueue,
    entry_types: CircularByteQueue,
    frame_size: usize,
    offset_packets: u32,
    stats: RedundancyStats,
}

impl TemporalRedundancyEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.data.is_valid()
    }

    /// Configured MADT delay, in packets.
    pub fn offset_packets(&self) -> u32 {
        self.offset_packets
    }

    pub fn stats(&self) -> RedundancyStats {
        self.stats
    }

    /// Reset the four counters, returning their values prior to reset
    /// for periodic reporting.
    pub fn take_stats(&mut self) -> RedundancyStats {
        std::mem::take(&mut self.stats)
    }

    /// Talker-side setup: a plain byte delay line, prefilled with
    /// `offsetPackets * frameSize` zero bytes.
    pub fn allocate_talker(&mut self, frame_size: usize, offset_packets: u32) {
        self.frame_size = frame_size;
        self.offset_packets = offset_packets;
        // Capacity must cover the prefilled depth plus one more frame
        // momentarily queued before each step's pull drains it back down.
        let capacity = frame_size * (offset_packets as usize + 1) + 1;
        self.data.allocate(capacity);
        self.data.push(None, frame_size * offset_packets as usize);
    }

    /// Listener-side setup: the same delay line plus a parallel entry-type
    /// queue, both prefilled so their depths stay in lockstep and the
    /// first `offsetPackets` loss recoveries see "was itself a gap".
    pub fn allocate_listener(&mut self, frame_size: usize, offset_packets: u32) {
        self.frame_size = frame_size;
        self.offset_packets = offset_packets;
        let capacity = frame_size * (offset_packets as usize + 1) + 1;
        self.data.allocate(capacity);
        self.entry_types.allocate(offset_packets as usize + 2);
        for _ in 0..offset_packets {
            self.data.push(None, frame_size);
            self.entry_types.push(Some(&[AafFormat::Unspec as u8]), 1);
        }
        self.stats = RedundancyStats::default();
    }

    pub fn free(&mut self) {
        self.data.free();
        self.entry_types.free();
    }

    /// Run one outgoing packet through the delay line. `fresh_payload`
    /// becomes the redundant copy in the outgoing frame as-is; the
    /// return value is the primary copy, delayed by `offsetPackets`.
    pub fn talker_step(&mut self, fresh_payload: &[u8], payload_size: usize) -> Vec<u8> {
        debug_assert_eq!(fresh_payload.len(), payload_size);
        self.data.push(Some(fresh_payload), payload_size);
        if self.frame_size > payload_size {
            self.data.push(None, self.frame_size - payload_size);
        }
        let mut primary = vec![0u8; payload_size];
        self.data.pull(Some(&mut primary), payload_size);
        if self.frame_size > payload_size {
            self.data.pull(None, self.frame_size - payload_size);
        }
        primary
    }

    /// Save an incoming redundant payload and tag it with the format it
    /// arrived in, then pull the oldest saved entry and discard it.
    /// Returns the discarded entry's bytes for diagnostic comparison
    /// against the packet's own primary payload.
    pub fn listener_step(
        &mut self,
        redundant_payload: &[u8],
        payload_size: usize,
        incoming_format: AafFormat,
    ) -> Vec<u8> {
        self.data.push(Some(redundant_payload), payload_size);
        if self.frame_size > payload_size {
            self.data.push(None, self.frame_size - payload_size);
        }
        self.entry_types
            .push(Some(&[incoming_format as u8]), 1);

        let mut discarded = vec![0u8; self.frame_size];
        self.data.pull(Some(&mut discarded), self.frame_size);
        let mut type_byte = [0u8; 1];
        self.entry_types.pull(Some(&mut type_byte), 1);
        discarded.truncate(payload_size);
        discarded
    }

    /// Recover `n` consecutive lost packets from the delay line.
    /// `payload_size` is the listener's configured payload size;
    /// `configured_format` is the listener's configured sample format.
    pub fn rx_lost(
        &mut self,
        n: u32,
        payload_size: usize,
        configured_format: AafFormat,
    ) -> Vec<RecoveredPayload> {
        let mut recovered = Vec::with_capacity(n as usize);
        for _ in 0..n {
            let mut type_byte = [0u8; 1];
            self.entry_types.pull(Some(&mut type_byte), 1);
            let mut stored = vec![0u8; self.frame_size];
            self.data.pull(Some(&mut stored), self.frame_size);
            stored.truncate(payload_size.min(stored.len()));

            let stored_format = AafFormat::from_wire(type_byte[0]);
            let bytes = if stored_format == AafFormat::Unspec {
                self.stats.needed_not_available += 1;
                vec![0u8; payload_size]
            } else {
                self.stats.needed_available += 1;
                if stored_format != configured_format
                    && stored_format.is_integer()
                    && configured_format.is_integer()
                {
                    let src_width = stored_format.integer_byte_width().unwrap();
                    let dst_width = configured_format.integer_byte_width().unwrap();
                    SampleConverter::convert_buffer(&stored, src_width, dst_width)
                } else {
                    stored
                }
            };

            self.stats.total_frames += 1;
            self.stats.lost_frames += 1;

            // Re-seed so the delay line keeps its configured depth: the
            // slot just consumed for recovery is itself now a gap.
            self.data.push(None, self.frame_size);
            self.entry_types.push(Some(&[AafFormat::Unspec as u8]), 1);

            recovered.push(RecoveredPayload { bytes });
        }
        recovered
    }

    /// Account for one packet that arrived and needed no recovery.
    pub fn note_frame_delivered(&mut self) {
        self.stats.total_frames += 1;
    }
}
