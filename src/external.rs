//! Contractual interfaces to collaborators that live outside this
//! module: the media queue container and the AVTP time abstraction.
//! Neither is implemented here; the mapping core is generic over them
//! so it can be driven by a real pipeline or by a test double.

/// One fixed-size slot in the media queue.
///
/// `data_len` is the writer's cursor (bytes filled so far); `read_idx`
/// is the reader's cursor. Both stay within `item_size`.
pub trait MediaQueueItem {
    fn data(&self) -> &[u8];
    fn data_mut(&mut self) -> &mut [u8];
    fn item_size(&self) -> usize;
    fn data_len(&self) -> usize;
    fn set_data_len(&mut self, len: usize);
    fn read_idx(&self) -> usize;
    fn set_read_idx(&mut self, idx: usize);
    fn avtp_time(&self) -> &dyn AvtpTime;
    fn avtp_time_mut(&mut self) -> &mut dyn AvtpTime;
}

/// External SPSC FIFO of fixed-size audio items with separate head and
/// tail locks.
pub trait MediaQueue {
    type Item: MediaQueueItem;

    fn set_size(&mut self, count: usize, item_bytes: usize);
    fn set_max_latency(&mut self, usec: u32);
    fn is_available_bytes(&self, n: usize, wait: bool) -> bool;

    fn head_lock(&mut self) -> Option<&mut Self::Item>;
    fn head_push(&mut self);
    fn head_unlock(&mut self);

    fn tail_lock(&mut self, wait: bool) -> Option<&mut Self::Item>;
    fn tail_pull(&mut self);
    fn tail_unlock(&mut self);
}

/// Get/set/add/subtract microseconds on an opaque presentation
/// timestamp value owned by the pipeline.
pub trait AvtpTime {
    fn timestamp_is_valid(&self) -> bool;
    fn set_timestamp_valid(&mut self, valid: bool);
    fn timestamp_is_uncertain(&self) -> bool;
    fn set_timestamp_uncertain(&mut self, uncertain: bool);
    fn add_usec(&mut self, usec: u32);
    fn sub_usec(&mut self, usec: u32);
    fn get_avtp_timestamp(&self) -> u32;
    fn set_to_timestamp(&mut self, timestamp: u32);
}
