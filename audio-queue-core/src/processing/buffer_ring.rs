use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Fixed-capacity PCM byte buffer cycled between an engine and its device.
///
/// Ownership is the state: a buffer held by the engine's ring is free, a
/// buffer moved into `QueueDevice::enqueue` is in flight. The type is not
/// `Clone`, so both sides can never hold the same buffer.
#[derive(Debug)]
pub struct AudioBuffer {
    index: usize,
    generation: u64,
    data: Box<[u8]>,
    len: usize,
}

impl AudioBuffer {
    fn new(index: usize, generation: u64, capacity: usize) -> Self {
        Self {
            index,
            generation,
            data: vec![0u8; capacity].into_boxed_slice(),
            len: 0,
        }
    }

    /// Detached buffer that belongs to no ring, for driving stages directly.
    pub fn standalone(capacity: usize) -> Self {
        Self::new(0, 0, capacity)
    }

    /// Slot index in the owning ring.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Number of valid bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.data.len()
    }

    /// Valid bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Whole backing storage, for producers that fill in place and then call `set_len`.
    pub fn storage_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Valid bytes, mutable.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data[..self.len]
    }

    pub fn set_len(&mut self, len: usize) {
        self.len = len.min(self.data.len());
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Append as much of `src` as fits. Returns the number of bytes taken.
    pub fn push_bytes(&mut self, src: &[u8]) -> usize {
        let n = src.len().min(self.data.len() - self.len);
        self.data[self.len..self.len + n].copy_from_slice(&src[..n]);
        self.len += n;
        n
    }
}

#[derive(Debug)]
enum Slot {
    Free(AudioBuffer),
    InFlight,
}

/// Fixed pool of indexed buffer slots.
///
/// Allocated when an engine starts and emptied when it stops. Buffers handed
/// out by `checkout` come back through `reclaim`; a buffer from an older
/// ring generation is rejected and simply dropped.
#[derive(Debug, Default)]
pub struct BufferRing {
    slots: Vec<Slot>,
    buffer_size: usize,
    generation: u64,
}

impl BufferRing {
    pub fn new(count: usize, buffer_size: usize) -> Self {
        let generation = NEXT_GENERATION.fetch_add(1, Ordering::Relaxed);
        let slots = (0..count)
            .map(|i| Slot::Free(AudioBuffer::new(i, generation, buffer_size)))
            .collect();
        Self {
            slots,
            buffer_size,
            generation,
        }
    }

    /// A ring with no slots.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of slots, free or in flight.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn free_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| matches!(s, Slot::Free(_)))
            .count()
    }

    pub fn in_flight_count(&self) -> usize {
        self.len() - self.free_count()
    }

    /// Take the lowest-indexed free buffer, marking its slot in flight.
    pub fn checkout(&mut self) -> Option<AudioBuffer> {
        let slot = self.slots.iter_mut().find(|s| matches!(s, Slot::Free(_)))?;
        match std::mem::replace(slot, Slot::InFlight) {
            Slot::Free(mut buffer) => {
                buffer.clear();
                Some(buffer)
            }
            Slot::InFlight => None,
        }
    }

    /// Return a buffer to its slot. Returns false if it does not belong to this ring.
    pub fn reclaim(&mut self, buffer: AudioBuffer) -> bool {
        if buffer.generation != self.generation {
            return false;
        }
        match self.slots.get_mut(buffer.index) {
            Some(slot @ Slot::InFlight) => {
                *slot = Slot::Free(buffer);
                true
            }
            _ => false,
        }
    }

    /// Drop every slot.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.buffer_size = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkout_cycles_through_slots() {
        let mut ring = BufferRing::new(3, 8);
        assert_eq!(ring.free_count(), 3);

        let a = ring.checkout().unwrap();
        let b = ring.checkout().unwrap();
        let c = ring.checkout().unwrap();
        assert_eq!((a.index(), b.index(), c.index()), (0, 1, 2));
        assert!(ring.checkout().is_none());
        assert_eq!(ring.in_flight_count(), 3);

        assert!(ring.reclaim(b));
        let again = ring.checkout().unwrap();
        assert_eq!(again.index(), 1);
    }

    #[test]
    fn reclaimed_buffers_come_back_cleared() {
        let mut ring = BufferRing::new(1, 4);
        let mut buf = ring.checkout().unwrap();
        buf.push_bytes(&[1, 2, 3]);
        assert!(ring.reclaim(buf));

        let buf = ring.checkout().unwrap();
        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), 4);
    }

    #[test]
    fn rejects_buffers_from_another_ring() {
        let mut old = BufferRing::new(2, 4);
        let stale = old.checkout().unwrap();

        let mut ring = BufferRing::new(2, 4);
        let _ = ring.checkout().unwrap();
        assert!(!ring.reclaim(stale));
        assert_eq!(ring.free_count(), 1);
    }

    #[test]
    fn double_reclaim_is_rejected() {
        let mut ring = BufferRing::new(1, 4);
        let buf = ring.checkout().unwrap();
        assert!(ring.reclaim(buf));
        assert!(!ring.reclaim(AudioBuffer::standalone(4)));
        assert_eq!(ring.free_count(), 1);
    }

    #[test]
    fn clear_empties_the_ring() {
        let mut ring = BufferRing::new(4, 16);
        let _held = ring.checkout();
        ring.clear();
        assert!(ring.is_empty());
        assert_eq!(ring.len(), 0);
        assert!(ring.checkout().is_none());
    }

    #[test]
    fn push_bytes_stops_at_capacity() {
        let mut buf = AudioBuffer::standalone(4);
        assert_eq!(buf.push_bytes(&[1, 2, 3]), 3);
        assert_eq!(buf.push_bytes(&[4, 5, 6]), 1);
        assert!(buf.is_full());
        assert_eq!(buf.bytes(), &[1, 2, 3, 4]);
    }
}
