//! Fixed buffer pools for codec input/output and PCM delivery
//!
//! Buffers are allocated once and handed out by index, so the decode
//! loop never allocates per frame.

use crossbeam::queue::ArrayQueue;

use crate::error::PoolError;

/// Fixed pool of equally sized byte buffers checked out by index
pub struct BufferPool {
    slots: Vec<Box<[u8]>>,
    /// Valid bytes per slot
    filled: Vec<usize>,
    checked_out: Vec<bool>,
    free: ArrayQueue<usize>,
}

impl BufferPool {
    /// Create a pool of `count` buffers of `capacity` bytes each.
    ///
    /// A pool always holds at least one buffer.
    pub fn new(count: usize, capacity: usize) -> Self {
        if count == 0 {
            tracing::warn!("Buffer pool size 0 raised to 1");
        }
        let count = count.max(1);

        let free = ArrayQueue::new(count);
        for index in 0..count {
            let _ = free.push(index);
        }

        Self {
            slots: (0..count).map(|_| vec![0u8; capacity].into_boxed_slice()).collect(),
            filled: vec![0; count],
            checked_out: vec![false; count],
            free,
        }
    }

    /// Take a free buffer, if any
    pub fn checkout(&mut self) -> Option<usize> {
        let index = self.free.pop()?;
        self.checked_out[index] = true;
        self.filled[index] = 0;
        Some(index)
    }

    /// Return a buffer to the pool
    pub fn checkin(&mut self, index: usize) -> Result<(), PoolError> {
        self.ensure_checked_out(index)?;
        self.checked_out[index] = false;
        self.filled[index] = 0;
        // Capacity equals slot count and the index was checked out, so this cannot fail
        let _ = self.free.push(index);
        Ok(())
    }

    /// Writable view of a checked-out buffer
    pub fn slot_mut(&mut self, index: usize) -> Result<&mut [u8], PoolError> {
        self.ensure_checked_out(index)?;
        Ok(&mut self.slots[index])
    }

    /// Record how many bytes of a checked-out buffer are valid
    pub fn set_filled(&mut self, index: usize, len: usize) -> Result<(), PoolError> {
        self.ensure_checked_out(index)?;
        self.filled[index] = len.min(self.slots[index].len());
        Ok(())
    }

    /// Valid bytes of a checked-out buffer
    pub fn filled(&self, index: usize) -> Result<&[u8], PoolError> {
        self.ensure_checked_out(index)?;
        Ok(&self.slots[index][..self.filled[index]])
    }

    pub fn is_checked_out(&self, index: usize) -> bool {
        self.checked_out.get(index).copied().unwrap_or(false)
    }

    /// Number of buffers in the pool
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of buffers currently available
    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Capacity of each buffer in bytes
    pub fn buffer_capacity(&self) -> usize {
        self.slots.first().map_or(0, |slot| slot.len())
    }

    /// Return every buffer to the pool
    pub fn reset(&mut self) {
        for index in 0..self.slots.len() {
            if self.checked_out[index] {
                let _ = self.checkin(index);
            }
        }
    }

    fn ensure_checked_out(&self, index: usize) -> Result<(), PoolError> {
        match self.checked_out.get(index) {
            None => Err(PoolError::InvalidIndex(index)),
            Some(false) => Err(PoolError::NotCheckedOut(index)),
            Some(true) => Ok(()),
        }
    }
}

/// Reusable scratch buffers for fixed-size PCM chunks
pub struct PcmScratch {
    normal: Vec<u8>,
    muted: Vec<u8>,
}

impl PcmScratch {
    pub fn new(normal_len: usize, muted_len: usize) -> Self {
        Self {
            normal: vec![0u8; normal_len],
            muted: vec![0u8; muted_len],
        }
    }

    /// Copy decoded PCM into the matching scratch buffer.
    ///
    /// The returned chunk always has the fixed length for the mute state;
    /// short input is zero-padded and long input is truncated.
    pub fn fill(&mut self, pcm: &[u8], muted: bool) -> &[u8] {
        let target = if muted { &mut self.muted } else { &mut self.normal };
        let copied = pcm.len().min(target.len());
        target[..copied].copy_from_slice(&pcm[..copied]);
        target[copied..].fill(0);
        target
    }

    pub fn normal_len(&self) -> usize {
        self.normal.len()
    }

    pub fn muted_len(&self) -> usize {
        self.muted.len()
    }
}
