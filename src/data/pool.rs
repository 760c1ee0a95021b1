//! Power-of-two bucketed slab allocator (Memory Pool, component design §4.1).
//!
//! Backs every hot internal buffer: constraint bundles, body arrays,
//! pair-cache arenas. Each sub-pool owns a growable list of fixed-size
//! blocks; slot ids are handed out from a LIFO free list so reuse stays
//! cache-hot, mirroring the teacher's own allocator-adjacent code (the
//! `Arena`/`slab`-style index reuse in `rigid_body_set.rs`) generalized to
//! arbitrary byte sizes instead of a single element type.

/// Cache-line-ish alignment granularity blocks are sized against; stands in
/// for "at least the wide-SIMD lane size" from the design notes.
const ALIGNMENT_BYTES: usize = 64;

/// Target size, in bytes, of one block within a sub-pool. Each sub-pool picks
/// `slots_per_block = max(1, BLOCK_BYTES / slot_bytes)`.
const BLOCK_BYTES: usize = 16 * 1024;

/// A handle to a buffer taken from a [`Pool`]. Opaque: the only ways to read
/// or write its bytes are [`Pool::get`] / [`Pool::get_mut`].
#[derive(Debug)]
pub struct Buffer {
    power: u32,
    slot: u32,
    len: usize,
}

impl Buffer {
    /// Requested byte length (may be smaller than the bucket's capacity).
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The power-of-two bucket this buffer was taken from.
    pub fn power(&self) -> u32 {
        self.power
    }
}

struct SubPool {
    power: u32,
    slot_bytes: usize,
    slots_per_block: usize,
    blocks: Vec<Box<[u8]>>,
    free_ids: Vec<u32>,
    is_free: bit_vec::BitVec,
    next_id: u32,
    outstanding: usize,
}

impl SubPool {
    fn new(power: u32) -> Self {
        let slot_bytes = 1usize << power;
        let slots_per_block = (BLOCK_BYTES / slot_bytes).max(1);
        SubPool {
            power,
            slot_bytes,
            slots_per_block,
            blocks: Vec::new(),
            free_ids: Vec::new(),
            is_free: bit_vec::BitVec::new(),
            next_id: 0,
            outstanding: 0,
        }
    }

    fn locate(&self, slot: u32) -> (usize, usize) {
        let slot = slot as usize;
        (slot / self.slots_per_block, (slot % self.slots_per_block) * self.slot_bytes)
    }

    fn ensure_block_for(&mut self, slot: u32) {
        let block_index = slot as usize / self.slots_per_block;
        while self.blocks.len() <= block_index {
            self.blocks
                .push(vec![0u8; self.slots_per_block * self.slot_bytes].into_boxed_slice());
        }
    }

    fn take_slot(&mut self) -> u32 {
        self.outstanding += 1;
        if let Some(slot) = self.free_ids.pop() {
            self.is_free.set(slot as usize, false);
            return slot;
        }
        let slot = self.next_id;
        self.next_id += 1;
        self.ensure_block_for(slot);
        if self.is_free.len() <= slot as usize {
            self.is_free.grow(slot as usize + 1 - self.is_free.len(), false);
        }
        slot
    }

    fn return_slot(&mut self, slot: u32) {
        assert!(
            !self.is_free.get(slot as usize).unwrap_or(false),
            "double-return to memory pool bucket 2^{} (slot {})",
            self.power,
            slot
        );
        self.is_free.set(slot as usize, true);
        self.free_ids.push(slot);
        self.outstanding -= 1;
    }

    fn bytes(&self, slot: u32, len: usize) -> &[u8] {
        let (block, offset) = self.locate(slot);
        &self.blocks[block][offset..offset + len]
    }

    fn bytes_mut(&mut self, slot: u32, len: usize) -> &mut [u8] {
        let (block, offset) = self.locate(slot);
        &mut self.blocks[block][offset..offset + len]
    }
}

/// The typed slab allocator described in component design §4.1.
///
/// Every buffer returned lives at a stable `(power, slot)` location for as
/// long as it is held; blocks are only ever appended to, never relocated, so
/// the byte slices handed out by [`Pool::get`]/[`Pool::get_mut`] keep a
/// consistent backing address across the life of the buffer.
pub struct Pool {
    max_power: u32,
    sub_pools: Vec<SubPool>,
}

impl Pool {
    /// Creates a pool supporting buckets `2^0 ..= 2^max_power` bytes.
    pub fn new(max_power: u32) -> Self {
        let sub_pools = (0..=max_power).map(SubPool::new).collect();
        Pool {
            max_power,
            sub_pools,
        }
    }

    /// The largest supported bucket, as a power of two in bytes.
    pub fn max_power(&self) -> u32 {
        self.max_power
    }

    fn power_for(byte_count: usize) -> u32 {
        if byte_count <= 1 {
            0
        } else {
            (byte_count - 1).ilog2() + 1
        }
    }

    /// Takes a buffer of at least `byte_count` bytes.
    ///
    /// # Panics
    /// If `byte_count` exceeds the largest bucket this pool supports.
    pub fn take(&mut self, byte_count: usize) -> Buffer {
        let power = Self::power_for(byte_count);
        assert!(
            power <= self.max_power,
            "pool: requested {byte_count} bytes exceeds max bucket 2^{}",
            self.max_power
        );
        let slot = self.sub_pools[power as usize].take_slot();
        Buffer {
            power,
            slot,
            len: byte_count,
        }
    }

    /// Scoped acquisition with guaranteed release on every exit path,
    /// including panics that unwind through the guard's `Drop`.
    pub fn take_scoped(&mut self, byte_count: usize) -> ScopedBuffer<'_> {
        let buffer = self.take(byte_count);
        ScopedBuffer {
            pool: self,
            buffer: Some(buffer),
        }
    }

    /// Releases `buffer`. Fatal if the underlying slot was already free
    /// (double-return) — this is a programming error, per the contract.
    pub fn give_back(&mut self, buffer: Buffer) {
        self.sub_pools[buffer.power as usize].return_slot(buffer.slot);
    }

    /// Resizes `buffer` to `new_size`, copying `copy_bytes` from the old
    /// buffer into the new one when the bucket changes. Returns the
    /// (possibly unchanged) buffer; the old one is released automatically.
    pub fn resize(&mut self, buffer: Buffer, new_size: usize, copy_bytes: usize) -> Buffer {
        let new_power = Self::power_for(new_size);
        if new_power == buffer.power {
            return Buffer {
                power: buffer.power,
                slot: buffer.slot,
                len: new_size,
            };
        }
        let mut new_buffer = self.take(new_size);
        let copy_bytes = copy_bytes.min(buffer.len).min(new_buffer.len);
        if copy_bytes > 0 {
            let mut tmp = vec![0u8; copy_bytes];
            tmp.copy_from_slice(&self.get(&buffer)[..copy_bytes]);
            self.get_mut(&mut new_buffer)[..copy_bytes].copy_from_slice(&tmp);
        }
        self.give_back(buffer);
        new_buffer
    }

    pub fn get(&self, buffer: &Buffer) -> &[u8] {
        self.sub_pools[buffer.power as usize].bytes(buffer.slot, buffer.len)
    }

    pub fn get_mut(&mut self, buffer: &mut Buffer) -> &mut [u8] {
        self.sub_pools[buffer.power as usize].bytes_mut(buffer.slot, buffer.len)
    }

    /// Number of outstanding (taken minus returned) buffers for `power`.
    /// Debug hook backing testable property 6 (pool accounting).
    pub fn outstanding(&self, power: u32) -> usize {
        self.sub_pools
            .get(power as usize)
            .map_or(0, |sub| sub.outstanding)
    }

    pub fn total_outstanding(&self) -> usize {
        self.sub_pools.iter().map(|sub| sub.outstanding).sum()
    }
}

/// RAII guard returned by [`Pool::take_scoped`]; returns its buffer to the
/// pool on drop, regardless of the exit path.
pub struct ScopedBuffer<'a> {
    pool: &'a mut Pool,
    buffer: Option<Buffer>,
}

impl<'a> ScopedBuffer<'a> {
    pub fn bytes(&self) -> &[u8] {
        self.pool.get(self.buffer.as_ref().unwrap())
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        self.pool.get_mut(self.buffer.as_mut().unwrap())
    }
}

impl<'a> Drop for ScopedBuffer<'a> {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            self.pool.give_back(buffer);
        }
    }
}

#[allow(dead_code)]
fn assert_alignment_hint() -> usize {
    ALIGNMENT_BYTES
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_and_return_round_trips() {
        let mut pool = Pool::new(20);
        let mut buf = pool.take(100);
        assert_eq!(pool.outstanding(buf.power()), 1);
        pool.get_mut(&mut buf).fill(7);
        assert!(pool.get(&buf).iter().all(|&b| b == 7));
        pool.give_back(buf);
        assert_eq!(pool.total_outstanding(), 0);
    }

    #[test]
    #[should_panic(expected = "double-return")]
    fn double_return_is_fatal() {
        let mut pool = Pool::new(20);
        let buf = pool.take(16);
        let slot = buf.slot;
        let power = buf.power;
        pool.give_back(buf);
        // Reconstruct a duplicate handle to the same slot to exercise the
        // fatal-on-double-return contract without unsafe aliasing.
        pool.give_back(Buffer { power, slot, len: 16 });
    }

    #[test]
    fn resize_preserves_bytes_on_bucket_change() {
        let mut pool = Pool::new(20);
        let mut buf = pool.take(4);
        pool.get_mut(&mut buf).copy_from_slice(&[1, 2, 3, 4]);
        let resized = pool.resize(buf, 4096, 4);
        assert_eq!(&pool.get(&resized)[..4], &[1, 2, 3, 4]);
    }

    #[test]
    fn scoped_buffer_releases_on_drop() {
        let mut pool = Pool::new(20);
        {
            let mut scoped = pool.take_scoped(32);
            scoped.bytes_mut().fill(9);
        }
        assert_eq!(pool.total_outstanding(), 0);
    }

    #[test]
    fn lifo_reuse_of_returned_slots() {
        let mut pool = Pool::new(20);
        let a = pool.take(16);
        let a_slot = a.slot;
        pool.give_back(a);
        let b = pool.take(16);
        assert_eq!(b.slot, a_slot, "freed slots should be reused LIFO");
    }
}
