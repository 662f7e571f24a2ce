//! Scratch memory for the in-flight write operation of a connection.
//!
//! A connection has at most one outstanding write, so a single inline buffer
//! covers the hot path: the response head or chunk framing of every write is
//! encoded into it and it is handed back once the write completes. When the slot
//! is already leased, or the request does not fit, the arena falls back to a plain
//! heap buffer.

use bytes::BytesMut;

/// Capacity of the inline slot.
pub const INLINE_CAPACITY: usize = 1024;

/// Allocation counters of one [`HandlerMemory`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ArenaStats {
    pub inline_hits: u64,
    pub heap_fallbacks: u64,
}

/// Single-slot scratch arena owned by one connection.
#[derive(Debug)]
pub struct HandlerMemory {
    slot: Option<BytesMut>,
    stats: ArenaStats,
}

/// A leased scratch buffer.
///
/// Must be given back through [`HandlerMemory::deallocate`]; a scratch dropped
/// elsewhere leaves the inline slot unavailable and later requests use the heap.
#[derive(Debug)]
pub struct Scratch {
    buf: BytesMut,
    inline: bool,
}

impl Default for HandlerMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlerMemory {
    pub fn new() -> Self {
        Self { slot: Some(BytesMut::with_capacity(INLINE_CAPACITY)), stats: ArenaStats::default() }
    }

    /// Returns a buffer able to hold `size` bytes without growing.
    pub fn allocate(&mut self, size: usize) -> Scratch {
        if size <= INLINE_CAPACITY {
            if let Some(buf) = self.slot.take() {
                self.stats.inline_hits += 1;
                return Scratch { buf, inline: true };
            }
        }

        self.stats.heap_fallbacks += 1;
        Scratch { buf: BytesMut::with_capacity(size), inline: false }
    }

    /// Releases `scratch`; the inline slot becomes available again.
    pub fn deallocate(&mut self, scratch: Scratch) {
        if scratch.inline {
            let mut buf = scratch.buf;
            buf.clear();
            // encoding may have grown the slot past its size, start over in that case
            if buf.capacity() > INLINE_CAPACITY * 4 {
                buf = BytesMut::with_capacity(INLINE_CAPACITY);
            }
            self.slot = Some(buf);
        }
    }

    /// Whether the inline slot is currently leased.
    #[inline]
    pub fn in_use(&self) -> bool {
        self.slot.is_none()
    }

    #[inline]
    pub fn stats(&self) -> ArenaStats {
        self.stats
    }
}

impl Scratch {
    /// An unpooled, empty scratch used when a write carries no framing.
    pub fn empty() -> Self {
        Self { buf: BytesMut::new(), inline: false }
    }

    #[inline]
    pub fn is_inline(&self) -> bool {
        self.inline
    }

    #[inline]
    pub fn buf_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }
}

impl AsRef<[u8]> for Scratch {
    fn as_ref(&self) -> &[u8] {
        &self.buf
    }
}

impl std::ops::Deref for Scratch {
    type Target = BytesMut;

    fn deref(&self) -> &Self::Target {
        &self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_slot_is_reused() {
        let mut memory = HandlerMemory::new();

        for _ in 0..3 {
            let mut scratch = memory.allocate(64);
            assert!(scratch.is_inline());
            assert!(memory.in_use());
            scratch.buf_mut().extend_from_slice(b"HTTP/1.1 200 OK\r\n");
            memory.deallocate(scratch);
            assert!(!memory.in_use());
        }

        assert_eq!(memory.stats(), ArenaStats { inline_hits: 3, heap_fallbacks: 0 });
    }

    #[test]
    fn falls_back_when_occupied_or_too_large() {
        let mut memory = HandlerMemory::new();

        let first = memory.allocate(16);
        let second = memory.allocate(16);
        assert!(first.is_inline());
        assert!(!second.is_inline());

        let large = memory.allocate(INLINE_CAPACITY + 1);
        assert!(!large.is_inline());
        assert!(large.capacity() > INLINE_CAPACITY);

        memory.deallocate(second);
        assert!(memory.in_use());
        memory.deallocate(first);
        assert!(!memory.in_use());
        memory.deallocate(large);

        assert_eq!(memory.stats(), ArenaStats { inline_hits: 1, heap_fallbacks: 2 });
    }

    #[test]
    fn returned_slot_is_cleared() {
        let mut memory = HandlerMemory::new();
        let mut scratch = memory.allocate(8);
        scratch.buf_mut().extend_from_slice(b"leftover");
        memory.deallocate(scratch);

        let scratch = memory.allocate(8);
        assert!(scratch.is_empty());
    }
}
