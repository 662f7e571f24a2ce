//! Chain of fixed-size receive chunks.
//!
//! Bytes read from the socket are appended into the spare capacity of the tail
//! chunk; when the tail is full a fresh chunk is pushed, so a variable-length read
//! never relocates data already received. Consumers drain from the front with
//! `BytesMut::split_to`, which hands out the consumed prefix without moving the
//! remaining bytes.

use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};

/// Capacity of every chunk appended to the chain.
pub const CHUNK_SIZE: usize = 8 * 1024;

/// Received-but-unconsumed bytes of one connection.
#[derive(Debug)]
pub struct BufferChain {
    chunks: VecDeque<BytesMut>,
    chunk_size: usize,
    len: usize,
}

impl Default for BufferChain {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferChain {
    pub fn new() -> Self {
        Self::with_chunk_size(CHUNK_SIZE)
    }

    pub fn with_chunk_size(chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "chunk size must not be zero");
        Self { chunks: VecDeque::new(), chunk_size, len: 0 }
    }

    /// Number of unconsumed bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Returns the chunk the next socket read should fill.
    ///
    /// The returned buffer always has spare capacity, so `read_buf` appends into it
    /// without growing it. Call [`commit`](Self::commit) with the number of bytes read.
    pub fn read_target(&mut self) -> &mut BytesMut {
        let reusable = self.chunks.back().is_some_and(|tail| tail.capacity() > tail.len());
        if !reusable {
            // a drained tail can be recycled in place when nobody else holds its bytes
            if let Some(tail) = self.chunks.back_mut().filter(|tail| tail.is_empty()) {
                tail.reserve(self.chunk_size);
            } else {
                self.chunks.push_back(BytesMut::with_capacity(self.chunk_size));
            }
        }

        // the branch above guarantees a tail chunk
        let last = self.chunks.len() - 1;
        &mut self.chunks[last]
    }

    /// Accounts for `n` bytes appended into the buffer returned by [`read_target`](Self::read_target).
    #[inline]
    pub fn commit(&mut self, n: usize) {
        self.len += n;
    }

    /// Appends a copy of `bytes`, filling the tail before pushing new chunks.
    pub fn extend_from_slice(&mut self, mut bytes: &[u8]) {
        while !bytes.is_empty() {
            let target = self.read_target();
            let n = (target.capacity() - target.len()).min(bytes.len());
            target.extend_from_slice(&bytes[..n]);
            self.commit(n);
            bytes = &bytes[n..];
        }
    }

    /// First chunk still holding unconsumed bytes.
    ///
    /// Decoders split consumed bytes off the returned buffer; call [`sync`](Self::sync)
    /// afterwards so the chain recomputes its length.
    pub fn front_mut(&mut self) -> Option<&mut BytesMut> {
        self.compact();
        self.chunks.iter_mut().find(|chunk| !chunk.is_empty())
    }

    /// Recomputes the unconsumed length after chunks were drained through [`front_mut`](Self::front_mut).
    pub fn sync(&mut self) {
        self.len = self.chunks.iter().map(BytesMut::len).sum();
        self.compact();
    }

    /// Drains up to `max` bytes from the front of the chain.
    ///
    /// The returned bytes share the chunk's allocation; nothing is copied unless the
    /// requested range is smaller than the front chunk, which is the common case.
    pub fn take(&mut self, max: usize) -> Bytes {
        self.compact();
        let Some(front) = self.chunks.iter_mut().find(|chunk| !chunk.is_empty()) else {
            return Bytes::new();
        };

        let n = front.len().min(max);
        let bytes = front.split_to(n).freeze();
        self.len -= n;
        self.compact();
        bytes
    }

    /// Moves every unconsumed byte into `dst`, leaving the chain empty.
    pub fn drain_into(&mut self, dst: &mut BytesMut) {
        dst.reserve(self.len);
        for chunk in &mut self.chunks {
            dst.extend_from_slice(chunk);
            chunk.clear();
        }
        self.len = 0;
        self.compact();
    }

    /// Pushes bytes back in front of the chain, ahead of anything not yet consumed.
    pub fn unread(&mut self, bytes: BytesMut) {
        if bytes.is_empty() {
            return;
        }
        self.len += bytes.len();
        self.chunks.push_front(bytes);
    }

    /// Releases drained chunks; the tail is kept so its spare capacity can be reused.
    pub fn compact(&mut self) {
        while self.chunks.len() > 1 && self.chunks.front().is_some_and(BytesMut::is_empty) {
            self.chunks.pop_front();
        }
    }

    /// Drops every buffered byte.
    pub fn clear(&mut self) {
        for chunk in &mut self.chunks {
            chunk.clear();
        }
        self.len = 0;
        self.compact();
    }

    /// Iterates over the unconsumed bytes chunk by chunk.
    pub fn chunks(&self) -> impl Iterator<Item = &[u8]> {
        self.chunks.iter().filter(|chunk| !chunk.is_empty()).map(|chunk| &chunk[..])
    }
}
