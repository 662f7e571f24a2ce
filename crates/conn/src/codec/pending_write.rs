//! The bytes of one outstanding socket write.
//!
//! A write is made of up to three parts sent in order: framing encoded into
//! arena scratch (a response head or a chunk-size line), the body bytes exactly
//! as the reply producer handed them over, and a static trailer such as the
//! CRLF closing a chunk. Body bytes are never copied into the scratch.
//!
//! [`PendingWrite`] implements [`Buf`], so `AsyncWriteExt::write_buf` can drive
//! it across partial writes: every short write only advances the cursor and the
//! next call resumes the same outstanding write.

use std::io::IoSlice;

use bytes::{Buf, Bytes};

use crate::arena::Scratch;

#[derive(Debug)]
pub struct PendingWrite {
    head: Scratch,
    head_pos: usize,
    body: Bytes,
    tail: &'static [u8],
}

impl PendingWrite {
    pub fn new(head: Scratch, body: Bytes, tail: &'static [u8]) -> Self {
        Self { head, head_pos: 0, body, tail }
    }

    /// A write with nothing to send.
    pub fn empty() -> Self {
        Self::new(Scratch::empty(), Bytes::new(), &[])
    }

    /// A write of bytes that need no framing.
    pub fn from_bytes(body: Bytes) -> Self {
        Self::new(Scratch::empty(), body, &[])
    }

    pub fn from_static(bytes: &'static [u8]) -> Self {
        Self::new(Scratch::empty(), Bytes::new(), bytes)
    }

    pub fn with_head(head: Scratch) -> Self {
        Self::new(head, Bytes::new(), &[])
    }

    pub fn is_empty(&self) -> bool {
        !self.has_remaining()
    }

    /// Gives the scratch back so it can be returned to its arena.
    pub fn into_scratch(self) -> Scratch {
        self.head
    }

    fn head_remaining(&self) -> &[u8] {
        &self.head.as_ref()[self.head_pos..]
    }
}

impl Buf for PendingWrite {
    fn remaining(&self) -> usize {
        self.head_remaining().len() + self.body.len() + self.tail.len()
    }

    fn chunk(&self) -> &[u8] {
        let head = self.head_remaining();
        if !head.is_empty() {
            head
        } else if !self.body.is_empty() {
            &self.body
        } else {
            self.tail
        }
    }

    fn chunks_vectored<'a>(&'a self, dst: &mut [IoSlice<'a>]) -> usize {
        let parts = [self.head_remaining(), &self.body[..], self.tail];
        let mut filled = 0;
        for part in parts.into_iter().filter(|part| !part.is_empty()) {
            if filled == dst.len() {
                break;
            }
            dst[filled] = IoSlice::new(part);
            filled += 1;
        }
        filled
    }

    fn advance(&mut self, mut cnt: usize) {
        let head = cnt.min(self.head_remaining().len());
        self.head_pos += head;
        cnt -= head;

        let body = cnt.min(self.body.len());
        self.body.advance(body);
        cnt -= body;

        assert!(cnt <= self.tail.len(), "advance past the end of a pending write");
        self.tail = &self.tail[cnt..];
    }
}
