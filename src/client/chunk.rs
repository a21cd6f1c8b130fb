//! The chunk chain underlying `BufferedWriter`: a bounded sequence of
//! fixed-capacity byte chunks, the unit both of producer appends and
//! of back-pressure eviction (spec §3, §4.1, §9 "Chained byte queue").
//!
//! A chunk is homogeneous — either entirely metadata or entirely
//! measurement data — so that eviction can always discard whole past
//! chunks and never needs to reason about partial, mixed contents.
//! Writers that switch between `push` and `push_meta` simply roll onto
//! a fresh chunk when the kind changes.

use std::collections::VecDeque;

#[derive(Debug)]
pub(crate) struct Chunk {
    data: Vec<u8>,
    pub(crate) is_metadata: bool,
}

impl Chunk {
    fn new(capacity: usize, is_metadata: bool) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            is_metadata,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.data.len()
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn push(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Rebuilds a chunk from bytes the drain task failed to write, for
    /// `Chain::requeue_front`.
    pub(crate) fn from_parts(data: Vec<u8>, is_metadata: bool) -> Self {
        Self { data, is_metadata }
    }
}

/// The bounded queue of chunks. `front` is the tail the drain task
/// reads from; `back` is the head producers append to.
#[derive(Debug)]
pub(crate) struct Chain {
    chunks: VecDeque<Chunk>,
    chunk_capacity: usize,
    chain_size: usize,
}

impl Chain {
    pub(crate) fn new(chunk_capacity: usize, chain_size: usize) -> Self {
        Self {
            chunks: VecDeque::new(),
            chunk_capacity: chunk_capacity.max(1),
            chain_size: chain_size.max(1),
        }
    }

    pub(crate) fn total_len(&self) -> usize {
        self.chunks.iter().map(Chunk::len).sum()
    }

    pub(crate) fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Detaches the oldest (tail) chunk for the drain task to write,
    /// without dropping its bytes — on a recoverable write failure the
    /// caller re-queues it via `requeue_front`.
    pub(crate) fn take_front(&mut self) -> Option<Chunk> {
        self.chunks.pop_front()
    }

    pub(crate) fn requeue_front(&mut self, chunk: Chunk) {
        self.chunks.push_front(chunk);
    }

    fn head_accepts(&self, is_metadata: bool) -> bool {
        match self.chunks.back() {
            Some(chunk) => chunk.is_metadata == is_metadata && chunk.len() < self.chunk_capacity,
            None => false,
        }
    }

    fn ensure_head(&mut self, is_metadata: bool) {
        if !self.head_accepts(is_metadata) {
            self.chunks
                .push_back(Chunk::new(self.chunk_capacity, is_metadata));
        }
    }

    /// Evicts oldest non-metadata chunks until at least `needed` bytes
    /// are freed or no evictable chunk remains. Returns bytes freed.
    pub(crate) fn evict_measurement_chunks(&mut self, needed: usize) -> usize {
        let mut freed = 0;
        while freed < needed {
            match self.chunks.front() {
                Some(chunk) if !chunk.is_metadata => {
                    freed += chunk.len();
                    self.chunks.pop_front();
                }
                _ => break,
            }
        }
        freed
    }

    /// Appends as much of `bytes` as fits across the head chunk and
    /// (while under `chain_size`) newly allocated chunks, splitting
    /// the input across chunk boundaries. Returns the number of bytes
    /// actually written.
    pub(crate) fn append_best_effort(&mut self, bytes: &[u8], is_metadata: bool) -> usize {
        let mut written = 0;
        while written < bytes.len() {
            self.ensure_head(is_metadata);
            let Some(head) = self.chunks.back_mut() else {
                break;
            };
            let room = self.chunk_capacity.saturating_sub(head.len());
            if room == 0 {
                if self.chunks.len() >= self.chain_size {
                    break;
                }
                continue;
            }
            let take = room.min(bytes.len() - written);
            head.push(&bytes[written..written + take]);
            written += take;
            if written < bytes.len() && self.chunks.len() >= self.chain_size {
                break;
            }
        }
        written
    }

    pub(crate) fn capacity_bytes(&self) -> usize {
        self.chunk_capacity * self.chain_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_split_across_chunks() {
        let mut chain = Chain::new(4, 10);
        let written = chain.append_best_effort(b"0123456789", false);
        assert_eq!(written, 10);
        assert_eq!(chain.chunk_count(), 3); // 4 + 4 + 2
        assert_eq!(chain.total_len(), 10);
    }

    #[test]
    fn metadata_and_measurement_never_share_a_chunk() {
        let mut chain = Chain::new(16, 10);
        chain.append_best_effort(b"meta", true);
        chain.append_best_effort(b"data", false);
        assert_eq!(chain.chunk_count(), 2);
        assert!(chain.chunks[0].is_metadata);
        assert!(!chain.chunks[1].is_metadata);
    }

    #[test]
    fn eviction_only_removes_measurement_chunks() {
        let mut chain = Chain::new(4, 10);
        chain.append_best_effort(b"meta", true);
        chain.append_best_effort(b"AAAA", false);
        chain.append_best_effort(b"BBBB", false);
        let freed = chain.evict_measurement_chunks(4);
        assert_eq!(freed, 4);
        assert_eq!(chain.chunk_count(), 2); // metadata + one measurement chunk left
        assert!(chain.chunks[0].is_metadata);
    }

    #[test]
    fn eviction_stops_at_metadata_boundary() {
        let mut chain = Chain::new(4, 10);
        chain.append_best_effort(b"AAAA", false);
        chain.append_best_effort(b"meta", true);
        let freed = chain.evict_measurement_chunks(100);
        assert_eq!(freed, 4);
        assert_eq!(chain.chunk_count(), 1);
        assert!(chain.chunks[0].is_metadata);
    }
}
