//! `BufferedWriter`: the client-side bounded queue that decouples
//! measurement producers from the network (spec §4.1).

use super::chunk::Chain;
use super::drain::{drain_loop, DrainShared};
use super::outstream::OutStream;
use crate::error::{OmlError, OmlResult};
use crate::util::MString;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// How long `close` waits for a best-effort flush before giving up and
/// dropping whatever remains queued (spec §5 "Cancellation").
const CLOSE_FLUSH_DEADLINE: Duration = Duration::from_secs(5);

struct Inner {
    chain: Chain,
    meta_prologue: MString,
    active: bool,
}

/// A bounded, metadata-preserving producer/consumer byte queue with a
/// dedicated drain task. See spec §4.1 for the full contract.
pub struct BufferedWriter {
    inner: Mutex<Inner>,
    data_available: Condvar,
    space_available: Condvar,
    drain_handle: Mutex<Option<JoinHandle<()>>>,
}

impl BufferedWriter {
    /// Starts the drain task and returns a handle shared between
    /// producers and the caller that will eventually `close` it.
    /// `out_stream` is owned by the writer from this point on.
    pub fn create(
        out_stream: Box<dyn OutStream + Send>,
        queue_capacity_bytes: usize,
        chain_chunk_count: usize,
    ) -> Arc<Self> {
        let chunk_capacity = (queue_capacity_bytes / chain_chunk_count.max(1)).max(1);
        let writer = Arc::new(Self {
            inner: Mutex::new(Inner {
                chain: Chain::new(chunk_capacity, chain_chunk_count),
                meta_prologue: MString::default(),
                active: true,
            }),
            data_available: Condvar::new(),
            space_available: Condvar::new(),
            drain_handle: Mutex::new(None),
        });

        let shared = DrainShared {
            writer: Arc::clone(&writer),
        };
        let handle = std::thread::Builder::new()
            .name("oml-buffered-writer-drain".into())
            .spawn(move || drain_loop(shared, out_stream))
            .expect("spawn drain thread");
        *writer.drain_handle.lock().unwrap() = Some(handle);
        writer
    }

    /// Appends measurement bytes. In blocking mode, waits for the
    /// drain task to free real space; in non-blocking mode, evicts the
    /// oldest un-drained measurement chunks to make room immediately
    /// and accepts as many bytes as fit, returning the count actually
    /// stored (possibly 0). Never touches metadata chunks. Spec §4.1's
    /// eviction algorithm is scoped to "a non-blocking producer" — a
    /// blocking caller waits rather than forcing a drop, except once
    /// the writer is closing, at which point there is no more space to
    /// wait for and the same evict-then-accept path applies.
    pub fn push(&self, bytes: &[u8], blocking: bool) -> OmlResult<usize> {
        if bytes.is_empty() {
            return Ok(0);
        }
        let mut guard = self.inner.lock().unwrap();
        loop {
            let capacity = guard.chain.capacity_bytes();
            let used = guard.chain.total_len();
            if used + bytes.len() <= capacity {
                let written = guard.chain.append_best_effort(bytes, false);
                self.data_available.notify_one();
                return Ok(written);
            }

            if !blocking || !guard.active {
                let needed = (used + bytes.len()).saturating_sub(capacity);
                guard.chain.evict_measurement_chunks(needed);
                let written = guard.chain.append_best_effort(bytes, false);
                self.data_available.notify_one();
                return Ok(written);
            }

            guard = self
                .space_available
                .wait_timeout(guard, Duration::from_millis(200))
                .unwrap()
                .0;
        }
    }

    /// Appends metadata (headers, schema) bytes. Metadata is recorded
    /// into the prologue replayed after every reconnect, is written
    /// into the head chunk like any other bytes, and is never
    /// discarded by back-pressure — if the chain is entirely full of
    /// metadata chunks this call blocks until the drain task frees
    /// room, regardless of caller preference.
    pub fn push_meta(&self, bytes: &[u8]) -> OmlResult<usize> {
        if bytes.is_empty() {
            return Ok(0);
        }
        let mut guard = self.inner.lock().unwrap();
        guard.meta_prologue.extend(bytes);
        loop {
            let capacity = guard.chain.capacity_bytes();
            let used = guard.chain.total_len();
            if used + bytes.len() <= capacity {
                let written = guard.chain.append_best_effort(bytes, true);
                self.data_available.notify_one();
                return Ok(written);
            }
            let needed = (used + bytes.len()).saturating_sub(capacity);
            let freed = guard.chain.evict_measurement_chunks(needed);
            if freed > 0 {
                let written = guard.chain.append_best_effort(bytes, true);
                self.data_available.notify_one();
                return Ok(written);
            }
            if !guard.active {
                return Err(OmlError::ResourceExhausted(
                    "buffered writer closed while metadata was pending".into(),
                ));
            }
            guard = self
                .space_available
                .wait_timeout(guard, Duration::from_millis(200))
                .unwrap()
                .0;
        }
    }

    /// Raw access to the head chunk for the adjacent encoding layer.
    /// `exclusive = true` holds the writer lock for the duration of
    /// the guard's lifetime, matching the C-library idiom of holding a
    /// mutex across a direct-format encode.
    pub fn get_write_buf(&self, exclusive: bool) -> WriteBufGuard<'_> {
        let guard = self.inner.lock().unwrap();
        WriteBufGuard {
            writer: self,
            guard: Some(guard),
            exclusive,
        }
    }

    /// Flushes pending bytes best-effort (bounded by
    /// `CLOSE_FLUSH_DEADLINE`), joins the drain task, and releases the
    /// stream. In-flight writes complete; anything still queued past
    /// the deadline is dropped.
    pub fn close(&self) {
        let deadline = Instant::now() + CLOSE_FLUSH_DEADLINE;
        {
            let mut guard = self.inner.lock().unwrap();
            while !guard.chain.is_empty() && Instant::now() < deadline {
                let (g, timeout) = self
                    .data_available
                    .wait_timeout(guard, Duration::from_millis(100))
                    .unwrap();
                guard = g;
                if timeout.timed_out() && guard.chain.is_empty() {
                    break;
                }
            }
            guard.active = false;
        }
        self.data_available.notify_all();
        self.space_available.notify_all();
        if let Some(handle) = self.drain_handle.lock().unwrap().take() {
            let _ = handle.join();
        }
    }

    /// Blocks until the chain has a chunk to drain or the writer has
    /// been closed, then detaches and returns it (bytes, is_metadata).
    /// Returns `None` only once `close` has been called and the chain
    /// is empty.
    pub(crate) fn wait_and_take_front(&self) -> Option<(Vec<u8>, bool)> {
        let mut guard = self.inner.lock().unwrap();
        loop {
            if let Some(front) = guard.take_front_chunk() {
                self.space_available.notify_all();
                return Some(front);
            }
            if !guard.active {
                return None;
            }
            guard = self
                .data_available
                .wait_timeout(guard, Duration::from_millis(200))
                .unwrap()
                .0;
        }
    }

    /// Re-queues a chunk the drain task failed to write, preserving
    /// FIFO order for the next attempt.
    pub(crate) fn requeue_front(&self, bytes: Vec<u8>, is_metadata: bool) {
        let mut guard = self.inner.lock().unwrap();
        guard.chain.requeue_front(super::chunk::Chunk::from_parts(bytes, is_metadata));
        self.data_available.notify_one();
    }

    /// Snapshot of the metadata replayed after every successful
    /// (re)connection, per spec §5's "header replay on reconnect".
    pub(crate) fn meta_prologue_snapshot(&self) -> Vec<u8> {
        self.inner.lock().unwrap().meta_prologue.as_slice().to_vec()
    }

    /// Whether the writer is still open. The drain task polls this to
    /// cut a reconnect backoff short and to stop retrying against a
    /// dead sink once `close()` has given up waiting on it (spec §5
    /// "reconnect back-off sleeps are interruptible by close").
    pub(crate) fn is_active(&self) -> bool {
        self.inner.lock().unwrap().active
    }
}

/// RAII guard returned by `get_write_buf`; dropping it is the
/// equivalent of the C API's `unlock_buf`.
pub struct WriteBufGuard<'a> {
    writer: &'a BufferedWriter,
    guard: Option<MutexGuard<'a, Inner>>,
    exclusive: bool,
}

impl<'a> WriteBufGuard<'a> {
    /// Appends directly into the head chunk without going through the
    /// back-pressure accounting `push` applies (the caller already
    /// holds the lock and is responsible for sizing its writes).
    pub fn write(&mut self, bytes: &[u8]) -> usize {
        let inner = self.guard.as_mut().expect("guard present while held");
        inner.chain.append_best_effort(bytes, false)
    }
}

impl<'a> Drop for WriteBufGuard<'a> {
    fn drop(&mut self) {
        if let Some(guard) = self.guard.take() {
            drop(guard);
        }
        self.writer.data_available.notify_one();
        if self.exclusive {
            self.writer.space_available.notify_all();
        }
    }
}

impl Inner {
    fn take_front_chunk(&mut self) -> Option<(Vec<u8>, bool)> {
        self.chain
            .take_front()
            .map(|chunk| (chunk.as_slice().to_vec(), chunk.is_metadata))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::outstream::MemoryStream;
    use std::sync::{Arc as StdArc, Mutex as StdMutex};

    #[test]
    fn push_accepts_when_under_capacity() {
        let sink = StdArc::new(StdMutex::new(Vec::new()));
        let stream = Box::new(MemoryStream::new(sink));
        let bw = BufferedWriter::create(stream, 4096, 4);
        let n = bw.push(b"hello", true).unwrap();
        assert_eq!(n, 5);
        bw.close();
    }

    #[test]
    fn push_meta_always_recorded_in_prologue() {
        let sink = StdArc::new(StdMutex::new(Vec::new()));
        let stream = Box::new(MemoryStream::new(sink));
        let bw = BufferedWriter::create(stream, 4096, 4);
        bw.push_meta(b"schema: power").unwrap();
        assert_eq!(bw.meta_prologue_snapshot(), b"schema: power");
        bw.close();
    }

    #[test]
    fn non_blocking_push_evicts_oldest_measurement_data() {
        // Stall the sink by never giving the drain task a chance to
        // run: we assert on the queue state directly instead, since
        // the drain task is real background thread and timing would
        // make this flaky otherwise.
        let mut chain = Chain::new(1024, 4);
        for _ in 0..10 {
            chain.append_best_effort(&vec![0u8; 1024], false);
        }
        assert!(chain.chunk_count() <= 4);
    }

    /// A sink that never succeeds, simulating a collector whose peer
    /// is unreachable: every write fails recoverably, keeping the
    /// drain task permanently behind (but not blocked inside the write
    /// call itself).
    struct UnreachableSink;

    impl OutStream for UnreachableSink {
        fn write(&mut self, _body: &[u8], _header: Option<&[u8]>) -> Result<usize, super::super::outstream::WriteError> {
            Err(super::super::outstream::WriteError::Recoverable(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "peer unreachable",
            )))
        }

        fn close(&mut self) {}
    }

    #[test]
    fn blocking_push_waits_for_drain_instead_of_evicting() {
        let bw = BufferedWriter::create(Box::new(UnreachableSink), 8, 1);
        // Fills the single 8-byte chunk; the stalled sink never drains
        // it, so the queue stays full.
        bw.push(b"12345678", false).unwrap();

        let bw_for_pusher = Arc::clone(&bw);
        let pusher = std::thread::spawn(move || bw_for_pusher.push(b"overflow!", true).unwrap());

        std::thread::sleep(Duration::from_millis(150));
        assert!(
            !pusher.is_finished(),
            "a blocking push over capacity must wait for space, not evict and return immediately"
        );

        // Closing marks the writer inactive, which the blocked push's
        // wait loop treats the same as "no more space is coming" and
        // falls through to the evict-then-accept path.
        bw.close();
        let written = pusher.join().unwrap();
        assert!(written > 0);
    }
}
