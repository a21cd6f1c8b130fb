//! The single drain task each `BufferedWriter` owns: pulls chunks off
//! the tail of the chain and writes them to the configured
//! `OutStream`, retrying recoverable failures with backoff and
//! replaying the metadata prologue after every (re)connect (spec §5).

use super::buffer::BufferedWriter;
use super::outstream::{OutStream, WriteError};
use crate::error::OmlError;
use std::sync::Arc;
use std::time::Duration;

const INITIAL_BACKOFF: Duration = Duration::from_millis(250);
const MAX_BACKOFF: Duration = Duration::from_secs(4);

pub(crate) struct DrainShared {
    pub(crate) writer: Arc<BufferedWriter>,
}

/// Runs until the writer is closed and its chain has drained. Never
/// exits on an I/O error on its own — the stream is given a chance to
/// recover via reconnect-with-backoff for as long as the writer is
/// active, but `close()` setting `active = false` interrupts a
/// retry-in-progress within one backoff step rather than being blocked
/// on it (spec §5 "reconnect back-off sleeps are interruptible by
/// close").
pub(crate) fn drain_loop(shared: DrainShared, mut stream: Box<dyn OutStream + Send>) {
    // Metadata already flows through the chain like any other chunk,
    // so the very first connection needs no separate replay. Only a
    // reconnect after a recoverable error needs the prologue resent,
    // since the new connection never saw the earlier chunks.
    let mut needs_header = false;

    loop {
        let Some((bytes, is_metadata)) = shared.writer.wait_and_take_front() else {
            break;
        };

        let mut backoff = INITIAL_BACKOFF;
        loop {
            if !shared.writer.is_active() {
                // `close()` is tearing the writer down and has already
                // given up waiting on us; put the chunk back rather
                // than keep retrying against a dead sink, and let the
                // normal close path account for it as dropped.
                shared.writer.requeue_front(bytes, is_metadata);
                stream.close();
                return;
            }

            let header = if needs_header {
                Some(shared.writer.meta_prologue_snapshot())
            } else {
                None
            };

            match stream.write(&bytes, header.as_deref()) {
                Ok(_) => {
                    needs_header = false;
                    break;
                }
                Err(WriteError::Recoverable(e)) => {
                    let err = OmlError::from(e);
                    log::warn!(
                        "buffered writer drain task hit a recoverable error, retrying in {:?}: {}",
                        backoff,
                        err
                    );
                    sleep_interruptible(&shared, backoff);
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                    needs_header = true;
                }
                Err(WriteError::Fatal(e)) => {
                    log::error!(
                        "buffered writer drain task hit a non-recoverable error, dropping chunk: {}",
                        e
                    );
                    break;
                }
            }
        }
    }

    stream.close();
}

/// Sleeps for `duration`, checking `shared.writer.is_active()` every
/// short step so a `close()` call cuts the backoff short instead of
/// leaving `close()`'s `handle.join()` waiting on a full retry.
fn sleep_interruptible(shared: &DrainShared, duration: Duration) {
    const STEP: Duration = Duration::from_millis(50);
    let mut remaining = duration;
    while remaining > Duration::ZERO {
        if !shared.writer.is_active() {
            return;
        }
        let step = STEP.min(remaining);
        std::thread::sleep(step);
        remaining -= step;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::buffer::BufferedWriter;
    use crate::client::outstream::MemoryStream;
    use std::sync::Mutex;

    #[test]
    fn drains_pushed_bytes_into_the_stream() {
        let sink = Arc::new(Mutex::new(Vec::new()));
        let stream = Box::new(MemoryStream::new(Arc::clone(&sink)));
        let bw = BufferedWriter::create(stream, 4096, 4);
        bw.push(b"hello", true).unwrap();
        bw.close();
        assert_eq!(&sink.lock().unwrap()[..], b"hello");
    }

    #[test]
    fn replays_metadata_prologue_after_close_and_reopen_cycle() {
        let sink = Arc::new(Mutex::new(Vec::new()));
        let stream = Box::new(MemoryStream::new(Arc::clone(&sink)));
        let bw = BufferedWriter::create(stream, 4096, 4);
        bw.push_meta(b"HEADER").unwrap();
        bw.push(b"data", true).unwrap();
        bw.close();
        let written = sink.lock().unwrap().clone();
        assert!(written.starts_with(b"HEADER"));
        assert!(written.ends_with(b"data"));
    }

    /// A sink whose peer never comes back: every write is recoverable,
    /// never fatal, matching `TcpStream`'s own error classification.
    struct AlwaysRecoverableSink;

    impl OutStream for AlwaysRecoverableSink {
        fn write(&mut self, _body: &[u8], _header: Option<&[u8]>) -> Result<usize, WriteError> {
            Err(WriteError::Recoverable(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "peer is down",
            )))
        }

        fn close(&mut self) {}
    }

    #[test]
    fn close_is_not_blocked_by_a_drain_task_stuck_retrying() {
        let bw = BufferedWriter::create(Box::new(AlwaysRecoverableSink), 4096, 4);
        bw.push(b"never delivered", true).unwrap();

        let start = std::time::Instant::now();
        bw.close();
        // `close()`'s own flush deadline is 5s; the drain task's retry
        // backoff must notice `active = false` well inside that, not
        // keep `close()`'s `handle.join()` waiting on a full 4s backoff
        // step.
        assert!(
            start.elapsed() < Duration::from_secs(8),
            "close() took {:?}, the drain task must have ignored the closed writer",
            start.elapsed()
        );
    }
}
