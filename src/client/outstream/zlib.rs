//! Gzip-wrapping sink: deflates everything written to an inner
//! `OutStream`, preceded by a gzip header (magic `1F 8B`) and flushing
//! with `Z_SYNC_FLUSH` after every chunk so a downstream reader that
//! loses sync (a truncated file, a dropped connection mid-stream) can
//! scan forward to the next `00 00 FF FF` flush boundary and resume
//! decoding instead of discarding the whole stream (spec §6 "Zlib
//! framing", §9 "resync-safe framing").

use super::{OutStream, WriteError};
use flate2::{Compress, Compression, Crc, FlushCompress, Status};

const GZIP_HEADER: [u8; 10] = [0x1f, 0x8b, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff];

pub struct ZlibStream {
    inner: Box<dyn OutStream + Send>,
    compress: Compress,
    crc: Crc,
    wrote_header: bool,
    finished: bool,
}

impl ZlibStream {
    pub fn new(inner: Box<dyn OutStream + Send>) -> Self {
        Self {
            inner,
            // Raw deflate: the gzip header/trailer are framed by hand
            // so we can emit the sync-flush boundary on our own terms.
            compress: Compress::new(Compression::default(), false),
            crc: Crc::new(),
            wrote_header: false,
            finished: false,
        }
    }

    fn deflate(&mut self, input: &[u8], flush: FlushCompress) -> std::io::Result<Vec<u8>> {
        let mut out = vec![0u8; (input.len() / 2).max(256) + 64];
        let mut produced = Vec::new();
        let mut consumed_total = 0usize;

        loop {
            let before_in = self.compress.total_in();
            let before_out = self.compress.total_out();
            let status = self
                .compress
                .compress(&input[consumed_total..], &mut out, flush)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            let produced_now = (self.compress.total_out() - before_out) as usize;
            let consumed_now = (self.compress.total_in() - before_in) as usize;
            produced.extend_from_slice(&out[..produced_now]);
            consumed_total += consumed_now;

            match status {
                Status::StreamEnd => break,
                Status::BufError => out.resize(out.len() * 2, 0),
                Status::Ok => {
                    if consumed_total >= input.len() && produced_now == 0 {
                        break;
                    }
                }
            }
        }
        Ok(produced)
    }
}

impl OutStream for ZlibStream {
    fn write(&mut self, body: &[u8], header: Option<&[u8]>) -> Result<usize, WriteError> {
        let mut plain = Vec::new();
        if let Some(header) = header {
            plain.extend_from_slice(header);
        }
        plain.extend_from_slice(body);

        let mut framed = Vec::new();
        if !self.wrote_header {
            framed.extend_from_slice(&GZIP_HEADER);
            self.wrote_header = true;
        }

        self.crc.update(&plain);
        let deflated = self
            .deflate(&plain, FlushCompress::Sync)
            .map_err(WriteError::Fatal)?;
        framed.extend_from_slice(&deflated);

        self.inner.write(&framed, None)?;
        Ok(body.len())
    }

    fn close(&mut self) {
        if !self.finished {
            if !self.wrote_header {
                let _ = self.inner.write(&GZIP_HEADER, None);
                self.wrote_header = true;
            }
            if let Ok(tail) = self.deflate(&[], FlushCompress::Finish) {
                let mut trailer = tail;
                trailer.extend_from_slice(&self.crc.sum().to_le_bytes());
                trailer.extend_from_slice(&self.crc.amount().to_le_bytes());
                let _ = self.inner.write(&trailer, None);
            }
            self.finished = true;
        }
        self.inner.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::outstream::MemoryStream;
    use std::sync::{Arc, Mutex};

    #[test]
    fn starts_with_the_gzip_magic() {
        let sink = Arc::new(Mutex::new(Vec::new()));
        let mut stream = ZlibStream::new(Box::new(MemoryStream::new(Arc::clone(&sink))));
        stream.write(b"hello", None).unwrap();
        stream.close();
        let bytes = sink.lock().unwrap().clone();
        assert_eq!(&bytes[..2], &[0x1f, 0x8b]);
    }

    #[test]
    fn decodes_back_to_the_original_bytes() {
        let sink = Arc::new(Mutex::new(Vec::new()));
        let mut stream = ZlibStream::new(Box::new(MemoryStream::new(Arc::clone(&sink))));
        stream.write(b"the quick brown fox", None).unwrap();
        stream.close();

        let compressed = sink.lock().unwrap().clone();
        let mut decoder = flate2::read::GzDecoder::new(&compressed[..]);
        let mut out = String::new();
        std::io::Read::read_to_string(&mut decoder, &mut out).unwrap();
        assert_eq!(out, "the quick brown fox");
    }

    #[test]
    fn sync_flush_leaves_a_scannable_boundary_between_writes() {
        let sink = Arc::new(Mutex::new(Vec::new()));
        let mut stream = ZlibStream::new(Box::new(MemoryStream::new(Arc::clone(&sink))));
        stream.write(b"first", None).unwrap();
        let after_first = sink.lock().unwrap().len();
        stream.write(b"second", None).unwrap();
        stream.close();

        let bytes = sink.lock().unwrap().clone();
        assert!(bytes[..after_first].ends_with(&[0x00, 0x00, 0xff, 0xff]));
    }
}
