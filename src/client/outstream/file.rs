//! Local-file sink, backing the `file:` and `flush:` collection URI
//! protocols. `flush` mode additionally calls `fsync` after every
//! write so a reader never observes a short trailing record.

use super::{OutStream, WriteError};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

pub struct FileStream {
    path: PathBuf,
    file: Option<File>,
    fsync_every_write: bool,
}

impl FileStream {
    pub fn new(path: impl Into<PathBuf>, fsync_every_write: bool) -> Self {
        Self {
            path: path.into(),
            file: None,
            fsync_every_write,
        }
    }

    fn ensure_open(&mut self) -> std::io::Result<&mut File> {
        if self.file.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            self.file = Some(file);
        }
        Ok(self.file.as_mut().expect("just opened"))
    }
}

impl OutStream for FileStream {
    fn write(&mut self, body: &[u8], header: Option<&[u8]>) -> Result<usize, WriteError> {
        let fsync = self.fsync_every_write;
        let file = self.ensure_open().map_err(WriteError::Recoverable)?;

        let result = (|| -> std::io::Result<usize> {
            if let Some(header) = header {
                file.write_all(header)?;
            }
            file.write_all(body)?;
            if fsync {
                file.sync_data()?;
            }
            Ok(body.len())
        })();

        result.map_err(|e| {
            // A write error on an open file descriptor is almost
            // always permanent (disk full, permission revoked); drop
            // the handle so the next attempt reopens it fresh anyway.
            self.file = None;
            match e.kind() {
                std::io::ErrorKind::Interrupted | std::io::ErrorKind::WouldBlock => {
                    WriteError::Recoverable(e)
                }
                _ => WriteError::Fatal(e),
            }
        })
    }

    fn close(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = file.sync_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_across_multiple_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.log");
        let mut stream = FileStream::new(&path, false);
        stream.write(b"first ", None).unwrap();
        stream.write(b"second", None).unwrap();
        stream.close();
        let contents = std::fs::read(&path).unwrap();
        assert_eq!(contents, b"first second");
    }

    #[test]
    fn header_precedes_body_on_replay() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.log");
        let mut stream = FileStream::new(&path, true);
        stream.write(b"body", Some(b"HDR:")).unwrap();
        stream.close();
        assert_eq!(std::fs::read(&path).unwrap(), b"HDR:body");
    }
}
