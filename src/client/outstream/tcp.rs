//! TCP sink backing the `tcp:` collection URI protocol. Connects
//! lazily and reconnects on the next write after any I/O error — the
//! drain task supplies the backoff between attempts.

use super::{OutStream, WriteError};
use std::io::Write;
use std::net::TcpStream as StdTcpStream;

pub struct TcpStream {
    host: String,
    port: u16,
    conn: Option<StdTcpStream>,
}

impl TcpStream {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            conn: None,
        }
    }

    fn ensure_connected(&mut self) -> std::io::Result<&mut StdTcpStream> {
        if self.conn.is_none() {
            let stream = StdTcpStream::connect((self.host.as_str(), self.port))?;
            stream.set_nodelay(true).ok();
            self.conn = Some(stream);
        }
        Ok(self.conn.as_mut().expect("just connected"))
    }
}

impl OutStream for TcpStream {
    fn write(&mut self, body: &[u8], header: Option<&[u8]>) -> Result<usize, WriteError> {
        let conn = self.ensure_connected().map_err(WriteError::Recoverable)?;

        let result = (|| -> std::io::Result<usize> {
            if let Some(header) = header {
                conn.write_all(header)?;
            }
            conn.write_all(body)?;
            Ok(body.len())
        })();

        result.map_err(|e| {
            self.conn = None;
            WriteError::Recoverable(e)
        })
    }

    fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            let _ = conn.shutdown(std::net::Shutdown::Both);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn connects_lazily_on_first_write() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let mut stream = TcpStream::new(addr.ip().to_string(), addr.port());
        assert!(stream.conn.is_none());

        let (mut server_side, _) = {
            let accept_thread = std::thread::spawn(move || listener.accept().unwrap());
            stream.write(b"hello", None).unwrap();
            accept_thread.join().unwrap()
        };
        assert!(stream.conn.is_some());

        use std::io::Read;
        let mut buf = [0u8; 5];
        server_side.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn close_drops_the_connection_so_the_next_write_reconnects() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let mut stream = TcpStream::new(addr.ip().to_string(), addr.port());
        let accept_thread = std::thread::spawn(move || {
            let _ = listener.accept().unwrap();
            let _ = listener.accept().unwrap();
        });
        stream.write(b"hello", None).unwrap();
        stream.close();
        assert!(stream.conn.is_none());
        stream.write(b"again", None).unwrap();
        accept_thread.join().unwrap();
    }
}
