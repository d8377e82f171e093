//! Blocking byte-stream channel between the two peers.
//!
//! The driver talks to a [`Channel`] rather than a socket so that framing,
//! size limits and teardown can be tested without the operating system.
//! [`UnixChannel`] is the production implementation over a connected Unix
//! stream socket.

use std::io::{self, Read, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;

use bytes::{Bytes, BytesMut};

/// A bidirectional, blocking byte-stream endpoint.
pub trait Channel {
    /// Write all of `bytes` or fail; partial delivery is never reported as success.
    fn send(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Read whatever is available, up to `max_len` bytes.
    ///
    /// Blocks until at least one byte arrives. An empty result means the
    /// peer closed its side cleanly.
    fn receive(&mut self, max_len: usize) -> io::Result<Bytes>;

    /// Read exactly `len` bytes, failing with `UnexpectedEof` on a short stream.
    fn receive_exact(&mut self, len: usize) -> io::Result<Bytes> {
        let mut buf = BytesMut::with_capacity(len);
        while buf.len() < len {
            let chunk = self.receive(len - buf.len())?;
            if chunk.is_empty() {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("stream ended after {} of {} bytes", buf.len(), len),
                ));
            }
            buf.extend_from_slice(&chunk);
        }
        Ok(buf.freeze())
    }

    /// Shut the channel down. Calling it again is a no-op.
    fn close(&mut self) -> io::Result<()>;
}

/// A [`Channel`] over a connected Unix stream socket.
///
/// The socket is shut down exactly once: by an explicit [`Channel::close`]
/// or, failing that, when the channel is dropped.
#[derive(Debug)]
pub struct UnixChannel {
    stream: Option<UnixStream>,
}

impl UnixChannel {
    /// Wrap an already-connected stream.
    pub fn new(stream: UnixStream) -> Self {
        Self {
            stream: Some(stream),
        }
    }

    /// Connect to the socket at `path`.
    pub fn connect(path: impl AsRef<Path>) -> io::Result<Self> {
        UnixStream::connect(path).map(Self::new)
    }

    /// Bound every blocking send and receive; `None` blocks indefinitely.
    pub fn set_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        let stream = self.stream()?;
        stream.set_read_timeout(timeout)?;
        stream.set_write_timeout(timeout)
    }

    /// Whether [`Channel::close`] has already run.
    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    fn stream(&self) -> io::Result<&UnixStream> {
        self.stream
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "channel is closed"))
    }
}

impl Channel for UnixChannel {
    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut stream = self.stream()?;
        stream.write_all(bytes)?;
        stream.flush()
    }

    fn receive(&mut self, max_len: usize) -> io::Result<Bytes> {
        let mut stream = self.stream()?;
        let mut buf = BytesMut::zeroed(max_len);
        loop {
            match stream.read(&mut buf) {
                Ok(n) => {
                    buf.truncate(n);
                    return Ok(buf.freeze());
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn close(&mut self) -> io::Result<()> {
        let Some(stream) = self.stream.take() else {
            return Ok(());
        };
        match stream.shutdown(Shutdown::Both) {
            // The peer may already have torn the connection down.
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }
}

impl Drop for UnixChannel {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::debug!("Channel shutdown failed: {}", e);
        }
    }
}
