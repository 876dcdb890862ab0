//! Per-connection socket plumbing: buffered nonblocking reads/writes around
//! a `mio::net::TcpStream`, split out from [`crate::server`] so the event
//! loop reads as dispatch rather than socket bookkeeping.

use std::io::{self, Read, Write};

use mio::net::TcpStream;
use mio::{Interest, Registry, Token};

use amlp_session::ConnectionKind;

pub struct Connection {
    pub stream: TcpStream,
    pub kind: ConnectionKind,
    pub token: Token,
    pub read_buf: Vec<u8>,
    pub write_buf: Vec<u8>,
    /// Framed sessions start false until the upgrade handshake completes;
    /// stream sessions have nothing to negotiate.
    pub ws_established: bool,
    pub closing: bool,
    interest: Interest,
}

impl Connection {
    pub fn new(stream: TcpStream, kind: ConnectionKind, token: Token) -> Self {
        Connection {
            stream,
            kind,
            token,
            read_buf: Vec::new(),
            write_buf: Vec::new(),
            ws_established: matches!(kind, ConnectionKind::Stream),
            closing: false,
            interest: Interest::READABLE,
        }
    }

    pub fn register(&mut self, registry: &Registry) -> io::Result<()> {
        registry.register(&mut self.stream, self.token, self.interest)
    }

    pub fn deregister(&mut self, registry: &Registry) {
        let _ = registry.deregister(&mut self.stream);
    }

    /// Keeps the registered interest in sync with whether there is
    /// anything queued to write; read interest is always on so a client
    /// closing its write half is still noticed.
    pub fn sync_interest(&mut self, registry: &Registry) -> io::Result<()> {
        let wanted = if self.write_buf.is_empty() { Interest::READABLE } else { Interest::READABLE | Interest::WRITABLE };
        if wanted != self.interest {
            self.interest = wanted;
            registry.reregister(&mut self.stream, self.token, wanted)?;
        }
        Ok(())
    }

    /// Reads whatever is available into `read_buf`. `Ok(false)` means the
    /// peer closed its write half (EOF); the caller should tear down the
    /// session.
    pub fn read_available(&mut self) -> io::Result<bool> {
        let mut chunk = [0u8; 4096];
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => return Ok(false),
                Ok(n) => self.read_buf.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(true),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    pub fn queue(&mut self, bytes: &[u8]) {
        self.write_buf.extend_from_slice(bytes);
    }

    /// Best-effort write of whatever the socket will currently accept.
    /// Leftover bytes stay queued for the next writable event.
    pub fn flush(&mut self) -> io::Result<()> {
        while !self.write_buf.is_empty() {
            match self.stream.write(&self.write_buf) {
                Ok(0) => break,
                Ok(n) => {
                    self.write_buf.drain(0..n);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}
