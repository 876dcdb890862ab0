//! Readiness-based I/O multiplexer and wire protocols (component C10):
//! the two listening ports, per-connection line/frame decoding, ANSI
//! output shaping, and the `mio` event loop that ties them to the session
//! state machine in `amlp-session`.

pub mod ansi;
pub mod connection;
pub mod error;
pub mod framing;
pub mod server;
pub mod websocket;

pub use error::{NetError, NetResult};
pub use server::Server;
