//! The per-connection state machine (spec §4.9). Transitions are driven by
//! `Session::advance_login`/`commands::dispatch`; this module only holds the
//! states and the wire-level distinction between the two listeners.

/// Which listener accepted the connection (spec §4.10): the line-oriented
/// stream protocol or the framed (WebSocket) protocol. `amlp-net` tags each
/// session with this at accept time; everything above it (including output
/// rendering) reads it back rather than re-deriving it from the socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionKind {
    Stream,
    Framed,
}

/// Spec §4.9's table, one variant per row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    GetName,
    GetPassword,
    NewPassword,
    ConfirmPassword,
    Chargen,
    Playing,
    Disconnecting,
}

impl SessionState {
    /// Whether input in this state should be echoed back to the terminal by
    /// the framing layer. Password entry is the only state that suppresses
    /// it (spec §4.9 names no echo-control contract explicitly, but every
    /// login flow this is grounded on hides password entry).
    pub fn suppresses_echo(self) -> bool {
        matches!(self, SessionState::GetPassword | SessionState::NewPassword | SessionState::ConfirmPassword)
    }

    pub fn is_login(self) -> bool {
        !matches!(self, SessionState::Playing | SessionState::Disconnecting)
    }
}
