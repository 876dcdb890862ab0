//! The per-connection record (spec §3 "Session"). Grounded on
//! `session_internal.h`'s `PlayerSession`, split along the line the spec
//! itself draws between the scripting runtime and the I/O layer: raw
//! socket buffers (`fd`, `ws_buffer`, `input_buffer`) belong to `amlp-net`,
//! which owns the actual descriptors; everything that the state machine and
//! built-in command dispatch need to reason about lives here.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use amlp_value::ObjectId;

use crate::state::{ConnectionKind, SessionState};

pub struct Session {
    pub id: u32,
    pub connection_kind: ConnectionKind,
    pub state: SessionState,
    /// Set once `GetName` accepts a valid name; stays immutable after that.
    pub name: Option<String>,
    /// Holds the candidate password between `NewPassword` and
    /// `ConfirmPassword`; cleared (like the teacher's
    /// `memset(session->password_buffer, ...)`) as soon as it is consumed.
    pub(crate) pending_password: Option<String>,
    pub bound_object: Option<ObjectId>,
    pub privilege_level: i32,
    /// Per-session working directory for the filesystem built-ins (spec
    /// §4.9), always mudlib-root-relative and slash-prefixed (e.g. `"/"`).
    pub working_dir: String,
    pub last_activity: Instant,
    pub connected_at: Instant,
}

impl Session {
    pub fn new(id: u32, connection_kind: ConnectionKind, now: Instant) -> Self {
        Session {
            id,
            connection_kind,
            state: SessionState::Connecting,
            name: None,
            pending_password: None,
            bound_object: None,
            privilege_level: 0,
            working_dir: "/".to_string(),
            last_activity: now,
            connected_at: now,
        }
    }

    pub fn touch(&mut self, now: Instant) {
        self.last_activity = now;
    }

    /// Spec §4.9 step 5: idle watchdog, default 1800s (`amlp_config::Config`).
    pub fn is_idle(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_activity) >= timeout
    }

    pub fn is_playing(&self) -> bool {
        self.state == SessionState::Playing
    }

    pub fn clear_pending_password(&mut self) {
        self.pending_password = None;
    }

    pub fn working_path(&self, root: &std::path::Path) -> PathBuf {
        root.join(self.working_dir.trim_start_matches('/'))
    }
}
