//! Errors for session-layer I/O (save files). Login/command failures are
//! not modeled as `Err` — they are user-visible prompts and state
//! transitions per spec §7 ("login errors produce terse prompts and
//! re-enter the relevant state").

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("save file I/O error at {path}: {source}")]
    SaveIo { path: String, source: std::io::Error },

    #[error("username {username:?} does not resolve to a safe save path")]
    SavePathRejected { username: String },
}

pub type SessionResult<T> = Result<T, SessionError>;
