//! Driver configuration: ports, mudlib root, session and diagnostic knobs.
//!
//! A `serde`-derived struct loaded from an optional TOML file with CLI and
//! environment overrides layered on top, following the teacher's
//! `neo-config`/`neo-node::config` pattern: the file supplies a baseline,
//! `AMLP_MUDLIB` (spec section 6) and `node`'s `clap::Parser` CLI fields win
//! over whatever the file says.

pub mod error;

pub use error::{ConfigError, ConfigResult};

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// How framed-session output converts ANSI SGR codes (spec section 4.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnsiMode {
    /// Strip ANSI escape sequences entirely.
    Strip,
    /// Emit `<span>` tags keyed off the SGR codes encountered.
    Span,
}

impl Default for AnsiMode {
    fn default() -> Self {
        AnsiMode::Strip
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub stream_port: u16,
    pub framed_port: u16,
    pub mudlib_root: PathBuf,
    pub idle_timeout_secs: u64,
    pub max_sessions: usize,
    pub debug_trace_instructions: bool,
    pub debug_trace_stack: bool,
    pub debug_trace_locals: bool,
    pub debug_trace_call_stack_on_error: bool,
    pub ansi_mode: AnsiMode,
    /// Fixed per-install pepper mixed into the password hash (DESIGN.md's
    /// Open Question decision: SHA-256 over password bytes plus this value).
    pub password_pepper: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            stream_port: 3000,
            framed_port: 3001,
            mudlib_root: PathBuf::from("./lib"),
            idle_timeout_secs: 1800,
            max_sessions: 256,
            debug_trace_instructions: false,
            debug_trace_stack: false,
            debug_trace_locals: false,
            debug_trace_call_stack_on_error: false,
            ansi_mode: AnsiMode::default(),
            password_pepper: "amlp-driver-default-pepper".to_string(),
        }
    }
}

impl Config {
    /// Loads a config file, filling in defaults for anything it omits.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Config> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.display().to_string(), source })?;
        toml::from_str(&text)
            .map_err(|source| ConfigError::Parse { path: path.display().to_string(), source })
    }

    /// `AMLP_MUDLIB` names the root directory for script and data
    /// resolution (spec section 6); when set, it overrides the configured
    /// mudlib root.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(mudlib) = std::env::var("AMLP_MUDLIB") {
            if !mudlib.is_empty() {
                self.mudlib_root = PathBuf::from(mudlib);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "stream_port = 4000").unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.stream_port, 4000);
        assert_eq!(config.framed_port, 3001);
        assert_eq!(config.ansi_mode, AnsiMode::Strip);
    }

    #[test]
    fn env_override_wins_over_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "mudlib_root = \"/from/file\"").unwrap();
        let mut config = Config::load(file.path()).unwrap();
        std::env::set_var("AMLP_MUDLIB", "/from/env");
        config.apply_env_overrides();
        std::env::remove_var("AMLP_MUDLIB");
        assert_eq!(config.mudlib_root, PathBuf::from("/from/env"));
    }
}
