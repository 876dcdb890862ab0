//! Persisted session save file (spec §6): "a minimal text record is written
//! to `save/players/<username>` containing at least the fields `name:` and
//! `priv:`." Grounded on `driver.c`'s `free_session`, which writes the same
//! `key:value`-per-line format (there as `lib/save/players/<name>.o`); this
//! driver resolves the save directory underneath the configured mudlib root
//! like every other persisted path (spec §4.8's sandbox rule), rather than
//! the teacher's hardcoded `lib/` prefix.
//!
//! The teacher source never verifies passwords (`STATE_GET_PASSWORD`'s
//! handler is a bare `/* TODO */`); this driver's save file additionally
//! carries the password hash so `SessionState::GetPassword` has something
//! real to check against (Open Question decision #3, DESIGN.md).

use std::path::{Path, PathBuf};

use crate::error::{SessionError, SessionResult};

const SAVE_SUBDIR: &str = "save/players";

#[derive(Debug, Clone, PartialEq)]
pub struct CharacterRecord {
    pub name: String,
    pub privilege_level: i32,
    pub password_hash: String,
}

impl CharacterRecord {
    fn to_text(&self) -> String {
        format!(
            "# AMLP minimal save file\nname:{}\npriv:{}\npwhash:{}\n",
            self.name, self.privilege_level, self.password_hash
        )
    }

    fn parse(text: &str) -> Option<CharacterRecord> {
        let mut name = None;
        let mut privilege_level = None;
        let mut password_hash = None;
        for line in text.lines() {
            let Some((key, value)) = line.split_once(':') else { continue };
            match key {
                "name" => name = Some(value.to_string()),
                "priv" => privilege_level = value.parse::<i32>().ok(),
                "pwhash" => password_hash = Some(value.to_string()),
                _ => {}
            }
        }
        Some(CharacterRecord {
            name: name?,
            privilege_level: privilege_level?,
            password_hash: password_hash?,
        })
    }
}

fn save_dir(mudlib_root: &Path) -> PathBuf {
    mudlib_root.join(SAVE_SUBDIR)
}

fn save_path(mudlib_root: &Path, username: &str) -> SessionResult<PathBuf> {
    let dir = save_dir(mudlib_root);
    std::fs::create_dir_all(&dir).map_err(|source| SessionError::SaveIo { path: dir.display().to_string(), source })?;
    amlp_io::resolve_under_root(&dir, username).ok_or_else(|| SessionError::SavePathRejected { username: username.to_string() })
}

pub fn exists(mudlib_root: &Path, username: &str) -> bool {
    save_path(mudlib_root, username).map(|p| p.is_file()).unwrap_or(false)
}

pub fn load(mudlib_root: &Path, username: &str) -> SessionResult<Option<CharacterRecord>> {
    let path = save_path(mudlib_root, username)?;
    if !path.is_file() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(&path).map_err(|source| SessionError::SaveIo { path: path.display().to_string(), source })?;
    Ok(CharacterRecord::parse(&text))
}

pub fn save(mudlib_root: &Path, record: &CharacterRecord) -> SessionResult<()> {
    let path = save_path(mudlib_root, &record.name)?;
    std::fs::write(&path, record.to_text()).map_err(|source| SessionError::SaveIo { path: path.display().to_string(), source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_the_key_value_format() {
        let dir = tempfile::tempdir().unwrap();
        let record = CharacterRecord { name: "bob".to_string(), privilege_level: 2, password_hash: "abc123".to_string() };
        save(dir.path(), &record).unwrap();
        assert!(exists(dir.path(), "bob"));
        let loaded = load(dir.path(), "bob").unwrap().unwrap();
        assert_eq!(loaded, record);
    }

    #[test]
    fn missing_character_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!exists(dir.path(), "nobody"));
        assert_eq!(load(dir.path(), "nobody").unwrap(), None);
    }

    #[test]
    fn traversal_in_username_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(save_path(dir.path(), "../../etc/passwd").is_err());
    }
}
