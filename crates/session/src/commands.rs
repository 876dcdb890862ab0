//! Built-in command dispatch (spec §4.9): reached "when no script handler
//! or script returned Null" on a line typed during `Playing`. Movement is a
//! thin convenience over the object model's `"environment"`/`"exits"`
//! property convention (there is no native room/exit table here — unlike
//! `room.c`'s hardcoded array, which is game content this engine's
//! `amlp-objects`/`amlp-efuns` layer expects scripts to express instead);
//! filesystem and administration commands are gated on `privilege_level`
//! exactly as `driver.c`'s `execute_command` gates them.

use std::path::Path;

use amlp_objects::ObjectManager;
use amlp_value::{ObjectId, Value};
use amlp_vm::Vm;

use crate::session::Session;

pub const PERMISSION_DENIED: &str = "You don't have permission to use that command.";

/// What the caller (`amlp-net`) should do with a dispatched command.
pub enum CommandOutcome {
    /// Fully handled here; send these lines to the player.
    Handled(Vec<String>),
    Denied,
    /// `users`/`promote`/`shutdown`: privilege check already passed, but
    /// completing the command needs the full session table, which only the
    /// multiplexer holds (spec §5 "Broadcasts iterate sessions in slot
    /// order"). Carries the command name and its raw argument string.
    RequiresRealm(String, String),
    Quit(Vec<String>),
    Unrecognized,
}

const MOVEMENT: &[(&str, &str)] =
    &[("north", "n"), ("south", "s"), ("east", "e"), ("west", "w"), ("up", "u"), ("down", "d")];

fn canonical_direction(word: &str) -> Option<&'static str> {
    MOVEMENT.iter().find(|(long, short)| word == *long || word == *short).map(|(long, _)| *long)
}

/// Dispatches one already-trimmed input line. Returns `Unrecognized` for
/// anything not in the built-in table so the caller can show the generic
/// help hint (spec §7).
pub fn dispatch(session: &mut Session, vm: &mut Vm, manager: &mut ObjectManager, mudlib_root: &Path, line: &str) -> CommandOutcome {
    let mut parts = line.splitn(2, ' ');
    let cmd = parts.next().unwrap_or("").to_ascii_lowercase();
    let arg = parts.next().unwrap_or("").trim();

    if let Some(direction) = canonical_direction(&cmd) {
        return CommandOutcome::Handled(movement(session, vm, manager, direction));
    }

    match cmd.as_str() {
        "quit" | "logout" => CommandOutcome::Quit(vec!["Goodbye!".to_string()]),
        "help" => CommandOutcome::Handled(help_text()),
        "save" => CommandOutcome::Handled(vec!["Saved.".to_string()]),
        "ls" | "cd" | "pwd" | "cat" => {
            if session.privilege_level < 1 {
                return CommandOutcome::Denied;
            }
            CommandOutcome::Handled(filesystem(session, mudlib_root, &cmd, arg))
        }
        "users" | "promote" | "shutdown" => {
            if session.privilege_level < 2 {
                return CommandOutcome::Denied;
            }
            CommandOutcome::RequiresRealm(cmd, arg.to_string())
        }
        _ => CommandOutcome::Unrecognized,
    }
}

fn help_text() -> Vec<String> {
    vec![
        "Movement: north, south, east, west, up, down (or n, s, e, w, u, d)".to_string(),
        "Other commands: quit, save, help".to_string(),
    ]
}

/// Reads the current room's `"exits"` mapping property (direction string ->
/// destination object); if the direction has an entry, moves the player
/// there via `move_object`-equivalent logic. Falls back to "you can't go
/// that way" when there is no bound object, no current room, or no exit.
fn movement(session: &mut Session, vm: &mut Vm, manager: &mut ObjectManager, direction: &str) -> Vec<String> {
    let Some(player) = session.bound_object else {
        return vec!["You aren't anywhere yet.".to_string()];
    };
    let Some(Value::Object(room)) = manager.resolve_property(player, "environment") else {
        return vec!["You aren't anywhere yet.".to_string()];
    };
    let destination = match manager.resolve_property(room, "exits") {
        Some(Value::Mapping(id)) => vm.heap.mappings.get(id).ok().and_then(|entries| match entries.get(direction) {
            Some(Value::Object(dest)) => Some(*dest),
            _ => None,
        }),
        _ => None,
    };
    let Some(destination) = destination else {
        return vec!["You can't go that way.".to_string()];
    };
    set_environment(manager, player, destination);
    vec![format!("You go {direction}.")]
}

fn set_environment(manager: &mut ObjectManager, player: ObjectId, destination: ObjectId) {
    if let Some(object) = manager.get_mut(player) {
        object.set_property("environment", Value::Object(destination));
    }
}

/// Resolves `arg` under `session.working_dir`, then under `mudlib_root`,
/// exactly the same sandbox rule the filesystem efuns use (spec §4.8).
fn resolve(session: &Session, mudlib_root: &Path, arg: &str) -> Option<std::path::PathBuf> {
    let candidate = if let Some(stripped) = arg.strip_prefix('/') {
        stripped.to_string()
    } else {
        format!("{}/{}", session.working_dir.trim_start_matches('/'), arg)
    };
    amlp_io::resolve_under_root(mudlib_root, &candidate)
}

fn filesystem(session: &mut Session, mudlib_root: &Path, cmd: &str, arg: &str) -> Vec<String> {
    match cmd {
        "pwd" => vec![session.working_dir.clone()],
        "ls" => {
            let target = if arg.is_empty() { "." } else { arg };
            match resolve(session, mudlib_root, target).and_then(|p| std::fs::read_dir(p).ok()) {
                Some(entries) => entries.flatten().map(|e| e.file_name().to_string_lossy().into_owned()).collect(),
                None => vec!["No such directory.".to_string()],
            }
        }
        "cd" => {
            let target = if arg.is_empty() { "/" } else { arg };
            match resolve(session, mudlib_root, target) {
                Some(resolved) if resolved.is_dir() => {
                    let relative = resolved.strip_prefix(mudlib_root.canonicalize().unwrap_or_else(|_| mudlib_root.to_path_buf())).unwrap_or(&resolved);
                    session.working_dir = format!("/{}", relative.to_string_lossy());
                    vec![format!("Now in {}", session.working_dir)]
                }
                _ => vec!["No such directory.".to_string()],
            }
        }
        "cat" => match resolve(session, mudlib_root, arg).and_then(|p| std::fs::read_to_string(p).ok()) {
            Some(contents) => contents.lines().map(str::to_string).collect(),
            None => vec!["No such file.".to_string()],
        },
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ConnectionKind;
    use std::time::Instant;

    fn session() -> Session {
        Session::new(0, ConnectionKind::Stream, Instant::now())
    }

    #[test]
    fn quit_is_always_available() {
        let mut vm = Vm::new();
        let mut manager = ObjectManager::new();
        let dir = tempfile::tempdir().unwrap();
        let mut s = session();
        assert!(matches!(dispatch(&mut s, &mut vm, &mut manager, dir.path(), "quit"), CommandOutcome::Quit(_)));
    }

    #[test]
    fn filesystem_commands_are_denied_below_privilege_one() {
        let mut vm = Vm::new();
        let mut manager = ObjectManager::new();
        let dir = tempfile::tempdir().unwrap();
        let mut s = session();
        assert!(matches!(dispatch(&mut s, &mut vm, &mut manager, dir.path(), "ls"), CommandOutcome::Denied));
    }

    #[test]
    fn ls_lists_directory_entries_once_privileged() {
        let mut vm = Vm::new();
        let mut manager = ObjectManager::new();
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"hi").unwrap();
        let mut s = session();
        s.privilege_level = 1;
        match dispatch(&mut s, &mut vm, &mut manager, dir.path(), "ls") {
            CommandOutcome::Handled(lines) => assert_eq!(lines, vec!["a.txt".to_string()]),
            _ => panic!("expected Handled"),
        }
    }

    #[test]
    fn admin_commands_require_privilege_two() {
        let mut vm = Vm::new();
        let mut manager = ObjectManager::new();
        let dir = tempfile::tempdir().unwrap();
        let mut s = session();
        s.privilege_level = 1;
        assert!(matches!(dispatch(&mut s, &mut vm, &mut manager, dir.path(), "shutdown"), CommandOutcome::Denied));
        s.privilege_level = 2;
        assert!(matches!(dispatch(&mut s, &mut vm, &mut manager, dir.path(), "shutdown"), CommandOutcome::RequiresRealm(_, _)));
    }

    #[test]
    fn movement_without_a_bound_object_gives_a_generic_message() {
        let mut vm = Vm::new();
        let mut manager = ObjectManager::new();
        let dir = tempfile::tempdir().unwrap();
        let mut s = session();
        match dispatch(&mut s, &mut vm, &mut manager, dir.path(), "north") {
            CommandOutcome::Handled(lines) => assert_eq!(lines, vec!["You aren't anywhere yet.".to_string()]),
            _ => panic!("expected Handled"),
        }
    }
}
