//! The `Playing`-state entry point (spec §4.9, §6): "every input line [is]
//! routed to the bound object's command handler or to a built-in command...
//! A returned string is sent to the player; Null or Int causes the session
//! layer to fall through to its built-in dispatch." This is also the one
//! place that upholds the "current session" contract those sections
//! describe: `this_player` must resolve to the object a line is being
//! dispatched against for exactly the duration of that dispatch, and
//! `write`/`printf` output queued during it belongs to this connection and
//! nowhere else.

use std::path::Path;

use amlp_value::Value;
use amlp_vm::Vm;

use crate::commands::{self, CommandOutcome};
use crate::host::with_efuns;
use crate::session::Session;

pub struct PlayContext<'a> {
    pub vm: &'a mut Vm,
    pub mudlib_root: &'a Path,
}

/// What the caller should do after one line has been handled.
pub enum PlayOutcome {
    /// Send these lines to the player; stay in `Playing`.
    Lines(Vec<String>),
    /// `quit`/`logout`: send these lines, then close the connection.
    Quit(Vec<String>),
    /// An admin command whose effect needs the full session table.
    RequiresRealm(String, String),
}

/// Dispatches one line typed while `Playing`. Tries the bound object's
/// `process_command` first; a `Null` or `Int` result (no handler, or the
/// object declined) falls through to [`commands::dispatch`].
pub fn handle_playing(session: &mut Session, ctx: &mut PlayContext, line: &str) -> PlayOutcome {
    if let Some(object) = session.bound_object {
        let command = ctx.vm.heap.alloc_string(line);
        let (result, output) = with_efuns(ctx.vm, |vm, efuns| {
            efuns.set_current_player(Some(object));
            let result = efuns.manager_mut().call_method(vm, object, "process_command", vec![command]);
            efuns.set_current_player(None);
            (result, efuns.drain_output())
        });

        if let Value::String(id) = result {
            let mut lines = output;
            if let Ok(text) = ctx.vm.heap.strings.payload(id) {
                lines.extend(text.lines().map(str::to_string));
            }
            return PlayOutcome::Lines(lines);
        }
        if !output.is_empty() {
            return PlayOutcome::Lines(output);
        }
    }

    with_efuns(ctx.vm, |vm, efuns| match commands::dispatch(session, vm, &mut *efuns.manager_mut(), ctx.mudlib_root, line) {
        CommandOutcome::Handled(lines) => PlayOutcome::Lines(lines),
        CommandOutcome::Denied => PlayOutcome::Lines(vec![commands::PERMISSION_DENIED.to_string()]),
        CommandOutcome::RequiresRealm(cmd, arg) => PlayOutcome::RequiresRealm(cmd, arg),
        CommandOutcome::Quit(lines) => PlayOutcome::Quit(lines),
        CommandOutcome::Unrecognized => PlayOutcome::Lines(vec!["What?".to_string()]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ConnectionKind;
    use amlp_efuns::Efuns;
    use std::rc::Rc;
    use std::time::Instant;

    const PLAYER_SOURCE: &str = r#"
        mixed process_command(string cmd) {
            if (cmd == "look") {
                write("You see nothing special.\n");
                return 1;
            }
            return 0;
        }
    "#;

    fn setup() -> (Vm, tempfile::TempDir, amlp_value::ObjectId) {
        let dir = tempfile::tempdir().unwrap();
        let program = amlp_compiler::Compiler::compile(PLAYER_SOURCE, "player.lpc");
        assert!(program.is_success(), "{:?}", program.errors);
        let loaded = amlp_loader::load_program(&program).unwrap();
        let mut vm = Vm::new();
        let indices = vm.load_program(loaded);

        let efuns = Efuns::new(dir.path().to_path_buf());
        let object = efuns.manager_mut().create("/std/player");
        for index in &indices {
            efuns.manager_mut().get_mut(object).unwrap().attach_method(*index);
        }
        vm.set_efun_host(Rc::new(efuns));

        (vm, dir, object)
    }

    #[test]
    fn script_handler_output_is_returned_and_current_player_is_cleared() {
        let (mut vm, dir, object) = setup();
        let mut session = Session::new(0, ConnectionKind::Stream, Instant::now());
        session.bound_object = Some(object);
        session.state = crate::state::SessionState::Playing;

        let mut ctx = PlayContext { vm: &mut vm, mudlib_root: dir.path() };
        match handle_playing(&mut session, &mut ctx, "look") {
            PlayOutcome::Lines(lines) => assert_eq!(lines, vec!["You see nothing special.".to_string()]),
            _ => panic!("expected Lines"),
        }

        let current = with_efuns(&mut vm, |_, efuns| efuns.current_player());
        assert!(current.is_none());
    }

    #[test]
    fn unhandled_script_command_falls_through_to_built_ins() {
        let (mut vm, dir, object) = setup();
        let mut session = Session::new(0, ConnectionKind::Stream, Instant::now());
        session.bound_object = Some(object);
        session.state = crate::state::SessionState::Playing;

        let mut ctx = PlayContext { vm: &mut vm, mudlib_root: dir.path() };
        match handle_playing(&mut session, &mut ctx, "quit") {
            PlayOutcome::Quit(_) => {}
            _ => panic!("expected Quit from built-in fallback"),
        }
    }

    #[test]
    fn no_bound_object_goes_straight_to_built_ins() {
        let (mut vm, dir, _object) = setup();
        let mut session = Session::new(0, ConnectionKind::Stream, Instant::now());
        session.state = crate::state::SessionState::Playing;

        let mut ctx = PlayContext { vm: &mut vm, mudlib_root: dir.path() };
        match handle_playing(&mut session, &mut ctx, "help") {
            PlayOutcome::Lines(lines) => assert!(!lines.is_empty()),
            _ => panic!("expected Lines"),
        }
    }
}
