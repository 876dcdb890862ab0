//! The readiness-based I/O multiplexer (spec §4.10, §5): one `mio::Poll`
//! over two listeners and a bounded table of sessions, a single thread, no
//! session ever touches the VM concurrently with another. Grounded on
//! `driver.c`'s `select()`-based main loop — accept, read, dispatch,
//! idle-timeout sweep, repeat — translated to readiness events instead of
//! a full-table `FD_ISSET` scan.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token};

use amlp_config::{AnsiMode, Config};
use amlp_efuns::Efuns;
use amlp_session::{login, play, ConnectionKind, LoginContext, LoginEvent, PlayContext, PlayOutcome, Session, SessionState};
use amlp_vm::Vm;

use crate::ansi::{convert_ansi, normalize_line_endings};
use crate::connection::Connection;
use crate::error::{NetError, NetResult};
use crate::framing;
use crate::websocket::{self, Opcode};

const STREAM_LISTENER: Token = Token(0);
const FRAMED_LISTENER: Token = Token(1);
const FIRST_SESSION_TOKEN: usize = 2;

const MAX_LINE_LEN: usize = 4096;
const POLL_TIMEOUT: Duration = Duration::from_secs(1);
const BANNER: &str = "Welcome to the realm.";
const NAME_PROMPT: &str = "What is your name?";

fn prompt_for(state: SessionState) -> Option<&'static str> {
    match state {
        SessionState::GetName => Some(NAME_PROMPT),
        SessionState::GetPassword => Some("Password:"),
        SessionState::NewPassword => Some("Choose a password (at least 6 characters):"),
        SessionState::ConfirmPassword => Some("Confirm your password:"),
        _ => None,
    }
}

fn find_header_end(buf: &[u8]) -> usize {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4).unwrap_or(buf.len())
}

/// Renders `lines` for `connection`'s protocol and queues the bytes.
/// Framed output only goes out once the upgrade handshake has completed;
/// callers that need to reach a not-yet-established framed session (there
/// shouldn't be one; the handshake path sends its own banner) get silently
/// dropped rather than corrupting the socket with raw text.
fn send_lines(connection: &mut Connection, ansi_mode: AnsiMode, lines: &[String]) {
    if lines.is_empty() {
        return;
    }
    match connection.kind {
        ConnectionKind::Stream => {
            let mut text = lines.join("\r\n");
            text.push_str("\r\n");
            connection.queue(text.as_bytes());
        }
        ConnectionKind::Framed => {
            if !connection.ws_established {
                return;
            }
            let joined = lines.join("\n");
            let rendered = normalize_line_endings(&convert_ansi(&joined, ansi_mode));
            connection.queue(&websocket::encode_text(&rendered));
        }
    }
}

struct Slot {
    connection: Connection,
    session: Session,
}

pub struct Server {
    poll: Poll,
    events: Events,
    stream_listener: TcpListener,
    framed_listener: TcpListener,
    slots: Vec<Option<Slot>>,
    vm: Vm,
    mudlib_root: PathBuf,
    password_pepper: String,
    idle_timeout: Duration,
    ansi_mode: AnsiMode,
    first_player_created: bool,
    shutdown: Arc<AtomicBool>,
    next_session_id: u32,
}

impl Server {
    pub fn bind(config: &Config) -> NetResult<Server> {
        let stream_addr: SocketAddr = format!("0.0.0.0:{}", config.stream_port).parse().expect("valid socket address");
        let framed_addr: SocketAddr = format!("0.0.0.0:{}", config.framed_port).parse().expect("valid socket address");

        let mut stream_listener =
            TcpListener::bind(stream_addr).map_err(|source| NetError::Bind { addr: stream_addr.to_string(), source })?;
        let mut framed_listener =
            TcpListener::bind(framed_addr).map_err(|source| NetError::Bind { addr: framed_addr.to_string(), source })?;

        let poll = Poll::new().map_err(NetError::Poll)?;
        poll.registry().register(&mut stream_listener, STREAM_LISTENER, Interest::READABLE).map_err(NetError::Poll)?;
        poll.registry().register(&mut framed_listener, FRAMED_LISTENER, Interest::READABLE).map_err(NetError::Poll)?;

        let mut vm = Vm::new();
        let efuns = Rc::new(Efuns::new(config.mudlib_root.clone()));
        vm.set_efun_host(efuns.clone());
        vm.set_method_host(efuns);

        let shutdown = Arc::new(AtomicBool::new(false));
        signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&shutdown)).map_err(NetError::Signal)?;
        signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&shutdown)).map_err(NetError::Signal)?;

        let slots = (0..config.max_sessions).map(|_| None).collect();

        Ok(Server {
            poll,
            events: Events::with_capacity(1024),
            stream_listener,
            framed_listener,
            slots,
            vm,
            mudlib_root: config.mudlib_root.clone(),
            password_pepper: config.password_pepper.clone(),
            idle_timeout: Duration::from_secs(config.idle_timeout_secs),
            ansi_mode: config.ansi_mode,
            first_player_created: false,
            shutdown,
            next_session_id: 0,
        })
    }

    /// Runs until a shutdown signal arrives or an admin issues `shutdown`,
    /// then sends every connected session a closing message and returns.
    pub fn run(&mut self) -> NetResult<()> {
        while !self.shutdown.load(Ordering::Relaxed) {
            match self.poll.poll(&mut self.events, Some(POLL_TIMEOUT)) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(NetError::Poll(e)),
            }

            let tokens: Vec<Token> = self.events.iter().map(|event| event.token()).collect();
            for token in tokens {
                match token {
                    STREAM_LISTENER => self.accept_loop(ConnectionKind::Stream),
                    FRAMED_LISTENER => self.accept_loop(ConnectionKind::Framed),
                    other => self.service_slot(other),
                }
            }

            self.check_idle_sessions();
        }

        self.shutdown_all();
        Ok(())
    }

    fn accept_loop(&mut self, kind: ConnectionKind) {
        loop {
            let accepted = match kind {
                ConnectionKind::Stream => self.stream_listener.accept(),
                ConnectionKind::Framed => self.framed_listener.accept(),
            };
            match accepted {
                Ok((stream, addr)) => self.accept_connection(stream, addr, kind),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    tracing::warn!(target: "net", error = %e, "accept failed");
                    break;
                }
            }
        }
    }

    fn accept_connection(&mut self, stream: mio::net::TcpStream, addr: SocketAddr, kind: ConnectionKind) {
        let Some(idx) = self.slots.iter().position(Option::is_none) else {
            tracing::warn!(target: "net", %addr, "session table full, dropping connection");
            return;
        };

        let token = Token(idx + FIRST_SESSION_TOKEN);
        let mut connection = Connection::new(stream, kind, token);
        if let Err(e) = connection.register(self.poll.registry()) {
            tracing::warn!(target: "net", %addr, error = %e, "failed to register connection");
            return;
        }

        self.next_session_id += 1;
        let mut session = Session::new(self.next_session_id, kind, Instant::now());

        // Framed sessions defer the banner until the upgrade handshake
        // completes (`try_complete_handshake`); stream sessions get it
        // immediately, matching the original's "write greeting on accept".
        if kind == ConnectionKind::Stream {
            session.state = SessionState::GetName;
            let ansi_mode = self.ansi_mode;
            send_lines(&mut connection, ansi_mode, &[BANNER.to_string(), NAME_PROMPT.to_string()]);
        }

        tracing::info!(target: "net", %addr, session = session.id, ?kind, "connection accepted");
        self.slots[idx] = Some(Slot { connection, session });
    }

    fn service_slot(&mut self, token: Token) {
        let Some(idx) = token.0.checked_sub(FIRST_SESSION_TOKEN) else { return };
        if idx >= self.slots.len() {
            return;
        }
        let Some(mut slot) = self.slots[idx].take() else { return };

        let mut close = slot.connection.flush().is_err();

        if !close {
            match slot.connection.read_available() {
                Ok(true) => {
                    slot.session.touch(Instant::now());
                    self.process_buffered_input(&mut slot);
                    close = slot.session.state == SessionState::Disconnecting;
                    if !close {
                        close = slot.connection.flush().is_err();
                    }
                }
                Ok(false) => close = true,
                Err(_) => close = true,
            }
        }

        if close {
            self.close_slot(slot);
        } else if slot.connection.sync_interest(self.poll.registry()).is_err() {
            self.close_slot(slot);
        } else {
            self.slots[idx] = Some(slot);
        }
    }

    fn close_slot(&mut self, mut slot: Slot) {
        slot.connection.deregister(self.poll.registry());
        tracing::info!(target: "net", session = slot.session.id, "connection closed");
    }

    fn process_buffered_input(&mut self, slot: &mut Slot) {
        match slot.connection.kind {
            ConnectionKind::Stream => match framing::extract_lines(&mut slot.connection.read_buf, MAX_LINE_LEN) {
                Ok(lines) => {
                    for line in lines {
                        if slot.session.state == SessionState::Disconnecting {
                            break;
                        }
                        self.handle_line(slot, &line);
                    }
                }
                Err(_) => {
                    let ansi_mode = self.ansi_mode;
                    send_lines(&mut slot.connection, ansi_mode, &["Line too long, resetting input.".to_string()]);
                }
            },
            ConnectionKind::Framed => self.process_framed_input(slot),
        }
    }

    fn process_framed_input(&mut self, slot: &mut Slot) {
        if !slot.connection.ws_established {
            self.try_complete_handshake(slot);
            return;
        }

        loop {
            match websocket::decode_frame(&slot.connection.read_buf) {
                Ok(Some((frame, consumed))) => {
                    slot.connection.read_buf.drain(0..consumed);
                    match frame.opcode {
                        Opcode::Text => {
                            if let Ok(text) = websocket::decode_text(&frame) {
                                for line in text.lines() {
                                    if slot.session.state == SessionState::Disconnecting {
                                        break;
                                    }
                                    self.handle_line(slot, line);
                                }
                            }
                        }
                        Opcode::Ping => slot.connection.queue(&websocket::encode_pong(&frame.payload)),
                        Opcode::Close => {
                            slot.connection.queue(&websocket::encode_close(1000, ""));
                            slot.session.state = SessionState::Disconnecting;
                        }
                        Opcode::Binary | Opcode::Continuation | Opcode::Pong | Opcode::Other(_) => {}
                    }
                    if slot.session.state == SessionState::Disconnecting {
                        break;
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    slot.session.state = SessionState::Disconnecting;
                    break;
                }
            }
        }
    }

    fn try_complete_handshake(&mut self, slot: &mut Slot) {
        let Some(key) = websocket::parse_handshake(&slot.connection.read_buf) else { return };
        let consumed = find_header_end(&slot.connection.read_buf);
        slot.connection.read_buf.drain(0..consumed);
        slot.connection.queue(websocket::handshake_response(&key).as_bytes());
        slot.connection.ws_established = true;

        slot.session.state = SessionState::GetName;
        let ansi_mode = self.ansi_mode;
        send_lines(&mut slot.connection, ansi_mode, &[BANNER.to_string(), NAME_PROMPT.to_string()]);
    }

    fn handle_line(&mut self, slot: &mut Slot, line: &str) {
        match slot.session.state {
            SessionState::GetName => {
                let ctx = LoginContext {
                    vm: &mut self.vm,
                    mudlib_root: &self.mudlib_root,
                    password_pepper: &self.password_pepper,
                    first_player_created: &mut self.first_player_created,
                };
                let lines = login::handle_get_name(&mut slot.session, &ctx, line);
                self.respond(slot, lines, None);
            }
            SessionState::GetPassword => {
                let mut ctx = LoginContext {
                    vm: &mut self.vm,
                    mudlib_root: &self.mudlib_root,
                    password_pepper: &self.password_pepper,
                    first_player_created: &mut self.first_player_created,
                };
                let (lines, event) = login::handle_get_password(&mut slot.session, &mut ctx, line);
                self.respond(slot, lines, Some(event));
            }
            SessionState::NewPassword => {
                let lines = login::handle_new_password(&mut slot.session, line);
                self.respond(slot, lines, None);
            }
            SessionState::ConfirmPassword => {
                let mut ctx = LoginContext {
                    vm: &mut self.vm,
                    mudlib_root: &self.mudlib_root,
                    password_pepper: &self.password_pepper,
                    first_player_created: &mut self.first_player_created,
                };
                let lines = login::handle_confirm_password(&mut slot.session, &mut ctx, line);
                self.respond(slot, lines, None);
            }
            SessionState::Chargen => {
                let mut ctx = LoginContext {
                    vm: &mut self.vm,
                    mudlib_root: &self.mudlib_root,
                    password_pepper: &self.password_pepper,
                    first_player_created: &mut self.first_player_created,
                };
                let (lines, event) = login::handle_chargen(&mut slot.session, &mut ctx, line);
                self.respond(slot, lines, Some(event));
            }
            SessionState::Playing => {
                let mut ctx = PlayContext { vm: &mut self.vm, mudlib_root: &self.mudlib_root };
                match play::handle_playing(&mut slot.session, &mut ctx, line) {
                    PlayOutcome::Lines(lines) => {
                        let ansi_mode = self.ansi_mode;
                        send_lines(&mut slot.connection, ansi_mode, &lines);
                    }
                    PlayOutcome::Quit(lines) => {
                        let ansi_mode = self.ansi_mode;
                        send_lines(&mut slot.connection, ansi_mode, &lines);
                        slot.session.state = SessionState::Disconnecting;
                    }
                    PlayOutcome::RequiresRealm(cmd, arg) => self.handle_realm_command(slot, &cmd, &arg),
                }
            }
            SessionState::Connecting | SessionState::Disconnecting => {}
        }
    }

    fn respond(&mut self, slot: &mut Slot, mut lines: Vec<String>, event: Option<LoginEvent>) {
        if let Some(prompt) = prompt_for(slot.session.state) {
            lines.push(prompt.to_string());
        }
        let ansi_mode = self.ansi_mode;
        send_lines(&mut slot.connection, ansi_mode, &lines);

        if let Some(LoginEvent::Announce(text)) = event {
            self.broadcast(text);
        }
    }

    /// Spec §5: "broadcasts iterate sessions in slot order." Never reaches
    /// the session whose line is being processed — it has been taken out
    /// of `slots` for the duration of `service_slot`, which is exactly
    /// right for a self-announce ("X has entered the game").
    fn broadcast(&mut self, text: String) {
        let ansi_mode = self.ansi_mode;
        let lines = vec![text];
        for slot in self.slots.iter_mut().flatten() {
            if slot.session.is_playing() {
                send_lines(&mut slot.connection, ansi_mode, &lines);
            }
        }
    }

    /// `users`/`promote`/`shutdown`: the three built-ins that need the full
    /// session table (spec §4.9), handed back here by
    /// `commands::CommandOutcome::RequiresRealm` once privilege has already
    /// been checked.
    fn handle_realm_command(&mut self, slot: &mut Slot, cmd: &str, arg: &str) {
        let ansi_mode = self.ansi_mode;
        match cmd {
            "users" => {
                let mut lines: Vec<String> = self
                    .slots
                    .iter()
                    .flatten()
                    .filter(|s| s.session.is_playing())
                    .map(|s| format!("{} (privilege {})", s.session.name.as_deref().unwrap_or("?"), s.session.privilege_level))
                    .collect();
                if slot.session.is_playing() {
                    lines.push(format!("{} (privilege {}) [you]", slot.session.name.as_deref().unwrap_or("?"), slot.session.privilege_level));
                }
                send_lines(&mut slot.connection, ansi_mode, &lines);
            }
            "promote" => match self.slots.iter_mut().flatten().find(|s| s.session.name.as_deref() == Some(arg)) {
                Some(target) => {
                    target.session.privilege_level = 2;
                    let by = slot.session.name.clone().unwrap_or_else(|| "an admin".to_string());
                    send_lines(&mut target.connection, ansi_mode, &[format!("You have been promoted by {by}.")]);
                    send_lines(&mut slot.connection, ansi_mode, &[format!("{arg} promoted.")]);
                }
                None => send_lines(&mut slot.connection, ansi_mode, &["No such user.".to_string()]),
            },
            "shutdown" => {
                self.broadcast("The realm is shutting down.".to_string());
                send_lines(&mut slot.connection, ansi_mode, &["Shutdown initiated.".to_string()]);
                self.shutdown.store(true, Ordering::Relaxed);
            }
            _ => {}
        }
    }

    fn check_idle_sessions(&mut self) {
        let now = Instant::now();
        let idle_timeout = self.idle_timeout;
        let ansi_mode = self.ansi_mode;
        let mut to_close = Vec::new();

        for (idx, slot) in self.slots.iter_mut().enumerate() {
            if let Some(s) = slot {
                if s.session.is_idle(now, idle_timeout) {
                    send_lines(&mut s.connection, ansi_mode, &["Idle timeout, disconnecting.".to_string()]);
                    let _ = s.connection.flush();
                    to_close.push(idx);
                }
            }
        }

        for idx in to_close {
            if let Some(slot) = self.slots[idx].take() {
                self.close_slot(slot);
            }
        }
    }

    fn shutdown_all(&mut self) {
        let ansi_mode = self.ansi_mode;
        for slot in self.slots.iter_mut() {
            if let Some(s) = slot {
                send_lines(&mut s.connection, ansi_mode, &["Server is shutting down. Goodbye.".to_string()]);
                let _ = s.connection.flush();
            }
        }
        let registry = self.poll.registry();
        for slot in self.slots.iter_mut() {
            if let Some(s) = slot.take() {
                let mut s = s;
                s.connection.deregister(registry);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpStream as StdTcpStream;

    // Chargen completes on the very first line it sees, so the login flow
    // below reaches `Playing` (and, being the first player, admin
    // privilege) after exactly one post-creation line.
    const PLAYER_SOURCE: &str = r#"
        void setup_player(string name, string password_hash) {}
        mixed process_command(string cmd) { return 1; }
    "#;

    fn test_config(mudlib_root: PathBuf, stream_port: u16, framed_port: u16) -> Config {
        Config {
            stream_port,
            framed_port,
            mudlib_root,
            idle_timeout_secs: 1800,
            max_sessions: 4,
            ansi_mode: AnsiMode::Strip,
            ..Config::default()
        }
    }

    /// Drains whatever text has arrived within a short window. A readiness
    /// loop has no fixed number of response lines per input, so tests poll
    /// for "nothing more came in the last 150ms" rather than counting lines.
    fn drain(stream: &mut StdTcpStream) -> String {
        stream.set_read_timeout(Some(Duration::from_millis(150))).unwrap();
        let mut out = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            match stream.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => out.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut => break,
                Err(_) => break,
            }
        }
        String::from_utf8_lossy(&out).into_owned()
    }

    /// A full stream-protocol login followed by an admin shutdown,
    /// grounded the same way the example pack's
    /// `crates/network/tests/peer_connection_tests.rs` grounds a handshake
    /// test: a real listener, a real client socket, one scripted exchange.
    #[test]
    fn stream_login_creates_a_character_and_admin_can_shut_the_server_down() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("std")).unwrap();
        std::fs::write(dir.path().join("std/player.lpc"), PLAYER_SOURCE).unwrap();

        let config = test_config(dir.path().to_path_buf(), 18765, 18766);
        let mut server = Server::bind(&config).expect("server binds both listeners");

        let handle = std::thread::spawn(move || server.run());
        std::thread::sleep(Duration::from_millis(100));

        let mut stream = StdTcpStream::connect(("127.0.0.1", 18765)).expect("client connects");
        stream.set_nodelay(true).ok();

        let banner = drain(&mut stream);
        assert!(banner.contains("What is your name?"));

        stream.write_all(b"alice\r\n").unwrap();
        let after_name = drain(&mut stream);
        assert!(after_name.contains("Welcome, alice!"));

        stream.write_all(b"sekrit1\r\n").unwrap();
        let after_new_password = drain(&mut stream);
        assert!(after_new_password.contains("confirm"));

        stream.write_all(b"sekrit1\r\n").unwrap();
        let after_confirm = drain(&mut stream);
        assert!(after_confirm.contains("Character created"));

        stream.write_all(b"look\r\n").unwrap();
        let after_chargen = drain(&mut stream);
        assert!(after_chargen.contains("Character generation complete"));

        stream.write_all(b"shutdown\r\n").unwrap();
        let after_shutdown = drain(&mut stream);
        assert!(after_shutdown.contains("Shutdown initiated"));

        handle.join().expect("server thread does not panic").expect("server run returns Ok");
    }
}
