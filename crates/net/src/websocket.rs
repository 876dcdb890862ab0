//! The framed-protocol wire format (spec §4.10). Grounded directly on
//! `websocket.c`: the same GUID, the same header-scan handshake, the same
//! frame layout and masking rule, reimplemented with the `sha1`/`base64`
//! crates rather than the original's hand-rolled SHA-1 (SPEC_FULL.md's
//! "WebSocket handshake" note — a real crate is available, nothing in the
//! spec forbids using it).

use base64::Engine;
use sha1::{Digest, Sha1};

use crate::error::{NetError, NetResult};

const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";
pub const MAX_FRAME_SIZE: u64 = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
    Other(u8),
}

impl Opcode {
    fn from_raw(byte: u8) -> Opcode {
        match byte {
            0x0 => Opcode::Continuation,
            0x1 => Opcode::Text,
            0x2 => Opcode::Binary,
            0x8 => Opcode::Close,
            0x9 => Opcode::Ping,
            0xA => Opcode::Pong,
            other => Opcode::Other(other),
        }
    }

    fn raw(self) -> u8 {
        match self {
            Opcode::Continuation => 0x0,
            Opcode::Text => 0x1,
            Opcode::Binary => 0x2,
            Opcode::Close => 0x8,
            Opcode::Ping => 0x9,
            Opcode::Pong => 0xA,
            Opcode::Other(byte) => byte,
        }
    }
}

pub struct Frame {
    pub fin: bool,
    pub opcode: Opcode,
    pub payload: Vec<u8>,
}

/// `ws_is_upgrade_request`: a GET request naming the `websocket` protocol.
/// Deliberately permissive about header casing/order, matching the
/// original's `strcasestr` scan.
pub fn is_upgrade_request(data: &[u8]) -> bool {
    let Ok(text) = std::str::from_utf8(data) else { return false };
    text.starts_with("GET ")
        && text.to_ascii_lowercase().contains("upgrade:")
        && text.to_ascii_lowercase().contains("websocket")
}

fn header_value<'a>(request: &'a str, header: &str) -> Option<&'a str> {
    let needle = format!("{header}:");
    request
        .lines()
        .find(|line| line.to_ascii_lowercase().starts_with(&needle.to_ascii_lowercase()))
        .and_then(|line| line.split_once(':'))
        .map(|(_, value)| value.trim())
}

/// `ws_handle_handshake`: requires a complete HTTP request (terminated by
/// the blank line) before it will parse it, since `Sec-WebSocket-Key` may
/// not have arrived yet in a partial read.
pub fn parse_handshake(data: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(data).ok()?;
    if !text.contains("\r\n\r\n") {
        return None;
    }
    if !is_upgrade_request(data) {
        return None;
    }
    header_value(text, "Sec-WebSocket-Key").map(str::to_string)
}

/// `SHA1(key + GUID)`, base64-encoded — the accept value for the
/// `Sec-WebSocket-Accept` response header.
pub fn accept_key(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(hasher.finalize())
}

/// The full HTTP/1.1 101 response for a given client key.
pub fn handshake_response(client_key: &str) -> String {
    format!(
        "HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Accept: {}\r\n\r\n",
        accept_key(client_key)
    )
}

/// Decodes at most one frame from the front of `data`. Returns `Ok(None)`
/// when there isn't a complete frame yet (`ws_decode_frame`'s "need more
/// data" return of 1); the caller should try again once more bytes arrive.
pub fn decode_frame(data: &[u8]) -> NetResult<Option<(Frame, usize)>> {
    if data.len() < 2 {
        return Ok(None);
    }

    let fin = data[0] & 0x80 != 0;
    let opcode = Opcode::from_raw(data[0] & 0x0F);
    let masked = data[1] & 0x80 != 0;
    let mut pos = 2;

    let mut payload_len = u64::from(data[1] & 0x7F);
    if payload_len == 126 {
        if data.len() < pos + 2 {
            return Ok(None);
        }
        payload_len = u64::from(u16::from_be_bytes([data[pos], data[pos + 1]]));
        pos += 2;
    } else if payload_len == 127 {
        if data.len() < pos + 8 {
            return Ok(None);
        }
        payload_len = u64::from_be_bytes(data[pos..pos + 8].try_into().unwrap());
        pos += 8;
    }

    if payload_len > MAX_FRAME_SIZE {
        return Err(NetError::FrameTooLarge);
    }

    let mask_key = if masked {
        if data.len() < pos + 4 {
            return Ok(None);
        }
        let key = [data[pos], data[pos + 1], data[pos + 2], data[pos + 3]];
        pos += 4;
        Some(key)
    } else {
        None
    };

    let payload_len = payload_len as usize;
    if data.len() < pos + payload_len {
        return Ok(None);
    }

    let mut payload = data[pos..pos + payload_len].to_vec();
    if let Some(key) = mask_key {
        for (i, byte) in payload.iter_mut().enumerate() {
            *byte ^= key[i % 4];
        }
    }

    Ok(Some((Frame { fin, opcode, payload }, pos + payload_len)))
}

/// `ws_encode_frame`: server-to-client frames are never masked.
pub fn encode_frame(opcode: Opcode, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 10);
    out.push(0x80 | opcode.raw());

    let len = payload.len();
    if len < 126 {
        out.push(len as u8);
    } else if len <= 0xFFFF {
        out.push(126);
        out.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        out.push(127);
        out.extend_from_slice(&(len as u64).to_be_bytes());
    }

    out.extend_from_slice(payload);
    out
}

pub fn encode_text(text: &str) -> Vec<u8> {
    encode_frame(Opcode::Text, text.as_bytes())
}

pub fn encode_close(code: u16, reason: &str) -> Vec<u8> {
    let mut payload = Vec::with_capacity(2 + reason.len());
    payload.extend_from_slice(&code.to_be_bytes());
    payload.extend_from_slice(reason.as_bytes());
    encode_frame(Opcode::Close, &payload)
}

pub fn encode_pong(ping_payload: &[u8]) -> Vec<u8> {
    encode_frame(Opcode::Pong, ping_payload)
}

pub fn decode_text(frame: &Frame) -> NetResult<String> {
    String::from_utf8(frame.payload.clone()).map_err(|_| NetError::MalformedFrame)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_key_matches_the_rfc_6455_test_vector() {
        assert_eq!(accept_key("dGhlIHNhbXBsZSBub25jZQ=="), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }

    #[test]
    fn round_trips_a_masked_text_frame() {
        let raw = encode_frame(Opcode::Text, b"hello");
        let mut masked = raw.clone();
        masked[1] |= 0x80;
        let key = [0x12, 0x34, 0x56, 0x78];
        let mut with_mask = masked[..2].to_vec();
        with_mask.extend_from_slice(&key);
        for (i, byte) in raw[2..].iter().enumerate() {
            with_mask.push(byte ^ key[i % 4]);
        }
        let (frame, consumed) = decode_frame(&with_mask).unwrap().unwrap();
        assert_eq!(consumed, with_mask.len());
        assert_eq!(frame.opcode, Opcode::Text);
        assert_eq!(decode_text(&frame).unwrap(), "hello");
    }

    #[test]
    fn partial_frame_asks_for_more_data() {
        let raw = encode_frame(Opcode::Text, b"longer payload here");
        assert!(decode_frame(&raw[..2]).unwrap().is_none());
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let mut header = vec![0x80 | Opcode::Binary.raw(), 127];
        header.extend_from_slice(&(MAX_FRAME_SIZE + 1).to_be_bytes());
        assert!(matches!(decode_frame(&header), Err(NetError::FrameTooLarge)));
    }

    #[test]
    fn parses_the_sec_websocket_key_header() {
        let request = "GET /ws HTTP/1.1\r\nHost: x\r\nUpgrade: websocket\r\nSec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\r\n";
        assert_eq!(parse_handshake(request.as_bytes()).as_deref(), Some("dGhlIHNhbXBsZSBub25jZQ=="));
    }
}
