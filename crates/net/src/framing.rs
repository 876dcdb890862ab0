//! Stream-protocol line framing (spec §4.10): "input bytes accumulate in a
//! per-session buffer; each LF delimits one logical input. A preceding CR
//! is stripped. Lines exceeding the buffer trigger a reset and an error
//! message." Grounded on `driver.c`'s raw `recv` into a fixed buffer
//! followed by `handle_session_input`, which treats the whole chunk as
//! already-terminated text; here the terminator search happens explicitly
//! since frames can span multiple `read()`s.

use crate::error::{NetError, NetResult};

/// Drains complete lines from `buf`, leaving any trailing partial line in
/// place. Each returned line has its terminating CRLF/LF stripped.
///
/// If the buffer grows past `max_len` without ever producing a newline,
/// the buffer is cleared and `Err(NetError::LineTooLong)` is returned so
/// the caller can report the reset to the connection.
pub fn extract_lines(buf: &mut Vec<u8>, max_len: usize) -> NetResult<Vec<String>> {
    let mut lines = Vec::new();
    let mut start = 0;

    while let Some(relative_nl) = buf[start..].iter().position(|&b| b == b'\n') {
        let end = start + relative_nl;
        let mut line = &buf[start..end];
        if line.last() == Some(&b'\r') {
            line = &line[..line.len() - 1];
        }
        lines.push(String::from_utf8_lossy(line).into_owned());
        start = end + 1;
    }

    buf.drain(0..start);

    if buf.len() > max_len {
        buf.clear();
        return Err(NetError::LineTooLong);
    }

    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_lf_and_strips_preceding_cr() {
        let mut buf = b"north\r\nlook\n".to_vec();
        let lines = extract_lines(&mut buf, 1024).unwrap();
        assert_eq!(lines, vec!["north".to_string(), "look".to_string()]);
        assert!(buf.is_empty());
    }

    #[test]
    fn holds_a_partial_line_until_its_terminator_arrives() {
        let mut buf = b"say hel".to_vec();
        let lines = extract_lines(&mut buf, 1024).unwrap();
        assert!(lines.is_empty());
        buf.extend_from_slice(b"lo\n");
        let lines = extract_lines(&mut buf, 1024).unwrap();
        assert_eq!(lines, vec!["say hello".to_string()]);
    }

    #[test]
    fn an_overlong_line_resets_the_buffer() {
        let mut buf = vec![b'a'; 10];
        let err = extract_lines(&mut buf, 8).unwrap_err();
        assert!(matches!(err, NetError::LineTooLong));
        assert!(buf.is_empty());
    }
}
