//! Output shaping for framed sessions (spec §4.10): "the text is passed
//! through an optional ANSI-to-tagged-span converter... line endings are
//! normalized." Grounded on `websocket.c`'s `ws_convert_ansi` (mode 0:
//! strip, mode 1: HTML spans keyed off SGR codes) and
//! `ws_normalize_line_endings`.

use amlp_config::AnsiMode;

fn css_class(code: u32) -> Option<&'static str> {
    match code {
        1 => Some("bold"),
        30 => Some("fg-black"),
        31 => Some("fg-red"),
        32 => Some("fg-green"),
        33 => Some("fg-yellow"),
        34 => Some("fg-blue"),
        35 => Some("fg-magenta"),
        36 => Some("fg-cyan"),
        37 => Some("fg-white"),
        90 => Some("fg-bright-black"),
        91 => Some("fg-bright-red"),
        92 => Some("fg-bright-green"),
        93 => Some("fg-bright-yellow"),
        94 => Some("fg-bright-blue"),
        95 => Some("fg-bright-magenta"),
        96 => Some("fg-bright-cyan"),
        97 => Some("fg-bright-white"),
        _ => None,
    }
}

/// Strips (`Strip`) or rewrites (`Span`) `ESC [ ... m` SGR sequences. A
/// reset code (`0`, or no recognized code) closes any span currently open
/// without starting a new one.
pub fn convert_ansi(text: &str, mode: AnsiMode) -> String {
    // Escape sequences are pure ASCII (ESC, `[`, digits, `m`), so scanning
    // at the byte level and copying unmatched spans verbatim never splits
    // a multi-byte UTF-8 character — the output stays valid UTF-8.
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(text.len());
    let mut in_span = false;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == 0x1B && bytes.get(i + 1) == Some(&b'[') {
            let seq_start = i + 2;
            let mut seq_end = seq_start;
            while seq_end < bytes.len() && bytes[seq_end] != b'm' && seq_end - seq_start < 20 {
                seq_end += 1;
            }
            if seq_end < bytes.len() && bytes[seq_end] == b'm' {
                if mode == AnsiMode::Span {
                    let code: u32 = text[seq_start..seq_end].parse().unwrap_or(0);
                    if in_span {
                        out.extend_from_slice(b"</span>");
                        in_span = false;
                    }
                    if let Some(class) = css_class(code) {
                        out.extend_from_slice(format!("<span class=\"{class}\">").as_bytes());
                        in_span = true;
                    }
                }
                i = seq_end + 1;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    if mode == AnsiMode::Span && in_span {
        out.extend_from_slice(b"</span>");
    }

    String::from_utf8(out).expect("copying verbatim UTF-8 byte runs preserves validity")
}

/// Drops `\r` entirely; framed clients only need `\n`.
pub fn normalize_line_endings(text: &str) -> String {
    text.chars().filter(|&c| c != '\r').collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_mode_removes_sgr_sequences() {
        let input = "\x1b[31mHello\x1b[0m, world";
        assert_eq!(convert_ansi(input, AnsiMode::Strip), "Hello, world");
    }

    #[test]
    fn span_mode_wraps_colored_runs() {
        let input = "\x1b[31mHello\x1b[0m";
        assert_eq!(convert_ansi(input, AnsiMode::Span), "<span class=\"fg-red\">Hello</span>");
    }

    #[test]
    fn span_mode_closes_an_open_span_before_a_reset_with_no_new_class() {
        let input = "\x1b[1mBold\x1b[0m plain";
        assert_eq!(convert_ansi(input, AnsiMode::Span), "<span class=\"bold\">Bold</span> plain");
    }

    #[test]
    fn normalization_drops_carriage_returns() {
        assert_eq!(normalize_line_endings("a\r\nb\r\n"), "a\nb\n");
    }
}
