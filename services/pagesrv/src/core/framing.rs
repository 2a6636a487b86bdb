//! Frame extraction for the stream transports
//!
//! Both TCP handlers accumulate raw bytes into a growing buffer and
//! repeatedly drain complete frames from the front: newline-delimited lines
//! for serial-over-IP, ESC+EOT-delimited segments for TAP. Decoding is
//! lenient; invalid UTF-8 sequences are dropped rather than failing the
//! frame.

/// Two-byte TAP message delimiter: ESC (0x1B) followed by EOT (0x04)
pub const FRAME_DELIMITER: [u8; 2] = [0x1B, 0x04];

/// Decode bytes as UTF-8, dropping invalid sequences.
pub fn decode_lossy(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => String::from_utf8_lossy(bytes).replace('\u{FFFD}', ""),
    }
}

/// Drain every complete newline-terminated line from the front of `buf`,
/// returning each decoded and trimmed. Trimming strips `\r` from CRLF
/// input; blank lines come back as empty strings for the caller to filter.
pub fn drain_lines(buf: &mut Vec<u8>) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
        let line: Vec<u8> = buf.drain(..=pos).collect();
        lines.push(decode_lossy(&line).trim().to_string());
    }
    lines
}

/// Drain every complete ESC+EOT-delimited segment from the front of `buf`,
/// returning each decoded and trimmed. Empty segments between consecutive
/// delimiters come back as empty strings for the caller to filter.
pub fn drain_frames(buf: &mut Vec<u8>) -> Vec<String> {
    let mut frames = Vec::new();
    while let Some(pos) = buf.windows(2).position(|w| w == FRAME_DELIMITER) {
        let segment: Vec<u8> = buf.drain(..pos + 2).collect();
        frames.push(decode_lossy(&segment[..pos]).trim().to_string());
    }
    frames
}

/// Take whatever undelimited content remains in `buf`, decoded and trimmed;
/// `None` if it is blank. Used by the serial-over-IP handler to flush a
/// trailing partial line when the peer disconnects.
pub fn take_remainder(buf: &mut Vec<u8>) -> Option<String> {
    let rest: Vec<u8> = buf.drain(..).collect();
    let text = decode_lossy(&rest).trim().to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
