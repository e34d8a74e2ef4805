//! # Packet Framing
//!
//! Turns transport payloads into individual packet texts.
//!
//! - **Datagrams** may carry several JSON objects glued together, a stray
//!   trailing comma, NUL padding or junk around the object.
//! - **Streams** are newline-delimited; a read can end mid-line, so partial
//!   lines are held back until their newline arrives. Held bytes are capped.

/// Decode bytes leniently: invalid UTF-8 is replaced, NUL bytes dropped
pub fn decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).replace('\0', "")
}

/// Strip surrounding whitespace and one trailing comma
pub fn clean_packet_text(text: &str) -> &str {
    let text = text.trim();
    text.strip_suffix(',').unwrap_or(text).trim_end()
}

/// Split one datagram into packet texts
pub fn split_datagram(bytes: &[u8]) -> Vec<String> {
    let text = decode(bytes);
    let text = clean_packet_text(&text);
    if text.is_empty() {
        return Vec::new();
    }

    let separated = text.replace("}{", "}\n{").replace("} {", "}\n{");

    separated
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// The JSON object inside a line with leading/trailing junk, if any.
///
/// Only consulted after the line as a whole went unrecognized, so text
/// formats that legitimately carry braces keep their values.
pub fn embedded_object(line: &str) -> Option<&str> {
    if line.starts_with('{') || line.starts_with('[') {
        return None;
    }

    match (line.find('{'), line.rfind('}')) {
        (Some(start), Some(end)) if start < end => Some(&line[start..=end]),
        _ => None,
    }
}

/// Longest stream line kept; matches the largest datagram
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Accumulates stream bytes and yields complete lines.
///
/// A line growing past [`MAX_LINE_LEN`] is dropped along with the rest of
/// its bytes up to the next newline.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
    discarding: bool,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes; returns every line completed by them
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut rest = bytes;

        while let Some(pos) = rest.iter().position(|b| *b == b'\n') {
            let head = &rest[..pos];
            rest = &rest[pos + 1..];

            if self.discarding {
                self.discarding = false;
                continue;
            }
            if self.pending.len() + head.len() > MAX_LINE_LEN {
                self.drop_oversized();
                self.discarding = false;
                continue;
            }

            self.pending.extend_from_slice(head);
            let line = std::mem::take(&mut self.pending);
            let text = decode(&line);
            let text = text.trim_end_matches('\r');
            if !text.trim().is_empty() {
                lines.push(text.to_string());
            }
        }

        if !self.discarding {
            if self.pending.len() + rest.len() > MAX_LINE_LEN {
                self.drop_oversized();
            } else {
                self.pending.extend_from_slice(rest);
            }
        }
        lines
    }

    fn drop_oversized(&mut self) {
        tracing::warn!(
            "[Framing] dropping line longer than {} bytes ({} buffered)",
            MAX_LINE_LEN,
            self.pending.len()
        );
        self.pending.clear();
        self.discarding = true;
    }

    /// Bytes waiting for a newline
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Flush whatever is left once the stream has closed
    pub fn finish(self) -> Option<String> {
        if self.discarding {
            return None;
        }
        let text = decode(&self.pending);
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}
