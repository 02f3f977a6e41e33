use std::fmt;

use bytes::{Buf, BytesMut};

use crate::codec::find_marker;

/// What a text line from the device is, judged by its first character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineKind {
    /// `#...` status and log output.
    Status,
    /// `>...` command echo.
    Echo,
    /// Anything else. Forwarded so the consumer can show or drop it.
    Other,
}

impl LineKind {
    pub fn classify(text: &str) -> Self {
        match text.as_bytes().first() {
            Some(b'#') => LineKind::Status,
            Some(b'>') => LineKind::Echo,
            _ => LineKind::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LineKind::Status => "status",
            LineKind::Echo => "echo",
            LineKind::Other => "other",
        }
    }
}

/// One newline-terminated text line, trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub text: String,
    pub kind: LineKind,
}

impl LogLine {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let kind = LineKind::classify(&text);
        Self { text, kind }
    }
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Result of one line-splitting step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineStep {
    /// A line was removed from the buffer.
    Line(LogLine),
    /// A blank line was removed; nothing to emit.
    Skipped,
    /// The next line holds a frame marker and is left for the extractor.
    Blocked,
    /// No newline buffered yet.
    NeedMore,
}

/// Remove the next complete text line from the front of `src`.
pub fn split_line(src: &mut BytesMut) -> LineStep {
    let Some(newline) = src.iter().position(|&b| b == b'\n') else {
        return LineStep::NeedMore;
    };
    if find_marker(&src[..newline]).is_some() {
        return LineStep::Blocked;
    }

    let raw = src.split_to(newline);
    src.advance(1);

    let text = String::from_utf8_lossy(&raw);
    let text = text.trim_matches(|c: char| c.is_ascii_whitespace());
    if text.is_empty() {
        LineStep::Skipped
    } else {
        LineStep::Line(LogLine::new(text))
    }
}
