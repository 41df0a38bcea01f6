//! Incremental `text/event-stream` framing.

use research_logging::research_warn;

/// Longest incomplete line kept while waiting for its terminator.
const DEFAULT_LINE_LIMIT: usize = 1 << 20;

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseMessage {
    /// Value of the `event:` field; `None` for the default `message` type.
    pub event: Option<String>,
    pub data: String,
}

/// Splits a byte stream into SSE messages.
///
/// Chunks may end anywhere, including in the middle of a line or a UTF-8
/// sequence; incomplete input stays buffered until the next `push`. Lines end
/// at `\n`, `\r\n` or a lone `\r`. A line that grows past the limit is
/// discarded together with the message it belongs to.
#[derive(Debug)]
pub struct SseDecoder {
    pending: Vec<u8>,
    data: Vec<String>,
    event: Option<String>,
    line_limit: usize,
    /// Set while the rest of an overlong line is being thrown away.
    skipping: bool,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::with_line_limit(DEFAULT_LINE_LIMIT)
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_line_limit(line_limit: usize) -> Self {
        Self {
            pending: Vec::new(),
            data: Vec::new(),
            event: None,
            line_limit,
            skipping: false,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseMessage> {
        self.pending.extend_from_slice(chunk);
        let mut messages = Vec::new();

        while let Some((end, terminator)) = self.next_line_end() {
            let line: Vec<u8> = self.pending.drain(..end + terminator).take(end).collect();
            if self.skipping {
                self.skipping = false;
                continue;
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(message) = self.process_line(&line) {
                messages.push(message);
            }
        }

        if self.pending.len() > self.line_limit {
            if !self.skipping {
                research_warn!(
                    "Dropping server-sent event line longer than {} bytes",
                    self.line_limit
                );
            }
            self.pending.clear();
            self.data.clear();
            self.event = None;
            self.skipping = true;
        }

        messages
    }

    /// Dispatches a final message that was not followed by a blank line.
    pub fn finish(&mut self) -> Option<SseMessage> {
        let rest = std::mem::take(&mut self.pending);
        if std::mem::take(&mut self.skipping) {
            return None;
        }
        if !rest.is_empty() {
            let line = String::from_utf8_lossy(&rest).into_owned();
            if let Some(message) = self.process_line(line.trim_end_matches('\r')) {
                return Some(message);
            }
        }
        self.dispatch()
    }

    /// Position and terminator length of the first complete line.
    ///
    /// A trailing `\r` is not complete yet: the next chunk may start with `\n`.
    fn next_line_end(&self) -> Option<(usize, usize)> {
        let end = self.pending.iter().position(|b| *b == b'\n' || *b == b'\r')?;
        if self.pending[end] == b'\n' {
            return Some((end, 1));
        }
        match self.pending.get(end + 1) {
            Some(b'\n') => Some((end, 2)),
            Some(_) => Some((end, 1)),
            None => None,
        }
    }

    fn process_line(&mut self, line: &str) -> Option<SseMessage> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "data" => self.data.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            // `id` and `retry` only matter to reconnecting clients that resume
            // by event id, which the backend does not support.
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseMessage> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseMessage { event, data })
    }
}
