//! Incremental Server-Sent Events decoding
//!
//! Used on both hops: the proxy reads provider frames with it and the client
//! reads proxy frames with it. Input may be split at arbitrary byte offsets.

/// One dispatched SSE event
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

/// Line-buffering SSE decoder
#[derive(Debug, Default)]
pub struct SseDecoder {
    /// Bytes of the current, not yet terminated line
    line: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, returning every event completed by them in order
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseFrame> {
        let mut frames = Vec::new();
        for &byte in bytes {
            if byte == b'\n' {
                let line = std::mem::take(&mut self.line);
                if let Some(frame) = self.process_line(&line) {
                    frames.push(frame);
                }
            } else {
                self.line.push(byte);
            }
        }
        frames
    }

    /// Flush whatever is buffered once the underlying body has ended
    pub fn finish(&mut self) -> Option<SseFrame> {
        let line = std::mem::take(&mut self.line);
        if !line.is_empty() {
            // A dispatch here would require a blank line, which cannot exist
            // inside a single unterminated line.
            let _ = self.process_line(&line);
        }
        self.dispatch()
    }

    fn process_line(&mut self, raw: &[u8]) -> Option<SseFrame> {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        if raw.is_empty() {
            return self.dispatch();
        }

        let line = String::from_utf8_lossy(raw);
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (&*line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            // id and retry carry nothing this protocol uses
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseFrame { event, data })
    }
}
