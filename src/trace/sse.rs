/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: String,
    pub data: String,
}

/// Incremental decoder for a `text/event-stream` body.
///
/// Input may arrive split at any byte. Lines end in `\n` or `\r\n`; a blank line dispatches
/// the pending frame; multi-line `data:` fields are joined with `\n`; comments and the `id:`
/// and `retry:` fields are ignored.
#[derive(Debug, Default)]
pub struct SseDecoder {
    line: String,
    pending_bytes: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &str) -> Vec<SseFrame> {
        let mut frames = Vec::new();
        for ch in chunk.chars() {
            if ch == '\n' {
                let line = std::mem::take(&mut self.line);
                let line = line.strip_suffix('\r').unwrap_or(&line);
                if let Some(frame) = self.process_line(line) {
                    frames.push(frame);
                }
            } else {
                self.line.push(ch);
            }
        }
        frames
    }

    /// Feeds raw bytes, holding back an incomplete UTF-8 sequence for the next call.
    ///
    /// Invalid sequences become U+FFFD one at a time.
    pub fn feed_bytes(&mut self, bytes: &[u8]) -> Vec<SseFrame> {
        self.pending_bytes.extend_from_slice(bytes);
        let mut text = String::new();
        let mut start = 0;
        while start < self.pending_bytes.len() {
            match std::str::from_utf8(&self.pending_bytes[start..]) {
                Ok(valid) => {
                    text.push_str(valid);
                    start = self.pending_bytes.len();
                }
                Err(e) => {
                    let valid_end = start + e.valid_up_to();
                    let head = &self.pending_bytes[start..valid_end];
                    text.push_str(&String::from_utf8_lossy(head));
                    match e.error_len() {
                        Some(len) => {
                            tracing::warn!(
                                offset = valid_end,
                                "invalid UTF-8 in event stream, replacing"
                            );
                            text.push(char::REPLACEMENT_CHARACTER);
                            start = valid_end + len;
                        }
                        None => {
                            start = valid_end;
                            break;
                        }
                    }
                }
            }
        }
        self.pending_bytes.drain(..start);
        self.feed(&text)
    }

    /// Flushes a final frame that was not terminated by a blank line.
    pub fn finish(&mut self) -> Option<SseFrame> {
        if !self.pending_bytes.is_empty() {
            let bytes = std::mem::take(&mut self.pending_bytes);
            self.line.push_str(&String::from_utf8_lossy(&bytes));
        }
        if !self.line.is_empty() {
            let line = std::mem::take(&mut self.line);
            let line = line.strip_suffix('\r').unwrap_or(&line).to_string();
            if let Some(frame) = self.process_line(&line) {
                return Some(frame);
            }
        }
        self.dispatch()
    }

    fn process_line(&mut self, line: &str) -> Option<SseFrame> {
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
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
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
        Some(SseFrame {
            event: event.filter(|e| !e.is_empty()).unwrap_or_else(|| "message".to_string()),
            data,
        })
    }
}
