use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::Stream;

use maestro_core::error::{MaestroError, Result};

/// Incremental parser for `text/event-stream` bodies.
/// SSE format: `event: <type>\ndata: <json>\n\n`
#[derive(Default)]
pub struct SseParser {
    buffer: String,
    /// Trailing bytes of a UTF-8 sequence split across chunks.
    partial: Vec<u8>,
}

/// A parsed SSE event.
#[derive(Debug, Clone)]
pub struct SseEvent {
    pub event_type: Option<String>,
    pub data: String,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, holding back an incomplete trailing UTF-8 sequence.
    ///
    /// Invalid sequences elsewhere decode as U+FFFD.
    pub fn feed_bytes(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.partial.extend_from_slice(chunk);
        let keep_from = match std::str::from_utf8(&self.partial) {
            Ok(_) => self.partial.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(_) => self.partial.len() - incomplete_tail(&self.partial),
        };
        let rest = self.partial.split_off(keep_from);
        let text = String::from_utf8_lossy(&self.partial).into_owned();
        self.partial = rest;
        self.feed(&text)
    }

    /// Feed text into the parser and extract complete events.
    pub fn feed(&mut self, chunk: &str) -> Vec<SseEvent> {
        self.buffer.push_str(&chunk.replace("\r\n", "\n"));
        let mut events = Vec::new();

        // Split on double newlines (event boundaries)
        while let Some(pos) = self.buffer.find("\n\n") {
            let block: String = self.buffer.drain(..pos + 2).collect();

            let mut event_type = None;
            let mut data_lines = Vec::new();

            for line in block.lines() {
                if let Some(val) = line.strip_prefix("event:") {
                    event_type = Some(val.trim_start().to_string());
                } else if let Some(val) = line.strip_prefix("data:") {
                    data_lines.push(val.strip_prefix(' ').unwrap_or(val).to_string());
                }
            }

            if !data_lines.is_empty() {
                events.push(SseEvent {
                    event_type,
                    data: data_lines.join("\n"),
                });
            }
        }

        events
    }
}

/// Length of a truncated UTF-8 sequence at the end of `bytes`, if any.
fn incomplete_tail(bytes: &[u8]) -> usize {
    let mut offset = 0;
    loop {
        match std::str::from_utf8(&bytes[offset..]) {
            Ok(_) => return 0,
            Err(e) => match e.error_len() {
                Some(bad) => offset += e.valid_up_to() + bad,
                None => return bytes.len() - offset - e.valid_up_to(),
            },
        }
    }
}

/// A stream of SSE events from a response body.
///
/// Transport errors surface as `CompletionFailure` rather than ending the
/// stream silently.
pub struct SseStream<S> {
    inner: S,
    parser: SseParser,
    pending: VecDeque<SseEvent>,
    done: bool,
}

impl<S> SseStream<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            parser: SseParser::new(),
            pending: VecDeque::new(),
            done: false,
        }
    }
}

impl<S> Stream for SseStream<S>
where
    S: Stream<Item = std::result::Result<bytes::Bytes, reqwest::Error>> + Unpin,
{
    type Item = Result<SseEvent>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if let Some(event) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }
            if this.done {
                return Poll::Ready(None);
            }

            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    this.pending.extend(this.parser.feed_bytes(&bytes));
                }
                Poll::Ready(Some(Err(e))) => {
                    this.done = true;
                    return Poll::Ready(Some(Err(MaestroError::CompletionFailure(format!(
                        "stream interrupted: {}",
                        e
                    )))));
                }
                Poll::Ready(None) => {
                    this.done = true;
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sse_parser_basic() {
        let mut parser = SseParser::new();
        let events = parser.feed("event: message\ndata: {\"type\":\"chunk\"}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type.as_deref(), Some("message"));
        assert_eq!(events[0].data, "{\"type\":\"chunk\"}");
    }

    #[test]
    fn test_sse_parser_multiple_events() {
        let mut parser = SseParser::new();
        let events = parser.feed("data: {\"x\":1}\n\ndata: {\"x\":2}\n\n");
        assert_eq!(events.len(), 2);
        assert!(events[0].event_type.is_none());
    }

    #[test]
    fn test_sse_parser_chunked() {
        let mut parser = SseParser::new();
        let events = parser.feed("data: {\"x\":");
        assert_eq!(events.len(), 0);
        let events = parser.feed("1}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "{\"x\":1}");
    }

    #[test]
    fn test_sse_parser_crlf() {
        let mut parser = SseParser::new();
        let events = parser.feed("data: [DONE]\r\n\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "[DONE]");
    }

    #[test]
    fn test_sse_parser_split_utf8() {
        let mut parser = SseParser::new();
        let bytes = "data: €\n\n".as_bytes();
        // Split inside the three-byte euro sign
        let events = parser.feed_bytes(&bytes[..7]);
        assert!(events.is_empty());
        let events = parser.feed_bytes(&bytes[7..]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "€");
    }

    #[test]
    fn test_sse_parser_invalid_byte_does_not_stall() {
        let mut parser = SseParser::new();
        let events = parser.feed_bytes(b"data: a\xff\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "a\u{FFFD}");

        let events = parser.feed_bytes(b"data: b\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "b");
    }

    #[test]
    fn test_sse_parser_invalid_byte_then_split_char() {
        let mut parser = SseParser::new();
        let mut raw = b"data: \xfe".to_vec();
        raw.extend_from_slice("€\n\n".as_bytes());
        // Split inside the euro sign, after the invalid byte
        let events = parser.feed_bytes(&raw[..8]);
        assert!(events.is_empty());
        let events = parser.feed_bytes(&raw[8..]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "\u{FFFD}€");
    }
}
