//! Decoding of the chat endpoint's event stream.
//!
//! The chat endpoint answers with a chunked body of newline-delimited lines.
//! Lines carrying the `data:` marker hold a JSON payload that is one of
//! `{"chunk": ...}`, `{"done": true}` or `{"error": ...}`. This module turns
//! raw byte chunks into [`ProtocolFrame`]s, independent of where the
//! transport happened to split the bytes.

use std::collections::VecDeque;
use std::error;

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use crate::observability::{MALFORMED_LINES, STREAM_BYTES, STREAM_ERRORS, STREAM_FRAMES};
use crate::{Error, FramePayload, ProtocolFrame, Result};

/// Prefix of lines that carry a frame payload.
pub const DATA_MARKER: &str = "data:";

/// Payload some servers send instead of `{"done": true}`.
const DONE_SENTINEL: &str = "[DONE]";

/// Incremental decoder from byte chunks to frames.
///
/// The decoder keeps the bytes of a multi-byte character split across two
/// chunks, and the text of a line that has not been terminated yet. A
/// decoder belongs to exactly one stream.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    pending: Vec<u8>,
    buffer: String,
}

impl FrameDecoder {
    /// Creates an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one chunk and returns every frame it completed, in order.
    pub fn decode(&mut self, chunk: &[u8]) -> Vec<ProtocolFrame> {
        self.push_bytes(chunk);
        self.drain_lines()
    }

    /// Signals end of input.
    ///
    /// A dangling partial character decodes to U+FFFD and a final line
    /// without a newline is still interpreted. No terminal frame is
    /// synthesized.
    pub fn finish(&mut self) -> Vec<ProtocolFrame> {
        if !self.pending.is_empty() {
            self.pending.clear();
            self.buffer.push(char::REPLACEMENT_CHARACTER);
        }
        let mut frames = self.drain_lines();
        let tail = std::mem::take(&mut self.buffer);
        if let Some(frame) = parse_line(tail.trim_end_matches('\r')) {
            frames.push(frame);
        }
        frames
    }

    /// Returns true if no partial line or character is buffered.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.buffer.is_empty()
    }

    fn push_bytes(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    self.pending.clear();
                    return;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    self.buffer
                        .push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match err.error_len() {
                        // The tail is the start of a character; wait for more bytes.
                        None => {
                            self.pending.drain(..valid);
                            return;
                        }
                        Some(len) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + len);
                        }
                    }
                }
            }
        }
    }

    fn drain_lines(&mut self) -> Vec<ProtocolFrame> {
        let mut frames = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buffer[start..].find('\n') {
            let end = start + offset;
            if let Some(frame) = parse_line(self.buffer[start..end].trim_end_matches('\r')) {
                frames.push(frame);
            }
            start = end + 1;
        }
        self.buffer.drain(..start);
        frames
    }
}

/// Interprets one complete line.
///
/// Lines without the data marker (blank separators, `event:` lines,
/// comments) are ignored. Data lines that fail to parse are logged and
/// dropped so one bad line cannot end the stream.
fn parse_line(line: &str) -> Option<ProtocolFrame> {
    let data = line.strip_prefix(DATA_MARKER)?;
    let data = data.strip_prefix(' ').unwrap_or(data);
    if data.trim() == DONE_SENTINEL {
        return Some(ProtocolFrame::Completed);
    }
    match serde_json::from_str::<FramePayload>(data) {
        Ok(payload) => {
            let frame = ProtocolFrame::from_payload(payload);
            if frame.is_none() {
                tracing::debug!(line, "ignoring data line without chunk, done or error");
            }
            frame
        }
        Err(err) => {
            MALFORMED_LINES.click();
            tracing::warn!(line, error = %err, "dropping malformed stream line");
            None
        }
    }
}

struct FrameState<S> {
    bytes: S,
    decoder: FrameDecoder,
    ready: VecDeque<ProtocolFrame>,
    exhausted: bool,
    done: bool,
}

/// Process a stream of bytes into a stream of protocol frames.
///
/// The returned stream yields any number of `Ok(ContentDelta)` items and then
/// exactly one terminal item: `Ok(Completed)`, `Ok(Failed)`, or `Err` when
/// the transport failed or closed before a terminal frame arrived. Nothing
/// is read from `byte_stream` after the terminal item.
pub fn process_frames<S, E>(byte_stream: S) -> impl Stream<Item = Result<ProtocolFrame>>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
    E: error::Error + Send + Sync + 'static,
{
    let state = FrameState {
        bytes: byte_stream,
        decoder: FrameDecoder::new(),
        ready: VecDeque::new(),
        exhausted: false,
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if state.done {
                return None;
            }

            if let Some(frame) = state.ready.pop_front() {
                STREAM_FRAMES.click();
                state.done = frame.is_terminal();
                return Some((Ok(frame), state));
            }

            if state.exhausted {
                state.done = true;
                STREAM_ERRORS.click();
                return Some((
                    Err(Error::streaming(
                        "stream closed before a completion or error frame",
                        None,
                    )),
                    state,
                ));
            }

            match state.bytes.next().await {
                Some(Ok(bytes)) => {
                    STREAM_BYTES.count(bytes.len() as u64);
                    let frames = state.decoder.decode(&bytes);
                    state.ready.extend(frames);
                }
                Some(Err(e)) => {
                    state.done = true;
                    STREAM_ERRORS.click();
                    return Some((
                        Err(Error::streaming(
                            format!("Error in HTTP stream: {e}"),
                            Some(Box::new(e)),
                        )),
                        state,
                    ));
                }
                None => {
                    state.exhausted = true;
                    let frames = state.decoder.finish();
                    state.ready.extend(frames);
                }
            }
        }
    })
}
