//! Driving a frame stream into callbacks.
//!
//! [`dispatch`] consumes a [`FrameStream`] and reports it through a
//! [`StreamHandler`]: zero or more `on_delta` calls followed by exactly one
//! of `on_complete` or `on_error`. A stream abandoned through the interrupt
//! flag reports neither.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use futures::StreamExt;

use crate::client::FrameStream;
use crate::observability::STREAM_DURATION;
use crate::{Error, ProtocolFrame};

/// Receives the events of one chat stream.
pub trait StreamHandler: Send {
    /// A piece of the answer arrived.
    fn on_delta(&mut self, text: &str);

    /// The answer is complete.
    fn on_complete(&mut self);

    /// The answer failed; no further calls follow.
    fn on_error(&mut self, error: &Error);
}

/// How a dispatched stream ended.
#[derive(Debug, Clone)]
pub enum StreamOutcome {
    /// A completion frame arrived.
    Completed,

    /// The server sent an error frame or the transport failed.
    Failed(Error),

    /// The caller abandoned the stream before it ended.
    Abandoned,
}

impl StreamOutcome {
    /// Returns true if the stream completed.
    pub fn is_completed(&self) -> bool {
        matches!(self, StreamOutcome::Completed)
    }
}

/// Read `frames` to the end, reporting every frame to `handler`.
///
/// `interrupted` is checked before each read; once it is set no further
/// callbacks fire and the stream is dropped without signalling the server.
pub async fn dispatch(
    mut frames: FrameStream,
    handler: &mut dyn StreamHandler,
    interrupted: &AtomicBool,
) -> StreamOutcome {
    let start = Instant::now();
    let outcome = loop {
        if interrupted.load(Ordering::Relaxed) {
            break StreamOutcome::Abandoned;
        }
        let next = frames.next().await;
        if interrupted.load(Ordering::Relaxed) {
            break StreamOutcome::Abandoned;
        }
        match next {
            Some(Ok(ProtocolFrame::ContentDelta(text))) => handler.on_delta(&text),
            Some(Ok(ProtocolFrame::Completed)) => {
                handler.on_complete();
                break StreamOutcome::Completed;
            }
            Some(Ok(ProtocolFrame::Failed(message))) => {
                let err = Error::stream(message);
                handler.on_error(&err);
                break StreamOutcome::Failed(err);
            }
            Some(Err(err)) => {
                handler.on_error(&err);
                break StreamOutcome::Failed(err);
            }
            None => {
                let err = Error::streaming("stream ended without a terminal frame", None);
                handler.on_error(&err);
                break StreamOutcome::Failed(err);
            }
        }
    };
    STREAM_DURATION.add(start.elapsed().as_secs_f64());
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures::stream;
    use std::io;

    use crate::sse::process_frames;

    #[derive(Debug, Default, PartialEq)]
    struct Recorder {
        calls: Vec<String>,
    }

    impl StreamHandler for Recorder {
        fn on_delta(&mut self, text: &str) {
            self.calls.push(format!("delta:{text}"));
        }

        fn on_complete(&mut self) {
            self.calls.push("complete".to_string());
        }

        fn on_error(&mut self, error: &Error) {
            self.calls.push(format!("error:{error}"));
        }
    }

    fn frames_from(body: &'static str) -> FrameStream {
        Box::pin(process_frames(stream::iter(vec![Ok::<_, io::Error>(
            Bytes::from_static(body.as_bytes()),
        )])))
    }

    #[tokio::test]
    async fn deltas_then_completion() {
        let mut recorder = Recorder::default();
        let outcome = dispatch(
            frames_from("data: {\"chunk\": \"A\"}\ndata: {\"chunk\": \"B\"}\ndata: {\"done\": true}\n"),
            &mut recorder,
            &AtomicBool::new(false),
        )
        .await;
        assert!(outcome.is_completed());
        assert_eq!(recorder.calls, vec!["delta:A", "delta:B", "complete"]);
    }

    #[tokio::test]
    async fn deltas_then_error_frame() {
        let mut recorder = Recorder::default();
        let outcome = dispatch(
            frames_from("data: {\"chunk\": \"A\"}\ndata: {\"error\": \"x\"}\n"),
            &mut recorder,
            &AtomicBool::new(false),
        )
        .await;
        assert!(matches!(outcome, StreamOutcome::Failed(ref e) if e.is_stream()));
        assert_eq!(recorder.calls, vec!["delta:A", "error:x"]);
    }

    #[tokio::test]
    async fn truncated_stream_is_an_error_not_a_success() {
        let mut recorder = Recorder::default();
        let outcome = dispatch(
            frames_from("data: {\"chunk\": \"A\"}\n"),
            &mut recorder,
            &AtomicBool::new(false),
        )
        .await;
        assert!(matches!(outcome, StreamOutcome::Failed(ref e) if e.is_streaming()));
        assert_eq!(recorder.calls.len(), 2);
        assert!(recorder.calls[1].starts_with("error:Streaming error"));
    }

    #[tokio::test]
    async fn immediately_completed_stream() {
        let mut recorder = Recorder::default();
        let outcome = dispatch(
            frames_from("data: {\"done\": true}\n"),
            &mut recorder,
            &AtomicBool::new(false),
        )
        .await;
        assert!(outcome.is_completed());
        assert_eq!(recorder.calls, vec!["complete"]);
    }

    #[tokio::test]
    async fn interrupted_stream_reports_nothing() {
        let mut recorder = Recorder::default();
        let outcome = dispatch(
            frames_from("data: {\"chunk\": \"A\"}\ndata: {\"done\": true}\n"),
            &mut recorder,
            &AtomicBool::new(true),
        )
        .await;
        assert!(matches!(outcome, StreamOutcome::Abandoned));
        assert!(recorder.calls.is_empty());
    }
}
