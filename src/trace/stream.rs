use super::event::{RunEvent, RunStatus};
use super::session::ChatSession;
use super::sse::{SseDecoder, SseFrame};
use crate::error::RunError;
use futures::future::{AbortHandle, AbortRegistration, Abortable};
use futures::{Stream, StreamExt, pin_mut};
use serde_json::{Value, json};
use std::fmt::Display;

/// Cancels a run that is being consumed elsewhere.
#[derive(Debug, Clone)]
pub struct RunHandle {
    abort: AbortHandle,
}

impl RunHandle {
    /// Creates a handle and the registration to pass to [`consume`].
    pub fn pair() -> (RunHandle, AbortRegistration) {
        let (abort, registration) = AbortHandle::new_pair();
        (RunHandle { abort }, registration)
    }

    pub fn abort(&self) {
        self.abort.abort();
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.is_aborted()
    }

    /// A guard that aborts the run when dropped, e.g. when the chat drawer closes.
    pub fn guard(&self) -> RunGuard {
        RunGuard {
            abort: self.abort.clone(),
        }
    }
}

#[derive(Debug)]
pub struct RunGuard {
    abort: AbortHandle,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.abort.abort();
    }
}

/// Streams an SSE body into the session's current run and returns its final status.
///
/// A transport error, an abort, or a stream that ends before `workflow_end` fails the run.
pub async fn consume<S, B, E>(
    stream: S,
    session: &mut ChatSession,
    registration: AbortRegistration,
) -> RunStatus
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    let mut decoder = SseDecoder::new();
    let fold = async {
        pin_mut!(stream);
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(bytes) => {
                    for frame in decoder.feed_bytes(bytes.as_ref()) {
                        apply_frame(session, &frame);
                    }
                }
                Err(e) => {
                    let error = RunError::Stream(e.to_string());
                    tracing::warn!(%error, "event stream broke off");
                    session.fail(json!({ "error": e.to_string() }));
                    return;
                }
            }
            if session.status().is_terminal() {
                return;
            }
        }
        if let Some(frame) = decoder.finish() {
            apply_frame(session, &frame);
        }
        if !session.status().is_terminal() {
            session.fail(Value::String("stream ended before workflow_end".to_string()));
        }
    };

    if Abortable::new(fold, registration).await.is_err() {
        tracing::debug!("run aborted");
        session.fail(Value::String("run aborted".to_string()));
    }
    session.status()
}

/// Applies every frame of a complete SSE capture to the session.
pub fn replay(text: &str, session: &mut ChatSession) -> RunStatus {
    let mut decoder = SseDecoder::new();
    let mut frames = decoder.feed(text);
    frames.extend(decoder.finish());
    for frame in &frames {
        apply_frame(session, frame);
    }
    session.status()
}

fn apply_frame(session: &mut ChatSession, frame: &SseFrame) {
    match RunEvent::from_frame(frame) {
        Ok(event) => {
            session.apply(event);
        }
        Err(e) => tracing::warn!(event = %frame.event, error = %e, "skipping malformed event"),
    }
}
