use super::client::ByteStream;
use super::event::{decode_event, StreamEvent};
use super::frame::{parse_frame, FrameSplitter};
use super::logging::{emit_frame_skipped, emit_payload_skipped, emit_trailing_discarded};
use super::utf8::Utf8Decoder;
use anyhow::Result;
use futures::{stream, Stream, StreamExt};
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio_util::sync::CancellationToken;

/// Turns response body chunks into events for a single streaming request.
#[derive(Default)]
pub struct StreamParser {
    decoder: Utf8Decoder,
    splitter: FrameSplitter,
}

impl StreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events completed by `chunk`, in stream order. Malformed frames and
    /// payloads are logged and skipped.
    pub fn process(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        let text = self.decoder.decode(chunk);
        let mut events = Vec::new();

        for frame_text in self.splitter.push(&text) {
            let frame = match parse_frame(&frame_text) {
                Ok(frame) => frame,
                Err(error) => {
                    emit_frame_skipped(&frame_text, &error);
                    continue;
                }
            };

            match decode_event(&frame) {
                Ok(Some(event)) => events.push(event),
                Ok(None) => {}
                Err(error) => emit_payload_skipped(&frame.event_type, &frame.data, &error),
            }
        }

        events
    }

    /// Ends the stream. Text that never formed a complete frame is dropped
    /// and returned.
    pub fn finish(&mut self) -> String {
        let mut remainder = self.splitter.finish();
        remainder.push_str(&self.decoder.finish());
        if !remainder.trim().is_empty() {
            emit_trailing_discarded(&remainder);
        }
        remainder
    }
}

struct EventStreamState {
    bytes: ByteStream,
    parser: StreamParser,
    pending: VecDeque<StreamEvent>,
    cancel: CancellationToken,
    finished: bool,
    end_of_data: bool,
    drained: Arc<AtomicBool>,
}

/// Events decoded from one response body.
///
/// Once the stream has ended, `is_drained` tells a full read (every event
/// delivered after the transport's end of data) apart from a cancelled or
/// failed one.
pub struct EventStream {
    inner: Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>,
    drained: Arc<AtomicBool>,
}

impl EventStream {
    pub fn is_drained(&self) -> bool {
        self.drained.load(Ordering::Acquire)
    }
}

impl Stream for EventStream {
    type Item = Result<StreamEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

/// Lazily decodes `bytes` into events.
///
/// The stream ends after the transport signals end of data, after the first
/// read error (yielded as the final item), or as soon as `cancel` fires.
pub fn event_stream(bytes: ByteStream, cancel: CancellationToken) -> EventStream {
    let drained = Arc::new(AtomicBool::new(false));
    let state = EventStreamState {
        bytes,
        parser: StreamParser::new(),
        pending: VecDeque::new(),
        cancel,
        finished: false,
        end_of_data: false,
        drained: Arc::clone(&drained),
    };

    let inner = stream::unfold(state, |mut state| async move {
        loop {
            if state.finished && state.pending.is_empty() {
                if state.end_of_data {
                    state.drained.store(true, Ordering::Release);
                }
                return None;
            }
            if state.cancel.is_cancelled() {
                return None;
            }
            if let Some(event) = state.pending.pop_front() {
                return Some((Ok(event), state));
            }

            let next = tokio::select! {
                biased;
                _ = state.cancel.cancelled() => return None,
                next = state.bytes.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    let events = state.parser.process(&chunk);
                    state.pending.extend(events);
                }
                Some(Err(error)) => {
                    state.finished = true;
                    return Some((Err(error), state));
                }
                None => {
                    state.parser.finish();
                    state.finished = true;
                    state.end_of_data = true;
                }
            }
        }
    });

    EventStream {
        inner: Box::pin(inner),
        drained,
    }
}
