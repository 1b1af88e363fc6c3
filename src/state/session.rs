use crate::api::{event_stream, ByteSource, StreamEvent};
use crate::types::{RetrievedDocument, StreamRequest};
use anyhow::Result;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;


#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Requesting,
    Streaming,
    Completed,
    Cancelled,
    Failed(String),
}

/// Change notifications for a front end rendering the session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    Phase(SessionPhase),
    Documents(Vec<RetrievedDocument>),
    AnswerDelta(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed,
    Cancelled,
}

/// Display state of a base chat conversation: the retrieved context of the
/// latest request and its answer so far.
///
/// `answer_text` is append-only while a request streams and is cleared only
/// when the next request begins. `context_documents` is replaced whole by
/// each documents event.
pub struct ChatSession {
    context_documents: Vec<RetrievedDocument>,
    answer_text: String,
    phase: SessionPhase,
    active_cancel: Option<CancellationToken>,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            context_documents: Vec::new(),
            answer_text: String::new(),
            phase: SessionPhase::Idle,
            active_cancel: None,
        }
    }

    pub fn context_documents(&self) -> &[RetrievedDocument] {
        &self.context_documents
    }

    pub fn answer_text(&self) -> &str {
        &self.answer_text
    }

    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    pub fn is_active(&self) -> bool {
        matches!(self.phase, SessionPhase::Requesting | SessionPhase::Streaming)
    }

    /// Applies one event and returns the matching update.
    pub fn apply(&mut self, event: StreamEvent) -> SessionUpdate {
        match event {
            StreamEvent::Documents(documents) => {
                self.context_documents = documents.clone();
                SessionUpdate::Documents(documents)
            }
            StreamEvent::AnswerFragment(text) => {
                self.answer_text.push_str(&text);
                SessionUpdate::AnswerDelta(text)
            }
        }
    }

    /// Stops the previous request, if any, and clears the display state.
    pub fn begin_request(&mut self, cancel: CancellationToken) {
        if let Some(previous) = self.active_cancel.replace(cancel) {
            previous.cancel();
        }
        self.context_documents.clear();
        self.answer_text.clear();
        self.phase = SessionPhase::Requesting;
    }

    pub fn cancel(&mut self) {
        if let Some(token) = self.active_cancel.take() {
            token.cancel();
        }
    }

    pub async fn stream_query<S: ByteSource>(
        &mut self,
        source: &S,
        base_chat_id: i64,
        request: &StreamRequest,
        updates: Option<&mpsc::UnboundedSender<SessionUpdate>>,
    ) -> Result<StreamOutcome> {
        self.stream_query_with_cancel(
            source,
            base_chat_id,
            request,
            CancellationToken::new(),
            updates,
        )
        .await
    }

    /// Runs one streaming request to completion, failure or cancellation.
    ///
    /// Invalid requests are rejected before any state changes. Fatal errors
    /// leave already applied documents and answer text in place.
    pub async fn stream_query_with_cancel<S: ByteSource>(
        &mut self,
        source: &S,
        base_chat_id: i64,
        request: &StreamRequest,
        cancel: CancellationToken,
        updates: Option<&mpsc::UnboundedSender<SessionUpdate>>,
    ) -> Result<StreamOutcome> {
        request.validate()?;

        self.begin_request(cancel.clone());
        emit_update(updates, SessionUpdate::Phase(SessionPhase::Requesting));

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            opened = source.open_stream(base_chat_id, request) => Some(opened),
        };
        let bytes = match opened {
            None => return Ok(self.finish_cancelled(updates)),
            Some(Ok(bytes)) => bytes,
            Some(Err(error)) => {
                self.fail(&error, updates);
                return Err(error);
            }
        };

        self.set_phase(SessionPhase::Streaming, updates);
        let mut events = event_stream(bytes, cancel.clone());
        while let Some(item) = events.next().await {
            match item {
                Ok(event) => {
                    let update = self.apply(event);
                    emit_update(updates, update);
                }
                Err(error) => {
                    self.fail(&error, updates);
                    return Err(error);
                }
            }
        }

        if !events.is_drained() {
            return Ok(self.finish_cancelled(updates));
        }

        self.active_cancel = None;
        self.set_phase(SessionPhase::Completed, updates);
        Ok(StreamOutcome::Completed)
    }

    fn finish_cancelled(
        &mut self,
        updates: Option<&mpsc::UnboundedSender<SessionUpdate>>,
    ) -> StreamOutcome {
        self.active_cancel = None;
        self.set_phase(SessionPhase::Cancelled, updates);
        StreamOutcome::Cancelled
    }

    fn fail(
        &mut self,
        error: &anyhow::Error,
        updates: Option<&mpsc::UnboundedSender<SessionUpdate>>,
    ) {
        self.active_cancel = None;
        self.set_phase(SessionPhase::Failed(format!("{error:#}")), updates);
    }

    fn set_phase(
        &mut self,
        phase: SessionPhase,
        updates: Option<&mpsc::UnboundedSender<SessionUpdate>>,
    ) {
        self.phase = phase.clone();
        emit_update(updates, SessionUpdate::Phase(phase));
    }
}

fn emit_update(updates: Option<&mpsc::UnboundedSender<SessionUpdate>>, update: SessionUpdate) {
    if let Some(tx) = updates {
        let _ = tx.send(update);
    }
}
