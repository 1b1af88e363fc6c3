use super::client::{ByteSource, ByteStream};
use crate::types::StreamRequest;
use anyhow::{anyhow, Result};
use bytes::Bytes;
use futures::stream;
use std::sync::{Arc, Mutex};

/// One read result of a canned response body.
#[derive(Debug, Clone)]
pub enum MockChunk {
    Data(Vec<u8>),
    ReadError(String),
}

impl MockChunk {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Data(text.into().into_bytes())
    }
}

#[derive(Debug, Clone)]
pub enum MockResponse {
    Body(Vec<MockChunk>),
    /// Fails before any body is returned, like a refused connection or a
    /// non-2xx status.
    RequestError(String),
}

/// Serves canned responses in order, one per `open_stream` call.
#[derive(Clone, Default)]
pub struct MockStreamSource {
    responses: Arc<Mutex<Vec<MockResponse>>>,
    requests: Arc<Mutex<Vec<(i64, StreamRequest)>>>,
}

impl MockStreamSource {
    pub fn new(responses: Vec<MockResponse>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            requests: Arc::default(),
        }
    }

    /// Single response whose body is delivered as the given chunks.
    pub fn from_chunks(chunks: Vec<MockChunk>) -> Self {
        Self::new(vec![MockResponse::Body(chunks)])
    }

    pub fn requests(&self) -> Vec<(i64, StreamRequest)> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    fn next_response(&self, base_chat_id: i64, request: &StreamRequest) -> Result<ByteStream> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push((base_chat_id, request.clone()));
        }

        let mut responses_guard = self
            .responses
            .lock()
            .map_err(|_| anyhow!("MockStreamSource: response queue poisoned"))?;
        if responses_guard.is_empty() {
            return Err(anyhow!("MockStreamSource: No more responses configured"));
        }

        match responses_guard.remove(0) {
            MockResponse::RequestError(message) => Err(anyhow!(message)),
            MockResponse::Body(chunks) => {
                let items: Vec<Result<Bytes>> = chunks
                    .into_iter()
                    .map(|chunk| match chunk {
                        MockChunk::Data(bytes) => Ok(Bytes::from(bytes)),
                        MockChunk::ReadError(message) => Err(anyhow!(message)),
                    })
                    .collect();
                Ok(Box::pin(stream::iter(items)))
            }
        }
    }
}

impl ByteSource for MockStreamSource {
    async fn open_stream(&self, base_chat_id: i64, request: &StreamRequest) -> Result<ByteStream> {
        request.validate()?;
        self.next_response(base_chat_id, request)
    }
}
