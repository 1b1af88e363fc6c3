use super::frame::RawFrame;
use crate::types::RetrievedDocument;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;

pub const DOCS_EVENT: &str = "docs";
pub const RESPONSE_EVENT: &str = "response";

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Retrieved context; replaces any earlier list for the request.
    Documents(Vec<RetrievedDocument>),
    /// Decoded slice of the answer text.
    AnswerFragment(String),
}

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("docs payload is not a document list: {0}")]
    InvalidDocuments(#[from] serde_json::Error),
    #[error("response payload is not valid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
    #[error("response payload is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

/// Maps a parsed frame to an event. Unknown event types yield `Ok(None)`.
pub fn decode_event(frame: &RawFrame) -> Result<Option<StreamEvent>, PayloadError> {
    match frame.event_type.as_str() {
        DOCS_EVENT => {
            let documents: Vec<RetrievedDocument> = serde_json::from_str(&frame.data)?;
            Ok(Some(StreamEvent::Documents(documents)))
        }
        RESPONSE_EVENT => decode_answer_fragment(&frame.data)
            .map(StreamEvent::AnswerFragment)
            .map(Some),
        _ => Ok(None),
    }
}

/// Decodes a base64 payload whose bytes are UTF-8 text.
pub fn decode_answer_fragment(payload: &str) -> Result<String, PayloadError> {
    let bytes = STANDARD.decode(payload.trim())?;
    Ok(String::from_utf8(bytes)?)
}
