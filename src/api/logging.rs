use super::event::PayloadError;
use super::frame::FrameError;
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::{IsTerminal, Write};

const DEFAULT_API_LOG_PATH: &str = "/tmp/scribe-stream-debug.log";
const DEBUG_PAYLOAD_ENV: &str = "SCRIBE_DEBUG_PAYLOAD";
const API_LOG_PATH_ENV: &str = "SCRIBE_API_LOG_PATH";

pub fn debug_payload_enabled() -> bool {
    std::env::var(DEBUG_PAYLOAD_ENV)
        .ok()
        .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

pub fn emit_debug_payload(request_url: &str, payload: &Value) {
    let formatted_payload = serde_json::to_string_pretty(payload)
        .unwrap_or_else(|_| "<payload serialization error>".to_string());
    let message = format!(
        "SCRIBE_API DEBUG payload_request url={request_url}\npayload:\n{formatted_payload}\n"
    );
    emit_log_message(&message);
}

pub fn emit_frame_skipped(frame: &str, error: &FrameError) {
    let message = format!("SCRIBE_API WARN frame_skipped error={error}\nframe:\n{frame}\n");
    emit_log_message(&message);
}

pub fn emit_payload_skipped(event_type: &str, data: &str, error: &PayloadError) {
    let message = format!(
        "SCRIBE_API WARN payload_skipped error={error}\nevent_type={event_type}\ndata:\n{data}\n"
    );
    emit_log_message(&message);
}

pub fn emit_trailing_discarded(remainder: &str) {
    let message = format!("SCRIBE_API DEBUG trailing_text_discarded\ntext:\n{remainder}\n");
    emit_log_message(&message);
}

fn emit_log_message(message: &str) {
    if let Some(path) = resolve_log_path() {
        if append_log_file(&path, message).is_ok() {
            return;
        }
    }

    eprintln!("{message}");
}

fn resolve_log_path() -> Option<String> {
    std::env::var(API_LOG_PATH_ENV)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| {
            if std::io::stderr().is_terminal() {
                Some(DEFAULT_API_LOG_PATH.to_string())
            } else {
                None
            }
        })
}

fn append_log_file(path: &str, message: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(message.as_bytes())
}
