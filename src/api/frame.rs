use thiserror::Error;

pub const FRAME_DELIMITER: &str = "\n\n";
const DATA_PREFIX: &str = "data: ";

/// Event type token and payload of one frame, before payload decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub event_type: String,
    pub data: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame has no data line")]
    MissingDataLine,
    #[error("event line has no event type token")]
    MissingEventType,
    #[error("data line does not start with \"data: \"")]
    MissingDataPrefix,
}

/// Accumulates decoded text and cuts it into blank-line delimited frames.
#[derive(Debug, Default)]
pub struct FrameSplitter {
    buffer: String,
}

impl FrameSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every frame completed by `text`, in stream order.
    pub fn push(&mut self, text: &str) -> Vec<String> {
        self.buffer.push_str(text);
        let mut frames = Vec::new();
        let mut start = 0;

        while let Some(end) = self.buffer[start..].find(FRAME_DELIMITER) {
            let frame_end = start + end;
            let frame = &self.buffer[start..frame_end];
            if !frame.trim().is_empty() {
                frames.push(frame.to_string());
            }
            start = frame_end + FRAME_DELIMITER.len();
        }

        if start > 0 {
            self.buffer.drain(..start);
        }

        frames
    }

    pub fn remainder(&self) -> &str {
        &self.buffer
    }

    /// Drops the unterminated tail at end of stream and returns it.
    pub fn finish(&mut self) -> String {
        std::mem::take(&mut self.buffer)
    }
}

/// Parses an `event: <type>` / `data: <payload>` frame.
///
/// The event type is the second space-separated token of the first line,
/// so the spelling of the first token is not checked. Lines after the data
/// line are ignored.
pub fn parse_frame(frame: &str) -> Result<RawFrame, FrameError> {
    let mut lines = frame.trim_start_matches('\n').lines();
    let event_line = lines.next().unwrap_or_default();
    let data_line = lines.next().ok_or(FrameError::MissingDataLine)?;

    let event_type = event_line
        .split(' ')
        .nth(1)
        .ok_or(FrameError::MissingEventType)?;
    let data = data_line
        .strip_prefix(DATA_PREFIX)
        .ok_or(FrameError::MissingDataPrefix)?;

    Ok(RawFrame {
        event_type: event_type.to_string(),
        data: data.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_keeps_incomplete_tail() {
        let mut splitter = FrameSplitter::new();
        let frames = splitter.push("event: docs\ndata: []\n\nevent: resp");
        assert_eq!(frames, vec!["event: docs\ndata: []".to_string()]);
        assert_eq!(splitter.remainder(), "event: resp");

        let frames = splitter.push("onse\ndata: SGk=\n\n");
        assert_eq!(frames, vec!["event: response\ndata: SGk=".to_string()]);
        assert_eq!(splitter.remainder(), "");
    }

    #[test]
    fn test_delimiter_split_across_pushes() {
        let mut splitter = FrameSplitter::new();
        assert!(splitter.push("event: docs\ndata: []\n").is_empty());
        let frames = splitter.push("\n");
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn test_whitespace_only_frames_are_dropped() {
        let mut splitter = FrameSplitter::new();
        let frames = splitter.push("\n\n  \n\nevent: docs\ndata: []\n\n");
        assert_eq!(frames, vec!["event: docs\ndata: []".to_string()]);
    }

    #[test]
    fn test_finish_discards_unterminated_frame() {
        let mut splitter = FrameSplitter::new();
        splitter.push("event: response\ndata: SGk=");
        assert_eq!(splitter.finish(), "event: response\ndata: SGk=");
        assert_eq!(splitter.remainder(), "");
    }

    #[test]
    fn test_parse_frame_extracts_type_and_payload() {
        let frame = parse_frame("event: response\ndata: SGVsbG8=").unwrap();
        assert_eq!(frame.event_type, "response");
        assert_eq!(frame.data, "SGVsbG8=");
    }

    #[test]
    fn test_parse_frame_tolerates_first_token_spelling() {
        let frame = parse_frame("evt: docs\ndata: []").unwrap();
        assert_eq!(frame.event_type, "docs");
    }

    #[test]
    fn test_parse_frame_ignores_extra_lines() {
        let frame = parse_frame("event: docs\ndata: []\nid: 7").unwrap();
        assert_eq!(frame.data, "[]");
    }

    #[test]
    fn test_parse_frame_failure_modes() {
        assert_eq!(
            parse_frame("event: docs"),
            Err(FrameError::MissingDataLine)
        );
        assert_eq!(
            parse_frame("event:docs\ndata: []"),
            Err(FrameError::MissingEventType)
        );
        assert_eq!(
            parse_frame("event: docs\npayload: []"),
            Err(FrameError::MissingDataPrefix)
        );
        assert_eq!(
            parse_frame("event: docs\ndata:[]"),
            Err(FrameError::MissingDataPrefix)
        );
    }
}
