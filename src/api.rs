pub mod client;
pub mod event;
pub mod frame;
pub mod logging;
pub mod mock_client;
pub mod stream;
pub mod utf8;

pub use client::{ByteSource, ByteStream, ScribeClient};
pub use event::StreamEvent;
pub use stream::{event_stream, EventStream, StreamParser};
