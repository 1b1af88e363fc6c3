mod session;

pub use session::{ChatSession, SessionPhase, SessionUpdate, StreamOutcome};
