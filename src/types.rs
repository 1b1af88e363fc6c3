mod api;

pub use api::{
    ApiKeyCredential, BaseChat, ChatModel, RetrievedDocument, StreamRequest, SystemPrompt,
};
