use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A context passage returned by the retrieval step of a base chat.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedDocument {
    #[serde(rename = "id_")]
    pub id: String,
    #[serde(default)]
    pub distance: Option<f64>,
    /// Display-only rendering of the embedding vector.
    #[serde(default)]
    pub embedding: String,
    #[serde(default)]
    pub document: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Body of `POST /base-chat/{id}/stream`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StreamRequest {
    pub query_string: String,
    pub doc_names: Option<Vec<String>>,
    pub n_results: Option<u32>,
}

impl StreamRequest {
    pub fn new(query_string: impl Into<String>, n_results: u32) -> Self {
        Self {
            query_string: query_string.into(),
            doc_names: None,
            n_results: Some(n_results),
        }
    }

    pub fn with_doc_names(mut self, doc_names: Vec<String>) -> Self {
        self.doc_names = Some(doc_names);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.query_string.trim().is_empty() {
            bail!("please provide a query string");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiKeyCredential {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub datetime: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatModel {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub api_key_credential_id: Option<i64>,
    #[serde(default)]
    pub api_key_credential: Option<ApiKeyCredential>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub top_p: Option<f64>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub stop_sequences: Option<String>,
    #[serde(default)]
    pub datetime: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SystemPrompt {
    pub id: i64,
    pub name: String,
    pub content: String,
    #[serde(default)]
    pub datetime: Option<String>,
}

/// A base chat pipeline: chat model, optional system prompt and optional
/// vector collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BaseChat {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub desc: String,
    pub chat_model_id: i64,
    #[serde(default)]
    pub chat_model: Option<ChatModel>,
    #[serde(default)]
    pub system_prompt_id: Option<i64>,
    #[serde(default)]
    pub system_prompt: Option<SystemPrompt>,
    #[serde(default)]
    pub vec_col_name: Option<String>,
    #[serde(default)]
    pub datetime: Option<String>,
}
