use serde::Serialize;

use crate::config::Configuration;
use crate::config::prompt::effective_system_prompt;
use crate::history::HistoryBuffer;
use crate::models::chat::ChatRole;

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ResponsesRequest {
    pub model: String,
    pub input: Vec<InputMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InputRole {
    System,
    User,
    Assistant,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct InputMessage {
    pub role: InputRole,
    pub content: Vec<ContentPart>,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    InputText,
    OutputText,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ContentPart {
    #[serde(rename = "type")]
    pub kind: ContentKind,
    pub text: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Tool {
    FileSearch {
        vector_store_ids: Vec<String>,
    },
}

impl InputMessage {
    fn text(role: InputRole, kind: ContentKind, text: &str) -> Self {
        Self {
            role,
            content: vec![ContentPart { kind, text: text.to_string() }],
        }
    }
}

/// Builds `[system, ...history, user]`, attaching file search when vector stores are configured.
/// `history` must not yet contain `message`.
pub fn assemble_request(
    config: &Configuration,
    history: &HistoryBuffer,
    message: &str,
    max_output_tokens: Option<u32>
) -> ResponsesRequest {
    let mut input = Vec::with_capacity(history.len() + 2);

    let system_prompt = effective_system_prompt(&config.system_prompt, config.retrieval_enabled());
    input.push(InputMessage::text(InputRole::System, ContentKind::InputText, &system_prompt));

    for turn in history.turns() {
        let (role, kind) = match turn.role() {
            ChatRole::User => (InputRole::User, ContentKind::InputText),
            ChatRole::Assistant => (InputRole::Assistant, ContentKind::OutputText),
        };
        input.push(InputMessage::text(role, kind, turn.content()));
    }

    input.push(InputMessage::text(InputRole::User, ContentKind::InputText, message));

    let tools = if config.retrieval_enabled() {
        vec![Tool::FileSearch { vector_store_ids: config.vector_store_ids.clone() }]
    } else {
        Vec::new()
    };

    ResponsesRequest {
        model: config.model.clone(),
        input,
        max_output_tokens,
        tools,
    }
}
