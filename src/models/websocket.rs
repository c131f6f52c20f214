use serde::{ Serialize, Deserialize };

use super::chat::TokenUsage;

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "chat")] Chat {
        content: String,
    },
    #[serde(rename = "reset")]
    Reset,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    RequestFailed,
    MalformedResponse,
    InvalidMessage,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "ready")] Ready {
        session_id: String,
        model: String,
        retrieval: bool,
    },
    #[serde(rename = "response")] Response {
        content: String,
        sql: Option<String>,
        usage: TokenUsage,
        timestamp: i64,
    },
    #[serde(rename = "error")] Error {
        kind: ErrorKind,
        message: String,
    },
    #[serde(rename = "processing")]
    Processing,
    #[serde(rename = "reset")]
    Reset,
}
