//! Turns session outcomes into messages for the chat page.

use chrono::Utc;

use crate::llm::LlmError;
use crate::models::chat::CompletionResult;
use crate::models::websocket::{ ErrorKind, ServerMessage };
use crate::session::SessionError;

pub fn render_result(result: &CompletionResult) -> ServerMessage {
    ServerMessage::Response {
        content: result.text.clone(),
        sql: extract_sql_block(&result.text),
        usage: result.usage,
        timestamp: Utc::now().timestamp(),
    }
}

pub fn render_error(err: &SessionError) -> ServerMessage {
    let (kind, message) = match err {
        SessionError::EmptyMessage =>
            (ErrorKind::InvalidMessage, "Please type a question first.".to_string()),
        SessionError::Llm(LlmError::RequestFailed(msg)) =>
            (ErrorKind::RequestFailed, format!("Error calling OpenAI: {}", msg)),
        SessionError::Llm(LlmError::MalformedResponse(msg)) =>
            (ErrorKind::MalformedResponse, format!("Unexpected response from OpenAI: {}", msg)),
    };
    ServerMessage::Error { kind, message }
}

/// Body of the first closed ```sql block, or of the first unlabelled block if none is labelled.
pub fn extract_sql_block(text: &str) -> Option<String> {
    let blocks = fenced_blocks(text);
    blocks
        .iter()
        .find(|(lang, _)| lang.eq_ignore_ascii_case("sql"))
        .or_else(|| blocks.iter().find(|(lang, _)| lang.is_empty()))
        .map(|(_, body)| body.clone())
}

fn fenced_blocks(text: &str) -> Vec<(&str, String)> {
    let mut blocks = Vec::new();
    let mut lines = text.lines();

    while let Some(line) = lines.next() {
        let Some(info) = line.trim_start().strip_prefix("```") else {
            continue;
        };
        let lang = info.trim();
        let mut body = Vec::new();
        let mut closed = false;
        for inner in lines.by_ref() {
            if inner.trim_start().starts_with("```") {
                closed = true;
                break;
            }
            body.push(inner);
        }
        if closed {
            blocks.push((lang, body.join("\n")));
        }
    }

    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::TokenUsage;

    #[test]
    fn extracts_labelled_sql_block() {
        let text = "Here you go:\n```sql\nSELECT id\nFROM users;\n```\nAssumes `users` exists.";
        assert_eq!(extract_sql_block(text).as_deref(), Some("SELECT id\nFROM users;"));
    }

    #[test]
    fn prefers_sql_over_unlabelled_block() {
        let text = "```\nsome note\n```\n```SQL\nSELECT 1;\n```";
        assert_eq!(extract_sql_block(text).as_deref(), Some("SELECT 1;"));
    }

    #[test]
    fn ignores_other_languages_and_unclosed_fences() {
        assert_eq!(extract_sql_block("```python\nprint(1)\n```"), None);
        assert_eq!(extract_sql_block("```sql\nSELECT 1;"), None);
        assert_eq!(extract_sql_block("plain text"), None);
    }

    #[test]
    fn response_carries_text_sql_and_usage() {
        let result = CompletionResult {
            text: "```sql\nSELECT 1;\n```".into(),
            usage: TokenUsage { prompt: 1, completion: 2, total: 3 },
        };

        match render_result(&result) {
            ServerMessage::Response { content, sql, usage, .. } => {
                assert_eq!(content, result.text);
                assert_eq!(sql.as_deref(), Some("SELECT 1;"));
                assert_eq!(usage.total, 3);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn request_failure_shows_upstream_message() {
        let err = SessionError::Llm(LlmError::RequestFailed("timed out".into()));
        assert_eq!(
            render_error(&err),
            ServerMessage::Error {
                kind: ErrorKind::RequestFailed,
                message: "Error calling OpenAI: timed out".into(),
            }
        );
    }
}
