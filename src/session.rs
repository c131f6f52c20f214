use crate::config::Configuration;
use crate::history::{ format_history_for_log, HistoryBuffer };
use crate::llm::request::assemble_request;
use crate::llm::{ CompletionClient, LlmError };
use crate::models::chat::{ ChatTurn, CompletionResult };

use log::{ debug, info, warn };
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingResponse,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Message is empty")]
    EmptyMessage,

    #[error(transparent)]
    Llm(#[from] LlmError),
}

/// One UI session: its own history and a snapshot of the configuration.
pub struct ChatSession {
    id: String,
    config: Arc<Configuration>,
    client: Arc<dyn CompletionClient>,
    history: HistoryBuffer,
    state: SessionState,
    max_output_tokens: Option<u32>,
}

impl ChatSession {
    pub fn new(
        config: Arc<Configuration>,
        client: Arc<dyn CompletionClient>,
        max_output_tokens: Option<u32>
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            config,
            client,
            history: HistoryBuffer::new(),
            state: SessionState::Idle,
            max_output_tokens,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Sends one user message. The exchange is recorded only if the call succeeds.
    pub async fn submit(&mut self, message: &str) -> Result<CompletionResult, SessionError> {
        if message.trim().is_empty() {
            return Err(SessionError::EmptyMessage);
        }

        let request = assemble_request(
            &self.config,
            &self.history,
            message,
            self.max_output_tokens
        );
        debug!("[{}] history: {}", self.id, format_history_for_log(&self.history));

        self.state = SessionState::AwaitingResponse;
        let outcome = self.client.complete(&request).await;
        self.state = SessionState::Idle;

        match outcome {
            Ok(result) => {
                info!(
                    "[{}] answered: {} prompt / {} completion / {} total tokens",
                    self.id,
                    result.usage.prompt,
                    result.usage.completion,
                    result.usage.total
                );
                self.history.append(ChatTurn::user(message));
                self.history.append(ChatTurn::assistant(result.text.clone()));
                Ok(result)
            }
            Err(e) => {
                warn!("[{}] completion failed: {}", self.id, e);
                Err(e.into())
            }
        }
    }

    pub fn reset(&mut self) {
        info!("[{}] conversation reset", self.id);
        self.history.clear();
    }
}
