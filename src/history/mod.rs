use std::collections::VecDeque;

use crate::models::chat::ChatTurn;

/// Number of turns kept per session.
pub const MAX_HISTORY_TURNS: usize = 6;

/// Most recent turns of one session, oldest first.
#[derive(Clone, Debug, Default)]
pub struct HistoryBuffer {
    turns: VecDeque<ChatTurn>,
}

impl HistoryBuffer {
    pub fn new() -> Self {
        Self { turns: VecDeque::with_capacity(MAX_HISTORY_TURNS + 1) }
    }

    /// Adds a turn, then evicts from the front until at most `MAX_HISTORY_TURNS` remain.
    pub fn append(&mut self, turn: ChatTurn) {
        self.turns.push_back(turn);
        while self.turns.len() > MAX_HISTORY_TURNS {
            self.turns.pop_front();
        }
    }

    pub fn turns(&self) -> impl Iterator<Item = &ChatTurn> {
        self.turns.iter()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

pub fn format_history_for_log(history: &HistoryBuffer) -> String {
    history
        .turns()
        .map(|turn| {
            let preview: String = turn.content().chars().take(40).collect();
            format!("{}: {}", turn.role().as_str(), preview)
        })
        .collect::<Vec<_>>()
        .join(" | ")
}
