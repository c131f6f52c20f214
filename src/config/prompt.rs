/// Used when DEFAULT_SQL_SYSTEM is not set anywhere.
pub const DEFAULT_SQL_SYSTEM_PROMPT: &str =
    "You are a senior data engineer who writes SQL for analysts. \
Answer every request with exactly one SQL query inside a fenced ```sql code block, \
followed by at most two short sentences explaining any assumption you made. \
Prefer ANSI SQL, qualify column names when more than one table is involved, \
and never invent tables or columns: if the schema does not say, ask for it.";

/// Appended to the system prompt when a retrieval store is attached.
pub const FILE_SEARCH_HINT: &str =
    "If needed, briefly use file_search to confirm column names and units, then write one SQL query.";

/// System prompt text actually sent for a session.
pub fn effective_system_prompt(base: &str, retrieval_enabled: bool) -> String {
    if retrieval_enabled {
        format!("{}\n\n{}", base.trim_end(), FILE_SEARCH_HINT)
    } else {
        base.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hint_only_added_with_retrieval() {
        assert_eq!(effective_system_prompt("Write SQL.", false), "Write SQL.");

        let with_hint = effective_system_prompt("Write SQL.\n", true);
        assert!(with_hint.starts_with("Write SQL.\n\n"));
        assert!(with_hint.ends_with(FILE_SEARCH_HINT));
    }
}
