use clap::Parser;

/// Infrastructure settings. The OpenAI key, model, vector stores and system prompt
/// are resolved separately from the environment and the secrets file.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Host address and port for the WebSocket chat server.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:4000")]
    pub server_addr: String,

    /// Host address and port for the HTTP server that serves the chat page.
    #[arg(long, env = "HTTP_ADDR", default_value = "127.0.0.1:8501")]
    pub http_addr: String,

    /// TOML file consulted for OPENAI_API_KEY, OPENAI_MODEL, VECTOR_STORE_IDS and
    /// DEFAULT_SQL_SYSTEM when they are not set in the environment.
    #[arg(long, env = "SECRETS_PATH", default_value = "secrets.toml")]
    pub secrets_path: String,

    /// Base URL of the completion service (e.g. a proxy). Defaults to https://api.openai.com
    #[arg(long, env = "OPENAI_BASE_URL")]
    pub openai_base_url: Option<String>,

    /// Upper bound on generated tokens per answer.
    #[arg(long, env = "MAX_OUTPUT_TOKENS", default_value = "300")]
    pub max_output_tokens: u32,

    /// Enable debug logging
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,

    /// Optional path to the TLS certificate file (PEM format). Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags() {
        let args = Args::try_parse_from([
            "sql-writer",
            "--server-addr",
            "0.0.0.0:9000",
            "--max-output-tokens",
            "512",
            "--openai-base-url",
            "http://localhost:8080",
        ]).unwrap();

        assert_eq!(args.server_addr, "0.0.0.0:9000");
        assert_eq!(args.max_output_tokens, 512);
        assert_eq!(args.openai_base_url.as_deref(), Some("http://localhost:8080"));
        assert!(!args.enable_tls);
    }
}
