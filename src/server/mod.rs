pub mod api;
pub mod tls;
pub mod websocket;

use crate::cli::Args;
use crate::config::Configuration;
use crate::llm::CompletionClient;
use crate::session::ChatSession;

use log::info;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid listen address '{addr}': {source}")]
    Address {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything a new UI session needs; shared read-only across connections.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Configuration>,
    pub client: Arc<dyn CompletionClient>,
    pub max_output_tokens: Option<u32>,
}

impl AppContext {
    pub fn new_session(&self) -> ChatSession {
        ChatSession::new(self.config.clone(), self.client.clone(), self.max_output_tokens)
    }
}

pub struct Server {
    args: Args,
    context: AppContext,
}

pub fn parse_addr(addr: &str) -> Result<SocketAddr, ServerError> {
    addr.parse::<SocketAddr>().map_err(|e| ServerError::Address { addr: addr.to_string(), source: e })
}

impl Server {
    pub fn new(args: Args, context: AppContext) -> Self {
        Self { args, context }
    }

    /// Starts the page server in the background, then serves chat sessions until failure.
    pub async fn run(&self) -> Result<(), ServerError> {
        let ws_addr = parse_addr(&self.args.server_addr)?;
        let http_addr = parse_addr(&self.args.http_addr)?;
        let tls = tls::tls_paths(&self.args)?;

        let page = api::PageSettings {
            ws_port: ws_addr.port(),
            secure: tls.is_some(),
        };
        api::start_http_server(http_addr, page, self.context.config.clone(), tls.clone()).await?;
        info!("Chat page available at http{}://{}", if tls.is_some() { "s" } else { "" }, http_addr);

        websocket::start_ws_server(ws_addr, self.context.clone(), tls).await
    }
}
