pub mod cli;
pub mod config;
pub mod history;
pub mod llm;
pub mod models;
pub mod render;
pub mod server;
pub mod session;

use cli::Args;
use config::Configuration;
use llm::openai::OpenAIResponsesClient;
use log::{ info, error };
use server::{ AppContext, Server };
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("WebSocket Address: {}", args.server_addr);
    info!("HTTP Address: {}", args.http_addr);
    info!("Secrets Path: {}", args.secrets_path);
    info!("OpenAI Base URL: {}", args.openai_base_url.as_deref().unwrap_or(llm::openai::DEFAULT_BASE_URL));
    info!("Max Output Tokens: {}", args.max_output_tokens);
    info!("TLS Enabled: {}", args.enable_tls);
    info!("-------------------------");

    let config = match Configuration::load(&args.secrets_path) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            error!("{}", e);
            return Err(e.into());
        }
    };
    info!("Model: {}", config.model);
    if config.retrieval_enabled() {
        info!("Vector search enabled: {:?}", config.vector_store_ids);
    } else {
        info!("No vector store attached");
    }

    let client = OpenAIResponsesClient::new(&config.api_key, args.openai_base_url.as_deref())?;
    let context = AppContext {
        config,
        client: Arc::new(client),
        max_output_tokens: Some(args.max_output_tokens),
    };

    let server = Server::new(args, context);
    server.run().await?;

    Ok(())
}
