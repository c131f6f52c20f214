use super::ServerError;
use super::tls::load_tls_config;
use crate::config::Configuration;
use crate::history::MAX_HISTORY_TURNS;

use axum::{
    routing::get,
    Router,
    extract::State,
    response::{ Html, IntoResponse },
    Json,
};
use log::{ info, error };
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{ Any, CorsLayer };

const PAGE_TEMPLATE: &str = include_str!("page.html");

/// What the chat page needs to find the WebSocket server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSettings {
    pub ws_port: u16,
    pub secure: bool,
}

#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct ConfigView {
    pub model: String,
    pub retrieval: bool,
    pub vector_store_count: usize,
    pub history_limit: usize,
}

#[derive(Clone)]
struct ApiState {
    page: Arc<String>,
    config: Arc<Configuration>,
}

pub fn render_page(settings: PageSettings) -> String {
    PAGE_TEMPLATE
        .replace("{{WS_SCHEME}}", if settings.secure { "wss" } else { "ws" })
        .replace("{{WS_PORT}}", &settings.ws_port.to_string())
}

pub fn router(settings: PageSettings, config: Arc<Configuration>) -> Router {
    let state = ApiState {
        page: Arc::new(render_page(settings)),
        config,
    };

    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/", get(page_handler))
        .route("/api/config", get(config_handler))
        .route("/api/health", get(health_handler))
        .layer(cors)
        .with_state(state)
}

pub async fn start_http_server(
    addr: SocketAddr,
    settings: PageSettings,
    config: Arc<Configuration>,
    tls: Option<(String, String)>
) -> Result<(), ServerError> {
    let app = router(settings, config);

    match tls {
        Some((cert_path, key_path)) => {
            let tls_config = axum_server::tls_rustls::RustlsConfig::from_config(
                load_tls_config(&cert_path, &key_path)?
            );
            info!("Starting HTTPS server on: https://{}", addr);
            tokio::spawn(async move {
                let result = axum_server
                    ::bind_rustls(addr, tls_config)
                    .serve(app.into_make_service()).await;
                if let Err(e) = result {
                    error!("HTTPS server error: {}", e);
                }
            });
        }
        None => {
            let listener = tokio::net::TcpListener::bind(addr).await?;
            info!("Starting HTTP server on: http://{}", addr);
            tokio::spawn(async move {
                if let Err(e) = axum::serve(listener, app.into_make_service()).await {
                    error!("HTTP server error: {}", e);
                }
            });
        }
    }

    Ok(())
}

async fn page_handler(State(state): State<ApiState>) -> impl IntoResponse {
    Html(state.page.as_str().to_string())
}

async fn config_handler(State(state): State<ApiState>) -> impl IntoResponse {
    Json(ConfigView {
        model: state.config.model.clone(),
        retrieval: state.config.retrieval_enabled(),
        vector_store_count: state.config.vector_store_ids.len(),
        history_limit: MAX_HISTORY_TURNS,
    })
}

async fn health_handler() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{ to_bytes, Body };
    use axum::http::{ Request, StatusCode };
    use tower::ServiceExt;

    fn config() -> Arc<Configuration> {
        Arc::new(Configuration {
            api_key: "sk-hidden".into(),
            model: "gpt-4o-mini".into(),
            vector_store_ids: vec!["vs_schema".into()],
            system_prompt: "Write SQL.".into(),
        })
    }

    async fn get_body(app: Router, uri: &str) -> (StatusCode, String) {
        let resp = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap()).await
            .unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[test]
    fn page_points_at_websocket_port() {
        let page = render_page(PageSettings { ws_port: 4100, secure: true });
        assert!(page.contains("const WS_PORT = 4100;"));
        assert!(page.contains("const WS_SCHEME = \"wss\";"));
        assert!(!page.contains("{{"));
    }

    #[test]
    fn page_offers_extracted_sql_for_copy() {
        let page = render_page(PageSettings { ws_port: 4000, secure: false });
        assert!(page.contains("if (msg.sql) addSqlCopy(answer, msg.sql);"));
        assert!(page.contains("navigator.clipboard.writeText(sql)"));
    }

    #[tokio::test]
    async fn serves_page() {
        let app = router(PageSettings { ws_port: 4000, secure: false }, config());
        let (status, body) = get_body(app, "/").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("SQL Writer"));
    }

    #[tokio::test]
    async fn config_view_has_no_secrets() {
        let app = router(PageSettings { ws_port: 4000, secure: false }, config());
        let (status, body) = get_body(app, "/api/config").await;

        assert_eq!(status, StatusCode::OK);
        assert!(!body.contains("sk-hidden"));
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "model": "gpt-4o-mini",
                "retrieval": true,
                "vector_store_count": 1,
                "history_limit": 6
            })
        );
    }

    #[tokio::test]
    async fn health_is_ok() {
        let app = router(PageSettings { ws_port: 4000, secure: false }, config());
        assert_eq!(get_body(app, "/api/health").await, (StatusCode::OK, "ok".to_string()));
    }
}
