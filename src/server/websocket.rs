use super::tls::load_tls_config;
use super::{ AppContext, ServerError };
use crate::models::websocket::{ ClientMessage, ErrorKind, ServerMessage };
use crate::render::{ render_error, render_result };
use crate::session::ChatSession;

use futures::stream::SplitSink;
use futures::{ SinkExt, StreamExt };
use governor::{ RateLimiter, Quota, state::{ InMemoryState, NotKeyed }, clock::DefaultClock };
use lazy_static::lazy_static;
use log::{ info, warn, error, debug };
use std::error::Error;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use tokio::io::{ AsyncRead, AsyncWrite };
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tokio_tungstenite::{ accept_async, tungstenite::protocol::Message, WebSocketStream };

const MAX_MESSAGE_SIZE: usize = 1 * 1024 * 1024;
const CONNECTIONS_PER_SECOND: u32 = 10;

lazy_static! {
    static ref CONNECTION_LIMITER: RateLimiter<NotKeyed, InMemoryState, DefaultClock> = RateLimiter::direct(
        Quota::per_second(NonZeroU32::new(CONNECTIONS_PER_SECOND).unwrap_or(NonZeroU32::MIN))
    );
}

type WsSink<S> = SplitSink<WebSocketStream<S>, Message>;

pub async fn start_ws_server(
    addr: SocketAddr,
    context: AppContext,
    tls: Option<(String, String)>
) -> Result<(), ServerError> {
    let tls_acceptor = match tls {
        Some((cert_path, key_path)) => {
            info!("TLS enabled. Loading certificate from '{}' and key from '{}'", cert_path, key_path);
            Some(TlsAcceptor::from(load_tls_config(&cert_path, &key_path)?))
        }
        None => None,
    };

    let listener = TcpListener::bind(addr).await?;
    info!("{} server listening on: {}", if tls_acceptor.is_some() { "WSS" } else { "WS" }, addr);

    loop {
        let (stream, peer) = listener.accept().await?;

        if CONNECTION_LIMITER.check().is_err() {
            warn!("Global connection rate limit exceeded for {}. Dropping connection.", peer);
            continue;
        }

        info!("Incoming connection from: {}", peer);
        let context = context.clone();
        let tls_acceptor = tls_acceptor.clone();

        tokio::spawn(async move {
            let result = match tls_acceptor {
                Some(acceptor) =>
                    match acceptor.accept(stream).await {
                        Ok(tls_stream) => serve_connection(peer, tls_stream, context).await,
                        Err(e) => Err(Box::new(e) as Box<dyn Error + Send + Sync>),
                    }
                None => serve_connection(peer, stream, context).await,
            };

            if let Err(e) = result {
                error!("Failed to process connection for {}: {}", peer, e);
            }
        });
    }
}

async fn serve_connection<S>(
    peer: SocketAddr,
    stream: S,
    context: AppContext
) -> Result<(), Box<dyn Error + Send + Sync>>
    where S: AsyncRead + AsyncWrite + Unpin
{
    let websocket = accept_async(stream).await?;
    handle_connection(peer, websocket, context.new_session()).await;
    Ok(())
}

/// Runs one UI session for the lifetime of the connection.
pub async fn handle_connection<S>(
    peer: SocketAddr,
    websocket: WebSocketStream<S>,
    mut session: ChatSession
)
    where S: AsyncRead + AsyncWrite + Unpin
{
    let (mut tx, mut rx) = websocket.split();
    info!("Session {} opened for {}", session.id(), peer);

    let ready = ServerMessage::Ready {
        session_id: session.id().to_string(),
        model: session.config().model.clone(),
        retrieval: session.config().retrieval_enabled(),
    };
    if let Err(e) = send(&mut tx, &ready).await {
        error!("Error sending ready message to {}: {}", peer, e);
        return;
    }

    while let Some(msg) = rx.next().await {
        let message = match msg {
            Ok(message) => message,
            Err(e) => {
                info!("WebSocket connection closed or errored for {}: {}", peer, e);
                break;
            }
        };

        if message.len() > MAX_MESSAGE_SIZE {
            warn!("Message from {} exceeds size limit ({} > {})", peer, message.len(), MAX_MESSAGE_SIZE);
            let too_large = ServerMessage::Error {
                kind: ErrorKind::InvalidMessage,
                message: "Message too large".to_string(),
            };
            let _ = send(&mut tx, &too_large).await;
            break;
        }

        match message {
            Message::Text(text) => {
                let client_message = match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(m) => m,
                    Err(e) => {
                        warn!("Failed to parse message from {}: {}", peer, e);
                        let reply = ServerMessage::Error {
                            kind: ErrorKind::InvalidMessage,
                            message: format!("Failed to parse message: {}", e),
                        };
                        if send(&mut tx, &reply).await.is_err() {
                            break;
                        }
                        continue;
                    }
                };

                if matches!(client_message, ClientMessage::Chat { .. }) {
                    if let Err(e) = send(&mut tx, &ServerMessage::Processing).await {
                        error!("Error sending processing status to {}: {}", peer, e);
                        break;
                    }
                }

                let reply = reply_to(&mut session, client_message).await;
                if let Err(e) = send(&mut tx, &reply).await {
                    error!("Error sending message to {}: {}", peer, e);
                    break;
                }
            }
            Message::Close(_) => {
                info!("Received close frame from {}", peer);
                break;
            }
            Message::Ping(data) => {
                if tx.send(Message::Pong(data)).await.is_err() {
                    error!("Failed to send pong to {}", peer);
                    break;
                }
            }
            Message::Binary(_) => {
                warn!("Ignoring binary message from {}", peer);
            }
            Message::Pong(_) | Message::Frame(_) => {}
        }
    }

    info!("Session {} closed for {}", session.id(), peer);
}

/// Applies one client message to the session and produces the reply to render.
pub async fn reply_to(session: &mut ChatSession, message: ClientMessage) -> ServerMessage {
    match message {
        ClientMessage::Chat { content } => {
            debug!("[{}] user: {}", session.id(), content);
            match session.submit(&content).await {
                Ok(result) => render_result(&result),
                Err(e) => render_error(&e),
            }
        }
        ClientMessage::Reset => {
            session.reset();
            ServerMessage::Reset
        }
    }
}

async fn send<S>(tx: &mut WsSink<S>, message: &ServerMessage) -> Result<(), Box<dyn Error + Send + Sync>>
    where S: AsyncRead + AsyncWrite + Unpin
{
    let json = serde_json::to_string(message)?;
    tx.send(Message::Text(json)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use crate::session::tests::{ answer, test_config, ScriptedClient };
    use std::sync::Arc;

    #[tokio::test]
    async fn chat_reply_renders_sql() {
        let client = Arc::new(ScriptedClient::new(vec![answer("```sql\nSELECT 1;\n```")]));
        let mut session = ChatSession::new(test_config(), client, None);

        let reply = reply_to(&mut session, ClientMessage::Chat { content: "one".into() }).await;

        match reply {
            ServerMessage::Response { sql, .. } => assert_eq!(sql.as_deref(), Some("SELECT 1;")),
            other => panic!("unexpected reply: {:?}", other),
        }
        assert_eq!(session.history().len(), 2);
    }

    #[tokio::test]
    async fn failed_turn_reports_error_and_keeps_session_usable() {
        let client = Arc::new(
            ScriptedClient::new(
                vec![Err(LlmError::RequestFailed("dns error".into())), answer("SELECT 2;")]
            )
        );
        let mut session = ChatSession::new(test_config(), client, None);

        let first = reply_to(&mut session, ClientMessage::Chat { content: "a".into() }).await;
        assert!(matches!(first, ServerMessage::Error { kind: ErrorKind::RequestFailed, .. }));
        assert!(session.history().is_empty());

        let second = reply_to(&mut session, ClientMessage::Chat { content: "b".into() }).await;
        assert!(matches!(second, ServerMessage::Response { .. }));
    }

    #[tokio::test]
    async fn reset_message_clears_history() {
        let client = Arc::new(ScriptedClient::new(vec![answer("SELECT 1;")]));
        let mut session = ChatSession::new(test_config(), client, None);
        reply_to(&mut session, ClientMessage::Chat { content: "q".into() }).await;

        assert_eq!(reply_to(&mut session, ClientMessage::Reset).await, ServerMessage::Reset);
        assert!(session.history().is_empty());
    }

    #[test]
    fn client_messages_are_tagged_by_type() {
        let chat: ClientMessage = serde_json::from_str(r#"{"type":"chat","content":"hi"}"#).unwrap();
        assert_eq!(chat, ClientMessage::Chat { content: "hi".into() });
        let reset: ClientMessage = serde_json::from_str(r#"{"type":"reset"}"#).unwrap();
        assert_eq!(reset, ClientMessage::Reset);
    }
}
