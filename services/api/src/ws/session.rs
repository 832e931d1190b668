//! Manages the WebSocket connection lifecycle for a learning session.

use super::{
    bridge::{BrowserRecognizer, BrowserSynthesizer},
    protocol::{ClientMessage, ServerMessage},
};
use crate::state::AppState;
use anyhow::{Context, Result, anyhow};
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use imagitale_core::{
    config::SessionConfig,
    controller::TurnController,
    events::SessionInput,
    language::Language,
    supervisor::{SessionHandle, SessionSupervisor},
    vocab::{WordCategory, prepare_round},
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{Instrument, debug, error, info, instrument, warn};

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// What the `init` message asked for, validated against the vocabulary bank.
struct SessionSetup {
    category: WordCategory,
    config: SessionConfig,
}

/// Main handler for an individual WebSocket connection.
///
/// The first message must be `init`. After a successful handshake the drill
/// round is prepared and the session runs until the socket closes.
#[instrument(name = "ws_session", skip_all, fields(session_id, category))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let session_id: u32 = rand::random();
    tracing::Span::current().record("session_id", session_id);
    info!("New WebSocket connection. Awaiting initialization...");

    let (mut socket_tx, mut socket_rx) = socket.split();

    // The first message from the client must be an `init` message.
    let setup = match socket_rx.next().await {
        Some(Ok(Message::Text(text))) => parse_init(&text, &state),
        Some(Ok(_)) => Err(anyhow!("First message was not a text `init` message.")),
        _ => {
            info!("Client disconnected before sending init message.");
            return;
        }
    };
    let setup = match setup {
        Ok(setup) => setup,
        Err(e) => {
            error!("Session initialization failed: {:?}", e);
            let _ = send_msg(
                &mut socket_tx,
                ServerMessage::Error {
                    message: e.to_string(),
                },
            )
            .await;
            return;
        }
    };
    tracing::Span::current().record("category", setup.category.id());

    let session_span = tracing::info_span!("session_runtime", session_id);
    if let Err(e) = run_session(state, setup, socket_tx, socket_rx)
        .instrument(session_span)
        .await
    {
        error!(error = ?e, "Session terminated with error.");
    }
    info!("Session finished.");
}

/// Parses the `init` message and builds the session configuration.
fn parse_init(init_text: &str, state: &AppState) -> Result<SessionSetup> {
    let init_msg: ClientMessage = serde_json::from_str(init_text)?;
    let ClientMessage::Init { category, language } = init_msg else {
        return Err(anyhow!("First message must be `init`"));
    };

    let category = WordCategory::from_id(&category)
        .with_context(|| format!("Unknown category '{}'", category))?;
    if state.vocabulary.words(category).is_empty() {
        return Err(anyhow!("Category '{}' has no words", category.id()));
    }

    let mut config = state.config.session.clone();
    if let Some(code) = language {
        config.story_language =
            Language::from_code(&code).with_context(|| format!("Unsupported language '{}'", code))?;
    }
    Ok(SessionSetup { category, config })
}

/// The main loop for an active session.
///
/// Device commands and reports from the session are written to the socket by
/// a dedicated writer task; client messages are fed to the session in order.
/// However the loop ends, the session is disposed before returning.
async fn run_session(
    state: Arc<AppState>,
    setup: SessionSetup,
    mut socket_tx: SplitSink<WebSocket, Message>,
    mut socket_rx: SplitStream<WebSocket>,
) -> Result<()> {
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ServerMessage>();
    let writer = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            if let Err(e) = send_msg(&mut socket_tx, msg).await {
                warn!(error = ?e, "Failed to write to client; stopping writer.");
                break;
            }
        }
    });

    let controller = TurnController::new(
        setup.config.clone(),
        Some(Box::new(BrowserSynthesizer::new(out_tx.clone()))),
        Some(Box::new(BrowserRecognizer::new(out_tx.clone()))),
    );
    let (reports_tx, mut reports_rx) = mpsc::unbounded_channel();
    let handle = SessionSupervisor::spawn(
        controller,
        state.generator.clone(),
        state.images.clone(),
        reports_tx,
    );
    let forward_tx = out_tx.clone();
    let forwarder = tokio::spawn(async move {
        while let Some(report) = reports_rx.recv().await {
            if forward_tx.send(ServerMessage::Report { report }).is_err() {
                break;
            }
        }
    });

    let result = drive_session(&state, &setup, &handle, &out_tx, &mut socket_rx).await;

    handle.dispose();
    handle.join().await;
    let _ = forwarder.await;
    drop(out_tx);
    let _ = writer.await;
    info!("WebSocket connection closed and session disposed.");
    result
}

async fn drive_session(
    state: &AppState,
    setup: &SessionSetup,
    handle: &SessionHandle,
    out_tx: &mpsc::UnboundedSender<ServerMessage>,
    socket_rx: &mut SplitStream<WebSocket>,
) -> Result<()> {
    let words = state.vocabulary.words(setup.category);
    let (items, pool) =
        prepare_round(words, setup.config.round_size, state.images.as_ref()).await;
    info!(round = items.len(), pool = pool.len(), "Round prepared");

    out_tx
        .send(ServerMessage::Initialized {
            category: setup.category.id().to_string(),
            round_size: items.len(),
            story_language: setup.config.story_language,
        })
        .context("Client writer closed before initialization")?;
    handle.send(SessionInput::StartDrill { items, pool });

    while let Some(msg_result) = socket_rx.next().await {
        let ws_msg = match msg_result {
            Ok(ws_msg) => ws_msg,
            Err(e) => {
                error!("Error receiving from client WebSocket: {:?}", e);
                break;
            }
        };
        match ws_msg {
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(msg) => match msg.into_input() {
                    Some(input) => {
                        if !handle.send(input) {
                            info!("Session ended; closing connection.");
                            break;
                        }
                    }
                    None => warn!("Ignoring repeated `init` message."),
                },
                Err(e) => warn!(error = %e, "Ignoring malformed client message."),
            },
            Message::Close(_) => {
                info!("Client sent close frame. Shutting down session.");
                break;
            }
            Message::Binary(_) => debug!("Ignoring binary message."),
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }
    Ok(())
}

/// A helper function to serialize and send a `ServerMessage` to the client.
pub(crate) async fn send_msg(
    socket_tx: &mut SplitSink<WebSocket, Message>,
    msg: ServerMessage,
) -> Result<()> {
    let serialized = serde_json::to_string(&msg)?;
    socket_tx.send(Message::Text(serialized.into())).await?;
    Ok(())
}
