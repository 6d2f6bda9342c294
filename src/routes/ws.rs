//! WebSocket upgrade + message loop. Each connection owns one `StudyFlow`.
//! Every client event is answered with the resulting view (preceded by an
//! error, or by a `busy` notice for long-running actions).

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{debug, error, info, instrument, warn};

use crate::error::ErrorKind;
use crate::logic::StudyFlow;
use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "study_quiz", "WebSocket upgrade requested");
  ws.max_message_size(state.settings.max_upload_bytes.saturating_mul(2))
    .on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip_all)]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  let mut flow = StudyFlow::new();
  info!(target: "study_quiz", flow = %flow.id, "WebSocket connected");

  // Initial screen so the client can render without asking.
  if send(&mut socket, &ServerWsMessage::View { view: flow.view() }).await.is_err() {
    return;
  }

  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        let replies = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            let mut replies = Vec::with_capacity(2);
            if let Some(action) = incoming.busy_action() {
              if send(&mut socket, &ServerWsMessage::Busy { action }).await.is_err() {
                break;
              }
            }
            handle_client_ws(&mut flow, incoming, &state, &mut replies).await;
            replies
          }
          Err(e) => {
            warn!(target: "study_quiz", flow = %flow.id, error = %e, "Unparseable WS message");
            vec![ServerWsMessage::Error { kind: ErrorKind::InvalidRequest, message: format!("Invalid JSON: {e}") }]
          }
        };

        let mut closed = false;
        for reply in &replies {
          if send(&mut socket, reply).await.is_err() {
            closed = true;
            break;
          }
        }
        if closed {
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "study_quiz", flow = %flow.id, "WebSocket disconnected");
}

async fn handle_client_ws(
  flow: &mut StudyFlow,
  msg: ClientWsMessage,
  state: &AppState,
  replies: &mut Vec<ServerWsMessage>,
) {
  debug!(target: "study_quiz", flow = %flow.id, event = msg.name(), "WS event");
  if matches!(msg, ClientWsMessage::Ping) {
    replies.push(ServerWsMessage::Pong);
    return;
  }
  if let Err(e) = flow.handle(msg, state).await {
    info!(target: "study_quiz", flow = %flow.id, kind = ?e.kind, message = %e.message, "WS event rejected");
    replies.push(e.into());
  }
  replies.push(ServerWsMessage::View { view: flow.view() });
}

async fn send(socket: &mut WebSocket, msg: &ServerWsMessage) -> Result<(), axum::Error> {
  let out = serde_json::to_string(msg).unwrap_or_else(|e| {
    serde_json::json!({ "type": "error", "kind": "invalid_request", "message": format!("Serialization error: {}", e) }).to_string()
  });
  socket.send(Message::Text(out)).await.map_err(|e| {
    error!(target: "study_quiz", error = %e, "WS send error");
    e
  })
}
