//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to core logic; we reply with a single JSON message per request.
//! Progress store notices are pushed to the client as they happen.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{info, error, instrument, debug, warn};

use crate::errors::{AppError, AppResult};
use crate::logic::*;
use crate::protocol::{ClientWsMessage, QuizStartIn, ServerWsMessage};
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "cultivator", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

async fn send_json(socket: &mut WebSocket, msg: &ServerWsMessage) -> Result<(), axum::Error> {
  let out = serde_json::to_string(msg).unwrap_or_else(|e| {
    serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e), "code": 500 }).to_string()
  });
  socket.send(Message::Text(out)).await
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "cultivator", "WebSocket connected");
  let mut notices = state.store.lock().await.subscribe();
  // Replies from request tasks; the socket is only written from this loop.
  let (tx, mut replies) = mpsc::unbounded_channel::<ServerWsMessage>();

  loop {
    tokio::select! {
      incoming = socket.recv() => {
        let Some(Ok(msg)) = incoming else { break };
        match msg {
          Message::Text(txt) => match serde_json::from_str::<ClientWsMessage>(&txt) {
            Ok(incoming) => {
              debug!(target: "cultivator", "WS received: {:?}", &incoming);
              route_request(incoming, &state, &tx).await;
            }
            Err(e) => {
              let _ = tx.send(ServerWsMessage::Error { message: format!("Invalid JSON: {}", e), code: 400 });
            }
          },
          Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
          Message::Close(_) => break,
          _ => {}
        }
      }
      Some(reply) = replies.recv() => {
        if let Err(e) = send_json(&mut socket, &reply).await {
          error!(target: "cultivator", error = %e, "WS send error");
          break;
        }
      }
      notice = notices.recv() => {
        match notice {
          Ok(n) => {
            if let Err(e) = send_json(&mut socket, &n.into()).await {
              error!(target: "cultivator", error = %e, "WS push error");
              break;
            }
          }
          Err(RecvError::Lagged(skipped)) => {
            warn!(target: "cultivator", skipped, "WS client lagged behind progress notices");
          }
          Err(RecvError::Closed) => break,
        }
      }
    }
  }
  info!(target: "cultivator", "WebSocket disconnected");
}

/// Requests that wait on the generator run on their own task so the rest of
/// the connection stays live. Everything else is answered in arrival order.
async fn route_request(msg: ClientWsMessage, state: &Arc<AppState>, tx: &UnboundedSender<ServerWsMessage>) {
  if msg.waits_on_generator() {
    let state = state.clone();
    let tx = tx.clone();
    tokio::spawn(async move {
      let reply = handle_client_ws(msg, &state).await.unwrap_or_else(error_message);
      let _ = tx.send(reply);
    });
  } else {
    let reply = handle_client_ws(msg, state).await.unwrap_or_else(error_message);
    let _ = tx.send(reply);
  }
}

fn error_message(e: AppError) -> ServerWsMessage {
  ServerWsMessage::Error { message: e.to_string(), code: e.status_code().as_u16() }
}

#[instrument(level = "info", skip(state))]
async fn handle_client_ws(msg: ClientWsMessage, state: &AppState) -> AppResult<ServerWsMessage> {
  Ok(match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::GetProgress => ServerWsMessage::Progress { progress: get_progress(state).await },

    ClientWsMessage::StartAssessment => ServerWsMessage::Quiz { quiz: start_assessment(state).await? },

    ClientWsMessage::SkipAssessment => {
      skip_assessment(state).await;
      ServerWsMessage::Progress { progress: get_progress(state).await }
    }

    ClientWsMessage::StartModuleQuiz { module } => {
      ServerWsMessage::Quiz { quiz: start_quiz(state, QuizStartIn::Module { module }).await? }
    }

    ClientWsMessage::StartFinalQuiz => ServerWsMessage::Quiz { quiz: start_quiz(state, QuizStartIn::Final).await? },

    ClientWsMessage::SelectOption { quiz_id, index } => {
      ServerWsMessage::Quiz { quiz: select_option(state, &quiz_id, index).await? }
    }

    ClientWsMessage::CheckAnswer { quiz_id } => ServerWsMessage::Reveal { reveal: check_answer(state, &quiz_id).await? },

    ClientWsMessage::NextQuestion { quiz_id } => ServerWsMessage::QuizStep { step: next_question(state, &quiz_id).await? },

    ClientWsMessage::RestartQuiz { quiz_id } => ServerWsMessage::Quiz { quiz: restart_quiz(state, &quiz_id).await? },

    ClientWsMessage::CloseQuiz { quiz_id } => {
      close_quiz(state, &quiz_id).await?;
      ServerWsMessage::QuizClosed { quiz_id }
    }

    ClientWsMessage::EnterModule { module } => {
      let challenge = enter_module(state, module).await?;
      info!(target: "challenge", %module, id = %challenge.challenge.id, "WS module entered");
      ServerWsMessage::Challenge { challenge }
    }

    ClientWsMessage::NextChallenge => ServerWsMessage::Challenge { challenge: next_challenge(state).await? },

    ClientWsMessage::DraftEdited => {
      draft_edited(state).await;
      ServerWsMessage::DraftCleared
    }

    ClientWsMessage::SubmitAnswer { answer } => {
      let result = submit_answer(state, &answer).await?;
      info!(target: "challenge", status = result.status(), "WS submit_answer evaluated");
      ServerWsMessage::Feedback { result }
    }
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use async_trait::async_trait;
  use tokio::sync::Notify;

  use crate::config::{AgentConfig, Prompts};
  use crate::domain::{Challenge, Feedback, Module};
  use crate::generator::{Generator, Offline};
  use crate::protocol::SubmitOut;
  use crate::storage::MemoryStore;

  /// Holds every feedback call until the gate opens.
  struct Gated(Arc<Notify>);

  #[async_trait]
  impl Generator for Gated {
    async fn feedback(&self, _p: &Prompts, _s: &str, _m: Module) -> Result<Feedback, String> {
      self.0.notified().await;
      Ok(Feedback { score: 8.0, suggestions: vec![], encouragement: "great".into() })
    }

    async fn challenge(&self, _p: &Prompts, _m: Module) -> Result<Challenge, String> {
      Err("no challenges".into())
    }

    fn name(&self) -> &'static str {
      "gated"
    }
  }

  fn state() -> AppState {
    AppState::from_parts(AgentConfig::default(), Box::new(MemoryStore::default()), Arc::new(Offline))
  }

  #[test]
  fn client_messages_parse() {
    let m: ClientWsMessage = serde_json::from_str(r#"{"type":"select_option","quizId":"q1","index":2}"#).unwrap();
    assert!(matches!(m, ClientWsMessage::SelectOption { index: 2, .. }));
    let m: ClientWsMessage = serde_json::from_str(r#"{"type":"enter_module","module":"code_onramp"}"#).unwrap();
    assert!(matches!(m, ClientWsMessage::EnterModule { module: Module::CodeOnramp }));
  }

  #[tokio::test]
  async fn errors_become_error_messages() {
    let state = state();
    let err = handle_client_ws(ClientWsMessage::EnterModule { module: Module::CodeOnramp }, &state)
      .await
      .unwrap_err();
    let json = serde_json::to_value(error_message(err)).unwrap();
    assert_eq!(json["type"], "error");
    assert_eq!(json["code"], 423);
  }

  #[tokio::test]
  async fn skip_replies_with_progress() {
    let state = state();
    let reply = handle_client_ws(ClientWsMessage::SkipAssessment, &state).await.unwrap();
    let json = serde_json::to_value(reply).unwrap();
    assert_eq!(json["type"], "progress");
    assert_eq!(json["progress"]["assessment_done"], true);
  }

  #[test]
  fn notices_serialize_with_type_tags() {
    let json = serde_json::to_value(ServerWsMessage::from(crate::store::StoreNotice::ModuleMastered(Module::Prompting))).unwrap();
    assert_eq!(json, serde_json::json!({ "type": "module_mastered", "module": "prompting" }));
  }

  #[tokio::test]
  async fn pending_feedback_does_not_block_other_requests() {
    let gate = Arc::new(Notify::new());
    let state = Arc::new(AppState::from_parts(
      AgentConfig::default(),
      Box::new(MemoryStore::default()),
      Arc::new(Gated(gate.clone())),
    ));
    let (tx, mut rx) = mpsc::unbounded_channel();

    route_request(ClientWsMessage::EnterModule { module: Module::Creativity }, &state, &tx).await;
    assert!(matches!(rx.recv().await, Some(ServerWsMessage::Challenge { .. })));

    route_request(ClientWsMessage::SubmitAnswer { answer: "a talking pet rock".into() }, &state, &tx).await;
    while !state.lab.lock().await.snapshot().feedback_pending {
      tokio::task::yield_now().await;
    }

    route_request(ClientWsMessage::Ping, &state, &tx).await;
    assert!(matches!(rx.recv().await, Some(ServerWsMessage::Pong)));
    route_request(ClientWsMessage::DraftEdited, &state, &tx).await;
    assert!(matches!(rx.recv().await, Some(ServerWsMessage::DraftCleared)));

    gate.notify_one();
    match rx.recv().await {
      Some(ServerWsMessage::Feedback { result: SubmitOut::Scored { xp_gained, .. } }) => assert_eq!(xp_gained, 12),
      other => panic!("unexpected {other:?}"),
    }
  }
}
