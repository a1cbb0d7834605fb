//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to core logic. `process` replies with one message per finished
//! step so the page can render results incrementally; other requests get a
//! single reply.

use std::sync::Arc;

use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::ProcessingConfig;
use crate::logic::*;
use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "vnqgen", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "vnqgen", "WebSocket connected");
  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        let (tx, mut rx) = mpsc::unbounded_channel();
        match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "vnqgen", "WS received: {:?}", &incoming);
            let work = handle_client_ws(incoming, &state, tx);
            let forward = async {
              while let Some(reply) = rx.recv().await {
                send_json(&mut socket, &reply).await?;
              }
              Ok::<(), axum::Error>(())
            };
            let ((), sent) = tokio::join!(work, forward);
            if let Err(e) = sent {
              error!(target: "vnqgen", error = %e, "WS send error");
              break;
            }
          }
          Err(e) => {
            let reply = ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) };
            if let Err(e) = send_json(&mut socket, &reply).await {
              error!(target: "vnqgen", error = %e, "WS send error");
              break;
            }
          }
        }
      }
      Message::Ping(payload) => {
        let _ = socket.send(Message::Pong(payload)).await;
      }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "vnqgen", "WebSocket disconnected");
}

async fn send_json(socket: &mut WebSocket, msg: &ServerWsMessage) -> Result<(), axum::Error> {
  let out = serde_json::to_string(msg).unwrap_or_else(|e| {
    serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
  });
  socket.send(Message::Text(out)).await
}

fn error_reply(e: &TaskError) -> ServerWsMessage {
  ServerWsMessage::Error { message: e.user_message().to_string() }
}

/// Dispatch one client message; replies go to `tx` in order.
#[instrument(level = "info", skip_all)]
async fn handle_client_ws(msg: ClientWsMessage, state: &AppState, tx: mpsc::UnboundedSender<ServerWsMessage>) {
  // A closed receiver means the socket is gone; nothing left to report to.
  let reply = |m: ServerWsMessage| {
    let _ = tx.send(m);
  };

  match msg {
    ClientWsMessage::Ping => reply(ServerWsMessage::Pong),

    ClientWsMessage::Process { text, config } => {
      let cfg = config.apply(&state.defaults);
      run_pipeline(state, &text, &cfg, &tx).await;
    }

    ClientWsMessage::Analyze { text, config } => {
      let cfg = config.apply(&state.defaults);
      let out = match state.client() {
        Ok(c) => analyze(c, &state.prompts, &text, cfg.extraction_ratio).await,
        Err(e) => Err(e),
      };
      reply(out.map(|analysis| ServerWsMessage::Analysis { analysis }).unwrap_or_else(|e| error_reply(&e)));
    }

    ClientWsMessage::Summarize { text, config } => {
      let cfg = config.apply(&state.defaults);
      let out = match state.client() {
        Ok(c) => summarize(c, &state.prompts, &text, cfg.summary_length).await,
        Err(e) => Err(e),
      };
      reply(out.map(|summary| ServerWsMessage::Summary { summary }).unwrap_or_else(|e| error_reply(&e)));
    }

    ClientWsMessage::GenerateQuestions { text, config } => {
      let cfg = config.apply(&state.defaults);
      let out = match state.client() {
        Ok(c) => generate_questions(c, &state.prompts, &text, cfg.num_questions, cfg.question_types).await,
        Err(e) => Err(e),
      };
      reply(out.map(|questions| ServerWsMessage::Questions { questions }).unwrap_or_else(|e| error_reply(&e)));
    }
  }
}

/// Analyze, summarize, then generate questions, one after another.
/// The first failure is reported and stops the run; earlier results stand.
#[instrument(level = "info", skip(state, text, tx), fields(text_len = text.len(), enable_chunking = cfg.enable_chunking))]
pub async fn run_pipeline(
  state: &AppState,
  text: &str,
  cfg: &ProcessingConfig,
  tx: &mpsc::UnboundedSender<ServerWsMessage>,
) {
  let run_id = Uuid::new_v4().to_string();
  let outcome = async {
    let client = state.client()?;

    let analysis = analyze(client, &state.prompts, text, cfg.extraction_ratio).await?;
    let _ = tx.send(ServerWsMessage::Analysis { analysis });

    let summary = summarize(client, &state.prompts, text, cfg.summary_length).await?;
    let _ = tx.send(ServerWsMessage::Summary { summary });

    let questions =
      generate_questions(client, &state.prompts, text, cfg.num_questions, cfg.question_types).await?;
    let _ = tx.send(ServerWsMessage::Questions { questions });
    Ok::<(), TaskError>(())
  }
  .await;

  match outcome {
    Ok(()) => {
      info!(target: "vnqgen", %run_id, "Pipeline finished");
      let _ = tx.send(ServerWsMessage::Done { run_id });
    }
    Err(e) => {
      warn!(target: "vnqgen", %run_id, error = %e, "Pipeline stopped");
      let _ = tx.send(error_reply(&e));
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  use crate::completion::tests::ScriptedBackend;
  use crate::completion::{BackendError, CompletionBackend};
  use crate::config::AppConfig;
  use crate::envelope::ResponseEnvelope;

  const INPUT: &str = "Việt Nam giành độc lập ngày 2/9/1945. Chủ tịch Hồ Chí Minh đọc Tuyên ngôn Độc lập.";

  fn state_with(backend: Arc<ScriptedBackend>) -> AppState {
    AppState::new(AppConfig::default(), Some(backend as Arc<dyn CompletionBackend>))
  }

  async fn collect(state: &AppState) -> Vec<ServerWsMessage> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    run_pipeline(state, INPUT, &ProcessingConfig::default(), &tx).await;
    drop(tx);
    let mut out = Vec::new();
    while let Some(m) = rx.recv().await {
      out.push(m);
    }
    out
  }

  #[tokio::test]
  async fn pipeline_reports_each_step_in_order() {
    let backend = Arc::new(ScriptedBackend::texts(&[
      r#"{"keywords":["độc lập"],"important_sentences":[],"entities":["Hồ Chí Minh"]}"#,
      r#"{"base_summary":"a","enhanced_summary":"b","summary_length":1,"rouge_score":0.5}"#,
      r#"[{"question":"Q","type":"tf","answer":true}]"#,
    ]));
    let msgs = collect(&state_with(backend)).await;
    assert_eq!(msgs.len(), 4);
    assert!(matches!(&msgs[0], ServerWsMessage::Analysis { analysis } if analysis.keywords == vec!["độc lập".to_string()]));
    assert!(matches!(&msgs[1], ServerWsMessage::Summary { summary } if summary.rouge_score == 0.5));
    assert!(matches!(&msgs[2], ServerWsMessage::Questions { questions } if questions.len() == 1));
    assert!(matches!(&msgs[3], ServerWsMessage::Done { .. }));
  }

  #[tokio::test(start_paused = true)]
  async fn failure_keeps_earlier_results() {
    let fail = || Some(Err(BackendError::Transport("connection reset".into())));
    let backend = Arc::new(ScriptedBackend::new(vec![
      Some(Ok(ResponseEnvelope::from_text(r#"{"keywords":["a"]}"#))),
      fail(),
      fail(),
      fail(),
    ]));
    let msgs = collect(&state_with(backend.clone())).await;
    assert_eq!(msgs.len(), 2);
    assert!(matches!(&msgs[0], ServerWsMessage::Analysis { .. }));
    assert!(matches!(&msgs[1], ServerWsMessage::Error { message } if message == USER_ERROR_MESSAGE));
    // questions never requested
    assert_eq!(backend.calls(), 4);
  }

  #[tokio::test]
  async fn missing_backend_is_reported_once() {
    let state = AppState::new(AppConfig::default(), None);
    let msgs = collect(&state).await;
    assert_eq!(msgs.len(), 1);
    assert!(matches!(&msgs[0], ServerWsMessage::Error { .. }));
  }
}
