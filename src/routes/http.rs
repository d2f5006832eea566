//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs parameters and basic result info.

use std::sync::Arc;
use axum::{extract::{Path, State}, http::StatusCode, Json, response::IntoResponse};
use tracing::{info, instrument};

use crate::domain::Module;
use crate::errors::{AppError, AppResult};
use crate::logic::*;
use crate::protocol::*;
use crate::scoring::Reveal;
use crate::state::AppState;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info", skip(state))]
pub async fn http_get_progress(State(state): State<Arc<AppState>>) -> Json<ProgressOut> {
  Json(get_progress(&state).await)
}

#[instrument(level = "info", skip(state))]
pub async fn http_start_assessment(State(state): State<Arc<AppState>>) -> AppResult<Json<QuizOut>> {
  let quiz = start_assessment(&state).await?;
  info!(target: "quiz", quiz_id = %quiz.quiz_id, total = quiz.question.total, "HTTP assessment started");
  Ok(Json(quiz))
}

#[instrument(level = "info", skip(state))]
pub async fn http_skip_assessment(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(skip_assessment(&state).await)
}

#[instrument(level = "info", skip(state))]
pub async fn http_start_quiz(
  State(state): State<Arc<AppState>>,
  Json(body): Json<QuizStartIn>,
) -> AppResult<Json<QuizOut>> {
  Ok(Json(start_quiz(&state, body).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_quiz(
  State(state): State<Arc<AppState>>,
  Path(quiz_id): Path<String>,
) -> AppResult<Json<QuizOut>> {
  Ok(Json(get_quiz(&state, &quiz_id).await?))
}

#[instrument(level = "info", skip(state, body), fields(index = body.index))]
pub async fn http_select_option(
  State(state): State<Arc<AppState>>,
  Path(quiz_id): Path<String>,
  Json(body): Json<SelectIn>,
) -> AppResult<Json<QuizOut>> {
  Ok(Json(select_option(&state, &quiz_id, body.index).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_check_answer(
  State(state): State<Arc<AppState>>,
  Path(quiz_id): Path<String>,
) -> AppResult<Json<Reveal>> {
  Ok(Json(check_answer(&state, &quiz_id).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_next_question(
  State(state): State<Arc<AppState>>,
  Path(quiz_id): Path<String>,
) -> AppResult<Json<NextOut>> {
  Ok(Json(next_question(&state, &quiz_id).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_restart_quiz(
  State(state): State<Arc<AppState>>,
  Path(quiz_id): Path<String>,
) -> AppResult<Json<QuizOut>> {
  Ok(Json(restart_quiz(&state, &quiz_id).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_close_quiz(
  State(state): State<Arc<AppState>>,
  Path(quiz_id): Path<String>,
) -> AppResult<StatusCode> {
  close_quiz(&state, &quiz_id).await?;
  Ok(StatusCode::NO_CONTENT)
}

#[instrument(level = "info", skip(state))]
pub async fn http_enter_module(
  State(state): State<Arc<AppState>>,
  Path(module): Path<String>,
) -> AppResult<Json<ChallengeOut>> {
  let module: Module = module.parse().map_err(AppError::NotFound)?;
  let out = enter_module(&state, module).await?;
  info!(target: "challenge", %module, id = %out.challenge.id, "HTTP module entered");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state))]
pub async fn http_next_challenge(State(state): State<Arc<AppState>>) -> AppResult<Json<ChallengeOut>> {
  Ok(Json(next_challenge(&state).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_draft_edited(State(state): State<Arc<AppState>>) -> StatusCode {
  draft_edited(&state).await;
  StatusCode::NO_CONTENT
}

#[instrument(level = "info", skip(state, body), fields(answer_len = body.answer.len()))]
pub async fn http_submit_answer(
  State(state): State<Arc<AppState>>,
  Json(body): Json<SubmitIn>,
) -> AppResult<Json<SubmitOut>> {
  let out = submit_answer(&state, &body.answer).await?;
  info!(target: "challenge", status = out.status(), "HTTP submit_answer evaluated");
  Ok(Json(out))
}
