//! Application error type and its HTTP mapping (status + JSON body).

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::domain::Module;
use crate::lab::LabError;
use crate::scoring::QuizError;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum AppError {
  #[error("Not found: {0}")]
  NotFound(String),

  #[error("Module locked: {0}")]
  Locked(Module),

  #[error("Final quiz locked: fill all three buckets first")]
  FinalLocked,

  #[error("Validation error: {0}")]
  ValidationError(String),

  #[error("Busy: {0}")]
  Busy(String),
}

impl AppError {
  fn error_code(&self) -> &'static str {
    match self {
      AppError::NotFound(_) => "NOT_FOUND",
      AppError::Locked(_) | AppError::FinalLocked => "LOCKED",
      AppError::ValidationError(_) => "VALIDATION_ERROR",
      AppError::Busy(_) => "BUSY",
    }
  }

  pub fn status_code(&self) -> StatusCode {
    match self {
      AppError::NotFound(_) => StatusCode::NOT_FOUND,
      AppError::Locked(_) | AppError::FinalLocked => StatusCode::LOCKED,
      AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
      AppError::Busy(_) => StatusCode::CONFLICT,
    }
  }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
  pub error: String,
  pub code: &'static str,
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    let body = ErrorResponse { error: self.to_string(), code: self.error_code() };
    (self.status_code(), Json(body)).into_response()
  }
}

impl From<QuizError> for AppError {
  fn from(err: QuizError) -> Self {
    match err {
      QuizError::AlreadyChecked => AppError::Busy(err.to_string()),
      _ => AppError::ValidationError(err.to_string()),
    }
  }
}

impl From<LabError> for AppError {
  fn from(err: LabError) -> Self {
    match err {
      LabError::NoActiveModule => AppError::ValidationError(err.to_string()),
      LabError::FeedbackPending => AppError::Busy(err.to_string()),
    }
  }
}

pub type AppResult<T> = Result<T, AppError>;
