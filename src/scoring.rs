//! Quiz scoring and per-quiz session state.
//!
//! Options are shuffled every time a question is shown (including restarts),
//! so answers are always scored by mapping the presentation index back to the
//! original option index before comparing with the stored key.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use thiserror::Error;

use crate::domain::{Module, QuizQuestion};

/// Points awarded for one correct answer. No partial credit.
pub const POINTS_PER_CORRECT: u32 = 10;

/// Maps presentation index -> original option index.
pub type PresentationOrder = Vec<usize>;

/// Fresh Fisher–Yates permutation of `0..option_count`.
pub fn shuffle_order<R: Rng + ?Sized>(option_count: usize, rng: &mut R) -> PresentationOrder {
  let mut order: PresentationOrder = (0..option_count).collect();
  order.shuffle(rng);
  order
}

/// 10 if the presented option maps back to the question's key, else 0.
pub fn score_answer(question: &QuizQuestion, selected: usize, order: &[usize]) -> u32 {
  match order.get(selected) {
    Some(&original) if original == question.correct_answer => POINTS_PER_CORRECT,
    _ => 0,
  }
}

/// Which quiz a session belongs to; decides how its total folds into progress.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuizKind {
  Module { module: Module },
  Assessment,
  Final,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuizError {
  #[error("quiz has no questions")]
  Empty,
  #[error("option {index} out of range (question has {options} options)")]
  SelectionOutOfRange { index: usize, options: usize },
  #[error("answer already checked")]
  AlreadyChecked,
  #[error("select an option first")]
  NoSelection,
}

/// What the learner sees for the current question.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct QuestionView {
  pub id: String,
  pub question: String,
  /// Option texts in presentation order.
  pub options: Vec<String>,
  pub index: usize,
  pub total: usize,
  pub selected: Option<usize>,
  pub points: u32,
}

/// Result of checking the current selection.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Reveal {
  pub correct: bool,
  /// Presentation index of the right option.
  pub correct_index: usize,
  pub explanation: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Advance {
  Next(QuestionView),
  Completed { total: u32 },
}

/// Ephemeral state of one open quiz.
#[derive(Clone, Debug)]
pub struct QuizSession {
  pub id: String,
  pub kind: QuizKind,
  questions: Vec<QuizQuestion>,
  current: usize,
  order: PresentationOrder,
  selected: Option<usize>,
  checked: bool,
  points: u32,
}

impl QuizSession {
  pub fn new<R: Rng + ?Sized>(
    id: String,
    kind: QuizKind,
    questions: Vec<QuizQuestion>,
    rng: &mut R,
  ) -> Result<Self, QuizError> {
    let first = questions.first().ok_or(QuizError::Empty)?;
    let order = shuffle_order(first.options.len(), rng);
    Ok(Self { id, kind, questions, current: 0, order, selected: None, checked: false, points: 0 })
  }

  pub fn len(&self) -> usize {
    self.questions.len()
  }

  pub fn points(&self) -> u32 {
    self.points
  }

  fn question(&self) -> &QuizQuestion {
    &self.questions[self.current]
  }

  pub fn view(&self) -> QuestionView {
    let q = self.question();
    QuestionView {
      id: q.id.clone(),
      question: q.question.clone(),
      options: self.order.iter().map(|&i| q.options[i].clone()).collect(),
      index: self.current,
      total: self.questions.len(),
      selected: self.selected,
      points: self.points,
    }
  }

  pub fn select(&mut self, index: usize) -> Result<(), QuizError> {
    if self.checked {
      return Err(QuizError::AlreadyChecked);
    }
    if index >= self.order.len() {
      return Err(QuizError::SelectionOutOfRange { index, options: self.order.len() });
    }
    self.selected = Some(index);
    Ok(())
  }

  /// Reveal correctness of the current selection and lock it.
  pub fn check(&mut self) -> Result<Reveal, QuizError> {
    let selected = self.selected.ok_or(QuizError::NoSelection)?;
    self.checked = true;
    let q = self.question();
    let correct_index = self
      .order
      .iter()
      .position(|&i| i == q.correct_answer)
      .unwrap_or_default();
    Ok(Reveal {
      correct: score_answer(q, selected, &self.order) > 0,
      correct_index,
      explanation: q.explanation.clone(),
    })
  }

  /// Score the current selection and move on. Blocks until a selection exists.
  pub fn advance<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<Advance, QuizError> {
    let selected = self.selected.ok_or(QuizError::NoSelection)?;
    self.points += score_answer(self.question(), selected, &self.order);

    if self.current + 1 >= self.questions.len() {
      return Ok(Advance::Completed { total: self.points });
    }
    self.current += 1;
    self.show_current(rng);
    Ok(Advance::Next(self.view()))
  }

  pub fn restart<R: Rng + ?Sized>(&mut self, rng: &mut R) -> QuestionView {
    self.current = 0;
    self.points = 0;
    self.show_current(rng);
    self.view()
  }

  fn show_current<R: Rng + ?Sized>(&mut self, rng: &mut R) {
    self.order = shuffle_order(self.question().options.len(), rng);
    self.selected = None;
    self.checked = false;
  }
}
