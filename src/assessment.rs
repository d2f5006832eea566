//! Placement quiz selection.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::domain::QuizQuestion;

pub const DEFAULT_ASSESSMENT_SIZE: usize = 6;

/// Uniformly sample `size` questions without replacement, in random order.
/// A pool smaller than `size` yields every question (shuffled).
pub fn select_assessment<R: Rng + ?Sized>(
  pool: &[QuizQuestion],
  size: usize,
  rng: &mut R,
) -> Vec<QuizQuestion> {
  let mut picked = pool.to_vec();
  picked.shuffle(rng);
  picked.truncate(size);
  picked
}
