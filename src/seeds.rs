//! Built-in content that keeps the app useful without external config or a generator.

use uuid::Uuid;

use crate::domain::{Challenge, ChallengeSource, Module, QuizQuestion};

fn q(id: &str, question: &str, options: &[&str], correct: usize, explanation: &str) -> QuizQuestion {
  QuizQuestion {
    id: id.into(),
    question: question.into(),
    options: options.iter().map(|s| s.to_string()).collect(),
    correct_answer: correct,
    explanation: explanation.into(),
  }
}

/// Placement pool. Larger than the default sample size so retakes vary.
pub fn seed_assessment_pool() -> Vec<QuizQuestion> {
  vec![
    q("a1", "You have a great app idea. What is the best first step?",
      &["Write a hundred lines of code right away", "Describe the idea and its features in simple words", "Ask the computer to make something cool", "Wait until you know every language"],
      1, "Building with AI starts with your story. If you can describe it, you can build it."),
    q("a2", "Which of these works like a map for an app?",
      &["A list of favourite colours", "A sketch of what each screen looks like", "The charger cable", "Your password"],
      1, "Sketching the screens shows the AI where buttons and text belong."),
    q("a3", "What makes a prompt better?",
      &["Writing in capital letters", "Adding specific details and rules", "Typing very fast", "Using as few words as possible"],
      1, "Specific prompts tell the AI exactly what to build."),
    q("a4", "The AI gave you code that does not work. What now?",
      &["Delete everything", "Tell the AI about the error and ask for a fix", "Switch the computer off", "Paste it again and hope"],
      1, "Fixing mistakes together with the AI is a core skill."),
    q("a5", "What is the logic flow of an app?",
      &["How fast the screen scrolls", "The step-by-step rules that decide what happens next", "The button colours", "How heavy the phone is"],
      1, "Logic flow is the sequence of decisions that makes things happen."),
    q("a6", "Why use a framework?",
      &["To make the computer look fancy", "To reuse a kit of ready-made parts and save time", "Because it is the law", "To hide your work"],
      1, "Frameworks are kits of parts that help you build bigger apps faster."),
    q("a7", "What does a variable do in a game?",
      &["Makes the music louder", "Stores a value that can change, like a high score", "Names the company", "Turns the screen 3D"],
      1, "Variables are boxes that hold what the app needs to remember."),
    q("a8", "You want the app to do the same thing ten times. What do you use?",
      &["A loop", "A variable", "A button", "A screen"],
      0, "Loops repeat a task until it is done."),
  ]
}

/// Module quiz banks.
pub fn seed_quiz_bank(m: Module) -> Vec<QuizQuestion> {
  match m {
    Module::Creativity => vec![
      q("q_c1", "What is an MVP?",
        &["Most Valuable Player", "Minimum Viable Product", "Main Visual Piece"],
        1, "The MVP is the simplest version of your idea that actually works."),
      q("q_c2", "Which studio is all about big ideas and imagination?",
        &["Design Studio", "Comm Studio", "Logic Studio"],
        0, "The Design Studio is where you dream and plan."),
    ],
    Module::Prompting => vec![
      q("q_p1", "What does refining a prompt mean?",
        &["Making it more specific and clear", "Typing the same thing twice", "Using a robot voice"],
        0, "Refining helps the AI understand exactly what you mean."),
      q("q_p2", "Which prompt is clearest?",
        &["Make a nice button", "Make a round blue button that says Start and opens the game screen", "Button please"],
        1, "Shape, colour, label and action leave nothing to guess."),
    ],
    Module::CodeOnramp => vec![
      q("q_f1", "What is debugging?",
        &["Catching bugs in a jar", "Finding and fixing logic mistakes", "Buying a new keyboard"],
        1, "Debugging is the detective work of building software."),
      q("q_f2", "A player has 0 coins. What should the shop's Buy button do?",
        &["Stay hidden or disabled", "Give a free item", "Crash the game"],
        0, "A condition checks the coins before allowing a purchase."),
    ],
  }
}

/// Static challenge served whenever generation fails.
pub fn fallback_challenge(m: Module) -> (String, Vec<String>) {
  let (task, hints): (&str, &[&str]) = match m {
    Module::Creativity => (
      "Describe how the hero of your new game app chooses their special power.",
      &["Use a list!", "Think about buttons.", "You can sketch or narrate it."],
    ),
    Module::Prompting => (
      "Rewrite this prompt so it is clearer: \"Make me a button that looks nice\".",
      &["Say what the button does.", "Give it a colour and a label."],
    ),
    Module::CodeOnramp => (
      "If a user has 0 coins, should the shop button be hidden? Explain why.",
      &["Think about what happens when they tap it.", "Use an if/then sentence."],
    ),
  };
  (task.to_string(), hints.iter().map(|s| s.to_string()).collect())
}

/// Wrap a fallback task into a challenge with a fresh id.
pub fn make_fallback(m: Module, challenge: String, hints: Vec<String>) -> Challenge {
  Challenge {
    id: Uuid::new_v4().to_string(),
    module: m,
    source: ChallengeSource::Fallback,
    challenge,
    hints,
  }
}
