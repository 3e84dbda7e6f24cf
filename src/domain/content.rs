/// Content tables: names, loading lines, quiz, dares and the chaos script.
///
/// Built-in content ships with the binary. A `content.toml` found next to
/// the executable (or in the working directory) replaces it wholesale.
/// A broken file never stops the show: the error is logged and the
/// built-in tables are used.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

pub const CHAOS_OPTION_COUNT: usize = 4;

#[derive(Clone, Debug, Deserialize)]
pub struct Question {
    pub question: String,
    pub options: Vec<String>,
    pub correct: String,
    pub right_response: String,
    pub wrong_response: String,
}

impl Question {
    pub fn is_correct(&self, option: usize) -> bool {
        self.options.get(option).is_some_and(|o| *o == self.correct)
    }

    pub fn correct_index(&self) -> Option<usize> {
        self.options.iter().position(|o| *o == self.correct)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Content {
    pub player_a: String,
    pub player_b: String,
    pub loading_lines: Vec<String>,
    pub questions: Vec<Question>,
    pub dares: Vec<String>,
    pub dare_done_responses: Vec<String>,
    pub dare_skip_responses: Vec<String>,
    pub chaos_question: String,
    pub chaos_options: Vec<String>,
    /// Shown in order: error, cannot, disabled.
    pub chaos_messages: [String; 3],
    pub easter_egg: String,
    pub final_lines: Vec<String>,
    pub final_question: String,
    pub forever_title: String,
    pub forever_subtitle: String,
}

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("content has no quiz questions")]
    NoQuestions,
    #[error("question {index} lists \"{correct}\" as correct but it is not one of its options")]
    CorrectNotAnOption { index: usize, correct: String },
    #[error("content has no dares")]
    NoDares,
    #[error("chaos round needs exactly 4 options, found {0}")]
    ChaosOptions(usize),
    #[error("content has no loading lines")]
    NoLoadingLines,
}

impl Content {
    /// Load `path` if it exists, otherwise the built-in content.
    pub fn load_or_builtin(path: &Path) -> Self {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no content file, using built-in content");
            return Content::builtin();
        }
        match Content::from_file(path) {
            Ok(content) => {
                tracing::info!(
                    path = %path.display(),
                    questions = content.questions.len(),
                    dares = content.dares.len(),
                    "loaded content"
                );
                content
            }
            Err(e) => {
                tracing::warn!("{e}; using built-in content");
                Content::builtin()
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ContentError> {
        let text = std::fs::read_to_string(path).map_err(|source| ContentError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let content: Content = toml::from_str(&text).map_err(|source| ContentError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        content.validate()?;
        Ok(content)
    }

    pub fn validate(&self) -> Result<(), ContentError> {
        if self.loading_lines.is_empty() {
            return Err(ContentError::NoLoadingLines);
        }
        if self.questions.is_empty() {
            return Err(ContentError::NoQuestions);
        }
        for (index, q) in self.questions.iter().enumerate() {
            if q.correct_index().is_none() {
                return Err(ContentError::CorrectNotAnOption {
                    index,
                    correct: q.correct.clone(),
                });
            }
        }
        if self.dares.is_empty() {
            return Err(ContentError::NoDares);
        }
        if self.chaos_options.len() != CHAOS_OPTION_COUNT {
            return Err(ContentError::ChaosOptions(self.chaos_options.len()));
        }
        Ok(())
    }

    pub fn builtin() -> Self {
        fn q(question: &str, options: [&str; 4], correct: &str, right: &str, wrong: &str) -> Question {
            Question {
                question: question.into(),
                options: options.iter().map(|s| s.to_string()).collect(),
                correct: correct.into(),
                right_response: right.into(),
                wrong_response: wrong.into(),
            }
        }
        fn strings(items: &[&str]) -> Vec<String> {
            items.iter().map(|s| s.to_string()).collect()
        }

        Content {
            player_a: "Perry".into(),
            player_b: "Gandu".into(),
            loading_lines: strings(&[
                "Initializing Love System...",
                "Scanning Emotional Database...",
                "Analyzing Relationship...",
                "Result: Dangerously in Love.",
            ]),
            questions: vec![
                q(
                    "What's my comfort food?",
                    ["Pasta", "Chocolate", "Mom's food", "Anything you cook"],
                    "Anything you cook",
                    "Momos toh khilaye jaate hai ni <3",
                    "Seriously?!",
                ),
                q(
                    "Who said \"I love you\" first?",
                    ["Perry", "Gandu", "Both", "It slipped out"],
                    "Gandu",
                    "Yep, couldn't hold it in!",
                    "Nope! It was Gandu. Bold move energy.",
                ),
                q(
                    "What's my red flag?",
                    ["Overthinks", "Too clingy", "Too hot", "None (perfect)"],
                    "None (perfect)",
                    "Self-aware and proud!",
                    "It's None (perfect) but 'too hot' was close.",
                ),
                q(
                    "My dream vacation?",
                    ["Paris", "Maldives", "Mountains", "Anywhere with you"],
                    "Anywhere with you",
                    "Smooth AND correct!",
                    "The right answer is 'Anywhere with you'. Take notes!",
                ),
                q(
                    "What makes me instantly happy?",
                    ["Food", "Compliments", "You", "Sleep"],
                    "You",
                    "Awww you're MY happiness too!",
                    "It's YOU, silly! Don't underestimate yourself.",
                ),
                q(
                    "Who is more dramatic?",
                    ["Perry", "Gandu", "Both", "Depends on the day"],
                    "Both",
                    "Correct! We're a dramatic power couple.",
                    "Lol it's BOTH of us. We're unhinged together.",
                ),
            ],
            dares: strings(&[
                "Send me the most embarrassing selfie in your gallery",
                "Sing the chorus of our song, out loud, right now",
                "Describe me in exactly three words",
                "Do your best impression of me when I'm hungry",
                "Text me a compliment you've never said before",
                "Slow dance with me for ten seconds",
            ]),
            dare_done_responses: strings(&[
                "Okay fine, you're kinda cute.",
                "That's what I'm talking about!",
                "Love level: UNMATCHED",
            ]),
            dare_skip_responses: strings(&[
                "Scared? Thought so.",
                "Skipping? That's -10 vibes.",
                "Weak move but okay.",
            ]),
            chaos_question: "Who loves more?".into(),
            chaos_options: strings(&["Perry", "Gandu", "Equal", "It cannot be measured"]),
            chaos_messages: [
                "Error.".into(),
                "Love cannot be calculated.".into(),
                "Competition mode disabled.".into(),
            ],
            easter_egg: "PS: You always win in my heart.".into(),
            final_lines: strings(&[
                "Plot twist...",
                "This was never about winning.",
                "I made this because I love you more than points can ever measure.",
                "Thank you for being my favorite person, my peace, my chaos, and my home.",
            ]),
            final_question: "Will you be my Valentine forever?".into(),
            forever_title: "Unlocked: Forever Mode".into(),
            forever_subtitle: "You + Me = Infinity".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_content_is_valid() {
        let c = Content::builtin();
        c.validate().unwrap();
        assert_eq!(c.loading_lines.len(), 4);
        assert_eq!(c.questions.len(), 6);
        assert_eq!(c.chaos_options.len(), CHAOS_OPTION_COUNT);
    }

    #[test]
    fn correct_option_lookup() {
        let c = Content::builtin();
        let q = &c.questions[1];
        assert_eq!(q.correct_index(), Some(1));
        assert!(q.is_correct(1));
        assert!(!q.is_correct(0));
        assert!(!q.is_correct(99)); // out of range is simply wrong
    }

    #[test]
    fn rejects_correct_answer_missing_from_options() {
        let mut c = Content::builtin();
        c.questions[2].correct = "Nobody".into();
        match c.validate() {
            Err(ContentError::CorrectNotAnOption { index, .. }) => assert_eq!(index, 2),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn rejects_wrong_chaos_option_count() {
        let mut c = Content::builtin();
        c.chaos_options.pop();
        assert!(matches!(c.validate(), Err(ContentError::ChaosOptions(3))));
    }

    #[test]
    fn rejects_empty_tables() {
        let mut c = Content::builtin();
        c.dares.clear();
        assert!(matches!(c.validate(), Err(ContentError::NoDares)));

        let mut c = Content::builtin();
        c.questions.clear();
        assert!(matches!(c.validate(), Err(ContentError::NoQuestions)));
    }

    #[test]
    fn parses_toml_content() {
        let mut text = String::from(
            r#"
player_a = "Ann"
player_b = "Bob"
loading_lines = ["Booting..."]
dares = ["Dance"]
dare_done_responses = ["Nice"]
dare_skip_responses = ["Boo"]
chaos_question = "Who?"
chaos_options = ["A", "B", "C", "D"]
chaos_messages = ["e", "c", "d"]
easter_egg = "egg"
final_lines = ["bye"]
final_question = "Yes?"
forever_title = "Forever"
forever_subtitle = "Always"
"#,
        );
        text.push_str(
            r#"
[[questions]]
question = "Color?"
options = ["Red", "Blue"]
correct = "Blue"
right_response = "yes"
wrong_response = "no"
"#,
        );
        let c: Content = toml::from_str(&text).unwrap();
        c.validate().unwrap();
        assert_eq!(c.player_a, "Ann");
        assert_eq!(c.questions[0].correct_index(), Some(1));
    }

    #[test]
    fn missing_file_falls_back_to_builtin() {
        let c = Content::load_or_builtin(Path::new("/definitely/not/here/content.toml"));
        assert_eq!(c.player_a, "Perry");
    }
}
