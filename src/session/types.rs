//! Interview data model shared by the session engine and the pipeline.
//!
//! Everything here is plain owned data: cheap to clone, `Send + Sync`, and
//! immutable once produced.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Difficulty
// ---------------------------------------------------------------------------

/// Target difficulty of the generated questions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    /// Lower-case label embedded in prompts (`"easy"`, `"medium"`, `"hard"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!(
                "unknown difficulty {other:?} (expected easy, medium or hard)"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// InterviewConfig
// ---------------------------------------------------------------------------

/// Target company, role and difficulty for one interview session.
///
/// Fixed for the lifetime of a session and passed explicitly to every
/// pipeline call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterviewConfig {
    pub company_name: String,
    pub role: String,
    pub difficulty: Difficulty,
}

impl InterviewConfig {
    pub fn new(
        company_name: impl Into<String>,
        role: impl Into<String>,
        difficulty: Difficulty,
    ) -> Self {
        Self {
            company_name: company_name.into(),
            role: role.into(),
            difficulty,
        }
    }
}

// ---------------------------------------------------------------------------
// QuestionAnswerPair / EvaluationResult
// ---------------------------------------------------------------------------

/// A technical question together with its model answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionAnswerPair {
    pub question: String,
    pub correct_answer: String,
}

impl QuestionAnswerPair {
    pub fn new(question: impl Into<String>, correct_answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            correct_answer: correct_answer.into(),
        }
    }
}

/// Outcome of evaluating one candidate answer.
///
/// `verdict` is free-form (`"Correct"`, `"Partially correct"`, `"No"` …);
/// `feedback` is what ends up in the transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub verdict: String,
    pub feedback: String,
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// Author of a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Interviewer output: questions and evaluation feedback.
    Assistant,
}

/// One line of the interview transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

impl HistoryEntry {
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn difficulty_parses_case_insensitively() {
        assert_eq!("Medium".parse::<Difficulty>(), Ok(Difficulty::Medium));
        assert_eq!(" HARD ".parse::<Difficulty>(), Ok(Difficulty::Hard));
        assert_eq!("easy".parse::<Difficulty>(), Ok(Difficulty::Easy));
    }

    #[test]
    fn difficulty_rejects_unknown_label() {
        let err = "impossible".parse::<Difficulty>().unwrap_err();
        assert!(err.contains("impossible"));
    }

    #[test]
    fn difficulty_displays_lowercase() {
        assert_eq!(Difficulty::Hard.to_string(), "hard");
        assert_eq!(Difficulty::default(), Difficulty::Medium);
    }

    #[test]
    fn assistant_entry_has_assistant_role() {
        let entry = HistoryEntry::assistant("What is a p-value?");
        assert_eq!(entry.role, Role::Assistant);
        assert_eq!(entry.content, "What is a p-value?");
    }
}
