//! Turns free-text model replies into typed interview values.
//!
//! Models do not always obey "reply with only JSON": the object may be
//! wrapped in a Markdown code fence or surrounded by prose, and the prose
//! may itself contain braces.  The parser takes the first balanced `{ … }`
//! block that deserialises into the expected shape.

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::llm::client::PipelineError;
use crate::session::{EvaluationResult, QuestionAnswerPair};

#[derive(Deserialize)]
struct RawQaPair {
    #[serde(default)]
    question: String,
    #[serde(default, alias = "answer")]
    correct_answer: String,
}

#[derive(Deserialize)]
struct RawEvaluation {
    #[serde(default, alias = "correct")]
    verdict: serde_json::Value,
    #[serde(default)]
    feedback: String,
}

/// Parse a `{"question": …, "correct_answer": …}` reply.
///
/// Both fields must be present and non-blank.
pub fn parse_qa_pair(reply: &str) -> Result<QuestionAnswerPair, PipelineError> {
    first_valid_object(reply, |raw: RawQaPair| {
        let question = raw.question.trim();
        let correct_answer = raw.correct_answer.trim();

        if question.is_empty() {
            return Err(PipelineError::Malformed("missing \"question\"".into()));
        }
        if correct_answer.is_empty() {
            return Err(PipelineError::Malformed("missing \"correct_answer\"".into()));
        }
        Ok(QuestionAnswerPair::new(question, correct_answer))
    })
}

/// Parse a `{"verdict": …, "feedback": …}` reply.
///
/// The verdict may come back as a string or a boolean; booleans are
/// rendered as `"Correct"` / `"Incorrect"`.  Feedback must be non-blank.
pub fn parse_evaluation(reply: &str) -> Result<EvaluationResult, PipelineError> {
    first_valid_object(reply, |raw: RawEvaluation| {
        let verdict = match raw.verdict {
            serde_json::Value::String(s) => s.trim().to_string(),
            serde_json::Value::Bool(true) => "Correct".to_string(),
            serde_json::Value::Bool(false) => "Incorrect".to_string(),
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        };

        let feedback = raw.feedback.trim();
        if feedback.is_empty() {
            return Err(PipelineError::Malformed("missing \"feedback\"".into()));
        }
        Ok(EvaluationResult {
            verdict,
            feedback: feedback.to_string(),
        })
    })
}

/// Try every balanced `{ … }` block in `reply`, left to right, and return
/// the first one that deserialises into `R` and passes `validate`.
///
/// When none does, the error from the first candidate is reported.
fn first_valid_object<R, T>(
    reply: &str,
    validate: impl Fn(R) -> Result<T, PipelineError>,
) -> Result<T, PipelineError>
where
    R: DeserializeOwned,
{
    let mut first_error = None;

    for candidate in json_objects(reply) {
        let result = serde_json::from_str::<R>(candidate)
            .map_err(|e| PipelineError::Malformed(e.to_string()))
            .and_then(&validate);
        match result {
            Ok(value) => return Ok(value),
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }

    Err(first_error
        .unwrap_or_else(|| PipelineError::Malformed("reply contains no JSON object".into())))
}

/// Every balanced `{ … }` slice of `text`, by start position.
fn json_objects(text: &str) -> impl Iterator<Item = &str> {
    text.char_indices()
        .filter(|&(_, ch)| ch == '{')
        .filter_map(move |(start, _)| balanced_object_at(text, start))
}

/// The balanced `{ … }` slice starting at byte `start`, honouring string
/// literals and escapes so braces inside values do not end the scan early.
fn balanced_object_at(text: &str, start: usize) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_qa_object() {
        let reply = r#"{"question": "What is a p-value?", "correct_answer": "The probability..."}"#;
        let qa = parse_qa_pair(reply).unwrap();
        assert_eq!(qa.question, "What is a p-value?");
        assert_eq!(qa.correct_answer, "The probability...");
    }

    #[test]
    fn parses_fenced_qa_object_with_prose() {
        let reply = concat!(
            "Here is your question:\n```json\n{\n",
            "  \"question\": \"Explain {braces} in f-strings\",\n",
            "  \"correct_answer\": \"They \\\"interpolate\\\" values\"\n",
            "}\n```\nGood luck!"
        );
        let qa = parse_qa_pair(reply).unwrap();
        assert_eq!(qa.question, "Explain {braces} in f-strings");
        assert_eq!(qa.correct_answer, "They \"interpolate\" values");
    }

    #[test]
    fn skips_brace_text_before_the_object() {
        let reply = "Use {placeholders} carefully.\n{\"question\":\"Q\",\"correct_answer\":\"A\"}";
        let qa = parse_qa_pair(reply).unwrap();
        assert_eq!(qa, QuestionAnswerPair::new("Q", "A"));
    }

    #[test]
    fn skips_unrelated_object_before_the_answer() {
        let reply = concat!(
            r#"Config: {"temperature": 0.7}. "#,
            r#"Answer: {"verdict": "Correct", "feedback": "Spot on."}"#
        );
        let eval = parse_evaluation(reply).unwrap();
        assert_eq!(eval.feedback, "Spot on.");
    }

    #[test]
    fn reports_first_candidate_error_when_nothing_parses() {
        let err = parse_qa_pair("Use {placeholders} and {more} here.").unwrap_err();
        assert!(
            matches!(
                err,
                PipelineError::Malformed(ref msg) if msg.contains("key must be a string")
            ),
            "got {err:?}"
        );
    }

    #[test]
    fn accepts_answer_alias() {
        let qa = parse_qa_pair(r#"{"question": "Q", "answer": "A"}"#).unwrap();
        assert_eq!(qa.correct_answer, "A");
    }

    #[test]
    fn rejects_missing_question() {
        let err = parse_qa_pair(r#"{"correct_answer": "A"}"#).unwrap_err();
        assert!(matches!(err, PipelineError::Malformed(msg) if msg.contains("question")));
    }

    #[test]
    fn rejects_reply_without_json() {
        let err = parse_qa_pair("Sorry, I cannot help with that.").unwrap_err();
        assert!(matches!(err, PipelineError::Malformed(_)));
    }

    #[test]
    fn rejects_unbalanced_object() {
        assert!(parse_qa_pair(r#"{"question": "Q""#).is_err());
    }

    #[test]
    fn parses_string_verdict() {
        let reply = r#"{"verdict": "Partially correct", "feedback": "Missed regularisation."}"#;
        let eval = parse_evaluation(reply).unwrap();
        assert_eq!(eval.verdict, "Partially correct");
        assert_eq!(eval.feedback, "Missed regularisation.");
    }

    #[test]
    fn parses_boolean_verdict() {
        let eval = parse_evaluation(r#"{"correct": false, "feedback": "Wrong formula."}"#).unwrap();
        assert_eq!(eval.verdict, "Incorrect");
    }

    #[test]
    fn evaluation_requires_feedback() {
        let err = parse_evaluation(r#"{"verdict": "Correct", "feedback": "   "}"#).unwrap_err();
        assert!(matches!(err, PipelineError::Malformed(_)));
    }
}
