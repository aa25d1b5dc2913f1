//! Prompt builder for the interview pipeline.
//!
//! Every builder method returns a **(system_msg, user_msg)** pair for an
//! OpenAI-compatible chat endpoint.  The replies that feed the session
//! engine are requested as bare JSON objects so [`crate::llm::parse`] can
//! turn them into typed values.

use std::fmt::Write as _;

use crate::llm::search::SearchHit;
use crate::session::Difficulty;

// ---------------------------------------------------------------------------
// System instructions
// ---------------------------------------------------------------------------

const SYSTEM_RESEARCHER: &str = "\
You are a company research specialist who prepares technical interviews.
You know how technology companies hire and which questions they ask for
each role and seniority level.";

const SYSTEM_QUESTION_PREPARER: &str = "\
You are an experienced technical interviewer.
You write challenging but fair questions that test both theory and practical
problem solving, and you provide detailed model answers.";

const SYSTEM_EVALUATOR: &str = "\
You are an experienced technical interviewer who grades candidate answers
against the expected solution.  You can tell whether an answer is technically
correct and complete.";

const SYSTEM_FOLLOW_UP: &str = "\
You are an experienced technical interviewer who asks meaningful follow-up
questions that dig deeper into the candidate's knowledge of a topic.";

/// Appended to every prompt whose reply must be a question/answer pair.
const QA_REPLY_FORMAT: &str = "\
Reply with ONLY a JSON object of the form
{\"question\": \"<the question>\", \"correct_answer\": \"<the model answer>\"}";

const EVALUATION_REPLY_FORMAT: &str = "\
Reply with ONLY a JSON object of the form
{\"verdict\": \"<Correct | Partially correct | Incorrect>\", \"feedback\": \"<key points hit or missed and a short explanation>\"}";

// ---------------------------------------------------------------------------
// PromptBuilder
// ---------------------------------------------------------------------------

/// Builds the chat prompts used by [`ApiPipeline`](crate::llm::ApiPipeline).
///
/// # Example
/// ```rust
/// use mock_interview::llm::PromptBuilder;
/// use mock_interview::session::Difficulty;
///
/// let builder = PromptBuilder::new();
/// let (_system, user) = builder.research("Google", "Data Scientist", Difficulty::Medium, &[]);
/// assert!(user.contains("Google"));
/// ```
#[derive(Debug, Default, Clone)]
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn new() -> Self {
        Self
    }

    /// First stage of question preparation: summarise the company's
    /// interview process, grounded in `findings` when a web search ran.
    pub fn research(
        &self,
        company_name: &str,
        role: &str,
        difficulty: Difficulty,
        findings: &[SearchHit],
    ) -> (String, String) {
        let mut user = format!(
            "Research {company_name} and gather information about:\n\
             1. Its technical interview process\n\
             2. Common interview questions for {role} positions at {difficulty} difficulty\n\
             3. Its technical stack and requirements\n\
             Provide a concise summary of your findings."
        );
        if !findings.is_empty() {
            user.push_str("\n\nWeb search results:\n");
            for hit in findings {
                let _ = writeln!(
                    user,
                    "- {} ({}): {}",
                    hit.title.trim(),
                    hit.link,
                    hit.snippet.trim()
                );
            }
        }
        (SYSTEM_RESEARCHER.to_string(), user)
    }

    /// Second stage of question preparation, fed with the research summary.
    pub fn prepare_question(&self, research: &str, difficulty: Difficulty) -> (String, String) {
        let user = format!(
            "Company research:\n{research}\n\n\
             Based on this research, create:\n\
             1. One technical question at {difficulty} difficulty that tests both theory and practice\n\
             2. A model answer that covers all the key points\n\
             The question must be challenging but fair for the {difficulty} level.\n\n\
             {QA_REPLY_FORMAT}"
        );
        (SYSTEM_QUESTION_PREPARER.to_string(), user)
    }

    pub fn evaluate(
        &self,
        question: &str,
        user_answer: &str,
        correct_answer: &str,
    ) -> (String, String) {
        let user = format!(
            "Evaluate whether the given answer is correct for the question.\n\
             Question: {question}\n\
             Answer: {user_answer}\n\
             Correct answer: {correct_answer}\n\n\
             Provide:\n\
             1. Whether the answer is correct\n\
             2. Key points that were right or missing\n\
             3. A brief explanation of why the answer is correct or incorrect\n\n\
             {EVALUATION_REPLY_FORMAT}"
        );
        (SYSTEM_EVALUATOR.to_string(), user)
    }

    pub fn follow_up(
        &self,
        question: &str,
        company_name: &str,
        role: &str,
        difficulty: Difficulty,
    ) -> (String, String) {
        let user = format!(
            "Based on the following context, create a relevant follow-up question:\n\
             Original question: {question}\n\
             Company: {company_name}\n\
             Role: {role}\n\
             Difficulty: {difficulty}\n\n\
             The follow-up question must:\n\
             1. Build on the original question\n\
             2. Test a deeper understanding of the topic\n\
             3. Fit the specified difficulty level\n\
             4. Be relevant to the company and role\n\n\
             {QA_REPLY_FORMAT}"
        );
        (SYSTEM_FOLLOW_UP.to_string(), user)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
