//! Core `PipelineClient` trait and the `ApiPipeline` implementation.
//!
//! `ApiPipeline` calls any OpenAI-compatible `/v1/chat/completions` endpoint
//! (Ollama in OpenAI mode, OpenAI, Groq, LM Studio, vLLM).
//! All connection details come from [`LlmConfig`]; nothing is hardcoded.

use async_trait::async_trait;
use thiserror::Error;

use crate::config::LlmConfig;
use crate::llm::parse::{parse_evaluation, parse_qa_pair};
use crate::llm::prompt::PromptBuilder;
use crate::llm::search::{research_query, WebSearch};
use crate::session::{Difficulty, EvaluationResult, QuestionAnswerPair};

// ---------------------------------------------------------------------------
// PipelineError
// ---------------------------------------------------------------------------

/// Errors returned by question / evaluation / follow-up generation.
///
/// `Clone` so a failed prefetch can be stored in its handle and reported
/// later.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("generation request timed out")]
    Timeout,

    /// The endpoint answered with a non-success status code.
    #[error("generation service returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The reply could not be parsed into the expected structure.
    #[error("malformed generation result: {0}")]
    Malformed(String),

    /// The model returned a reply with no usable text content.
    #[error("generation service returned an empty response")]
    EmptyResponse,
}

impl From<reqwest::Error> for PipelineError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            PipelineError::Timeout
        } else {
            PipelineError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// PipelineClient trait
// ---------------------------------------------------------------------------

/// The generation service behind an interview.
///
/// Implementors are stateless service handles: they must be `Send + Sync`
/// so one instance can be shared (`Arc<dyn PipelineClient>`) by any number
/// of sessions and by the background prefetch task.  Everything that varies
/// per interview is passed explicitly on each call.
#[async_trait]
pub trait PipelineClient: Send + Sync {
    /// Produce the opening question (and its model answer) for a session.
    async fn prepare_question(
        &self,
        company_name: &str,
        role: &str,
        difficulty: Difficulty,
    ) -> Result<QuestionAnswerPair, PipelineError>;

    /// Judge `user_answer` against the model answer.
    async fn evaluate(
        &self,
        question: &str,
        user_answer: &str,
        correct_answer: &str,
    ) -> Result<EvaluationResult, PipelineError>;

    /// Produce a follow-up question that digs deeper into `question`.
    async fn follow_up(
        &self,
        question: &str,
        company_name: &str,
        role: &str,
        difficulty: Difficulty,
    ) -> Result<QuestionAnswerPair, PipelineError>;
}

// ---------------------------------------------------------------------------
// ApiPipeline
// ---------------------------------------------------------------------------

/// Calls an OpenAI-compatible `/v1/chat/completions` endpoint.
///
/// # No hardcoded URLs
/// All connection details (`base_url`, `api_key`, `model`) come exclusively
/// from the [`LlmConfig`] passed to [`ApiPipeline::from_config`].
///
/// When `search_api_key` is set, company research is grounded in a web
/// search first; a failed search is logged and research continues without
/// it.
pub struct ApiPipeline {
    client: reqwest::Client,
    config: LlmConfig,
    prompts: PromptBuilder,
    search: Option<WebSearch>,
}

impl ApiPipeline {
    /// Build an `ApiPipeline` from application config.
    ///
    /// The HTTP client carries the per-request timeout from
    /// `config.timeout_secs`.  A default client is used as a last resort if
    /// the builder fails.
    pub fn from_config(config: &LlmConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            search: WebSearch::from_config(config, client.clone()),
            client,
            config: config.clone(),
            prompts: PromptBuilder::new(),
        }
    }

    /// `true` when company research runs a web search first.
    pub fn has_web_search(&self) -> bool {
        self.search.is_some()
    }

    /// Send one system + user exchange and return the trimmed reply text.
    ///
    /// The `Authorization: Bearer …` header is attached **only** when
    /// `config.api_key` is a non-empty string, so local providers work
    /// without authentication.
    async fn chat(&self, system_msg: &str, user_msg: &str) -> Result<String, PipelineError> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let body = serde_json::json!({
            "model":       self.config.model,
            "messages": [
                { "role": "system", "content": system_msg },
                { "role": "user",   "content": user_msg   }
            ],
            "stream":      false,
            "temperature": self.config.temperature,
            "max_tokens":  self.config.max_tokens
        });

        let mut req = self.client.post(&url).json(&body);

        let key = self.config.api_key.as_deref().unwrap_or("");
        if !key.is_empty() {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PipelineError::Status {
                status: status.as_u16(),
                message: message.chars().take(200).collect(),
            });
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| PipelineError::Malformed(e.to_string()))?;

        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or(PipelineError::EmptyResponse)?
            .trim()
            .to_string();

        if content.is_empty() {
            return Err(PipelineError::EmptyResponse);
        }

        Ok(content)
    }
}

#[async_trait]
impl PipelineClient for ApiPipeline {
    /// Research the company first, then prepare a question from that
    /// research summary.
    async fn prepare_question(
        &self,
        company_name: &str,
        role: &str,
        difficulty: Difficulty,
    ) -> Result<QuestionAnswerPair, PipelineError> {
        let findings = match &self.search {
            Some(search) => {
                let query = research_query(company_name, role, difficulty);
                match search.search(&query).await {
                    Ok(hits) => {
                        log::debug!("pipeline: web search returned {} results", hits.len());
                        hits
                    }
                    Err(e) => {
                        log::warn!("pipeline: web search failed, researching without it: {e}");
                        Vec::new()
                    }
                }
            }
            None => Vec::new(),
        };

        let (system, user) = self
            .prompts
            .research(company_name, role, difficulty, &findings);
        let research = self.chat(&system, &user).await?;
        log::debug!(
            "pipeline: company research for {company_name} done ({} chars)",
            research.len()
        );

        let (system, user) = self.prompts.prepare_question(&research, difficulty);
        let reply = self.chat(&system, &user).await?;
        parse_qa_pair(&reply)
    }

    async fn evaluate(
        &self,
        question: &str,
        user_answer: &str,
        correct_answer: &str,
    ) -> Result<EvaluationResult, PipelineError> {
        let (system, user) = self.prompts.evaluate(question, user_answer, correct_answer);
        let reply = self.chat(&system, &user).await?;
        parse_evaluation(&reply)
    }

    async fn follow_up(
        &self,
        question: &str,
        company_name: &str,
        role: &str,
        difficulty: Difficulty,
    ) -> Result<QuestionAnswerPair, PipelineError> {
        let (system, user) = self
            .prompts
            .follow_up(question, company_name, role, difficulty);
        let reply = self.chat(&system, &user).await?;
        parse_qa_pair(&reply)
    }
}

// ---------------------------------------------------------------------------
// ScriptedPipeline  (test-only)
// ---------------------------------------------------------------------------

/// How a scripted follow-up call behaves.
#[cfg(test)]
pub enum ScriptedReply {
    /// Resolve immediately.
    Ready(QuestionAnswerPair),
    /// Fail immediately.
    Fail(PipelineError),
    /// Never resolve.
    Never,
    /// Resolve once the gate is notified.
    Gated(std::sync::Arc<tokio::sync::Notify>, QuestionAnswerPair),
}

/// A test double that replays queued replies in call order and records the
/// arguments of every call.
///
/// An exhausted question or evaluation queue yields
/// `PipelineError::EmptyResponse`; an exhausted follow-up queue behaves like
/// [`ScriptedReply::Never`].
#[cfg(test)]
#[derive(Default)]
pub struct ScriptedPipeline {
    questions: Queue<Result<QuestionAnswerPair, PipelineError>>,
    evaluations: Queue<Result<EvaluationResult, PipelineError>>,
    follow_ups: Queue<ScriptedReply>,
    question_calls: std::sync::Mutex<Vec<(String, String, Difficulty)>>,
    evaluation_calls: std::sync::Mutex<Vec<(String, String, String)>>,
    follow_up_questions: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
type Queue<T> = std::sync::Mutex<std::collections::VecDeque<T>>;

#[cfg(test)]
impl ScriptedPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn question(self, reply: Result<QuestionAnswerPair, PipelineError>) -> Self {
        self.questions.lock().unwrap().push_back(reply);
        self
    }

    pub fn evaluation(self, reply: Result<EvaluationResult, PipelineError>) -> Self {
        self.evaluations.lock().unwrap().push_back(reply);
        self
    }

    pub fn follow_up(self, reply: ScriptedReply) -> Self {
        self.follow_ups.lock().unwrap().push_back(reply);
        self
    }

    /// `(company_name, role, difficulty)` of every question call so far.
    pub fn question_calls(&self) -> Vec<(String, String, Difficulty)> {
        self.question_calls.lock().unwrap().clone()
    }

    /// `(question, user_answer, correct_answer)` of every evaluation so far.
    pub fn evaluation_calls(&self) -> Vec<(String, String, String)> {
        self.evaluation_calls.lock().unwrap().clone()
    }

    /// The `question` argument of every follow-up call so far, in order.
    pub fn follow_up_questions(&self) -> Vec<String> {
        self.follow_up_questions.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl PipelineClient for ScriptedPipeline {
    async fn prepare_question(
        &self,
        company_name: &str,
        role: &str,
        difficulty: Difficulty,
    ) -> Result<QuestionAnswerPair, PipelineError> {
        self.question_calls
            .lock()
            .unwrap()
            .push((company_name.to_string(), role.to_string(), difficulty));
        let reply = self.questions.lock().unwrap().pop_front();
        reply.unwrap_or(Err(PipelineError::EmptyResponse))
    }

    async fn evaluate(
        &self,
        question: &str,
        user_answer: &str,
        correct_answer: &str,
    ) -> Result<EvaluationResult, PipelineError> {
        self.evaluation_calls.lock().unwrap().push((
            question.to_string(),
            user_answer.to_string(),
            correct_answer.to_string(),
        ));
        let reply = self.evaluations.lock().unwrap().pop_front();
        reply.unwrap_or(Err(PipelineError::EmptyResponse))
    }

    async fn follow_up(
        &self,
        question: &str,
        _company_name: &str,
        _role: &str,
        _difficulty: Difficulty,
    ) -> Result<QuestionAnswerPair, PipelineError> {
        self.follow_up_questions.lock().unwrap().push(question.to_string());
        let reply = self.follow_ups.lock().unwrap().pop_front();
        match reply.unwrap_or(ScriptedReply::Never) {
            ScriptedReply::Ready(qa) => Ok(qa),
            ScriptedReply::Fail(e) => Err(e),
            ScriptedReply::Never => std::future::pending().await,
            ScriptedReply::Gated(gate, qa) => {
                gate.notified().await;
                Ok(qa)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn make_config(api_key: Option<&str>) -> LlmConfig {
        LlmConfig {
            api_key: api_key.map(|s| s.to_string()),
            ..LlmConfig::default()
        }
    }

    #[test]
    fn from_config_builds_without_panic() {
        let _pipeline = ApiPipeline::from_config(&make_config(None));
    }

    #[test]
    fn from_config_accepts_empty_api_key() {
        let _pipeline = ApiPipeline::from_config(&make_config(Some("")));
    }

    /// `ApiPipeline` must be usable as `dyn PipelineClient`.
    #[test]
    fn pipeline_is_object_safe() {
        let pipeline: Box<dyn PipelineClient> =
            Box::new(ApiPipeline::from_config(&make_config(Some("sk-test"))));
        drop(pipeline);
    }

    #[test]
    fn status_error_display_includes_code() {
        let e = PipelineError::Status {
            status: 429,
            message: "rate limited".into(),
        };
        let text = e.to_string();
        assert!(text.contains("429"));
        assert!(text.contains("rate limited"));
    }

    /// Nothing listens on port 9 (discard); the call must surface as an
    /// error rather than hang or panic.
    #[tokio::test]
    async fn unreachable_endpoint_is_a_pipeline_error() {
        let config = LlmConfig {
            base_url: "http://127.0.0.1:9".into(),
            timeout_secs: 2,
            ..LlmConfig::default()
        };
        let pipeline = ApiPipeline::from_config(&config);
        let result = pipeline
            .evaluate("What is overfitting?", "no idea", "memorising noise")
            .await;
        assert!(matches!(
            result,
            Err(PipelineError::Request(_)) | Err(PipelineError::Timeout)
        ));
    }

    // -----------------------------------------------------------------------
    // HTTP path (mock server)
    // -----------------------------------------------------------------------

    fn chat_reply(content: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [ { "message": { "role": "assistant", "content": content } } ]
        }))
    }

    fn server_config(server: &MockServer, api_key: Option<&str>) -> LlmConfig {
        LlmConfig {
            base_url: format!("{}/", server.uri()),
            api_key: api_key.map(str::to_string),
            timeout_secs: 5,
            ..LlmConfig::default()
        }
    }

    async fn authorization_headers(server: &MockServer) -> Vec<Option<String>> {
        server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .map(|req| {
                req.headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
            })
            .collect()
    }

    #[tokio::test]
    async fn prepare_question_researches_then_asks_for_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_string_contains("Research Acme"))
            .respond_with(chat_reply("Acme runs four rounds and loves Spark."))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_string_contains("Acme runs four rounds and loves Spark."))
            .and(body_string_contains("correct_answer"))
            .respond_with(chat_reply(concat!(
                "```json\n",
                r#"{"question": "Explain Spark shuffles", "#,
                r#""correct_answer": "Data moves between stages"}"#,
                "\n```"
            )))
            .expect(1)
            .mount(&server)
            .await;

        let pipeline = ApiPipeline::from_config(&server_config(&server, None));
        let qa = pipeline
            .prepare_question("Acme", "Data Engineer", Difficulty::Medium)
            .await
            .unwrap();

        assert_eq!(qa.question, "Explain Spark shuffles");
        assert_eq!(qa.correct_answer, "Data moves between stages");
        assert!(!pipeline.has_web_search());
    }

    #[tokio::test]
    async fn bearer_header_only_with_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(chat_reply(r#"{"verdict": "Correct", "feedback": "Good."}"#))
            .mount(&server)
            .await;

        let keyed = ApiPipeline::from_config(&server_config(&server, Some("sk-test")));
        keyed.evaluate("Q", "A", "A").await.unwrap();
        let anonymous = ApiPipeline::from_config(&server_config(&server, Some("")));
        anonymous.evaluate("Q", "A", "A").await.unwrap();

        assert_eq!(
            authorization_headers(&server).await,
            [Some("Bearer sk-test".to_string()), None]
        );
    }

    #[tokio::test]
    async fn reply_content_is_read_from_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [
                    {
                        "message": {
                            "content": r#"  {"verdict": false, "feedback": "Missed it."}  "#
                        }
                    },
                    { "message": { "content": r#"{"verdict": true, "feedback": "ignored"}"# } }
                ]
            })))
            .mount(&server)
            .await;

        let pipeline = ApiPipeline::from_config(&server_config(&server, None));
        let eval = pipeline.evaluate("Q", "A", "B").await.unwrap();

        assert_eq!(eval.verdict, "Incorrect");
        assert_eq!(eval.feedback, "Missed it.");
    }

    #[tokio::test]
    async fn non_success_status_maps_to_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(503).set_body_string("x".repeat(500)))
            .mount(&server)
            .await;

        let pipeline = ApiPipeline::from_config(&server_config(&server, None));
        let err = pipeline
            .follow_up("Q", "Acme", "Data Engineer", Difficulty::Easy)
            .await
            .unwrap_err();

        match err {
            PipelineError::Status { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message.len(), 200);
            }
            other => panic!("expected Status, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn blank_or_missing_content_is_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(chat_reply("   \n "))
            .mount(&server)
            .await;

        let pipeline = ApiPipeline::from_config(&server_config(&server, None));
        let err = pipeline.evaluate("Q", "A", "B").await.unwrap_err();
        assert!(matches!(err, PipelineError::EmptyResponse));

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })),
            )
            .mount(&server)
            .await;

        let pipeline = ApiPipeline::from_config(&server_config(&server, None));
        let err = pipeline.evaluate("Q", "A", "B").await.unwrap_err();
        assert!(matches!(err, PipelineError::EmptyResponse));
    }

    #[tokio::test]
    async fn research_is_grounded_in_search_results() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "organic": [{
                    "title": "Acme hiring",
                    "link": "https://acme.example/jobs",
                    "snippet": "Acme asks about Kafka."
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_string_contains("Acme asks about Kafka."))
            .respond_with(chat_reply("Acme focuses on streaming."))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_string_contains("Acme focuses on streaming."))
            .respond_with(chat_reply(
                r#"{"question": "Explain Kafka offsets", "correct_answer": "Positions"}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let config = LlmConfig {
            search_api_key: Some("serper-key".into()),
            search_url: server.uri(),
            ..server_config(&server, None)
        };
        let pipeline = ApiPipeline::from_config(&config);
        assert!(pipeline.has_web_search());

        let qa = pipeline
            .prepare_question("Acme", "Data Engineer", Difficulty::Hard)
            .await
            .unwrap();
        assert_eq!(qa.question, "Explain Kafka offsets");
    }

    #[tokio::test]
    async fn failed_search_does_not_block_research() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_string_contains("Research Acme"))
            .respond_with(chat_reply("General knowledge only."))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_string_contains("General knowledge only."))
            .respond_with(chat_reply(r#"{"question": "Q", "correct_answer": "A"}"#))
            .mount(&server)
            .await;

        let config = LlmConfig {
            search_api_key: Some("serper-key".into()),
            search_url: server.uri(),
            ..server_config(&server, None)
        };
        let qa = ApiPipeline::from_config(&config)
            .prepare_question("Acme", "Data Engineer", Difficulty::Easy)
            .await
            .unwrap();
        assert_eq!(qa, QuestionAnswerPair::new("Q", "A"));
    }
}
