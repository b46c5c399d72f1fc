//! OpenAI chat-completions client backing the classification gate and framework scoring.
//!
//! Both calls use JSON mode and parse the single completion's message content. Failures are
//! reported as `meeting_ai::Error`; the classification gate decides what a failure means.

use super::backoff_policy;
use crate::error::Error;
use async_trait::async_trait;
use log::*;
use meeting_ai::traits::{analysis, classification};
use meeting_ai::{
    CallCategory, CallClassification, ClassificationRequest, ScoringRequest, ScoringResult,
};
use meeting_auth::api_key::{ApiKeyProvider, BearerTokenAuth};
use meeting_auth::http::{AuthenticatedClient, AuthenticatedClientBuilder};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use service::config::Config;
use std::sync::Arc;

const PROVIDER_ID: &str = "openai";

const CLASSIFIER_SYSTEM_PROMPT: &str = "You decide whether a recorded call is an authentic \
sales conversation between a sales rep and a prospect. Answer only with valid JSON.";

const SCORING_SYSTEM_PROMPT: &str = "You are a sales coach scoring a sales call against a \
three-pillar framework: genuine conversation, problem understanding, and solution provided. \
Score each pillar from 0 to 100 and give an overall weighted score. Answer only with valid JSON \
of the shape {\"overall_score\": number, \"framework_level_scores\": {\"genuine_conversation\": \
number, \"problem_understanding\": number, \"solution_provided\": number}, \"sentiment_score\": \
number, \"key_topics\": [string], \"wins\": [string], \"improvements\": [string], \
\"coaching_feedback\": string}.";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    response_format: Value,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// The classifier's JSON answer.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClassifierAnswer {
    is_sales_call: bool,
    #[serde(default)]
    call_type: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    rejection_reason: Option<String>,
}

impl From<ClassifierAnswer> for CallClassification {
    fn from(answer: ClassifierAnswer) -> Self {
        CallClassification {
            is_sales_call: answer.is_sales_call,
            call_type: answer
                .call_type
                .as_deref()
                .map(CallCategory::from_label)
                .unwrap_or_default(),
            confidence: answer.confidence.unwrap_or(0.5),
            reasoning: answer.reasoning.unwrap_or_default(),
            rejection_reason: answer.rejection_reason,
        }
        .normalized()
    }
}

/// The scorer's JSON answer. Everything else the model returns is kept in `analysis_data`.
#[derive(Debug, Deserialize)]
struct ScoringAnswer {
    overall_score: f64,
    #[serde(default)]
    sentiment_score: Option<f64>,
    #[serde(default)]
    key_topics: Vec<String>,
}

pub struct OpenAiClient {
    client: AuthenticatedClient,
    base_url: String,
    classifier_model: String,
    scoring_model: String,
}

impl OpenAiClient {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let api_key = config
            .openai_api_key()
            .ok_or_else(|| Error::config("OpenAI API key not configured"))?;
        let auth = BearerTokenAuth::new(ApiKeyProvider::OpenAi, SecretString::new(api_key));
        let client = AuthenticatedClientBuilder::new()
            .with_auth(Arc::new(auth))
            .with_backoff(backoff_policy(config))
            .build()?;

        Ok(Self {
            client,
            base_url: config.openai_base_url().trim_end_matches('/').to_string(),
            classifier_model: config.classifier_model.clone(),
            scoring_model: config.scoring_model.clone(),
        })
    }

    /// Sends a JSON-mode chat completion and returns the parsed message content and the model that answered.
    async fn complete_json(
        &self,
        request: ChatRequest<'_>,
    ) -> Result<(Value, String), meeting_ai::Error> {
        let url = format!("{}/chat/completions", self.base_url);
        let model = request.model.to_string();
        let response = self.client.send(self.client.post(&url).json(&request)).await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("OpenAI API error ({status}): {body}");
            return Err(match status.as_u16() {
                401 | 403 => meeting_ai::Error::Authentication(body),
                404 => meeting_ai::Error::NotFound(body),
                _ => meeting_ai::Error::Provider(format!("{status}: {body}")),
            });
        }

        let completion: ChatResponse = response
            .json()
            .await
            .map_err(|e| meeting_ai::Error::Deserialization(e.to_string()))?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| meeting_ai::Error::Provider("Completion had no content".to_string()))?;

        Ok((
            serde_json::from_str(&content)?,
            completion.model.unwrap_or(model),
        ))
    }
}

fn scoring_user_message(request: &ScoringRequest) -> String {
    let mut message = format!("# SALES CALL TRANSCRIPT: {}\n\n", request.meeting_title);
    if let Some(rep_name) = &request.rep_name {
        message.push_str(&format!("Sales rep: {rep_name}\n"));
    }
    message.push_str(&format!(
        "Date: {}\nDuration: {} minutes\n\n{}",
        request.call_date.format("%Y-%m-%d"),
        (request.duration_seconds as f64 / 60.0).round(),
        request.transcript
    ));
    message
}

#[async_trait]
impl classification::Provider for OpenAiClient {
    async fn classify(
        &self,
        request: ClassificationRequest,
    ) -> Result<CallClassification, meeting_ai::Error> {
        let content = format!(
            "Participants: {}\nTranscript ({} characters):\n\"\"\"\n{}\n\"\"\"\n\n\
             Answer with {{\"isSalesCall\": bool, \"callType\": \
             \"sales_call|team_meeting|demo|support|development|stand_up|unknown\", \
             \"confidence\": number, \"reasoning\": string, \"rejectionReason\": string}}. \
             A call with a single participant is never a sales call.",
            request.participant_count,
            request.transcript.chars().count(),
            request.transcript
        );
        let chat = ChatRequest {
            model: &self.classifier_model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: CLASSIFIER_SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content,
                },
            ],
            temperature: 0.3,
            max_tokens: 1200,
            response_format: json!({ "type": "json_object" }),
        };

        let (answer, _model) = self.complete_json(chat).await?;
        let answer: ClassifierAnswer = serde_json::from_value(answer)?;
        Ok(answer.into())
    }

    fn provider_id(&self) -> &str {
        PROVIDER_ID
    }
}

#[async_trait]
impl analysis::Provider for OpenAiClient {
    async fn score(&self, request: ScoringRequest) -> Result<ScoringResult, meeting_ai::Error> {
        debug!("Scoring call {} with {}", request.external_call_id, self.scoring_model);
        let chat = ChatRequest {
            model: &self.scoring_model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SCORING_SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: scoring_user_message(&request),
                },
            ],
            temperature: 0.3,
            max_tokens: 3000,
            response_format: json!({ "type": "json_object" }),
        };

        let (mut data, model) = self.complete_json(chat).await?;
        let answer: ScoringAnswer = serde_json::from_value(data.clone())?;
        if let Value::Object(fields) = &mut data {
            fields.insert("model".to_string(), Value::String(model));
        }

        Ok(ScoringResult {
            framework_score: answer.overall_score.round() as i32,
            sentiment_score: answer.sentiment_score.map(|score| score.round() as i32),
            key_topics: answer.key_topics,
            analysis_data: data,
        })
    }

    fn provider_id(&self) -> &str {
        PROVIDER_ID
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use meeting_ai::traits::analysis::Provider as _;
    use meeting_ai::traits::classification::Provider as _;
    use mockito::{Matcher, Server};

    fn test_config(base_url: &str) -> Config {
        let mut config = Config::from_defaults()
            .set_openai_api_key("sk-test")
            .set_openai_base_url(base_url);
        config.retry_initial_delay_ms = 1;
        config.retry_max_delay_ms = 5;
        config
    }

    fn completion(content: Value) -> String {
        json!({
            "model": "gpt-4o-2024-08-06",
            "choices": [{ "message": { "role": "assistant", "content": content.to_string() } }]
        })
        .to_string()
    }

    #[tokio::test]
    async fn classify_parses_json_mode_answer() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::PartialJson(json!({
                "model": "gpt-4o-mini",
                "response_format": { "type": "json_object" }
            })))
            .with_status(200)
            .with_body(completion(json!({
                "isSalesCall": false,
                "callType": "stand_up",
                "confidence": 0.92,
                "reasoning": "Daily engineering standup"
            })))
            .create_async()
            .await;

        let client = OpenAiClient::new(&test_config(&server.url())).unwrap();
        let verdict = client
            .classify(ClassificationRequest {
                transcript: "Yesterday I fixed the deploy".to_string(),
                participant_count: 3,
            })
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(!verdict.is_sales_call);
        assert_eq!(verdict.call_type, CallCategory::StandUp);
        assert_eq!(
            verdict.rejection_reason.as_deref(),
            Some("Daily engineering standup")
        );
    }

    #[tokio::test]
    async fn classify_rejects_non_json_content() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(
                json!({ "choices": [{ "message": { "content": "definitely a sales call" } }] })
                    .to_string(),
            )
            .create_async()
            .await;

        let client = OpenAiClient::new(&test_config(&server.url())).unwrap();
        let result = client
            .classify(ClassificationRequest {
                transcript: "hello".to_string(),
                participant_count: 2,
            })
            .await;

        assert!(matches!(result, Err(meeting_ai::Error::Deserialization(_))));
    }

    #[tokio::test]
    async fn score_keeps_full_answer_in_analysis_data() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .match_body(Matcher::PartialJson(json!({ "model": "gpt-4o" })))
            .with_status(200)
            .with_body(completion(json!({
                "overall_score": 72.6,
                "framework_level_scores": {
                    "genuine_conversation": 80,
                    "problem_understanding": 70,
                    "solution_provided": 65
                },
                "key_topics": ["pricing", "timeline"],
                "coaching_feedback": "Dig deeper into the current situation"
            })))
            .create_async()
            .await;

        let client = OpenAiClient::new(&test_config(&server.url())).unwrap();
        let result = client
            .score(ScoringRequest {
                external_call_id: "abc-1".to_string(),
                meeting_title: "Discovery".to_string(),
                transcript: "a".repeat(3000),
                rep_name: Some("Jane".to_string()),
                call_date: Utc::now(),
                duration_seconds: 1800,
            })
            .await
            .unwrap();

        assert_eq!(result.framework_score, 73);
        assert_eq!(result.sentiment_score, None);
        assert_eq!(result.sentiment_or_derived(), 80);
        assert_eq!(result.key_topics, vec!["pricing", "timeline"]);
        assert_eq!(
            result.analysis_data["framework_level_scores"]["genuine_conversation"],
            80
        );
        assert_eq!(result.analysis_data["model"], "gpt-4o-2024-08-06");
    }

    #[tokio::test]
    async fn score_surfaces_exhausted_rate_limit() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .expect(4)
            .create_async()
            .await;

        let client = OpenAiClient::new(&test_config(&server.url())).unwrap();
        let result = client
            .score(ScoringRequest {
                external_call_id: "abc-1".to_string(),
                meeting_title: "Discovery".to_string(),
                transcript: "transcript".to_string(),
                rep_name: None,
                call_date: Utc::now(),
                duration_seconds: 60,
            })
            .await;

        mock.assert_async().await;
        assert!(matches!(result, Err(meeting_ai::Error::RateLimited { .. })));
    }
}
