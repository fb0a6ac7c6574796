use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::Settings;
use crate::error::TimelineError;
use crate::timeline::{proposals_from_value, RawSceneProposal};
use crate::transcription::{compact_words, WordTiming};

/// Word timings are cut to this many characters before going into the prompt.
const MAX_TIMINGS_CHARS: usize = 15_000;

const SYSTEM_PROMPT: &str = r#"You are an expert video director. Analyze the script and word timings to create a production plan.

Input:
1. Script.
2. Word timings as JSON, one [word, start_seconds, end_seconds] entry per word.

Output:
A JSON object with a 'scenes' list. Each scene:
- 'id': int
- 'text': the exact phrase spoken during the scene.
- 'start_time': float, seconds
- 'end_time': float, seconds
- 'visual_query': search query for stock footage or images.
- 'media_source': "pexels", "duckduckgo", or "pollinations".
  * "pexels" for high-quality stock footage and photos.
  * "duckduckgo" for specific real-world entities, famous places, or when stock footage might be missing.
  * "pollinations" for abstract, fantasy, or very specific generated art.
- 'image_prompt': detailed prompt when the source is "pollinations".

Return ONLY valid JSON. No markdown formatting."#;

static CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)\s*```").expect("valid fence regex"));

/// The reasoning service that turns a script and its word timings into
/// scene proposals.
#[async_trait]
pub trait ScenePlanner: Send + Sync {
    async fn propose_scenes(
        &self,
        script: &str,
        words: &[WordTiming],
    ) -> Result<Vec<RawSceneProposal>, TimelineError>;
}

// OpenAI-compatible chat completion response
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

pub struct PollinationsPlanner {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl PollinationsPlanner {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, TimelineError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(180))
            .build()
            .map_err(TimelineError::planner)?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            model: model.into(),
            api_key,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, TimelineError> {
        Self::new(
            settings.planner_endpoint.clone(),
            settings.planner_model.clone(),
            settings.pollinations_api_key.clone(),
        )
    }
}

#[async_trait]
impl ScenePlanner for PollinationsPlanner {
    async fn propose_scenes(
        &self,
        script: &str,
        words: &[WordTiming],
    ) -> Result<Vec<RawSceneProposal>, TimelineError> {
        let user_prompt = build_user_prompt(script, words);
        let request_body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": user_prompt}
            ]
        });

        info!(
            model = %self.model,
            words = words.len(),
            prompt_chars = user_prompt.len(),
            "requesting scene plan"
        );

        let mut request = self.client.post(&self.endpoint).json(&request_body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await.map_err(TimelineError::planner)?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(TimelineError::planner(format!(
                "HTTP {status}: {error_body}"
            )));
        }

        let chat: ChatResponse = response.json().await.map_err(TimelineError::planner)?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| TimelineError::planner("response carried no choices"))?;

        let proposals = parse_planner_reply(&content)?;
        info!(proposals = proposals.len(), "scene plan received");
        Ok(proposals)
    }
}

pub fn build_user_prompt(script: &str, words: &[WordTiming]) -> String {
    let timings = compact_words(words).to_string();
    let timings: String = if timings.chars().count() > MAX_TIMINGS_CHARS {
        debug!(chars = timings.len(), "truncating word timings for planner prompt");
        timings.chars().take(MAX_TIMINGS_CHARS).collect()
    } else {
        timings
    };
    format!("Script:\n{script}\n\nWord Timings:\n{timings}")
}

/// Pull the JSON document out of a model reply, tolerating a Markdown code fence.
pub fn extract_json_block(reply: &str) -> &str {
    match CODE_FENCE.captures(reply).and_then(|c| c.get(1)) {
        Some(body) => body.as_str(),
        None => reply.trim(),
    }
}

pub fn parse_planner_reply(reply: &str) -> Result<Vec<RawSceneProposal>, TimelineError> {
    let body = extract_json_block(reply);
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| TimelineError::planner(format!("reply is not JSON: {e}")))?;
    proposals_from_value(value).map_err(TimelineError::planner)
}
