//! LLM 모듈 - 텍스트 생성 클라이언트
//!
//! OpenAI 호환 chat completions API (기본: Groq)를 호출합니다.
//! 프롬프트 하나 → 생성 텍스트 하나. 재시도/스트리밍은 하지 않습니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let llm = GroqChat::from_env(&LlmConfig::default())?;
//! let answer = llm.generate("Summarize ...").await?;
//! ```

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;

/// API 키 환경변수
pub const API_KEY_ENV: &str = "GROQ_API_KEY";

// ============================================================================
// TextGenerator Trait
// ============================================================================

/// 텍스트 생성 트레이트
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// 프롬프트로 텍스트 생성
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// 모델 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Groq (OpenAI-compatible) Chat
// ============================================================================

/// OpenAI 호환 chat completions 클라이언트
#[derive(Debug)]
pub struct GroqChat {
    api_key: String,
    client: reqwest::Client,
    url: String,
    model: String,
}

impl GroqChat {
    /// 새 클라이언트 생성
    ///
    /// # Arguments
    /// * `api_key` - API 키
    /// * `config` - endpoint, model, timeout
    pub fn new(api_key: String, config: &LlmConfig) -> Result<Self> {
        if api_key.trim().is_empty() {
            anyhow::bail!("LLM API key is empty");
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        let url = format!("{}/chat/completions", config.endpoint.trim_end_matches('/'));

        Ok(Self {
            api_key,
            client,
            url,
            model: config.model.clone(),
        })
    }

    /// 환경변수에서 API 키를 읽어 생성
    pub fn from_env(config: &LlmConfig) -> Result<Self> {
        let api_key = get_api_key()?;
        let llm = Self::new(api_key, config)?;
        tracing::info!("LLM initialized: {}", llm.model);
        Ok(llm)
    }
}

/// chat completions 요청 본문
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// chat completions 응답
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// API 에러 응답
#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
    #[serde(default, rename = "type")]
    kind: String,
}

#[async_trait]
impl TextGenerator for GroqChat {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to send generation request")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<ApiError>(&body) {
                anyhow::bail!(
                    "LLM API error ({} {}): {}",
                    status,
                    error.error.kind,
                    error.error.message
                );
            }
            anyhow::bail!("LLM API error ({}): {}", status, body);
        }

        parse_chat_response(&body)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// 응답 본문에서 첫 번째 선택지 텍스트 추출
fn parse_chat_response(body: &str) -> Result<String> {
    let response: ChatResponse =
        serde_json::from_str(body).context("Failed to parse generation response")?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| anyhow::anyhow!("Generation response contained no content"))
}

// ============================================================================
// API Key Management
// ============================================================================

/// API 키 로드 (`GROQ_API_KEY`)
pub fn get_api_key() -> Result<String> {
    match std::env::var(API_KEY_ENV) {
        Ok(key) if !key.is_empty() => Ok(key),
        _ => anyhow::bail!(
            "API key not found. Set {} environment variable.\n\
             Get your API key at: https://console.groq.com/keys",
            API_KEY_ENV
        ),
    }
}

/// API 키 존재 여부 확인
pub fn has_api_key() -> bool {
    std::env::var(API_KEY_ENV)
        .map(|key| !key.is_empty())
        .unwrap_or(false)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat_response() {
        let body = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"A summary."}}]}"#;
        assert_eq!(parse_chat_response(body).unwrap(), "A summary.");
    }

    #[test]
    fn test_parse_chat_response_without_choices() {
        assert!(parse_chat_response(r#"{"choices":[]}"#).is_err());
        assert!(parse_chat_response("not json").is_err());
    }

    #[test]
    fn test_empty_key_rejected() {
        let result = GroqChat::new("  ".to_string(), &LlmConfig::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_url_from_endpoint() {
        let config = LlmConfig {
            endpoint: "http://localhost:8080/v1/".to_string(),
            ..Default::default()
        };
        let llm = GroqChat::new("key".to_string(), &config).unwrap();
        assert_eq!(llm.url, "http://localhost:8080/v1/chat/completions");
        assert_eq!(llm.name(), "openai/gpt-oss-120b");
    }
}
