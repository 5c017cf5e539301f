//! DeepSeek chat-completions client
//!
//! Plain OpenAI-compatible `/chat/completions` over `reqwest`. Credentials
//! and model name come from `DeepSeek_API_Key` / `DeepSeek_Model_Name`.

use serde::{Deserialize, Serialize};

use super::{ChatModel, LlmError};

/// Environment variable for the API key
pub const ENV_API_KEY: &str = "DeepSeek_API_Key";

/// Environment variable for the model name
pub const ENV_MODEL_NAME: &str = "DeepSeek_Model_Name";

const DEFAULT_BASE_URL: &str = "https://api.deepseek.com";
const DEFAULT_TEMPERATURE: f32 = 0.2;
const DEFAULT_MAX_TOKENS: u32 = 1024;
const REQUEST_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone)]
pub struct DeepSeekConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl DeepSeekConfig {
    /// Read key and model from the environment. Missing values are an
    /// unrecoverable init failure for the Enrich worker.
    pub fn from_env() -> Result<Self, LlmError> {
        let api_key = std::env::var(ENV_API_KEY)
            .map_err(|_| LlmError::Config(format!("{ENV_API_KEY} is not set")))?;
        let model = std::env::var(ENV_MODEL_NAME)
            .map_err(|_| LlmError::Config(format!("{ENV_MODEL_NAME} is not set")))?;
        Ok(Self {
            api_key,
            model,
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

pub struct DeepSeekClient {
    config: DeepSeekConfig,
    client: reqwest::Client,
}

impl DeepSeekClient {
    pub fn new(config: DeepSeekConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| LlmError::Connection(e.to_string()))?;
        tracing::debug!(model = %config.model, base_url = %config.base_url, "LLM client initialized");
        Ok(Self { config, client })
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait::async_trait]
impl ChatModel for DeepSeekClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            stream: false,
        };

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("HTTP {status}: {body}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| LlmError::Parse("response contained no choices".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DeepSeekConfig {
        DeepSeekConfig {
            api_key: "test-key".into(),
            model: "deepseek-chat".into(),
            base_url: "https://api.deepseek.com/".into(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    #[test]
    fn test_completions_url() {
        let client = DeepSeekClient::new(config()).unwrap();
        assert_eq!(
            client.completions_url(),
            "https://api.deepseek.com/chat/completions"
        );
    }

    #[test]
    fn test_chat_response_parsing() {
        let raw = r#"{
            "choices": [{"message": {"role": "assistant", "content": "{\"summary\":\"S\"}"}}]
        }"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices[0].message.content, "{\"summary\":\"S\"}");
    }
}
