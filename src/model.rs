//! Downstream model capability

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// System instruction used for forwarded requests.
pub const ASSISTANT_SYSTEM_INSTRUCTION: &str =
    "You are a helpful AI assistant. Please respond to the user's request.";

/// Keys probed, in order, when extracting a prompt from a structured
/// payload.
const PROMPT_KEYS: &[&str] = &["user_query", "prompt", "text", "input", "message", "content"];

/// One completion from the downstream model.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub tokens: u64,
}

/// Downstream generation capability.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn generate(&self, prompt: &str, system_instruction: &str) -> Result<Completion>;
}

/// Call the model, converting any error into a response text describing it
/// with zero usage. A model failure is never a hard failure of the
/// pipeline.
pub async fn generate_lenient(
    client: &dyn ModelClient,
    prompt: &str,
    system_instruction: &str,
) -> Completion {
    match client.generate(prompt, system_instruction).await {
        Ok(completion) => completion,
        Err(e) => {
            tracing::warn!(error = %e, "downstream model call failed");
            Completion {
                text: format!("Error generating model response: {}", e),
                tokens: 0,
            }
        }
    }
}

/// Extract the prompt from a payload by key probing; falls back to the
/// serialized payload itself.
pub fn extract_prompt(payload: &Value) -> String {
    if let Value::Object(map) = payload {
        for key in PROMPT_KEYS {
            if let Some(value) = map.get(*key) {
                return match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
            }
        }
    }
    if let Value::String(s) = payload {
        return s.clone();
    }
    serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use serde_json::json;

    struct EchoModel;

    #[async_trait]
    impl ModelClient for EchoModel {
        async fn generate(&self, prompt: &str, _system: &str) -> Result<Completion> {
            Ok(Completion {
                text: format!("echo: {}", prompt),
                tokens: (prompt.len() / 4) as u64,
            })
        }
    }

    struct DownModel;

    #[async_trait]
    impl ModelClient for DownModel {
        async fn generate(&self, _prompt: &str, _system: &str) -> Result<Completion> {
            Err(Error::Upstream("model timeout".to_string()))
        }
    }

    #[tokio::test]
    async fn test_lenient_passthrough() {
        let completion = generate_lenient(&EchoModel, "hi there", ASSISTANT_SYSTEM_INSTRUCTION).await;
        assert_eq!(completion.text, "echo: hi there");
        assert_eq!(completion.tokens, 2);
    }

    #[tokio::test]
    async fn test_lenient_converts_error_to_text() {
        let completion = generate_lenient(&DownModel, "hi", ASSISTANT_SYSTEM_INSTRUCTION).await;
        assert!(completion.text.contains("model timeout"));
        assert_eq!(completion.tokens, 0);
    }

    #[test]
    fn test_extract_prompt_probes_keys_in_order() {
        let payload = json!({"message": "from message", "content": "from content"});
        assert_eq!(extract_prompt(&payload), "from message");

        let payload = json!({"user_query": "from user_query", "message": "m"});
        assert_eq!(extract_prompt(&payload), "from user_query");
    }

    #[test]
    fn test_extract_prompt_bare_string() {
        assert_eq!(extract_prompt(&json!("just text")), "just text");
    }

    #[test]
    fn test_extract_prompt_falls_back_to_json() {
        let payload = json!({"records": [1, 2, 3]});
        let prompt = extract_prompt(&payload);
        assert!(prompt.contains("records"));
    }

    #[test]
    fn test_extract_prompt_non_string_value() {
        let payload = json!({"input": {"nested": true}});
        assert!(extract_prompt(&payload).contains("nested"));
    }
}
