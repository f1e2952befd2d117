//! Deterministic offline model provider.
//!
//! Bound when no API key is configured. Replies are derived purely from the
//! input so that offline behavior is reproducible; schema-bound calls return
//! `parsed: None`, which callers treat as "use the domain default".

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use stockyard_core::{ModelClient, ModelError, ModelMessage, ModelOutput};

/// Offline stand-in for a real model binding.
#[derive(Debug, Clone, Default)]
pub struct FallbackModel;

#[async_trait]
impl ModelClient for FallbackModel {
    async fn run(
        &self,
        _model: &str,
        messages: &[ModelMessage],
        response_schema: Option<&JsonValue>,
    ) -> Result<ModelOutput, ModelError> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
            .unwrap_or("");

        let text = if response_schema.is_some() {
            // No generation capability offline; the caller substitutes its
            // deterministic domain default when `parsed` is absent.
            String::new()
        } else if last_user.is_empty() {
            "I'm the offline assistant. Ask me about stock levels or alerts.".to_string()
        } else {
            format!(
                "I'm running without a model binding, so I can only run local \
                 lookups. You asked: \"{}\". Try \"check stock of <sku>\" or \
                 \"show alerts\".",
                truncate(last_user, 120)
            )
        };

        Ok(ModelOutput { parsed: None, text })
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fallback_is_deterministic() {
        let model = FallbackModel;
        let messages = vec![ModelMessage::user("hello")];
        let a = model.run("any", &messages, None).await.unwrap();
        let b = model.run("any", &messages, None).await.unwrap();
        assert_eq!(a, b);
        assert!(a.text.contains("hello"));
    }

    #[tokio::test]
    async fn test_schema_calls_return_unparsed() {
        let model = FallbackModel;
        let schema = serde_json::json!({"type": "object"});
        let out = model
            .run("any", &[ModelMessage::user("analyze")], Some(&schema))
            .await
            .unwrap();
        assert!(out.parsed.is_none());
    }
}
