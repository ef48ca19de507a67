use url::Url;

use crate::error::ChatApiError;

/// Default base URL for chat completion requests.
pub const DEFAULT_CHAT_BASE_URL: &str = "https://api.openai.com/v1";

/// Normalize a base URL for OpenAI-compatible endpoints.
///
/// Normalization rules:
/// 1) blank input falls back to the default base
/// 2) trailing slashes are dropped
/// 3) a `/v1` suffix is appended when missing
#[must_use]
pub fn normalize_chat_base_url(input: &str) -> String {
    let base = if input.trim().is_empty() {
        DEFAULT_CHAT_BASE_URL
    } else {
        input.trim()
    };

    let trimmed = base.trim_end_matches('/');
    if trimmed.ends_with("/v1") {
        return trimmed.to_string();
    }
    format!("{trimmed}/v1")
}

/// Resolve the streaming completions endpoint for a base URL.
pub fn completions_url(base_url: &str) -> Result<String, ChatApiError> {
    join_endpoint(base_url, "chat/completions")
}

/// Resolve the model listing endpoint for a base URL.
pub fn models_url(base_url: &str) -> Result<String, ChatApiError> {
    join_endpoint(base_url, "models")
}

fn join_endpoint(base_url: &str, endpoint: &str) -> Result<String, ChatApiError> {
    let normalized = normalize_chat_base_url(base_url);
    let base = Url::parse(&format!("{normalized}/"))
        .map_err(|error| ChatApiError::InvalidBaseUrl(format!("{normalized}: {error}")))?;
    let joined = base
        .join(endpoint)
        .map_err(|error| ChatApiError::InvalidBaseUrl(format!("{normalized}/{endpoint}: {error}")))?;

    Ok(joined.to_string())
}

#[cfg(test)]
mod tests {
    use super::{completions_url, models_url, normalize_chat_base_url, DEFAULT_CHAT_BASE_URL};

    #[test]
    fn blank_base_url_falls_back_to_default() {
        assert_eq!(normalize_chat_base_url(""), DEFAULT_CHAT_BASE_URL);
        assert_eq!(normalize_chat_base_url("   "), DEFAULT_CHAT_BASE_URL);
    }

    #[test]
    fn v1_suffix_is_appended_once() {
        assert_eq!(
            normalize_chat_base_url("http://localhost:11434"),
            "http://localhost:11434/v1"
        );
        assert_eq!(
            normalize_chat_base_url("http://localhost:11434/v1/"),
            "http://localhost:11434/v1"
        );
    }

    #[test]
    fn endpoints_join_under_normalized_base() {
        let completions =
            completions_url("https://api.openai.com").expect("completions url should resolve");
        assert_eq!(completions, "https://api.openai.com/v1/chat/completions");

        let models = models_url("http://localhost:11434/v1").expect("models url should resolve");
        assert_eq!(models, "http://localhost:11434/v1/models");
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(completions_url("not a url").is_err());
    }
}
