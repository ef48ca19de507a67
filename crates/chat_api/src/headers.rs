use std::collections::BTreeMap;

use crate::config::ChatApiConfig;

pub const HEADER_ACCEPT: &str = "accept";
pub const HEADER_CONTENT_TYPE: &str = "content-type";
pub const HEADER_AUTHORIZATION: &str = "authorization";
pub const HEADER_ORGANIZATION: &str = "OpenAI-Organization";
pub const HEADER_USER_AGENT: &str = "User-Agent";

/// Build a deterministic header map for chat transport requests.
#[must_use]
pub fn build_headers(config: &ChatApiConfig, user_agent: Option<&str>) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();

    if let Some(api_key) = config.api_key.as_deref().map(str::trim) {
        if !api_key.is_empty() {
            headers.insert(HEADER_AUTHORIZATION.to_owned(), format!("Bearer {api_key}"));
        }
    }

    if let Some(organization) = config.organization.as_deref().map(str::trim) {
        if !organization.is_empty() {
            headers.insert(HEADER_ORGANIZATION.to_owned(), organization.to_owned());
        }
    }

    headers.insert(HEADER_ACCEPT.to_owned(), "text/event-stream".to_owned());
    headers.insert(
        HEADER_CONTENT_TYPE.to_owned(),
        "application/json".to_owned(),
    );

    let ua = match (user_agent, config.user_agent.as_deref()) {
        (Some(explicit), _) if !explicit.trim().is_empty() => explicit.trim().to_owned(),
        (None, Some(explicit)) if !explicit.trim().is_empty() => explicit.trim().to_owned(),
        _ => default_user_agent(),
    };
    headers.insert(HEADER_USER_AGENT.to_owned(), ua);

    for (key, value) in &config.extra_headers {
        headers.insert(key.trim().to_owned(), value.trim().to_owned());
    }

    headers
}

fn default_user_agent() -> String {
    format!("murmur/{}", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::{build_headers, HEADER_AUTHORIZATION, HEADER_ORGANIZATION, HEADER_USER_AGENT};
    use crate::config::ChatApiConfig;

    #[test]
    fn bearer_token_is_sent_only_when_configured() {
        let anonymous = build_headers(&ChatApiConfig::new(), None);
        assert!(!anonymous.contains_key(HEADER_AUTHORIZATION));

        let authorized = build_headers(&ChatApiConfig::new().with_api_key(" sk-test "), None);
        assert_eq!(
            authorized.get(HEADER_AUTHORIZATION).map(String::as_str),
            Some("Bearer sk-test")
        );
    }

    #[test]
    fn organization_header_skips_blank_values() {
        let config = ChatApiConfig::new().with_organization("   ");
        assert!(!build_headers(&config, None).contains_key(HEADER_ORGANIZATION));

        let config = ChatApiConfig::new().with_organization("org-1");
        assert_eq!(
            build_headers(&config, None)
                .get(HEADER_ORGANIZATION)
                .map(String::as_str),
            Some("org-1")
        );
    }

    #[test]
    fn explicit_user_agent_overrides_config_and_default() {
        let config = ChatApiConfig::new().with_user_agent("configured/1");
        let headers = build_headers(&config, Some("explicit/2"));
        assert_eq!(
            headers.get(HEADER_USER_AGENT).map(String::as_str),
            Some("explicit/2")
        );

        let headers = build_headers(&config, None);
        assert_eq!(
            headers.get(HEADER_USER_AGENT).map(String::as_str),
            Some("configured/1")
        );
    }

    #[test]
    fn extra_headers_are_merged_last() {
        let config = ChatApiConfig::new().insert_header("x-request-tag", " replay ");
        let headers = build_headers(&config, None);
        assert_eq!(
            headers.get("x-request-tag").map(String::as_str),
            Some("replay")
        );
    }
}
