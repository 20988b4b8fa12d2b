use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse cause of a failed batch item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureCategory {
    Timeout,
    Quota,
    ContentFilter,
    Network,
    ServerBusy,
    Unknown,
}

impl FailureCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCategory::Timeout => "timeout",
            FailureCategory::Quota => "quota",
            FailureCategory::ContentFilter => "content-filter",
            FailureCategory::Network => "network",
            FailureCategory::ServerBusy => "server-busy",
            FailureCategory::Unknown => "unknown",
        }
    }

    /// Human-readable explanation shown next to a partial result.
    pub fn describe(&self) -> &'static str {
        match self {
            FailureCategory::Timeout => "the image model took too long to respond",
            FailureCategory::Quota => "the API quota or rate limit was reached",
            FailureCategory::ContentFilter => "the content was blocked by the model's safety filter",
            FailureCategory::Network => "the connection to the image model failed",
            FailureCategory::ServerBusy => "the image model server is busy or returned an error",
            FailureCategory::Unknown => "an unexpected error occurred",
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What went wrong with a single item, before classification.
#[derive(Debug, Clone, Copy)]
pub enum FailureSignal<'a> {
    /// The model call itself failed with this message.
    Message(&'a str),
    /// The call completed but no part decoded to an image.
    NoImage,
}

// Checked top to bottom; first match wins.
const RULES: &[(FailureCategory, &[&str])] = &[
    (FailureCategory::Timeout, &["timeout", "timed out"]),
    (FailureCategory::Quota, &["quota", "rate limit"]),
    (FailureCategory::ContentFilter, &["safety", "blocked", "filter"]),
    (FailureCategory::Network, &["network", "connection"]),
    (FailureCategory::ServerBusy, &["server", "500", "503"]),
];

pub fn classify(signal: FailureSignal<'_>) -> FailureCategory {
    let message = match signal {
        FailureSignal::NoImage => return FailureCategory::ContentFilter,
        FailureSignal::Message(m) => m.to_lowercase(),
    };

    RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| message.contains(k)))
        .map(|(category, _)| *category)
        .unwrap_or(FailureCategory::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn msg(m: &str) -> FailureCategory {
        classify(FailureSignal::Message(m))
    }

    #[test]
    fn matches_each_keyword_group() {
        assert_eq!(msg("request timed out after 120s"), FailureCategory::Timeout);
        assert_eq!(msg("Deadline TIMEOUT"), FailureCategory::Timeout);
        assert_eq!(msg("Quota exceeded for project"), FailureCategory::Quota);
        assert_eq!(msg("rate limit exceeded"), FailureCategory::Quota);
        assert_eq!(msg("response blocked"), FailureCategory::ContentFilter);
        assert_eq!(msg("SAFETY"), FailureCategory::ContentFilter);
        assert_eq!(msg("connection reset by peer"), FailureCategory::Network);
        assert_eq!(msg("Internal Server Error"), FailureCategory::ServerBusy);
        assert_eq!(msg("status=503 body=unavailable"), FailureCategory::ServerBusy);
        assert_eq!(msg("something odd"), FailureCategory::Unknown);
    }

    #[test]
    fn no_image_is_content_filter() {
        assert_eq!(classify(FailureSignal::NoImage), FailureCategory::ContentFilter);
    }

    #[test]
    fn earlier_group_wins_when_several_match() {
        // network is checked before server-busy
        assert_eq!(msg("network error: HTTP 500"), FailureCategory::Network);
        // timeout is checked before network
        assert_eq!(msg("connection timed out"), FailureCategory::Timeout);
        // quota is checked before server-busy
        assert_eq!(msg("status=429 server says: quota exhausted"), FailureCategory::Quota);
    }

    #[test]
    fn serializes_to_stable_strings() {
        assert_eq!(serde_json::to_string(&FailureCategory::ContentFilter).unwrap(), "\"content-filter\"");
        assert_eq!(serde_json::to_string(&FailureCategory::ServerBusy).unwrap(), "\"server-busy\"");
        assert_eq!(FailureCategory::Quota.to_string(), "quota");
    }
}
