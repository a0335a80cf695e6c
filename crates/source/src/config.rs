use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_CONTACTS_URL: &str = "https://api.systeme.io/api/contacts";
pub const DEFAULT_TAGS_URL: &str = "https://api.systeme.io/api/tags";

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub api_key: Option<String>,
    pub contacts_url: String,
    pub tags_url: String,
    /// Items requested per page; the API accepts 10 to 100.
    pub page_limit: u32,
    pub timeout_secs: u64,
    /// Attempts per page request, transient failures only.
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    pub max_pages: usize,
}

impl SourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            contacts_url: DEFAULT_CONTACTS_URL.to_string(),
            tags_url: DEFAULT_TAGS_URL.to_string(),
            page_limit: 100,
            timeout_secs: 30,
            max_attempts: 3,
            retry_delay_ms: 1_000,
            max_pages: 10_000,
        }
    }
}

impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("contacts_url", &self.contacts_url)
            .field("tags_url", &self.tags_url)
            .field("page_limit", &self.page_limit)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_attempts", &self.max_attempts)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("max_pages", &self.max_pages)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_hides_api_key() {
        let config = SourceConfig {
            api_key: Some("sk-live-123".into()),
            ..SourceConfig::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk-live-123"));
        assert!(rendered.contains("<redacted>"));
    }
}
