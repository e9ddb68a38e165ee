use reqwest::header::HeaderMap;
use reqwest::header::HeaderValue;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};

/// One monitoring backend instance, source or target of a migration.
/// Immutable for the duration of a run.
#[derive(Debug, Clone)]
pub struct Backend {
    base_url: String,
    token: String,
}

impl Backend {
    pub fn new(base_url: &str, token: &str) -> Backend {
        Backend {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn headers(&self) -> Result<HeaderMap, anyhow::Error> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("apiToken {}", self.token))
            .map_err(|e| anyhow!("invalid characters in api token: {}", e))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }
}
