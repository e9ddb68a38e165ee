use std::time::Duration;

use reqwest::Method;
use reqwest::Response;
use serde::Serialize;

use crate::client::retry::RetryPolicy;
use crate::common::backend::Backend;
use crate::common::common_constants::POOL_MAX_IDLE_PER_HOST;

/// Pooled, retrying request channel shared by every task of a run. The
/// orchestrator owns one instance for the run's lifetime; dropping it
/// releases the pooled connections.
pub struct HttpClient {
    inner: reqwest::Client,
    policy: RetryPolicy,
}

impl HttpClient {
    pub fn new(
        verify_ssl: bool,
        timeout_secs: u64,
        policy: RetryPolicy,
    ) -> Result<HttpClient, anyhow::Error> {
        if !verify_ssl {
            warn!("TLS certificate verification is disabled for this run");
        }
        let inner = reqwest::Client::builder()
            .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
            .timeout(Duration::from_secs(timeout_secs))
            .danger_accept_invalid_certs(!verify_ssl)
            .build()?;
        Ok(HttpClient { inner, policy })
    }

    pub async fn get(&self, backend: &Backend, path: &str) -> Result<Response, anyhow::Error> {
        self.send::<()>(Method::GET, backend, path, None, None).await
    }

    pub async fn post<B: Serialize>(
        &self,
        backend: &Backend,
        path: &str,
        body: &B,
    ) -> Result<Response, anyhow::Error> {
        self.send(Method::POST, backend, path, None, Some(body)).await
    }

    pub async fn post_with_query<B: Serialize>(
        &self,
        backend: &Backend,
        path: &str,
        query: &[(&str, &str)],
        body: &B,
    ) -> Result<Response, anyhow::Error> {
        self.send(Method::POST, backend, path, Some(query), Some(body))
            .await
    }

    pub async fn put<B: Serialize>(
        &self,
        backend: &Backend,
        path: &str,
        body: &B,
    ) -> Result<Response, anyhow::Error> {
        self.send(Method::PUT, backend, path, None, Some(body)).await
    }

    pub async fn delete(&self, backend: &Backend, path: &str) -> Result<Response, anyhow::Error> {
        self.send::<()>(Method::DELETE, backend, path, None, None)
            .await
    }

    /// Sends one request, retrying transient statuses per the policy. The
    /// final response is returned whatever its status; callers decide what a
    /// non-success status means for them.
    async fn send<B: Serialize>(
        &self,
        method: Method,
        backend: &Backend,
        path: &str,
        query: Option<&[(&str, &str)]>,
        body: Option<&B>,
    ) -> Result<Response, anyhow::Error> {
        let url = backend.url(path);
        let headers = backend.headers()?;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut request = self.inner.request(method.clone(), &url).headers(headers.clone());
            if let Some(query) = query {
                request = request.query(query);
            }
            if let Some(body) = body {
                request = request.json(body);
            }
            let response = request.send().await?;
            let status = response.status();
            if self.policy.should_retry(status) && attempt < self.policy.max_attempts {
                let delay = self.policy.backoff_for(attempt);
                warn!(
                    "{} {} returned {}, retrying in {:?} (attempt {}/{})",
                    method, url, status, delay, attempt, self.policy.max_attempts
                );
                tokio::time::sleep(delay).await;
                continue;
            }
            return Ok(response);
        }
    }
}
