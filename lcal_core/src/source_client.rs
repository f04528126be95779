//! This client sends the requests to the councils' and societies' websites.

use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use tracing::debug;

use crate::{model::RawResponse, FetchError, Result};

static AGENT: &str = "Mozilla/5.0 (compatible; lcal calendar generator)";
static TIMEOUT: Duration = Duration::from_secs(10);

/// A thin HTTP client issuing one request per call.
#[derive(Debug, Clone)]
pub struct SourceClient {
    client: reqwest::Client,
}

impl SourceClient {
    pub fn new() -> Result<Self> {
        Self::with_timeout(TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| FetchError::Request {
                url: String::new(),
                source,
            })?;
        Ok(SourceClient { client })
    }

    /// Get the body of `url`, failing on anything but a 2xx answer.
    pub async fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<RawResponse> {
        let request_error = |source| FetchError::Request {
            url: url.to_string(),
            source,
        };
        let mut request = self.client.get(url).header(USER_AGENT, AGENT);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let response = request.send().await.map_err(request_error)?;
        let status = response.status();
        debug!(url, status = status.as_u16(), "received response");
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
            .into());
        }
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(String::from);
        let body = response.text().await.map_err(request_error)?;
        Ok(RawResponse { body, content_type })
    }
}
