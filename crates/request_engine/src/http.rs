use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use thiserror::Error;

use crate::service::Service;
use crate::ServiceError;

/// Client limits for [`HttpService`].
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Whole-request deadline.
    pub timeout: Duration,
    /// Largest accepted body.
    pub max_bytes: usize,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_bytes: 5 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub final_url: String,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("http status {0}")]
    Status(u16),
    #[error("request timed out")]
    Timeout,
    #[error("response larger than {max_bytes} bytes")]
    TooLarge { max_bytes: usize },
    #[error("network error: {0}")]
    Network(String),
}

/// GETs the URL it is called with. Non-success statuses are errors.
#[derive(Debug, Clone)]
pub struct HttpService {
    client: reqwest::Client,
    max_bytes: usize,
}

impl HttpService {
    pub fn new(settings: HttpSettings) -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(map_reqwest_error)?;
        Ok(Self {
            client,
            max_bytes: settings.max_bytes,
        })
    }

    pub async fn get(&self, url: &str) -> Result<HttpResponse, HttpError> {
        let url = reqwest::Url::parse(url).map_err(|err| HttpError::InvalidUrl(err.to_string()))?;
        let response = self.client.get(url).send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(HttpError::Status(status.as_u16()));
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        let mut body = BytesMut::new();
        let mut chunks = response.bytes_stream();
        while let Some(chunk) = chunks.next().await {
            body.extend_from_slice(&chunk.map_err(map_reqwest_error)?);
            if body.len() > self.max_bytes {
                return Err(HttpError::TooLarge {
                    max_bytes: self.max_bytes,
                });
            }
        }

        Ok(HttpResponse {
            status: status.as_u16(),
            final_url,
            content_type,
            body: body.freeze(),
        })
    }
}

#[async_trait::async_trait]
impl Service<HttpResponse, String> for HttpService {
    async fn call(&self, url: String) -> Result<HttpResponse, ServiceError> {
        Ok(self.get(&url).await?)
    }
}

fn map_reqwest_error(err: reqwest::Error) -> HttpError {
    if err.is_timeout() {
        HttpError::Timeout
    } else {
        HttpError::Network(err.to_string())
    }
}
