//! HTTP fetcher backed by reqwest

use crate::cache::fetch::HttpFetcher;
use crate::error::FetchError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;

const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Downloads artifacts with a shared reqwest client
#[derive(Debug, Clone)]
pub struct ReqwestHttp {
    client: Client,
}

impl ReqwestHttp {
    pub fn new(user_agent: &str) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .connect_timeout(HTTP_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| FetchError::Network {
                reference: "http client".to_string(),
                message: format!("Failed to create HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpFetcher for ReqwestHttp {
    async fn download(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| map_http_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(map_status(url, status));
        }

        let body = response.bytes().await.map_err(|e| map_http_error(url, e))?;
        Ok(body.to_vec())
    }
}

fn map_status(url: &str, status: StatusCode) -> FetchError {
    let reference = url.to_string();
    let message = format!("server answered {}", status);
    match status.as_u16() {
        401 | 403 => FetchError::Authentication { reference, message },
        404 | 410 => FetchError::NotFound { reference, message },
        _ => FetchError::Network { reference, message },
    }
}

fn map_http_error(url: &str, error: reqwest::Error) -> FetchError {
    if let Some(status) = error.status() {
        return map_status(url, status);
    }
    let message = if error.is_timeout() {
        format!("Request timeout: {}", error)
    } else if error.is_connect() {
        format!("Connection error: {}", error)
    } else {
        format!("HTTP error: {}", error)
    };
    FetchError::Network {
        reference: url.to_string(),
        message,
    }
}
