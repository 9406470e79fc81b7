use futures_util::future::{BoxFuture, FutureExt};
use std::time::Duration;
use url::Url;

use crate::error::TransportError;

/// A fully built outbound request
#[derive(Debug, Clone)]
pub struct PostRequest {
    pub url: Url,
    pub headers: Vec<(&'static str, String)>,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// Sends one POST. Any `Err` is a transport-level failure; an HTTP response
/// of any status comes back as `Ok`.
pub trait Transport: Send + Sync {
    fn post<'a>(
        &'a self,
        request: &'a PostRequest,
    ) -> BoxFuture<'a, Result<TransportResponse, TransportError>>;
}

/// reqwest-backed transport, one pooled client for the process
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(HttpTransport { client })
    }
}

impl Transport for HttpTransport {
    fn post<'a>(
        &'a self,
        request: &'a PostRequest,
    ) -> BoxFuture<'a, Result<TransportResponse, TransportError>> {
        async move {
            let mut builder = self
                .client
                .post(request.url.clone())
                .body(request.body.clone());
            for (name, value) in &request.headers {
                builder = builder.header(*name, value.as_str());
            }

            let response = builder.send().await?;
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();

            Ok(TransportResponse { status, body })
        }
        .boxed()
    }
}
