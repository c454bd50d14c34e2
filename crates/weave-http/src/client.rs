// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::pin::Pin;
use std::time::Duration;

use futures::stream::{Stream, StreamExt, TryStreamExt};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::HttpError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const STREAM_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// The rate-limit header trio most LLM gateways expose, when present.
/// Absent on providers that don't advertise limits (or that use
/// differently-named headers) — callers treat a `None` as "unknown", not
/// "unlimited".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimitHeaders {
    pub limit: Option<u64>,
    pub remaining: Option<u64>,
    pub reset: Option<u64>,
}

impl RateLimitHeaders {
    fn from_headers(headers: &reqwest::header::HeaderMap) -> Self {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
        };
        Self {
            limit: get("x-ratelimit-limit"),
            remaining: get("x-ratelimit-remaining"),
            reset: get("x-ratelimit-reset"),
        }
    }
}

/// A buffered response: status, the rate-limit trio if the server sent it,
/// and the full body read into memory.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub rate_limit: RateLimitHeaders,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        serde_json::from_slice(&self.body).map_err(|e| HttpError::Decode(e.to_string()))
    }
}

/// A streamed response body: raw byte chunks as they arrive off the wire,
/// each read bounded by a timeout.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, HttpError>> + Send>>;

/// Thin wrapper over `reqwest`. Offers `get`/`post_json` (buffered, whole
/// body read before returning) and `post_stream` (the body handed back as
/// an incremental chunk stream, for callers that want to process a
/// streaming completion or long poll as it arrives).
pub struct HttpClient {
    buffered: reqwest::Client,
    streaming: reqwest::Client,
}

impl HttpClient {
    pub fn new() -> Result<Self, HttpError> {
        let buffered = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| HttpError::Network(e.to_string()))?;
        // No overall timeout on the streaming client: a long poll or a slow
        // model response can legitimately run far longer than a buffered
        // call. Staleness is instead caught per-chunk by `post_stream`.
        let streaming = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| HttpError::Network(e.to_string()))?;
        Ok(Self { buffered, streaming })
    }

    pub async fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse, HttpError> {
        let mut req = self.buffered.get(url);
        for (k, v) in headers {
            req = req.header(*k, *v);
        }
        let resp = req.send().await.map_err(|e| HttpError::Network(e.to_string()))?;
        Self::buffer(resp).await
    }

    pub async fn post_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &Value,
    ) -> Result<HttpResponse, HttpError> {
        let mut req = self.buffered.post(url).json(body);
        for (k, v) in headers {
            req = req.header(*k, *v);
        }
        let resp = req.send().await.map_err(|e| HttpError::Network(e.to_string()))?;
        Self::buffer(resp).await
    }

    async fn buffer(resp: reqwest::Response) -> Result<HttpResponse, HttpError> {
        let status = resp.status().as_u16();
        let rate_limit = RateLimitHeaders::from_headers(resp.headers());
        let body = resp
            .bytes()
            .await
            .map_err(|e| HttpError::Network(e.to_string()))?
            .to_vec();
        Ok(HttpResponse { status, rate_limit, body })
    }

    /// Open a streaming POST and return its status plus its body as a
    /// sequence of raw byte chunks. A non-2xx status is read fully and
    /// returned as `HttpError::Status` rather than handed back as a stream,
    /// since error bodies are almost always small and callers shouldn't
    /// need to special-case them.
    ///
    /// Each chunk read is bounded by a timeout so a connection that goes
    /// silent mid-stream surfaces as an error instead of hanging the caller
    /// forever; the stream ends after the first timeout rather than
    /// retrying silently.
    pub async fn post_stream(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &Value,
    ) -> Result<(u16, ByteStream), HttpError> {
        let mut req = self.streaming.post(url).json(body);
        for (k, v) in headers {
            req = req.header(*k, *v);
        }
        let resp = req.send().await.map_err(|e| HttpError::Network(e.to_string()))?;
        let status = resp.status().as_u16();
        if !(200..300).contains(&status) {
            let body = resp.text().await.unwrap_or_default();
            return Err(HttpError::Status { status, body });
        }

        let byte_stream = resp
            .bytes_stream()
            .map_err(|e| HttpError::Network(e.to_string()))
            .map_ok(|b| b.to_vec());

        let timed = futures::stream::unfold((Box::pin(byte_stream), false), |(mut s, done)| async move {
            if done {
                return None;
            }
            match tokio::time::timeout(STREAM_READ_TIMEOUT, s.next()).await {
                Ok(Some(item)) => Some((item, (s, false))),
                Ok(None) => None,
                Err(_) => Some((Err(HttpError::ReadTimeout), (s, true))),
            }
        });

        Ok((status, Box::pin(timed)))
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new().expect("building the default reqwest client should never fail")
    }
}
