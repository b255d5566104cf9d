//! Blocking `Transport` backed by `ureq`.

use std::io::{self, Read};

use ureq::{Agent, RequestBuilder, SendBody};

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport};

/// Header carrying the API access token.
pub const TOKEN_HEADER: &str = "X-Atlas-Token";

/// Executes requests with a shared `ureq::Agent`.
///
/// Status-as-error is disabled so 4xx/5xx answers come back as data and
/// the client decides what they mean. The token is attached to API calls
/// only; upload paths are pre-signed and receive no credentials.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: Agent,
    token: Option<String>,
}

impl UreqTransport {
    pub fn new(config: &ClientConfig) -> Self {
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(config.timeout)
            .build()
            .new_agent();
        Self {
            agent,
            token: config.token.clone(),
        }
    }

    fn decorate<B>(&self, mut builder: RequestBuilder<B>, headers: &[(String, String)]) -> RequestBuilder<B> {
        for (name, value) in headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(token) = &self.token {
            builder = builder.header(TOKEN_HEADER, token.as_str());
        }
        builder
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        tracing::debug!(method = request.method.as_str(), path = %request.path, "sending request");

        let result = match request.method {
            HttpMethod::Get => self.decorate(self.agent.get(&request.path), &request.headers).call(),
            HttpMethod::Post => {
                let builder = self.decorate(self.agent.post(&request.path), &request.headers);
                match &request.body {
                    Some(body) => builder.send(body.as_bytes()),
                    None => builder.send_empty(),
                }
            }
        };
        let mut response = result.map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        tracing::trace!(status, path = %request.path, "received response");

        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Ok(HttpResponse { status, headers, body })
    }

    fn put_file(&self, url: &str, payload: &mut dyn Read, size: u64) -> Result<(), ApiError> {
        tracing::debug!(path = %url, size, "uploading payload");

        let upload_error = |reason: String| ApiError::Upload {
            upload_path: url.to_string(),
            reason,
        };

        let mut exact = ExactLen::new(payload, size);
        let response = self
            .agent
            .put(url)
            .header("content-length", size.to_string())
            .send(SendBody::from_reader(&mut exact))
            .map_err(|e| upload_error(e.to_string()))?;

        let status = response.status().as_u16();
        tracing::trace!(status, path = %url, "upload finished");
        if !(200..300).contains(&status) {
            return Err(upload_error(format!("server answered HTTP {status}")));
        }
        Ok(())
    }
}

/// Yields exactly `remaining` bytes of `inner`.
///
/// Running dry early is an `UnexpectedEof` error so the send aborts instead
/// of leaving the server waiting on the declared `content-length`.
struct ExactLen<'a> {
    inner: &'a mut dyn Read,
    remaining: u64,
}

impl<'a> ExactLen<'a> {
    fn new(inner: &'a mut dyn Read, size: u64) -> Self {
        Self { inner, remaining: size }
    }
}

impl Read for ExactLen<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 {
            return Ok(0);
        }
        let max = buf.len().min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
        let n = self.inner.read(&mut buf[..max])?;
        if n == 0 && max > 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("payload ended {} bytes short of the declared size", self.remaining),
            ));
        }
        self.remaining -= n as u64;
        Ok(n)
    }
}
