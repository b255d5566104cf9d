//! HTTP transport types and the transport seam.
//!
//! # Design
//! Requests and responses are plain data. `BuildConfigRequests` builds
//! `HttpRequest` values and parses `HttpResponse` values without touching the
//! network; a `Transport` executes them. The transport is the only place that
//! performs I/O, owns credentials and timeouts, and provides the bulk-upload
//! primitive used for template payloads.

use std::io::Read;

use crate::error::ApiError;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

/// An HTTP request described as plain data.
///
/// `path` is the fully-qualified URL.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Executes requests on behalf of the client.
///
/// `execute` returns every status as data and fails only when no response
/// could be obtained. `put_file` streams exactly `size` bytes from `payload`
/// to `url` and fails on I/O errors or a non-2xx answer.
pub trait Transport {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError>;

    fn put_file(&self, url: &str, payload: &mut dyn Read, size: u64) -> Result<(), ApiError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        (**self).execute(request)
    }

    fn put_file(&self, url: &str, payload: &mut dyn Read, size: u64) -> Result<(), ApiError> {
        (**self).put_file(url, payload, size)
    }
}
