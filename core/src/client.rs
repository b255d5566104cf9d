//! Request builder, response parser and transport-backed facade for the
//! build-configuration API.
//!
//! # Design
//! `BuildConfigRequests` holds only a base URL and carries no state between
//! calls. Each operation is split into a `build_*` method that produces an
//! `HttpRequest` and a `parse_*` method that consumes an `HttpResponse`, so
//! request shapes and status handling are testable without a network.
//!
//! `BuildConfigClient` pairs the builder with an injected `Transport` and
//! runs `build_* -> execute -> parse_*` for each operation. Version upload
//! stays two explicit steps (`create_version`, then `upload_payload`); the
//! combined `upload_build_config_version` does not roll back a version whose
//! payload failed to upload.

use std::io::Read;

use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport};
use crate::transport::UreqTransport;
use crate::types::{BuildConfig, BuildConfigEnvelope, BuildConfigVersion, UploadTarget, VersionEnvelope};

const COLLECTION_PATH: &str = "/api/v1/packer/build-configurations";

/// Stateless request builder and response parser.
///
/// `user` and `name` are interpolated into paths verbatim: no escaping and
/// no validation.
#[derive(Debug, Clone)]
pub struct BuildConfigRequests {
    base_url: String,
}

impl BuildConfigRequests {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn build_get_build_config(&self, user: &str, name: &str) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            path: format!("{}{COLLECTION_PATH}/{user}/{name}", self.base_url),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn build_create_build_config(&self, user: &str, name: &str) -> Result<HttpRequest, ApiError> {
        let envelope = BuildConfigEnvelope {
            build_configuration: BuildConfig::new(user, name),
        };
        Ok(HttpRequest {
            method: HttpMethod::Post,
            path: format!("{}{COLLECTION_PATH}", self.base_url),
            headers: json_headers(),
            body: Some(to_json(&envelope)?),
        })
    }

    pub fn build_create_version(&self, version: &BuildConfigVersion) -> Result<HttpRequest, ApiError> {
        let envelope = VersionEnvelope::from_version(version);
        Ok(HttpRequest {
            method: HttpMethod::Post,
            path: format!(
                "{}{COLLECTION_PATH}/{}/{}/versions",
                self.base_url, version.user, version.name
            ),
            headers: json_headers(),
            body: Some(to_json(&envelope)?),
        })
    }

    pub fn parse_get_build_config(&self, response: HttpResponse) -> Result<BuildConfig, ApiError> {
        check_status(&response)?;
        serde_json::from_str(&response.body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// The body of a successful create is ignored.
    pub fn parse_create_build_config(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response)
    }

    pub fn parse_create_version(&self, response: HttpResponse) -> Result<UploadTarget, ApiError> {
        check_status(&response)?;
        serde_json::from_str(&response.body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

/// Build-configuration client over an injected transport.
#[derive(Debug, Clone)]
pub struct BuildConfigClient<T> {
    requests: BuildConfigRequests,
    transport: T,
}

impl BuildConfigClient<UreqTransport> {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(BuildConfigRequests::new(&config.address), UreqTransport::new(config))
    }
}

impl<T: Transport> BuildConfigClient<T> {
    pub fn new(requests: BuildConfigRequests, transport: T) -> Self {
        Self { requests, transport }
    }

    pub fn requests(&self) -> &BuildConfigRequests {
        &self.requests
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn get_build_config(&self, user: &str, name: &str) -> Result<BuildConfig, ApiError> {
        let request = self.requests.build_get_build_config(user, name);
        let response = self.transport.execute(request)?;
        self.requests.parse_get_build_config(response)
    }

    pub fn create_build_config(&self, user: &str, name: &str) -> Result<(), ApiError> {
        let request = self.requests.build_create_build_config(user, name)?;
        let response = self.transport.execute(request)?;
        self.requests.parse_create_build_config(response)
    }

    /// Phase one of a version upload: create the version record and obtain
    /// the path its payload must be uploaded to.
    pub fn create_version(&self, version: &BuildConfigVersion) -> Result<UploadTarget, ApiError> {
        let request = self.requests.build_create_version(version)?;
        let response = self.transport.execute(request)?;
        self.requests.parse_create_version(response)
    }

    /// Phase two: stream exactly `size` bytes of `payload` to `target`.
    ///
    /// Every failure is reported as `ApiError::Upload`. The reader is
    /// borrowed and left open.
    pub fn upload_payload(&self, target: &UploadTarget, payload: &mut dyn Read, size: u64) -> Result<(), ApiError> {
        self.transport
            .put_file(&target.upload_path, payload, size)
            .map_err(|e| match e {
                ApiError::Upload { .. } => e,
                other => ApiError::Upload {
                    upload_path: target.upload_path.clone(),
                    reason: other.to_string(),
                },
            })
    }

    /// Create a version and upload its template.
    ///
    /// Errors before the upload starts leave nothing behind on the server.
    /// An `ApiError::Upload` means the version record exists without a
    /// payload.
    pub fn upload_build_config_version(
        &self,
        version: &BuildConfigVersion,
        payload: &mut dyn Read,
        size: u64,
    ) -> Result<(), ApiError> {
        let target = self.create_version(version)?;
        self.upload_payload(&target, payload, size)
    }
}

fn json_headers() -> Vec<(String, String)> {
    vec![("content-type".to_string(), "application/json".to_string())]
}

fn to_json<S: serde::Serialize>(value: &S) -> Result<String, ApiError> {
    serde_json::to_string(value).map_err(|e| ApiError::Serialization(e.to_string()))
}

/// Map non-2xx statuses to `ApiError::Api`, keeping any server message.
fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    if response.is_success() {
        return Ok(());
    }
    Err(ApiError::Api {
        status: response.status,
        message: error_message(&response.body),
    })
}

/// Pull a human-readable message out of an error body.
///
/// Understands `{"errors": [..]}`, `{"errors": {"field": [..]}}` and
/// `{"error": ".."}`; anything else non-empty is returned as-is.
fn error_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| structured_message(&value))
        .or_else(|| Some(body.to_string()))
}

fn structured_message(value: &Value) -> Option<String> {
    let parts: Vec<String> = match value.get("errors") {
        Some(Value::Array(items)) => items.iter().map(render).collect(),
        Some(Value::Object(fields)) => {
            let mut fields: Vec<_> = fields.iter().collect();
            fields.sort_by(|a, b| a.0.cmp(b.0));
            fields
                .into_iter()
                .flat_map(|(field, messages)| match messages {
                    Value::Array(items) => items.iter().map(|m| format!("{field}: {}", render(m))).collect(),
                    other => vec![format!("{field}: {}", render(other))],
                })
                .collect()
        }
        _ => return value.get("error").and_then(Value::as_str).map(str::to_string),
    };
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::io::Cursor;

    use super::*;
    use crate::types::BuildConfigBuild;

    const BASE: &str = "http://localhost:3000";

    fn requests() -> BuildConfigRequests {
        BuildConfigRequests::new(BASE)
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    fn version() -> BuildConfigVersion {
        BuildConfigVersion {
            user: "hashicorp".to_string(),
            name: "web".to_string(),
            builds: vec![BuildConfigBuild::new("b1", "amazon-ebs")],
        }
    }

    /// Replays canned responses and records everything it is asked to do.
    #[derive(Default)]
    struct FakeTransport {
        responses: RefCell<VecDeque<Result<HttpResponse, ApiError>>>,
        sent: RefCell<Vec<HttpRequest>>,
        uploads: RefCell<Vec<(String, Vec<u8>, u64)>>,
        upload_result: RefCell<Option<ApiError>>,
    }

    impl FakeTransport {
        fn with(responses: Vec<Result<HttpResponse, ApiError>>) -> Self {
            Self {
                responses: RefCell::new(responses.into()),
                ..Default::default()
            }
        }

        fn fail_uploads_with(self, err: ApiError) -> Self {
            *self.upload_result.borrow_mut() = Some(err);
            self
        }
    }

    impl Transport for FakeTransport {
        fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
            self.sent.borrow_mut().push(request);
            self.responses
                .borrow_mut()
                .pop_front()
                .expect("no canned response left")
        }

        fn put_file(&self, url: &str, payload: &mut dyn Read, size: u64) -> Result<(), ApiError> {
            let mut bytes = Vec::new();
            Read::take(payload, size).read_to_end(&mut bytes).unwrap();
            self.uploads.borrow_mut().push((url.to_string(), bytes, size));
            match self.upload_result.borrow_mut().take() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }
    }

    fn client(transport: FakeTransport) -> BuildConfigClient<FakeTransport> {
        BuildConfigClient::new(requests(), transport)
    }

    // --- request building ---

    #[test]
    fn build_get_produces_correct_request() {
        let req = requests().build_get_build_config("hashicorp", "web");
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(
            req.path,
            "http://localhost:3000/api/v1/packer/build-configurations/hashicorp/web"
        );
        assert!(req.body.is_none());
        assert!(req.headers.is_empty());
    }

    #[test]
    fn build_create_wraps_config_in_envelope() {
        let req = requests().build_create_build_config("u", "n").unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.path, "http://localhost:3000/api/v1/packer/build-configurations");
        assert_eq!(
            req.headers,
            vec![("content-type".to_string(), "application/json".to_string())]
        );
        assert_eq!(
            req.body.as_deref(),
            Some(r#"{"build_configuration":{"username":"u","name":"n"}}"#)
        );
    }

    #[test]
    fn build_create_version_keeps_user_and_name_out_of_body() {
        let req = requests().build_create_version(&version()).unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(
            req.path,
            "http://localhost:3000/api/v1/packer/build-configurations/hashicorp/web/versions"
        );
        assert_eq!(
            req.body.as_deref(),
            Some(r#"{"version":{"builds":[{"name":"b1","type":"amazon-ebs"}]}}"#)
        );
    }

    #[test]
    fn path_segments_are_not_escaped() {
        let req = requests().build_get_build_config("a b", "x/y");
        assert_eq!(
            req.path,
            "http://localhost:3000/api/v1/packer/build-configurations/a b/x/y"
        );
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let req = BuildConfigRequests::new("http://localhost:3000/").build_get_build_config("u", "n");
        assert_eq!(req.path, "http://localhost:3000/api/v1/packer/build-configurations/u/n");
    }

    // --- response parsing ---

    #[test]
    fn parse_get_decodes_bare_object() {
        let config = requests()
            .parse_get_build_config(response(200, r#"{"username":"u","name":"n"}"#))
            .unwrap();
        assert_eq!(config, BuildConfig::new("u", "n"));
    }

    #[test]
    fn parse_get_rejects_enveloped_object() {
        let err = requests()
            .parse_get_build_config(response(
                200,
                r#"{"build_configuration":{"username":"u","name":"n"}}"#,
            ))
            .unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[test]
    fn parse_get_bad_json() {
        let err = requests().parse_get_build_config(response(200, "not json")).unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[test]
    fn parse_get_not_found_preserves_status() {
        let err = requests().parse_get_build_config(response(404, "")).unwrap_err();
        assert!(matches!(err, ApiError::Api { status: 404, message: None }));
    }

    #[test]
    fn parse_create_ignores_body() {
        assert!(requests().parse_create_build_config(response(201, "not json")).is_ok());
        assert!(requests().parse_create_build_config(response(204, "")).is_ok());
    }

    #[test]
    fn parse_create_reports_field_errors() {
        let err = requests()
            .parse_create_build_config(response(
                422,
                r#"{"errors":{"name":["has already been taken","is reserved"],"username":["is invalid"]}}"#,
            ))
            .unwrap_err();
        match err {
            ApiError::Api { status, message } => {
                assert_eq!(status, 422);
                assert_eq!(
                    message.as_deref(),
                    Some("name: has already been taken, name: is reserved, username: is invalid")
                );
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn parse_create_version_decodes_upload_path() {
        let target = requests()
            .parse_create_version(response(200, r#"{"upload_path":"https://bucket/up/1"}"#))
            .unwrap();
        assert_eq!(target.upload_path, "https://bucket/up/1");
    }

    #[test]
    fn parse_create_version_missing_upload_path() {
        let err = requests().parse_create_version(response(200, "{}")).unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[test]
    fn error_message_variants() {
        assert_eq!(error_message(""), None);
        assert_eq!(error_message("  \n"), None);
        assert_eq!(error_message("boom").as_deref(), Some("boom"));
        assert_eq!(
            error_message(r#"{"errors":["a","b"]}"#).as_deref(),
            Some("a, b")
        );
        assert_eq!(error_message(r#"{"error":"denied"}"#).as_deref(), Some("denied"));
        assert_eq!(error_message(r#"{"errors":[]}"#).as_deref(), Some(r#"{"errors":[]}"#));
    }

    // --- facade ---

    #[test]
    fn get_build_config_round_trip() {
        let c = client(FakeTransport::with(vec![Ok(response(
            200,
            r#"{"username":"u","name":"n"}"#,
        ))]));
        let config = c.get_build_config("u", "n").unwrap();
        assert_eq!(config, BuildConfig::new("u", "n"));
        assert_eq!(c.transport().sent.borrow()[0].method, HttpMethod::Get);
    }

    #[test]
    fn transport_failure_is_passed_through() {
        let c = client(FakeTransport::with(vec![Err(ApiError::Transport(
            "connection refused".to_string(),
        ))]));
        let err = c.create_build_config("u", "n").unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
    }

    #[test]
    fn upload_sends_payload_to_returned_path() {
        let c = client(FakeTransport::with(vec![Ok(response(
            200,
            r#"{"upload_path":"https://bucket/up/1"}"#,
        ))]));
        let mut payload = Cursor::new(b"template-bytes-and-trailing".to_vec());
        c.upload_build_config_version(&version(), &mut payload, 14).unwrap();

        let uploads = c.transport().uploads.borrow();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].0, "https://bucket/up/1");
        assert_eq!(uploads[0].1, b"template-bytes");
        assert_eq!(uploads[0].2, 14);
        // the reader is borrowed, not consumed past `size`
        assert_eq!(payload.position(), 14);
    }

    #[test]
    fn version_not_found_never_uploads() {
        let c = client(FakeTransport::with(vec![Ok(response(404, ""))]));
        let mut payload = Cursor::new(b"tpl".to_vec());
        let err = c.upload_build_config_version(&version(), &mut payload, 3).unwrap_err();
        assert!(matches!(err, ApiError::Api { status: 404, .. }));
        assert!(c.transport().uploads.borrow().is_empty());
    }

    #[test]
    fn malformed_version_response_never_uploads() {
        let c = client(FakeTransport::with(vec![Ok(response(200, "<html>"))]));
        let mut payload = Cursor::new(b"tpl".to_vec());
        let err = c.upload_build_config_version(&version(), &mut payload, 3).unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
        assert!(c.transport().uploads.borrow().is_empty());
    }

    #[test]
    fn upload_failure_is_distinct_from_api_error() {
        let transport = FakeTransport::with(vec![Ok(response(
            200,
            r#"{"upload_path":"https://bucket/up/1"}"#,
        ))])
        .fail_uploads_with(ApiError::Transport("reset by peer".to_string()));
        let c = client(transport);
        let mut payload = Cursor::new(b"tpl".to_vec());
        let err = c.upload_build_config_version(&version(), &mut payload, 3).unwrap_err();
        match err {
            ApiError::Upload { upload_path, reason } => {
                assert_eq!(upload_path, "https://bucket/up/1");
                assert!(reason.contains("reset by peer"));
            }
            other => panic!("expected Upload error, got {other:?}"),
        }
        assert_eq!(c.transport().uploads.borrow().len(), 1);
    }

    #[test]
    fn two_phase_upload_exposes_target() {
        let c = client(FakeTransport::with(vec![Ok(response(
            201,
            r#"{"upload_path":"https://bucket/up/2"}"#,
        ))]));
        let target = c.create_version(&version()).unwrap();
        assert!(c.transport().uploads.borrow().is_empty());

        let mut payload = Cursor::new(Vec::new());
        c.upload_payload(&target, &mut payload, 0).unwrap();
        assert_eq!(c.transport().uploads.borrow()[0].0, "https://bucket/up/2");
    }

    #[test]
    fn borrowed_transport_can_back_many_clients() {
        let transport = FakeTransport::with(vec![
            Ok(response(201, "")),
            Ok(response(200, r#"{"username":"u","name":"n"}"#)),
        ]);
        let writer = BuildConfigClient::new(requests(), &transport);
        let reader = BuildConfigClient::new(requests(), &transport);
        writer.create_build_config("u", "n").unwrap();
        reader.get_build_config("u", "n").unwrap();
        assert_eq!(transport.sent.borrow().len(), 2);
    }
}
