//! Synchronous client core for the build-configuration API.
//!
//! # Overview
//! Fetches and creates build configurations and uploads new versions with
//! their template payloads. Requests are built and responses parsed as plain
//! data; an injected `Transport` performs the I/O.
//!
//! # Design
//! - `BuildConfigRequests` is stateless and holds only the base URL.
//! - `BuildConfigClient<T: Transport>` owns one transport and reuses it for
//!   every call. `UreqTransport` is the blocking production transport.
//! - The bare read shape and the enveloped write shapes are separate types.
//! - Version upload is two observable steps: `create_version` returns an
//!   `UploadTarget`, `upload_payload` streams the template to it.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod transport;
pub mod types;

pub use client::{BuildConfigClient, BuildConfigRequests};
pub use config::ClientConfig;
pub use error::{ApiError, ConfigError};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport};
pub use transport::UreqTransport;
pub use types::{BuildConfig, BuildConfigBuild, BuildConfigVersion, UploadTarget};
