//! Domain DTOs for the build-configuration API.
//!
//! # Design
//! The server reads and writes different shapes for the same resource: a
//! bare `{"username","name"}` object on read, and the same object nested
//! under `build_configuration` on create. Both shapes get their own named
//! type here and are never unified. The version-create body likewise carries
//! only the builds; the owning user/name travel in the request path.

use serde::{Deserialize, Serialize};

/// A named build template owned by a user namespace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildConfig {
    #[serde(rename = "username")]
    pub user: String,
    pub name: String,
}

impl BuildConfig {
    pub fn new(user: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            name: name.into(),
        }
    }
}

/// A single build inside an uploadable version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildConfigBuild {
    pub name: String,
    /// Builder kind, such as `amazon-ebs` or `qemu`.
    #[serde(rename = "type")]
    pub kind: String,
}

impl BuildConfigBuild {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
        }
    }
}

/// One uploadable revision of a build configuration.
///
/// `user` and `name` identify the parent configuration and only ever appear
/// in the request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfigVersion {
    pub user: String,
    pub name: String,
    pub builds: Vec<BuildConfigBuild>,
}

/// Server-issued, single-use destination for a version's template payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadTarget {
    pub upload_path: String,
}

/// Create-request body: `{"build_configuration": {...}}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct BuildConfigEnvelope {
    pub build_configuration: BuildConfig,
}

/// Version-create body: `{"version": {"builds": [...]}}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct VersionEnvelope {
    pub version: VersionBody,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VersionBody {
    pub builds: Vec<BuildConfigBuild>,
}

impl VersionEnvelope {
    pub fn from_version(version: &BuildConfigVersion) -> Self {
        Self {
            version: VersionBody {
                builds: version.builds.clone(),
            },
        }
    }
}
