//! Per-ecosystem metadata fetchers (spec 4.3). Each fetcher turns a
//! `(name, version)` lookup into a small set of candidate versions plus,
//! for a chosen version, its declared dependencies and download artifact.
//! All share `http_client`'s client builder and the `MetadataCache`.

pub mod conda;
pub mod http_client;
pub mod maven;
pub mod npm;
pub mod pypi;
pub mod yum;

use serde::{Deserialize, Serialize};

use crate::model::dependency::MavenScope;

/// One dependency edge as declared by an ecosystem's metadata, before
/// constraint resolution. Fields unused by a given ecosystem are left at
/// their defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDependency {
    pub name: String,
    pub constraint: String,
    pub optional: bool,
    pub marker: Option<String>,
    pub scope: Option<MavenScope>,
}

impl RawDependency {
    #[must_use]
    pub fn required(name: impl Into<String>, constraint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constraint: constraint.into(),
            optional: false,
            marker: None,
            scope: None,
        }
    }
}

/// The resolvable artifact for a chosen `(name, version)`: where to download
/// it from and, if known up front, its checksum.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtifactLocation {
    pub url: String,
    pub checksum: Option<String>,
    pub checksum_algorithm: Option<String>,
}
