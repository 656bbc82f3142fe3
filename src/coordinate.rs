//! `Coordinate`: the canonical, ecosystem-scoped identity of an artifact.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    Pip,
    Conda,
    Maven,
    Npm,
    Yum,
    Docker,
}

impl Ecosystem {
    #[must_use]
    pub fn all() -> &'static [Ecosystem] {
        &[
            Ecosystem::Pip,
            Ecosystem::Conda,
            Ecosystem::Maven,
            Ecosystem::Npm,
            Ecosystem::Yum,
            Ecosystem::Docker,
        ]
    }

    /// Names this ecosystem treats as part of the platform rather than an
    /// installable dependency; the resolver short-circuits on these rather
    /// than recursing (spec 4.4 step 3).
    #[must_use]
    pub fn is_system_package(&self, name: &str) -> bool {
        match self {
            Ecosystem::Yum => matches!(
                name,
                "libc" | "libc.so.6" | "libgcc_s" | "libgcc_s.so.1" | "__glibc" | "rpmlib"
            ) || name.starts_with("rpmlib("),
            Ecosystem::Maven => false,
            Ecosystem::Npm => false,
            Ecosystem::Pip | Ecosystem::Conda => matches!(name, "python" | "pip" | "setuptools"),
            Ecosystem::Docker => false,
        }
    }
}

impl fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Ecosystem::Pip => "pip",
            Ecosystem::Conda => "conda",
            Ecosystem::Maven => "maven",
            Ecosystem::Npm => "npm",
            Ecosystem::Yum => "yum",
            Ecosystem::Docker => "docker",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for Ecosystem {
    type Err = crate::error::DepotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pip" | "pypi" | "python" => Ok(Ecosystem::Pip),
            "conda" => Ok(Ecosystem::Conda),
            "maven" | "java" => Ok(Ecosystem::Maven),
            "npm" | "node" | "javascript" => Ok(Ecosystem::Npm),
            "yum" | "rpm" => Ok(Ecosystem::Yum),
            "docker" | "oci" => Ok(Ecosystem::Docker),
            other => Err(crate::error::DepotError::ParseError {
                context: "ecosystem".to_string(),
                message: format!("unknown ecosystem '{other}'"),
            }),
        }
    }
}

/// Ecosystem-specific hints that narrow where/how a coordinate is fetched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinateHints {
    /// Conda channel, e.g. "conda-forge".
    pub channel: Option<String>,
    /// Conda subdir / platform tag, e.g. "linux-64".
    pub subdir: Option<String>,
    /// Alternate npm registry base URL.
    pub registry: Option<String>,
    /// Alternate Maven repository base URL.
    pub repository: Option<String>,
}

/// Immutable value object identifying one artifact within its ecosystem.
/// Equality and hashing are componentwise over `(ecosystem, name, version, architecture)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coordinate {
    pub ecosystem: Ecosystem,
    /// For Maven this encodes `groupId:artifactId`.
    pub name: String,
    pub version: String,
    pub architecture: Option<String>,
    #[serde(default)]
    pub hints: CoordinateHints,
}

impl Coordinate {
    #[must_use]
    pub fn new(ecosystem: Ecosystem, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            ecosystem,
            name: name.into(),
            version: version.into(),
            architecture: None,
            hints: CoordinateHints::default(),
        }
    }

    #[must_use]
    pub fn with_architecture(mut self, arch: impl Into<String>) -> Self {
        self.architecture = Some(arch.into());
        self
    }

    #[must_use]
    pub fn with_hints(mut self, hints: CoordinateHints) -> Self {
        self.hints = hints;
        self
    }

    /// The canonical key used for dedup in `packages`, the visited map, and
    /// the artifact cache (invariant ii).
    #[must_use]
    pub fn canonical_key(&self) -> String {
        match &self.architecture {
            Some(arch) => format!("{}:{}:{}:{}", self.ecosystem, self.name, self.version, arch),
            None => format!("{}:{}:{}", self.ecosystem, self.name, self.version),
        }
    }

    /// A filesystem-safe form of `name` for use under the artifact cache root.
    #[must_use]
    pub fn sanitized_name(&self) -> String {
        self.name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
            .collect()
    }
}

impl PartialEq for Coordinate {
    fn eq(&self, other: &Self) -> bool {
        self.ecosystem == other.ecosystem
            && self.name == other.name
            && self.version == other.version
            && self.architecture == other.architecture
    }
}
impl Eq for Coordinate {}

impl std::hash::Hash for Coordinate {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.ecosystem.hash(state);
        self.name.hash(state);
        self.version.hash(state);
        self.architecture.hash(state);
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}@{}", self.ecosystem, self.name, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_key_includes_architecture_when_present() {
        let c = Coordinate::new(Ecosystem::Pip, "flask", "2.0.0");
        assert_eq!(c.canonical_key(), "pip:flask:2.0.0");
        let c2 = c.with_architecture("x86_64");
        assert_eq!(c2.canonical_key(), "pip:flask:2.0.0:x86_64");
    }

    #[test]
    fn equality_is_componentwise() {
        let a = Coordinate::new(Ecosystem::Npm, "left-pad", "1.3.0");
        let b = Coordinate::new(Ecosystem::Npm, "left-pad", "1.3.0");
        let c = Coordinate::new(Ecosystem::Npm, "left-pad", "1.3.1");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn ecosystem_from_str_accepts_aliases() {
        assert_eq!("pypi".parse::<Ecosystem>().unwrap(), Ecosystem::Pip);
        assert_eq!("rpm".parse::<Ecosystem>().unwrap(), Ecosystem::Yum);
        assert!("bogus".parse::<Ecosystem>().is_err());
    }

    #[test]
    fn yum_system_package_denylist() {
        assert!(Ecosystem::Yum.is_system_package("libc"));
        assert!(!Ecosystem::Yum.is_system_package("httpd"));
    }

    #[test]
    fn sanitized_name_strips_unsafe_characters() {
        let c = Coordinate::new(Ecosystem::Maven, "org.springframework:spring-core", "5.3.0");
        assert_eq!(c.sanitized_name(), "org.springframework_spring-core");
    }
}
