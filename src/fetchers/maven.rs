//! Maven POM fetcher (spec 4.3). No metadata-fetching code in the donor
//! covers Maven; this is grounded on the retrieval pack's Maven tooling
//! examples (coordinate/URL shaping from a `forge`-style dependency
//! resolver, the `Ecosystem`-trait POM-parsing entry point from an
//! LSP-tooling example) and rebuilt on `quick-xml`'s serde support for real
//! XML parsing instead of either example's manual string scanning.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use crate::cache::metadata_cache::MetadataCache;
use crate::error::{DepotError, Result};
use crate::fetchers::http_client::get_bytes;
use crate::fetchers::{ArtifactLocation, RawDependency};
use crate::model::dependency::MavenScope;

#[derive(Debug, Default, Clone)]
pub struct MavenCoordinate {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
}

impl MavenCoordinate {
    /// Parses the `groupId:artifactId` encoding used for `Coordinate::name`
    /// plus a separate version string.
    #[must_use]
    pub fn parse(name: &str, version: &str) -> Option<Self> {
        let (group_id, artifact_id) = name.split_once(':')?;
        Some(Self {
            group_id: group_id.to_string(),
            artifact_id: artifact_id.to_string(),
            version: version.to_string(),
        })
    }

    #[must_use]
    fn group_path(&self) -> String {
        self.group_id.replace('.', "/")
    }

    #[must_use]
    pub fn pom_url(&self, repo: &str) -> String {
        format!(
            "{repo}/{}/{}/{}/{}-{}.pom",
            self.group_path(),
            self.artifact_id,
            self.version,
            self.artifact_id,
            self.version
        )
    }

    #[must_use]
    pub fn jar_url(&self, repo: &str) -> String {
        format!(
            "{repo}/{}/{}/{}/{}-{}.jar",
            self.group_path(),
            self.artifact_id,
            self.version,
            self.artifact_id,
            self.version
        )
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Pom {
    parent: Option<PomParent>,
    group_id: Option<String>,
    artifact_id: Option<String>,
    version: Option<String>,
    #[serde(default)]
    properties: Properties,
    dependency_management: Option<DependencyBlock>,
    dependencies: Option<DependencyBlock>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct PomParent {
    group_id: String,
    artifact_id: String,
    version: String,
}

#[derive(Debug, Deserialize, Default)]
struct Properties {
    #[serde(flatten)]
    values: HashMap<String, String>,
}

#[derive(Debug, Deserialize, Default)]
struct DependencyBlock {
    #[serde(default, rename = "dependency")]
    dependency: Vec<PomDependency>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
struct PomDependency {
    group_id: String,
    artifact_id: String,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    optional: Option<String>,
}

pub struct MavenFetcher {
    client: Client,
    repo_url: String,
    cache: Arc<MetadataCache>,
}

impl MavenFetcher {
    #[must_use]
    pub fn new(client: Client, cache: Arc<MetadataCache>) -> Self {
        Self {
            client,
            repo_url: "https://repo1.maven.org/maven2".to_string(),
            cache,
        }
    }

    #[must_use]
    pub fn with_repo(mut self, url: impl Into<String>) -> Self {
        self.repo_url = url.into();
        self
    }

    async fn fetch_raw_pom(&self, coord: &MavenCoordinate) -> Result<Pom> {
        let url = coord.pom_url(&self.repo_url);
        let client = self.client.clone();
        let fetch_url = url.clone();
        let bytes = self
            .cache
            .get_or_fetch("maven", &url, Duration::from_secs(3600), || async move {
                get_bytes(&client, &fetch_url).await
            })
            .await?;
        quick_xml::de::from_reader(bytes.as_slice()).map_err(|e| DepotError::ParseError {
            context: format!("pom.xml for {}:{}", coord.group_id, coord.artifact_id),
            message: e.to_string(),
        })
    }

    /// Resolves the `<parent>` chain (depth-limited) and merges inherited
    /// properties, so `${spring.version}`-style placeholders defined on an
    /// ancestor POM are visible to the child.
    async fn effective_properties(&self, coord: &MavenCoordinate, depth: u32) -> Result<HashMap<String, String>> {
        if depth > 8 {
            return Ok(HashMap::new());
        }
        let pom = self.fetch_raw_pom(coord).await?;
        let mut props = if let Some(parent) = &pom.parent {
            let parent_coord = MavenCoordinate {
                group_id: parent.group_id.clone(),
                artifact_id: parent.artifact_id.clone(),
                version: parent.version.clone(),
            };
            Box::pin(self.effective_properties(&parent_coord, depth + 1)).await?
        } else {
            HashMap::new()
        };
        props.extend(pom.properties.values.clone());
        props.insert("project.groupId".to_string(), pom.group_id.clone().unwrap_or_else(|| coord.group_id.clone()));
        props.insert("project.artifactId".to_string(), pom.artifact_id.clone().unwrap_or_else(|| coord.artifact_id.clone()));
        props.insert("project.version".to_string(), pom.version.clone().unwrap_or_else(|| coord.version.clone()));
        Ok(props)
    }

    fn substitute(text: &str, props: &HashMap<String, String>) -> String {
        let mut out = text.to_string();
        for _ in 0..4 {
            let Some(start) = out.find("${") else { break };
            let Some(end) = out[start..].find('}') else { break };
            let key = &out[start + 2..start + end];
            let replacement = props.get(key).cloned().unwrap_or_default();
            out.replace_range(start..start + end + 1, &replacement);
        }
        out
    }

    /// Declared dependencies for a coordinate, with `${prop}` substitution,
    /// `dependencyManagement` version binding, scope classification, and the
    /// default-scope/`test`+`provided`-exclusion rule applied by the caller
    /// (the resolver, per spec 4.4's Maven notes).
    pub async fn dependencies(&self, coord: &MavenCoordinate) -> Result<Vec<RawDependency>> {
        let pom = self.fetch_raw_pom(coord).await?;
        let props = self.effective_properties(coord, 0).await?;

        let managed: HashMap<(String, String), String> = pom
            .dependency_management
            .as_ref()
            .map(|block| {
                block
                    .dependency
                    .iter()
                    .filter_map(|d| d.version.clone().map(|v| ((d.group_id.clone(), d.artifact_id.clone()), Self::substitute(&v, &props))))
                    .collect()
            })
            .unwrap_or_default();

        let deps = pom.dependencies.unwrap_or_default();
        Ok(deps
            .dependency
            .into_iter()
            .map(|d| {
                let version = d
                    .version
                    .map(|v| Self::substitute(&v, &props))
                    .or_else(|| managed.get(&(d.group_id.clone(), d.artifact_id.clone())).cloned())
                    .unwrap_or_default();
                RawDependency {
                    name: format!("{}:{}", d.group_id, d.artifact_id),
                    constraint: version,
                    optional: d.optional.as_deref() == Some("true"),
                    marker: None,
                    scope: Some(parse_scope(d.scope.as_deref())),
                }
            })
            .collect())
    }

    #[must_use]
    pub fn artifact(&self, coord: &MavenCoordinate) -> ArtifactLocation {
        ArtifactLocation {
            url: coord.jar_url(&self.repo_url),
            checksum: None,
            checksum_algorithm: None,
        }
    }
}

pub(crate) fn parse_scope(scope: Option<&str>) -> MavenScope {
    match scope {
        Some("runtime") => MavenScope::Runtime,
        Some("provided") => MavenScope::Provided,
        Some("test") => MavenScope::Test,
        Some("system") => MavenScope::System,
        _ => MavenScope::Compile,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinate_builds_maven2_layout_urls() {
        let coord = MavenCoordinate::parse("org.springframework:spring-core", "5.3.0").unwrap();
        assert_eq!(
            coord.pom_url("https://repo1.maven.org/maven2"),
            "https://repo1.maven.org/maven2/org/springframework/spring-core/5.3.0/spring-core-5.3.0.pom"
        );
    }

    #[test]
    fn property_substitution_resolves_nested_placeholders() {
        let mut props = HashMap::new();
        props.insert("spring.version".to_string(), "5.3.0".to_string());
        assert_eq!(MavenFetcher::substitute("${spring.version}", &props), "5.3.0");
    }

    #[tokio::test]
    async fn fetches_and_parses_dependencies_with_variable_substitution() {
        let mut server = mockito::Server::new_async().await;
        let pom = r#"<project>
            <properties><spring.version>5.3.0</spring.version></properties>
            <dependencies>
                <dependency>
                    <groupId>org.springframework</groupId>
                    <artifactId>spring-jcl</artifactId>
                    <version>${spring.version}</version>
                    <scope>compile</scope>
                </dependency>
                <dependency>
                    <groupId>junit</groupId>
                    <artifactId>junit</artifactId>
                    <version>4.13.2</version>
                    <scope>test</scope>
                </dependency>
            </dependencies>
        </project>"#;
        server
            .mock("GET", "/org/springframework/spring-core/5.3.0/spring-core-5.3.0.pom")
            .with_status(200)
            .with_body(pom)
            .create_async()
            .await;

        let client = crate::fetchers::http_client::build_client(4);
        let cache = Arc::new(MetadataCache::new(None, 16));
        let fetcher = MavenFetcher::new(client, cache).with_repo(server.url());
        let coord = MavenCoordinate::parse("org.springframework:spring-core", "5.3.0").unwrap();

        let deps = fetcher.dependencies(&coord).await.unwrap();
        let jcl = deps.iter().find(|d| d.name.ends_with("spring-jcl")).unwrap();
        assert_eq!(jcl.constraint, "5.3.0");
        let junit = deps.iter().find(|d| d.name.ends_with("junit")).unwrap();
        assert_eq!(junit.scope, Some(MavenScope::Test));
    }
}
