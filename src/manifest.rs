//! Manifest parsing (spec 4.4/6): turns an ecosystem's native dependency
//! file into the same `RawDependency` edges a fetcher would produce from a
//! registry response, so a caller can seed resolution from a checked-in
//! manifest instead of only from root coordinates. Grounded on the
//! fetchers' own `RawDependency` shape (`fetchers/mod.rs`) and, for
//! `pom.xml`, the POM `Deserialize` structs already built for
//! `fetchers/maven.rs`.

use regex::Regex;
use serde::Deserialize;

use crate::coordinate::Ecosystem;
use crate::error::{DepotError, Result};
use crate::fetchers::RawDependency;

/// Parses the manifest format native to `ecosystem` into its declared
/// dependency edges. Conda and Docker have no source-controlled manifest
/// format named by this system (images are referenced directly; conda
/// projects are handled via `environment.yml`, routed through `Pip`'s
/// sibling here is not applicable) — yum has no manifest format either,
/// repos are queried directly. Both return an empty list rather than erroring,
/// since "no manifest" is a valid state for those ecosystems.
pub fn parse_manifest(ecosystem: Ecosystem, text: &str) -> Result<Vec<RawDependency>> {
    match ecosystem {
        Ecosystem::Pip => parse_requirements_txt(text),
        Ecosystem::Npm => parse_package_json(text),
        Ecosystem::Maven => parse_pom_xml(text),
        Ecosystem::Conda => parse_environment_yml(text),
        Ecosystem::Yum | Ecosystem::Docker => Ok(Vec::new()),
    }
}

/// `requirements.txt`: one requirement per line, `name<constraint...>`,
/// blank lines, `#` comments, and `-r other.txt` / `-e .` lines ignored
/// (the latter have no resolvable coordinate).
fn parse_requirements_txt(text: &str) -> Result<Vec<RawDependency>> {
    let line_re = Regex::new(r"^([A-Za-z0-9][A-Za-z0-9._-]*)\s*(\[[^\]]*\])?\s*(.*)$").expect("static regex");
    let mut deps = Vec::new();
    for raw_line in text.lines() {
        let line = raw_line.split('#').next().unwrap_or("").trim();
        if line.is_empty() || line.starts_with('-') {
            continue;
        }
        let Some(caps) = line_re.captures(line) else { continue };
        let name = caps[1].to_string();
        let constraint = caps[3].trim().to_string();
        deps.push(RawDependency::required(name, constraint));
    }
    Ok(deps)
}

#[derive(Deserialize)]
struct PackageJson {
    #[serde(default)]
    dependencies: std::collections::BTreeMap<String, String>,
    #[serde(default)]
    #[serde(rename = "optionalDependencies")]
    optional_dependencies: std::collections::BTreeMap<String, String>,
}

/// `package.json`: `dependencies` map to required edges,
/// `optionalDependencies` map to optional ones. `devDependencies` are never
/// part of an installable artifact set and are not read.
fn parse_package_json(text: &str) -> Result<Vec<RawDependency>> {
    let parsed: PackageJson = serde_json::from_str(text)?;
    let mut deps = Vec::new();
    for (name, constraint) in parsed.dependencies {
        deps.push(RawDependency::required(name, constraint));
    }
    for (name, constraint) in parsed.optional_dependencies {
        deps.push(RawDependency { optional: true, ..RawDependency::required(name, constraint) });
    }
    Ok(deps)
}

#[derive(Debug, Deserialize, Default)]
struct PomProject {
    dependencies: Option<PomDependencies>,
}

#[derive(Debug, Deserialize, Default)]
struct PomDependencies {
    #[serde(default, rename = "dependency")]
    dependency: Vec<PomDependency>,
}

#[derive(Debug, Deserialize, Default)]
struct PomDependency {
    #[serde(rename = "groupId")]
    group_id: String,
    #[serde(rename = "artifactId")]
    artifact_id: String,
    version: Option<String>,
    scope: Option<String>,
    optional: Option<bool>,
}

/// `pom.xml`: the project's own `<dependencies>` block, independent of any
/// `<parent>`/BOM resolution (that happens inside `fetchers::maven` once a
/// coordinate is being fetched from a repository). A missing `<version>`
/// (left to `dependencyManagement`) parses as an empty constraint, meaning
/// "highest available" to the resolver.
fn parse_pom_xml(text: &str) -> Result<Vec<RawDependency>> {
    let project: PomProject = quick_xml::de::from_str(text).map_err(|err| DepotError::ParseError {
        context: "pom.xml".to_string(),
        message: err.to_string(),
    })?;
    let mut deps = Vec::new();
    let Some(block) = project.dependencies else { return Ok(deps) };
    for dep in block.dependency {
        let name = format!("{}:{}", dep.group_id, dep.artifact_id);
        let constraint = dep.version.unwrap_or_default();
        deps.push(RawDependency {
            name,
            constraint,
            optional: dep.optional.unwrap_or(false),
            marker: None,
            scope: Some(crate::fetchers::maven::parse_scope(dep.scope.as_deref())),
        });
    }
    Ok(deps)
}

#[derive(Debug, Deserialize, Default)]
struct EnvironmentYml {
    #[serde(default)]
    dependencies: Vec<EnvironmentDependency>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EnvironmentDependency {
    Conda(String),
    /// `- pip:` sub-list; not routed anywhere since this parser is scoped
    /// to the conda ecosystem's own dependency edges.
    Nested(#[allow(dead_code)] std::collections::BTreeMap<String, Vec<String>>),
}

/// `environment.yml`: the top-level `dependencies` list, `name[version-spec]`
/// entries parsed by splitting on the first constraint operator.
fn parse_environment_yml(text: &str) -> Result<Vec<RawDependency>> {
    let parsed: EnvironmentYml = serde_yaml::from_str(text).map_err(|err| DepotError::ParseError {
        context: "environment.yml".to_string(),
        message: err.to_string(),
    })?;
    let op_re = Regex::new(r"^([A-Za-z0-9_.-]+)\s*(.*)$").expect("static regex");
    let mut deps = Vec::new();
    for entry in parsed.dependencies {
        let EnvironmentDependency::Conda(spec) = entry else { continue };
        let Some(caps) = op_re.captures(spec.trim()) else { continue };
        deps.push(RawDependency::required(caps[1].to_string(), caps[2].trim().to_string()));
    }
    Ok(deps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requirements_txt_skips_comments_and_editable_installs() {
        let text = "# top comment\nFlask==2.0.0\nrequests>=2.28,<3\n-e .\n\nclick\n";
        let deps = parse_requirements_txt(text).unwrap();
        assert_eq!(deps.len(), 3);
        assert_eq!(deps[0].name, "Flask");
        assert_eq!(deps[0].constraint, "==2.0.0");
        assert_eq!(deps[2].constraint, "");
    }

    #[test]
    fn package_json_splits_required_and_optional() {
        let text = r#"{"dependencies": {"left-pad": "^1.3.0"}, "optionalDependencies": {"fsevents": "^2.3.0"}}"#;
        let deps = parse_package_json(text).unwrap();
        assert_eq!(deps.len(), 2);
        assert!(deps.iter().any(|d| d.name == "left-pad" && !d.optional));
        assert!(deps.iter().any(|d| d.name == "fsevents" && d.optional));
    }

    #[test]
    fn pom_xml_reads_dependency_block() {
        let text = r#"<project>
            <dependencies>
                <dependency>
                    <groupId>org.springframework</groupId>
                    <artifactId>spring-jcl</artifactId>
                    <version>5.3.0</version>
                    <scope>test</scope>
                </dependency>
            </dependencies>
        </project>"#;
        let deps = parse_pom_xml(text).unwrap();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].name, "org.springframework:spring-jcl");
        assert_eq!(deps[0].constraint, "5.3.0");
    }

    #[test]
    fn environment_yml_parses_conda_entries_and_skips_pip_block() {
        let text = "name: demo\ndependencies:\n  - numpy=1.26.0\n  - python=3.12\n  - pip:\n      - some-pip-only-pkg\n";
        let deps = parse_environment_yml(text).unwrap();
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].name, "numpy");
        assert_eq!(deps[0].constraint, "=1.26.0");
    }

    #[test]
    fn yum_and_docker_have_no_manifest_format() {
        assert!(parse_manifest(Ecosystem::Yum, "anything").unwrap().is_empty());
        assert!(parse_manifest(Ecosystem::Docker, "anything").unwrap().is_empty());
    }
}
