//! Conda build-tag filtering (spec 4.2): for a requested Python X.Y, keep
//! only candidates whose build string matches `pyXY*` or `noarch`.

/// `python_version` like `"3.12"` or `"3.12.1"`; only the first two
/// components matter for the `pyXY` tag.
#[must_use]
pub fn python_tag(python_version: &str) -> String {
    let mut parts = python_version.split('.');
    let major = parts.next().unwrap_or("3");
    let minor = parts.next().unwrap_or("0");
    format!("py{major}{minor}")
}

/// True if `build` is compatible with the requested Python version: either
/// `noarch` (no python-version constraint) or a `pyXY*` prefix match.
#[must_use]
pub fn build_matches(build: &str, python_version: &str) -> bool {
    if build == "noarch" || build.starts_with("noarch") {
        return true;
    }
    let tag = python_tag(python_version);
    build.starts_with(&tag)
}

/// Conda subdir compatibility: the package's declared subdir must equal the
/// target subdir, or be the universal `noarch` subdir.
#[must_use]
pub fn subdir_matches(package_subdir: &str, target_subdir: &str) -> bool {
    package_subdir == "noarch" || package_subdir == target_subdir
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn python_tag_formats_major_minor() {
        assert_eq!(python_tag("3.12.1"), "py312");
        assert_eq!(python_tag("3.9"), "py39");
    }

    #[test]
    fn build_matches_accepts_noarch_and_matching_tag() {
        assert!(build_matches("noarch_0", "3.12"));
        assert!(build_matches("py312h1234_0", "3.12"));
        assert!(!build_matches("py311h1234_0", "3.12"));
    }

    #[test]
    fn subdir_matches_allows_noarch() {
        assert!(subdir_matches("noarch", "linux-64"));
        assert!(subdir_matches("linux-64", "linux-64"));
        assert!(!subdir_matches("osx-64", "linux-64"));
    }
}
