//! Architecture/OS filter (spec 4.2): drops artifacts whose declared arch
//! does not match the target, for ecosystems where that matters (yum, conda,
//! npm's optional native-dependency artifacts).

/// Normalizes common architecture aliases so "x86_64" and "amd64" (etc.)
/// compare equal.
#[must_use]
fn normalize_arch(arch: &str) -> &str {
    match arch.to_ascii_lowercase().as_str() {
        "amd64" | "x64" => "x86_64",
        "arm64" => "aarch64",
        "i686" | "i386" => "i386",
        _ => arch,
    }
}

#[must_use]
pub fn arch_matches(declared: &str, target: &str) -> bool {
    if declared.eq_ignore_ascii_case("noarch") || declared.eq_ignore_ascii_case("any") {
        return true;
    }
    normalize_arch(declared).eq_ignore_ascii_case(normalize_arch(target))
}

#[must_use]
pub fn os_matches(declared: Option<&str>, target_os: &str) -> bool {
    match declared {
        None => true,
        Some(d) => d.eq_ignore_ascii_case(target_os) || d.eq_ignore_ascii_case("any"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arch_aliases_normalize() {
        assert!(arch_matches("amd64", "x86_64"));
        assert!(arch_matches("arm64", "aarch64"));
        assert!(!arch_matches("i386", "x86_64"));
    }

    #[test]
    fn noarch_always_matches() {
        assert!(arch_matches("noarch", "anything"));
    }

    #[test]
    fn missing_os_declaration_matches_anything() {
        assert!(os_matches(None, "linux"));
        assert!(os_matches(Some("linux"), "linux"));
        assert!(!os_matches(Some("windows"), "linux"));
    }
}
