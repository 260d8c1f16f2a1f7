//! Update detection: semver comparison of installed versus newest available.

use semver::Version;
use tracing::debug;

use crate::state::Package;

/// What: Parse a version string leniently into a semver [`Version`].
///
/// Inputs:
/// - `raw`: Version string as reported by the catalog
///
/// Output:
/// - `Some(Version)` when the string is semver or can be coerced to a
///   `major.minor.patch` prefix; `None` otherwise.
///
/// Details:
/// - Exact semver (including pre-release tags, e.g. `1.2.3-rc.1`) parses
///   as-is so pre-release precedence is honored.
/// - Otherwise the leading numeric components are extracted and missing
///   parts default to zero: `1.24` -> `1.24.0`, `v2.1` -> `2.1.0`,
///   `2021.04.1build3` -> `2021.4.1`.
#[must_use]
pub fn coerce_version(raw: &str) -> Option<Version> {
    let trimmed = raw.trim().trim_start_matches(['v', 'V']);
    if let Ok(v) = Version::parse(trimmed) {
        return Some(v);
    }

    // Numeric prefix: digits and dots up to the first foreign character.
    let start = trimmed.find(|c: char| c.is_ascii_digit())?;
    let mut parts: [u64; 3] = [0; 3];
    let mut idx = 0usize;
    let mut seen_digit = false;
    for ch in trimmed[start..].chars() {
        if let Some(d) = ch.to_digit(10) {
            seen_digit = true;
            parts[idx] = parts[idx].checked_mul(10)?.checked_add(u64::from(d))?;
        } else if ch == '.' && seen_digit && idx < 2 {
            idx += 1;
            seen_digit = false;
        } else {
            break;
        }
    }
    Some(Version::new(parts[0], parts[1], parts[2]))
}

/// What: Mark each package's `updatable` flag after a catalog refresh.
///
/// Inputs:
/// - `packages`: Freshly fetched catalog, mutated in place
///
/// Output:
/// - `true` when at least one package is updatable.
///
/// Details:
/// - A package is updatable when the newest entry of `versions_available`
///   strictly exceeds `version_installed` under semver precedence.
/// - A malformed version string on either side makes that one package "not
///   updatable" and is logged at debug; it never aborts the batch.
pub fn mark_updatable(packages: &mut [Package]) -> bool {
    let mut has_update = false;
    for pkg in packages.iter_mut() {
        pkg.updatable = is_updatable(pkg);
        has_update |= pkg.updatable;
    }
    has_update
}

/// Decide updatability for a single package; malformed versions lose.
fn is_updatable(pkg: &Package) -> bool {
    let Some(installed_raw) = pkg.version_installed.as_deref() else {
        return false;
    };
    let Some(newest_raw) = pkg.newest_available() else {
        return false;
    };
    match (coerce_version(newest_raw), coerce_version(installed_raw)) {
        (Some(newest), Some(installed)) => newest > installed,
        _ => {
            debug!(
                name = %pkg.name,
                installed = %installed_raw,
                newest = %newest_raw,
                "unparseable version, treating as not updatable"
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pkg(name: &str, installed: Option<&str>, available: &[&str]) -> Package {
        Package {
            name: name.to_string(),
            versions_available: available.iter().map(|s| (*s).to_string()).collect(),
            version_installed: installed.map(str::to_string),
            summary: String::new(),
            updatable: false,
        }
    }

    #[test]
    /// What: Lenient coercion of catalog version strings
    ///
    /// - Input: Semver, partial, prefixed, and suffixed versions
    /// - Output: Expected major.minor.patch triples; None for junk
    fn updates_coerce_version_lenient() {
        assert_eq!(coerce_version("1.24.0"), Some(Version::new(1, 24, 0)));
        assert_eq!(coerce_version("1.24"), Some(Version::new(1, 24, 0)));
        assert_eq!(coerce_version("v2.1"), Some(Version::new(2, 1, 0)));
        assert_eq!(coerce_version("2021.04.1build3"), Some(Version::new(2021, 4, 1)));
        assert_eq!(coerce_version("garbage"), None);
        let pre = coerce_version("1.2.3-rc.1").expect("pre-release parses");
        assert!(pre < Version::new(1, 2, 3));
    }

    #[test]
    /// What: Newest available strictly greater marks a package updatable
    ///
    /// - Input: numpy 1.20.0 installed, ["1.20.0", "1.24.0"] available
    /// - Output: updatable true; has_update true
    fn updates_newer_available_marks_updatable() {
        let mut pkgs = vec![pkg("numpy", Some("1.20.0"), &["1.20.0", "1.24.0"])];
        assert!(mark_updatable(&mut pkgs));
        assert!(pkgs[0].updatable);
    }

    #[test]
    /// What: Equal or older newest version is not an update
    ///
    /// - Input: Installed equals newest; installed newer than newest
    /// - Output: updatable false in both cases
    fn updates_equal_or_older_not_updatable() {
        let mut pkgs = vec![
            pkg("same", Some("1.24.0"), &["1.20.0", "1.24.0"]),
            pkg("ahead", Some("2.0.0"), &["1.9.0"]),
        ];
        assert!(!mark_updatable(&mut pkgs));
        assert!(!pkgs[0].updatable);
        assert!(!pkgs[1].updatable);
    }

    #[test]
    /// What: A malformed version never aborts the batch
    ///
    /// - Input: One package with a junk installed version, one updatable
    /// - Output: Junk package not updatable; the other still marked
    fn updates_malformed_version_swallowed() {
        let mut pkgs = vec![
            pkg("broken", Some("not-a-version"), &["1.0.0"]),
            pkg("fine", Some("1.0.0"), &["1.1.0"]),
        ];
        assert!(mark_updatable(&mut pkgs));
        assert!(!pkgs[0].updatable);
        assert!(pkgs[1].updatable);
    }

    #[test]
    /// What: Pre-release newest does not beat its own release
    ///
    /// - Input: 1.2.3 installed, newest 1.2.4-rc.1 then 1.2.3-rc.1
    /// - Output: rc of a higher patch is an update; rc of the same patch is
    ///   not
    fn updates_pre_release_precedence() {
        let mut pkgs = vec![pkg("a", Some("1.2.3"), &["1.2.4-rc.1"])];
        assert!(mark_updatable(&mut pkgs));
        let mut pkgs = vec![pkg("a", Some("1.2.3"), &["1.2.3-rc.1"])];
        assert!(!mark_updatable(&mut pkgs));
    }
}
