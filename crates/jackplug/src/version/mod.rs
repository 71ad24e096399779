//! Version-compatibility predicate over semantic versions.
//!
//! The manager only ever needs one boolean question answered: is an
//! installed version acceptable where a minimum version is required? Two
//! versions are compatible when both parse, share the same major number,
//! and the installed one is not older than the requirement. Abbreviated
//! forms such as `"1"` or `"1.2"` are zero-padded before parsing and a
//! leading `v` is tolerated; anything else that `semver` rejects is never
//! compatible.

use semver::Version;

/// Returns `true` when `installed` satisfies a requirement of at least
/// `required` within the same major version.
///
/// # Example
///
/// ```
/// use jackplug::version::compatible;
///
/// assert!(compatible("1.2.0", "1.0.0"));
/// assert!(compatible("1.2", "1"));
/// assert!(!compatible("2.0.0", "1.0.0"));
/// assert!(!compatible("1.0.0", "1.1.0"));
/// assert!(!compatible("not-a-version", "1.0.0"));
/// ```
#[must_use]
pub fn compatible(installed: &str, required: &str) -> bool {
    match (parse_lenient(installed), parse_lenient(required)) {
        (Some(installed), Some(required)) => {
            installed.major == required.major && installed >= required
        }
        _ => false,
    }
}

/// Parses a version string, padding `X` and `X.Y` forms to full semver.
fn parse_lenient(text: &str) -> Option<Version> {
    let trimmed = text.trim().trim_start_matches('v');
    if let Ok(version) = Version::parse(trimmed) {
        return Some(version);
    }
    let padded = match trimmed.split('.').count() {
        1 => format!("{trimmed}.0.0"),
        2 => format!("{trimmed}.0"),
        _ => return None,
    };
    Version::parse(&padded).ok()
}
