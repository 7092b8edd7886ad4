//! Deterministic docker-volume naming.

/// Strip every non-alphanumeric character.
///
/// The filtering is deliberately non-reversible: two logical paths that
/// differ only in stripped characters map to the same identifier. That
/// collision is an accepted limitation of the naming scheme.
pub fn alphanumeric_filter(s: &str) -> String {
    s.chars().filter(char::is_ascii_alphanumeric).collect()
}

/// Derive the docker-volume identifier for a logical in-container path.
///
/// Pure function of its inputs; stable across runs and case-sensitive, so
/// a volume provisioned on install can always be found again by name.
pub fn volume_id(service_name: &str, logical_path: &str) -> String {
    format!(
        "drunner-{service_name}-{}",
        alphanumeric_filter(logical_path)
    )
}
