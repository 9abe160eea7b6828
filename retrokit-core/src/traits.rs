//! Contracts shared by the chemistry and report crates.

/// Stable identity derived from content, used to prove that two runs
/// produced the same molecule or the same report.
pub trait ContentAddressable {
    /// Lowercase SHA-256 hex digest.
    fn content_hash(&self) -> String;
}

/// One-line description for log records.
pub trait Summarizable {
    fn summary(&self) -> String;
}
