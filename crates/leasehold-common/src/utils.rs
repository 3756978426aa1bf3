//! Utility functions for leasehold

use std::sync::LazyLock;

/// Namespaces become the first segment of every physical key, so they may
/// not contain the `/` separator.
static NAMESPACE_PATTERN: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new("^[a-zA-Z0-9_.:-]+$").expect("Invalid regex pattern"));

/// Validate a namespace
///
/// Allowed characters: alphanumeric, underscore, dot, colon, hyphen.
/// The empty string is rejected.
///
/// # Examples
///
/// ```
/// use leasehold_common::is_valid_namespace;
///
/// assert!(is_valid_namespace("billing-jobs"));
/// assert!(is_valid_namespace("prod:eu.west_1"));
/// assert!(!is_valid_namespace("a/b"));
/// assert!(!is_valid_namespace(""));
/// ```
pub fn is_valid_namespace(namespace: &str) -> bool {
    NAMESPACE_PATTERN.is_match(namespace)
}
