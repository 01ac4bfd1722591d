//! Name normalization shared by manifest validation and relation matching.

/// Normalizes a schema name for identity comparison.
///
/// Case-folds and keeps only alphanumeric characters, so whitespace,
/// punctuation and invisible characters such as soft hyphens are dropped.
/// Two names that normalize equal denote the same relation within a space.
///
/// ```
/// use penny_types::normalize_name;
///
/// assert_eq!(normalize_name(" Status "), "status");
/// assert_eq!(normalize_name("Due-Date"), normalize_name("due date"));
/// ```
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_alphanumeric())
        .collect()
}
