//! Property-based tests for name normalization.

use penny_types::normalize_name;
use proptest::prelude::*;

#[test]
fn soft_hyphen_and_padding_are_ignored() {
    assert_eq!(normalize_name("Sta\u{00AD}tus "), "status");
    assert_eq!(normalize_name("  Status"), normalize_name("status"));
    assert_eq!(normalize_name("Due_Date"), "duedate");
}

#[test]
fn non_ascii_letters_survive() {
    assert_eq!(normalize_name("Fällig am"), "fälligam");
}

proptest! {
    #[test]
    fn normalization_is_idempotent(s in "[a-zA-Z0-9 äöüÄÖÜß_.-]{0,40}") {
        let once = normalize_name(&s);
        prop_assert_eq!(normalize_name(&once), once);
    }

    #[test]
    fn normalization_ignores_ascii_case(s in "[a-zA-Z0-9 ]{0,40}") {
        prop_assert_eq!(normalize_name(&s.to_uppercase()), normalize_name(&s.to_lowercase()));
    }

    #[test]
    fn normalized_names_contain_no_whitespace(s in "\\PC{0,40}") {
        prop_assert!(!normalize_name(&s).chars().any(char::is_whitespace));
    }
}
