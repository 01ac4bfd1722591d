use penny_ontology::{MatchResult, RelationMatcher, levenshtein_with_max};
use penny_types::{LiveRelation, RelationId};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn live(entries: &[(&str, &str)]) -> Vec<LiveRelation> {
    entries
        .iter()
        .map(|(id, name)| LiveRelation {
            id: RelationId::from(*id),
            name: name.to_string(),
            format: "shorttext".into(),
        })
        .collect()
}

fn reused_id(result: &MatchResult) -> Option<&str> {
    match result {
        MatchResult::Reused { id, .. } => Some(id.as_str()),
        MatchResult::NotFound => None,
    }
}

#[test]
fn exact_normalized_match_is_reused_without_warning() {
    let matcher = RelationMatcher::default();
    let relations = live(&[("rel_1", "Status"), ("rel_2", "Due Date")]);

    for desired in ["Status", " status ", "STATUS", "Sta\u{00AD}tus", "due-date", "Due  Date"] {
        let result = matcher.match_name(desired, &relations);
        match result {
            MatchResult::Reused { fuzzy, .. } => assert!(fuzzy.is_none(), "{desired}"),
            MatchResult::NotFound => panic!("{desired} should match"),
        }
    }
}

#[test]
fn near_match_is_reused_with_warning() {
    let matcher = RelationMatcher::default();
    let relations = live(&[("rel_1", "Priority")]);

    match matcher.match_name("Priorty", &relations) {
        MatchResult::Reused {
            id,
            matched_name,
            fuzzy,
        } => {
            assert_eq!(id.as_str(), "rel_1");
            assert_eq!(matched_name, "Priority");
            let warning = fuzzy.expect("fuzzy warning");
            assert_eq!(warning.desired, "Priorty");
            assert_eq!(warning.matched, "Priority");
            assert_eq!(warning.distance, 1);
        }
        MatchResult::NotFound => panic!("expected a fuzzy reuse"),
    }
}

#[test]
fn exact_match_beats_earlier_fuzzy_candidate() {
    let matcher = RelationMatcher::default();
    let relations = live(&[("rel_1", "Stats"), ("rel_2", "Status")]);
    let result = matcher.match_name("status", &relations);
    assert_eq!(reused_id(&result), Some("rel_2"));
}

#[test]
fn closest_fuzzy_candidate_wins() {
    let matcher = RelationMatcher::default();
    let relations = live(&[("rel_1", "Categories"), ("rel_2", "Category")]);
    let result = matcher.match_name("Categry", &relations);
    assert_eq!(reused_id(&result), Some("rel_2"));
}

#[test]
fn short_names_are_never_fuzzy_matched() {
    let matcher = RelationMatcher::default();
    assert_eq!(matcher.match_name("Tag", &live(&[("rel_1", "Tags")])), MatchResult::NotFound);
    assert_eq!(matcher.match_name("Url", &live(&[("rel_1", "Uri")])), MatchResult::NotFound);
}

#[test]
fn distant_names_are_not_found() {
    let matcher = RelationMatcher::default();
    let relations = live(&[("rel_1", "Status"), ("rel_2", "Owner")]);
    assert_eq!(matcher.match_name("Deadline", &relations), MatchResult::NotFound);
    assert_eq!(matcher.match_name("Stage", &relations), MatchResult::NotFound);
}

#[test]
fn strict_matcher_only_reuses_exact_names() {
    let matcher = RelationMatcher::new(0, 4);
    let relations = live(&[("rel_1", "Priority")]);
    assert_eq!(matcher.match_name("Priorty", &relations), MatchResult::NotFound);
    assert!(matcher.match_name("priority", &relations).is_reused());
}

#[test]
fn empty_key_never_matches() {
    let matcher = RelationMatcher::default();
    assert_eq!(matcher.match_name("--", &live(&[("rel_1", "x")])), MatchResult::NotFound);
}

#[test]
fn closest_picks_among_plain_names() {
    let matcher = RelationMatcher::default();
    let pending = ["Status", "Priority"];

    let (index, warning) = matcher.closest("Priorty", &pending).unwrap();
    assert_eq!(index, 1);
    let warning = warning.unwrap();
    assert_eq!(warning.matched, "Priority");
    assert_eq!(warning.distance, 1);

    assert_eq!(matcher.closest(" STATUS ", &pending), Some((0, None)));
    assert_eq!(matcher.closest("Owner", &pending), None);
    assert_eq!(matcher.closest("Status", &[]), None);
}

#[test]
fn levenshtein_known_values() {
    assert_eq!(levenshtein_with_max("kitten", "sitting", 3), Some(3));
    assert_eq!(levenshtein_with_max("kitten", "sitting", 2), None);
    assert_eq!(levenshtein_with_max("", "abc", 3), Some(3));
    assert_eq!(levenshtein_with_max("same", "same", 0), Some(0));
    assert_eq!(levenshtein_with_max("fälligam", "falligam", 2), Some(1));
}

proptest! {
    #[test]
    fn levenshtein_is_symmetric(a in "[a-z]{0,12}", b in "[a-z]{0,12}") {
        prop_assert_eq!(levenshtein_with_max(&a, &b, 4), levenshtein_with_max(&b, &a, 4));
    }

    #[test]
    fn levenshtein_zero_iff_equal(a in "[a-z]{0,12}", b in "[a-z]{0,12}") {
        prop_assert_eq!(levenshtein_with_max(&a, &b, 2) == Some(0), a == b);
    }

    #[test]
    fn levenshtein_respects_bound(a in "[a-z]{0,12}", b in "[a-z]{0,12}", max in 0usize..5) {
        if let Some(d) = levenshtein_with_max(&a, &b, max) {
            prop_assert!(d <= max);
        }
    }

    #[test]
    fn single_edit_is_distance_one(a in "[a-z]{1,12}", c in "[a-z]") {
        let appended = format!("{a}{c}");
        prop_assert_eq!(levenshtein_with_max(&a, &appended, 2), Some(1));
    }
}
