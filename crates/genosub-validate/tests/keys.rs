//! Relational key-integrity tests: orphan and unreferenced checks,
//! uniqueness, execution-mode equivalence, and exclusion handling.

use genosub_model::{ErrorKind, Relation};
use genosub_validate::{
    ExclusionDictionary, ExecutionMode, KeyRow, RelationCheck, check_relation, check_uniqueness,
};

fn make_relation(bidirectional: bool) -> Relation {
    Relation {
        fields: vec!["donor_id".to_string()],
        other_file_schema: "donor".to_string(),
        other_fields: vec!["donor_id".to_string()],
        bidirectional,
    }
}

fn key(value: &str, line: u64) -> KeyRow {
    KeyRow::new(vec![value.to_string()], line)
}

fn make_check<'a>(
    relation: &'a Relation,
    local: Vec<KeyRow>,
    referenced: Vec<KeyRow>,
) -> RelationCheck<'a> {
    RelationCheck {
        relation,
        local_file: "specimen.txt",
        local,
        referenced_file: "donor.txt",
        referenced,
    }
}

#[test]
fn orphan_tuples_are_reported_once_each() {
    let relation = make_relation(false);
    let check = make_check(
        &relation,
        vec![key("DO1", 2), key("DO3", 3)],
        vec![key("DO1", 2), key("DO2", 3)],
    );
    let errors = check_relation(
        "PRJ1",
        &check,
        &ExclusionDictionary::default(),
        ExecutionMode::SingleNode,
    );

    assert_eq!(errors.local.len(), 1);
    assert_eq!(errors.local[0].kind, ErrorKind::RelationViolation);
    assert_eq!(errors.local[0].line_number, Some(3));
    assert_eq!(errors.local[0].value.as_deref(), Some("DO3"));
    assert!(errors.referenced.is_empty());
}

#[test]
fn blank_components_are_values_not_wildcards() {
    let relation = make_relation(false);
    let check = make_check(&relation, vec![key("", 2)], vec![key("DO1", 2)]);
    let errors = check_relation(
        "PRJ1",
        &check,
        &ExclusionDictionary::default(),
        ExecutionMode::SingleNode,
    );
    // The blank tuple does not match DO1; it is an ordinary orphan.
    assert_eq!(errors.local.len(), 1);
}

#[test]
fn unreferenced_keys_reported_only_when_bidirectional() {
    let local = vec![key("DO1", 2)];
    let referenced = vec![key("DO1", 2), key("DO2", 3)];

    let plain = make_relation(false);
    let errors = check_relation(
        "PRJ1",
        &make_check(&plain, local.clone(), referenced.clone()),
        &ExclusionDictionary::default(),
        ExecutionMode::SingleNode,
    );
    assert!(errors.referenced.is_empty());

    let bidirectional = make_relation(true);
    let errors = check_relation(
        "PRJ1",
        &make_check(&bidirectional, local, referenced),
        &ExclusionDictionary::default(),
        ExecutionMode::SingleNode,
    );
    assert_eq!(errors.referenced.len(), 1);
    assert_eq!(errors.referenced[0].kind, ErrorKind::UnusedReferencedKey);
    assert_eq!(errors.referenced[0].line_number, Some(3));
}

#[test]
fn partitioned_execution_matches_single_node() {
    let relation = make_relation(true);
    let local: Vec<KeyRow> = (0..200)
        .map(|i| key(&format!("DO{i}"), i as u64 + 2))
        .collect();
    // Every third referenced key is absent locally; every seventh local key
    // is absent from the referenced side.
    let referenced: Vec<KeyRow> = (0..200)
        .filter(|i| i % 7 != 0)
        .map(|i| key(&format!("DO{i}"), i as u64 + 2))
        .chain((200..230).map(|i| key(&format!("DO{i}"), i as u64 + 2)))
        .collect();

    let single = check_relation(
        "PRJ1",
        &make_check(&relation, local.clone(), referenced.clone()),
        &ExclusionDictionary::default(),
        ExecutionMode::SingleNode,
    );
    for partitions in [2, 3, 8, 64] {
        let partitioned = check_relation(
            "PRJ1",
            &make_check(&relation, local.clone(), referenced.clone()),
            &ExclusionDictionary::default(),
            ExecutionMode::Partitioned(partitions),
        );
        assert_eq!(single.local, partitioned.local, "{partitions} partitions");
        assert_eq!(
            single.referenced, partitioned.referenced,
            "{partitions} partitions"
        );
    }
}

#[test]
fn excluded_analysis_is_skipped_after_the_join() {
    let relation = make_relation(false);
    let mut exclusions = ExclusionDictionary::default();
    exclusions
        .excluded_analysis_ids
        .insert("PRJ1".to_string(), vec!["AN1".to_string()]);

    let check = make_check(
        &relation,
        vec![
            key("DO3", 2).with_analysis_id("AN1"),
            key("DO4", 3).with_analysis_id("AN2"),
        ],
        vec![key("DO1", 2)],
    );
    let errors = check_relation("PRJ1", &check, &exclusions, ExecutionMode::SingleNode);
    // Only the non-grandfathered miss is reported.
    assert_eq!(errors.local.len(), 1);
    assert_eq!(errors.local[0].value.as_deref(), Some("DO4"));
}

#[test]
fn excluded_project_suppresses_every_miss() {
    let relation = make_relation(false);
    let exclusions = ExclusionDictionary {
        excluded_project_keys: vec!["PRJ1".to_string()],
        ..ExclusionDictionary::default()
    };
    let check = make_check(
        &relation,
        vec![key("DO9", 2).with_analysis_id("AN1")],
        vec![],
    );
    let errors = check_relation("PRJ1", &check, &exclusions, ExecutionMode::SingleNode);
    assert!(errors.local.is_empty());

    // A different project is unaffected.
    let check = make_check(
        &relation,
        vec![key("DO9", 2).with_analysis_id("AN1")],
        vec![],
    );
    let errors = check_relation("PRJ2", &check, &exclusions, ExecutionMode::SingleNode);
    assert_eq!(errors.local.len(), 1);
}

#[test]
fn duplicate_keys_skip_the_first_occurrence() {
    let rows = vec![key("DO1", 2), key("DO2", 3), key("DO1", 4), key("DO1", 5)];
    let errors = check_uniqueness(&["donor_id".to_string()], &rows);
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|e| e.kind == ErrorKind::DuplicateKey));
    assert_eq!(errors[0].line_number, Some(4));
    assert_eq!(errors[1].line_number, Some(5));
}

#[test]
fn error_stream_is_sorted_by_line() {
    let relation = make_relation(false);
    let check = make_check(
        &relation,
        vec![key("ZZ", 9), key("AA", 2), key("MM", 5)],
        vec![],
    );
    let errors = check_relation(
        "PRJ1",
        &check,
        &ExclusionDictionary::default(),
        ExecutionMode::SingleNode,
    );
    let lines: Vec<Option<u64>> = errors.local.iter().map(|e| e.line_number).collect();
    assert_eq!(lines, vec![Some(2), Some(5), Some(9)]);
}
