//! Integration tests for the record query language.
//!
//! These tests exercise the public parser API with the query shapes the
//! research front end actually sends.

use ehr_query::{parse_query, Columns, GroupBy, MatchKind, Predicate, QueryPlan, DEFAULT_LIMIT};

#[test]
fn test_condition_equality_and_like_forms() {
    let eq = parse_query("SELECT * FROM ehr_records WHERE condition = 'Diabetes'");
    let like = parse_query("SELECT * FROM ehr_records WHERE condition LIKE '%abet%'");

    assert_eq!(eq.predicate("condition"), Some(&Predicate::equals("Diabetes")));
    assert_eq!(like.predicate("condition").map(|p| p.kind), Some(MatchKind::Like));
    assert_eq!(like.predicate("condition").map(|p| p.value.as_str()), Some("abet"));
}

#[test]
fn test_group_by_gender_plan() {
    let plan = parse_query("SELECT * FROM ehr_records GROUP BY gender");
    assert!(plan.is_grouped());
    assert_eq!(plan.group_by, Some(GroupBy::Gender));
    assert!(plan.predicates.is_empty());
}

#[test]
fn test_empty_and_whitespace_queries_are_equivalent_defaults() {
    let empty = parse_query("");
    let blank = parse_query("   \r\n  ");

    assert_eq!(empty, QueryPlan::default());
    assert_eq!(blank, QueryPlan::default());
    assert_eq!(empty.columns, Columns::All);
    assert_eq!(empty.effective_limit(DEFAULT_LIMIT), DEFAULT_LIMIT);
}

#[test]
fn test_plan_limit_overrides_fallback() {
    let plan = parse_query("SELECT * FROM ehr_records LIMIT 3");
    assert_eq!(plan.effective_limit(DEFAULT_LIMIT), 3);
}

#[test]
fn test_mixed_case_everything() {
    let plan = parse_query("sElEcT * fRoM ehr_records wHeRe GeNdEr = 'Female' AnD ReGiOn LiKe '%south%' gRoUp By ReGiOn LiMiT 4");
    assert_eq!(plan.predicate("gender"), Some(&Predicate::equals("Female")));
    assert_eq!(plan.predicate("region"), Some(&Predicate::like("south")));
    assert_eq!(plan.group_by, Some(GroupBy::Region));
    assert_eq!(plan.limit, Some(4));
}

#[test]
fn test_joins_produce_partial_plan() {
    let plan = parse_query(
        "SELECT * FROM ehr_records JOIN visits ON ehr_records.id = visits.id WHERE gender = 'Male'",
    );
    assert_eq!(plan.table.as_deref(), Some("ehr_records"));
    assert_eq!(plan.predicate("gender"), Some(&Predicate::equals("Male")));
    assert_eq!(plan.predicates.len(), 1);
}

#[test]
fn test_never_panics_on_odd_input() {
    let inputs = [
        "'",
        "\"",
        "WHERE",
        "WHERE AND AND",
        "GROUP BY",
        "LIMIT",
        "SELECT",
        "%%%",
        "WHERE x LIKE",
        "WHERE x = ",
        "ünïcödé = 'ä'",
    ];
    for input in inputs {
        let _ = parse_query(input);
    }
}

#[cfg(feature = "serde")]
#[test]
fn test_plan_serializes() {
    let plan = parse_query("SELECT * FROM ehr_records WHERE gender = 'Male' LIMIT 2");
    let json = serde_json::to_string(&plan).unwrap();
    let back: QueryPlan = serde_json::from_str(&json).unwrap();
    assert_eq!(plan, back);
}
