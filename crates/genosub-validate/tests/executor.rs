//! Executor tests: result ordering and validation-slot admission.

use genosub_model::Report;
use genosub_validate::{
    FlowExecutor, FlowType, LocalExecutor, UnitOutput, ValidationSlots, WorkUnit,
};

fn make_unit(name: &str) -> WorkUnit {
    WorkUnit::new(name, FlowType::Internal, || {
        Ok(UnitOutput::report_only(Report::new()))
    })
}

#[test]
fn results_come_back_in_submission_order() {
    let units = vec![make_unit("a"), make_unit("b"), make_unit("c")];
    let results = LocalExecutor::parallel().execute(units);
    let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b", "c"]);

    let units = vec![make_unit("a"), make_unit("b"), make_unit("c")];
    let results = LocalExecutor::sequential().execute(units);
    let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b", "c"]);
}

#[test]
fn one_unit_failure_does_not_poison_the_rest() {
    let units = vec![
        make_unit("ok"),
        WorkUnit::new("bad", FlowType::External, || {
            Err(genosub_validate::ValidateError::Executor("boom".to_string()))
        }),
        make_unit("also-ok"),
    ];
    let results = LocalExecutor::sequential().execute(units);
    assert!(results[0].output.is_ok());
    assert!(results[1].output.is_err());
    assert!(results[2].output.is_ok());
}

#[test]
fn same_submission_cannot_validate_twice() {
    let slots = ValidationSlots::new(4);
    let _guard = slots.acquire("release18", "PRJ1").unwrap();
    assert!(slots.acquire("release18", "PRJ1").is_err());
    // A different project is fine.
    let _other = slots.acquire("release18", "PRJ2").unwrap();
}

#[test]
fn global_ceiling_bounds_concurrent_runs() {
    let slots = ValidationSlots::new(1);
    let guard = slots.acquire("release18", "PRJ1").unwrap();
    assert!(slots.acquire("release18", "PRJ2").is_err());

    drop(guard);
    // The slot frees on drop.
    assert!(slots.acquire("release18", "PRJ2").is_ok());
}

#[test]
fn default_ceiling_is_one() {
    let slots = ValidationSlots::default();
    let _guard = slots.acquire("release18", "PRJ1").unwrap();
    assert!(slots.acquire("release18", "PRJ2").is_err());
}
