//! Integration tests for the ticket dependency graph.
//!
//! Tests dependency management, cycle detection, unblocked work and
//! auto-completion.

mod common;

use agentplan::{DependencySet, ProjectStatus, StoreBatchExt, StoreError, TicketStatus};
use common::{TestEnv, store_error};

// =============================================================================
// Unblocked Work Tests
// =============================================================================

#[test]
fn test_unblocked_empty_project() {
    let mut env = TestEnv::new();
    let project = env.create_project("Empty", &[]);

    env.assert_unblocked(&project, &[]);
}

#[test]
fn test_unblocked_independent_tickets() {
    let mut env = TestEnv::new();
    let project = env.create_project("Independent", &["One", "Two", "Three"]);

    env.assert_unblocked(&project, &[1, 2, 3]);
}

#[test]
fn test_unblocked_excludes_terminal_tickets() {
    let mut env = TestEnv::new();
    let project = env.create_project("Mixed", &["One", "Two", "Three"]);

    env.done(&project, &[1]);
    env.skip(&project, &[3]);

    env.assert_unblocked(&project, &[2]);
}

#[test]
fn test_unblocked_includes_in_progress() {
    let mut env = TestEnv::new();
    let project = env.create_project("Working", &["One", "Two"]);

    env.store.start_ticket(&project.slug, 2).unwrap();

    env.assert_unblocked(&project, &[1, 2]);
}

#[test]
fn test_unblocked_requires_every_dependency() {
    let mut env = TestEnv::new();
    let project = env.create_project("Fan in", &["A", "B", "C"]);
    env.add_dep(&project, 3, &[1, 2]);

    env.done(&project, &[1]);
    env.assert_unblocked(&project, &[2]);

    // Skipped satisfies a dependency the same way done does
    env.skip(&project, &[2]);
    env.assert_unblocked(&project, &[3]);
}

#[test]
fn test_scenario_chain_to_completion() {
    let mut env = TestEnv::new();
    let project = env.create_project("Chain", &["A", "B", "C"]);
    env.add_dep(&project, 2, &[1]);
    env.add_dep(&project, 3, &[1]);
    env.add_dep(&project, 3, &[2]);

    env.assert_unblocked(&project, &[1]);

    env.done(&project, &[1]);
    env.assert_unblocked(&project, &[2]);

    env.done(&project, &[2]);
    env.assert_unblocked(&project, &[3]);
    assert_eq!(env.project_status(&project), ProjectStatus::Active);

    env.done(&project, &[3]);
    env.assert_unblocked(&project, &[]);
    assert_eq!(env.project_status(&project), ProjectStatus::Completed);
}

// =============================================================================
// Cycle Detection Tests
// =============================================================================

#[test]
fn test_cycle_detection_simple() {
    let mut env = TestEnv::new();
    let project = env.create_project("Simple", &["A", "B"]);
    env.add_dep(&project, 2, &[1]);

    let err = env
        .store
        .add_dependency(&project.slug, 1, &DependencySet::from([2]))
        .unwrap_err();

    assert!(matches!(store_error(&err), Some(StoreError::CycleDetected { .. })));
    assert!(env.deps_of(&project, 1).is_empty());
    assert_eq!(env.deps_of(&project, 2), vec![1]);
}

#[test]
fn test_scenario_transitive_cycle_rejected() {
    let mut env = TestEnv::new();
    let project = env.create_project("Transitive", &["A", "B", "C"]);
    // C -> B -> A
    env.add_dep(&project, 2, &[1]);
    env.add_dep(&project, 3, &[2]);

    // A -> C would close A -> C -> B -> A
    let err = env
        .store
        .add_dependency(&project.slug, 1, &DependencySet::from([3]))
        .unwrap_err();

    assert!(matches!(store_error(&err), Some(StoreError::CycleDetected { .. })));
    assert!(env.deps_of(&project, 1).is_empty());
    assert_eq!(env.deps_of(&project, 2), vec![1]);
    assert_eq!(env.deps_of(&project, 3), vec![2]);
}

#[test]
fn test_cycle_detection_self_reference() {
    let mut env = TestEnv::new();
    let project = env.create_project("Self", &["A"]);

    let err = env
        .store
        .add_dependency(&project.slug, 1, &DependencySet::from([1]))
        .unwrap_err();

    assert_eq!(store_error(&err), Some(&StoreError::CycleDetected { ticket: 1 }));
    assert!(env.deps_of(&project, 1).is_empty());
}

#[test]
fn test_cycle_rejection_is_all_or_nothing() {
    let mut env = TestEnv::new();
    let project = env.create_project("Partial", &["A", "B", "C"]);
    env.add_dep(&project, 1, &[2]);

    // 3 is fine on its own, 2 closes a cycle; neither is stored
    let err = env
        .store
        .add_dependency(&project.slug, 2, &DependencySet::from([1, 3]))
        .unwrap_err();

    assert!(matches!(store_error(&err), Some(StoreError::CycleDetected { .. })));
    assert!(env.deps_of(&project, 2).is_empty());
}

#[test]
fn test_no_false_positive_on_diamond() {
    let mut env = TestEnv::new();
    let project = env.create_project("Diamond", &["Top", "Left", "Right", "Bottom"]);

    env.add_dep(&project, 2, &[1]);
    env.add_dep(&project, 3, &[1]);
    env.add_dep(&project, 4, &[2, 3]);

    assert_eq!(env.deps_of(&project, 4), vec![2, 3]);
    env.assert_unblocked(&project, &[1]);
}

#[test]
fn test_add_dependency_merges_with_existing() {
    let mut env = TestEnv::new();
    let project = env.create_project("Merge", &["A", "B", "C"]);

    env.add_dep(&project, 3, &[1]);
    let ticket = env.add_dep(&project, 3, &[2, 1]);

    assert_eq!(ticket.depends_on, DependencySet::from([1, 2]));
}

#[test]
fn test_add_ticket_with_dependencies() {
    let mut env = TestEnv::new();
    let project = env.create_project("Deps on add", &["A", "B"]);

    let ticket = env
        .store
        .add_ticket(&project.slug, "C", &DependencySet::from([1, 2]), None)
        .unwrap();

    assert_eq!(ticket.num, 3);
    assert_eq!(env.deps_of(&project, 3), vec![1, 2]);
    env.assert_unblocked(&project, &[1, 2]);
}

#[test]
fn test_unknown_dependency_rejected() {
    let mut env = TestEnv::new();
    let project = env.create_project("Unknown", &["A"]);

    let err = env
        .store
        .add_ticket(&project.slug, "B", &DependencySet::from([7]), None)
        .unwrap_err();

    assert!(matches!(store_error(&err), Some(StoreError::Validation(_))));
    assert_eq!(env.store.list_tickets(&project.slug, None).unwrap().len(), 1);
}

// =============================================================================
// Ticket Removal Tests
// =============================================================================

#[test]
fn test_remove_ticket_strips_dependents() {
    let mut env = TestEnv::new();
    let project = env.create_project("Removal", &["A", "B", "C"]);
    env.add_dep(&project, 2, &[1]);
    env.add_dep(&project, 3, &[1, 2]);

    env.store.remove_ticket(&project.slug, 1).unwrap();

    assert!(env.deps_of(&project, 2).is_empty());
    assert_eq!(env.deps_of(&project, 3), vec![2]);
    env.assert_unblocked(&project, &[2]);
}

#[test]
fn test_removed_number_is_not_reused_while_higher_exists() {
    let mut env = TestEnv::new();
    let project = env.create_project("Numbers", &["A", "B", "C"]);

    env.store.remove_ticket(&project.slug, 2).unwrap();
    let ticket = env.add_ticket(&project, "D");

    assert_eq!(ticket.num, 4);
}

// =============================================================================
// Auto-Completion Tests
// =============================================================================

#[test]
fn test_project_stays_active_with_open_tickets() {
    let mut env = TestEnv::new();
    let project = env.create_project("Open", &["A", "B"]);

    env.done(&project, &[1]);

    assert_eq!(env.project_status(&project), ProjectStatus::Active);
}

#[test]
fn test_last_skip_completes_project() {
    let mut env = TestEnv::new();
    let project = env.create_project("Skip last", &["A", "B"]);
    env.done(&project, &[1]);

    let report = env.store.transition_ticket(&project.slug, 2, TicketStatus::Skipped).unwrap();

    assert!(report.project_completed);
    assert_eq!(env.project_status(&project), ProjectStatus::Completed);
}

#[test]
fn test_paused_project_auto_completes() {
    let mut env = TestEnv::new();
    let project = env.create_project("Paused", &["A"]);
    env.store.set_project_status(&project.slug, ProjectStatus::Paused).unwrap();

    env.done(&project, &[1]);

    assert_eq!(env.project_status(&project), ProjectStatus::Completed);
}

#[test]
fn test_abandoned_project_is_not_auto_completed() {
    let mut env = TestEnv::new();
    let project = env.create_project("Abandoned", &["A"]);
    env.store
        .set_project_status(&project.slug, ProjectStatus::Abandoned)
        .unwrap();

    let report = env.store.batch_done(&project.slug, &[1]).unwrap();

    assert!(!report.project_completed);
    assert_eq!(env.project_status(&project), ProjectStatus::Abandoned);
}

#[test]
fn test_repeated_done_reports_completion_once() {
    let mut env = TestEnv::new();
    let project = env.create_project("Once", &["A"]);

    let first = env.store.batch_done(&project.slug, &[1]).unwrap();
    let second = env.store.batch_done(&project.slug, &[1]).unwrap();

    assert!(first.project_completed);
    assert!(!second.project_completed);
    assert!(!second.changes[0].changed);
}
