//! Integration tests for error handling.
//!
//! Tests lookup failures, input validation, status transitions and storage.

mod common;

use agentplan::{
    Config, DependencySet, ProjectStatus, Store, StoreBatchExt, StoreError, StoreReportExt, TicketStatus,
    ValidationError,
};
use common::{TestEnv, store_error};
use tempfile::TempDir;

// =============================================================================
// Not Found Tests
// =============================================================================

#[test]
fn test_unknown_project_fails() {
    let env = TestEnv::new();

    let err = env.store.project("nope").unwrap_err();

    assert_eq!(store_error(&err), Some(&StoreError::ProjectNotFound("nope".into())));
}

#[test]
fn test_resolve_unknown_project_returns_none() {
    let env = TestEnv::new();
    assert!(env.store.resolve_project("nope").unwrap().is_none());
}

#[test]
fn test_add_ticket_to_unknown_project_fails() {
    let mut env = TestEnv::new();

    let err = env
        .store
        .add_ticket("nope", "Task", &DependencySet::new(), None)
        .unwrap_err();

    assert!(matches!(store_error(&err), Some(StoreError::ProjectNotFound(_))));
}

#[test]
fn test_unknown_ticket_fails() {
    let mut env = TestEnv::new();
    let project = env.create_project("Known", &["A"]);

    let err = env.store.start_ticket(&project.slug, 9).unwrap_err();

    assert_eq!(
        store_error(&err),
        Some(&StoreError::TicketNotFound {
            project: "known".into(),
            num: 9
        })
    );
}

#[test]
fn test_attach_to_unknown_ticket_fails() {
    let mut env = TestEnv::new();
    let project = env.create_project("Attach", &["A"]);

    let err = env
        .store
        .attach(&project.slug, "spec", "docs/spec.md", Some(5))
        .unwrap_err();

    assert!(matches!(store_error(&err), Some(StoreError::TicketNotFound { num: 5, .. })));
    assert!(env.store.list_attachments(&project.slug).unwrap().is_empty());
}

#[test]
fn test_status_report_unknown_project_fails() {
    let env = TestEnv::new();
    assert!(env.store.status_report("nope").is_err());
}

// =============================================================================
// Validation Tests
// =============================================================================

#[test]
fn test_create_empty_title_fails() {
    let mut env = TestEnv::new();

    let err = env.store.create_project("", None, &[]).unwrap_err();

    assert_eq!(store_error(&err), Some(&StoreError::Validation(ValidationError::EmptyTitle)));
}

#[test]
fn test_create_whitespace_title_fails() {
    let mut env = TestEnv::new();
    assert!(env.store.create_project("   ", None, &[]).is_err());
}

#[test]
fn test_create_with_invalid_ticket_title_creates_nothing() {
    let mut env = TestEnv::new();

    let err = env.store.create_project("Good", None, &["Fine", ""]).unwrap_err();

    assert!(matches!(store_error(&err), Some(StoreError::Validation(_))));
    assert!(env.store.list_projects(None).unwrap().is_empty());
}

#[test]
fn test_control_chars_in_title_fail() {
    let mut env = TestEnv::new();

    let err = env.store.create_project("Bad\u{7}title", None, &[]).unwrap_err();

    assert_eq!(
        store_error(&err),
        Some(&StoreError::Validation(ValidationError::InvalidCharacters))
    );
}

#[test]
fn test_empty_log_entry_fails() {
    let mut env = TestEnv::new();
    let project = env.create_project("Log", &[]);

    let err = env.store.log(&project.slug, "  ", None).unwrap_err();

    assert_eq!(
        store_error(&err),
        Some(&StoreError::Validation(ValidationError::EmptyLogEntry))
    );
}

#[test]
fn test_empty_attachment_label_fails() {
    let mut env = TestEnv::new();
    let project = env.create_project("Attach", &[]);

    let err = env.store.attach(&project.slug, "", "x.md", None).unwrap_err();

    assert_eq!(store_error(&err), Some(&StoreError::Validation(ValidationError::EmptyLabel)));
}

// =============================================================================
// Ticket Transition Tests
// =============================================================================

#[test]
fn test_transition_to_pending_fails() {
    let mut env = TestEnv::new();
    let project = env.create_project("Pending", &["A"]);
    env.store.start_ticket(&project.slug, 1).unwrap();

    let err = env
        .store
        .transition_ticket(&project.slug, 1, TicketStatus::Pending)
        .unwrap_err();

    assert_eq!(
        store_error(&err),
        Some(&StoreError::InvalidTransition {
            from: TicketStatus::InProgress,
            to: TicketStatus::Pending
        })
    );
}

#[test]
fn test_done_ticket_cannot_restart() {
    let mut env = TestEnv::new();
    let project = env.create_project("Restart", &["A", "B"]);
    env.done(&project, &[1]);

    let report = env.store.start_ticket(&project.slug, 1).unwrap();

    assert!(!report.changes[0].changed);
    assert_eq!(
        env.store.ticket(&project.slug, 1).unwrap().status,
        TicketStatus::Done
    );
}

#[test]
fn test_skipped_ticket_stays_skipped_when_done() {
    let mut env = TestEnv::new();
    let project = env.create_project("Skip", &["A", "B"]);
    env.skip(&project, &[1]);

    env.done(&project, &[1]);

    assert_eq!(
        env.store.ticket(&project.slug, 1).unwrap().status,
        TicketStatus::Skipped
    );
}

#[test]
fn test_batch_with_invalid_member_changes_nothing() {
    let mut env = TestEnv::new();
    let project = env.create_project("Batch", &["A", "B"]);

    let result = env.store.batch_transition(&project.slug, &[1, 2], TicketStatus::Pending);

    assert!(result.is_err());
    let statuses: Vec<_> = env
        .store
        .list_tickets(&project.slug, None)
        .unwrap()
        .iter()
        .map(|t| t.status)
        .collect();
    assert_eq!(statuses, vec![TicketStatus::Pending, TicketStatus::Pending]);
}

// =============================================================================
// Project Transition Tests
// =============================================================================

#[test]
fn test_pause_and_resume() {
    let mut env = TestEnv::new();
    let project = env.create_project("Pausable", &["A"]);

    env.store.set_project_status(&project.slug, ProjectStatus::Paused).unwrap();
    assert_eq!(env.project_status(&project), ProjectStatus::Paused);

    env.store.set_project_status(&project.slug, ProjectStatus::Active).unwrap();
    assert_eq!(env.project_status(&project), ProjectStatus::Active);
}

#[test]
fn test_closed_project_cannot_resume() {
    let mut env = TestEnv::new();
    let project = env.create_project("Closed", &["A"]);
    env.store
        .set_project_status(&project.slug, ProjectStatus::Completed)
        .unwrap();

    let err = env
        .store
        .set_project_status(&project.slug, ProjectStatus::Active)
        .unwrap_err();

    assert_eq!(
        store_error(&err),
        Some(&StoreError::InvalidProjectTransition {
            from: ProjectStatus::Completed,
            to: ProjectStatus::Active
        })
    );
}

#[test]
fn test_closing_closed_project_again_succeeds() {
    let mut env = TestEnv::new();
    let project = env.create_project("Twice", &[]);
    env.store
        .set_project_status(&project.slug, ProjectStatus::Abandoned)
        .unwrap();

    let again = env
        .store
        .set_project_status(&project.slug, ProjectStatus::Abandoned)
        .unwrap();

    assert_eq!(again.status, ProjectStatus::Abandoned);
}

// =============================================================================
// Storage Tests
// =============================================================================

#[test]
fn test_open_creates_directory_and_database() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path().join("nested").join("agentplan");
    let config = Config::in_dir(&dir);

    Store::open(&config).unwrap();

    assert!(dir.is_dir());
    assert!(config.db_path.is_file());
}

#[test]
fn test_open_explicit_db_path() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("elsewhere").join("plans.db");

    let mut store = Store::open_at(&db_path).unwrap();
    store.create_project("Elsewhere", None, &[]).unwrap();

    assert!(db_path.is_file());
}
