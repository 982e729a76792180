//! Shared test infrastructure for agentplan integration tests.
//!
//! Provides TestEnv helper for consistent test setup/teardown.

#![allow(dead_code)]

use agentplan::{Config, DependencySet, Project, ProjectStatus, Store, StoreBatchExt, StoreError, Ticket};
use tempfile::TempDir;

/// Test environment with automatic cleanup.
pub struct TestEnv {
    pub temp_dir: TempDir,
    pub store: Store,
}

impl TestEnv {
    /// Create a new test environment with a fresh on-disk store.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = Store::open(&Config::in_dir(temp_dir.path())).expect("Failed to open store");
        Self { temp_dir, store }
    }

    /// Drop the current handle and open the same database again.
    pub fn reopen(self) -> Self {
        let TestEnv { temp_dir, store } = self;
        drop(store);
        let store = Store::open(&Config::in_dir(temp_dir.path())).expect("Failed to reopen store");
        Self { temp_dir, store }
    }

    /// Create a project with the given tickets, numbered from 1.
    pub fn create_project(&mut self, title: &str, tickets: &[&str]) -> Project {
        self.store
            .create_project(title, None, tickets)
            .expect("Failed to create project")
            .0
    }

    /// Add a ticket without dependencies.
    pub fn add_ticket(&mut self, project: &Project, title: &str) -> Ticket {
        self.store
            .add_ticket(&project.slug, title, &DependencySet::new(), None)
            .expect("Failed to add ticket")
    }

    /// Make ticket `num` depend on each of `on`.
    pub fn add_dep(&mut self, project: &Project, num: u32, on: &[u32]) -> Ticket {
        self.store
            .add_dependency(&project.slug, num, &on.iter().copied().collect())
            .expect("Failed to add dependency")
    }

    /// Mark tickets done.
    pub fn done(&mut self, project: &Project, nums: &[u32]) {
        self.store.batch_done(&project.slug, nums).expect("Failed to mark done");
    }

    /// Mark tickets skipped.
    pub fn skip(&mut self, project: &Project, nums: &[u32]) {
        self.store.batch_skip(&project.slug, nums).expect("Failed to mark skipped");
    }

    /// Display indices of the unblocked tickets.
    pub fn unblocked(&self, project: &Project) -> Vec<u32> {
        self.store
            .compute_unblocked(&project.slug)
            .expect("Failed to compute unblocked")
            .iter()
            .map(|t| t.num)
            .collect()
    }

    /// Assert the exact unblocked set, in display order.
    pub fn assert_unblocked(&self, project: &Project, expected: &[u32]) {
        let unblocked = self.unblocked(project);
        assert_eq!(
            unblocked, expected,
            "Expected unblocked tickets {:?}, got {:?}",
            expected, unblocked
        );
    }

    /// Stored dependencies of a ticket.
    pub fn deps_of(&self, project: &Project, num: u32) -> Vec<u32> {
        self.store
            .ticket(&project.slug, num)
            .expect("Failed to get ticket")
            .depends_on
            .iter()
            .collect()
    }

    /// Current status of a project.
    pub fn project_status(&self, project: &Project) -> ProjectStatus {
        self.store.project(&project.slug).expect("Failed to get project").status
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// The StoreError behind an eyre report, if any.
pub fn store_error(err: &eyre::Report) -> Option<&StoreError> {
    err.downcast_ref::<StoreError>()
}
