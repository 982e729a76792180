//! agentplan: durable project and ticket tracking for AI agents.
//!
//! Projects hold tickets; tickets depend on other tickets of the same project.
//! The store keeps the dependency graph acyclic, answers "what can be worked
//! on now?", and completes a project once its last open ticket is finished.
//! Everything lives in a single SQLite file so agents that lose their memory
//! between invocations can pick up where they left off.
//!
//! # Example
//!
//! ```no_run
//! use agentplan::{Config, DependencySet, ProjectStatus, Store, StoreBatchExt};
//!
//! let mut store = Store::open(&Config::resolve(None, None)).unwrap();
//!
//! // A project with three tickets, numbered 1..3
//! store.create_project("Ship login", None, &["Design", "Implement", "Test"]).unwrap();
//!
//! // Implement waits on Design, Test waits on both
//! store.add_dependency("ship-login", 2, &DependencySet::from([1])).unwrap();
//! store.add_dependency("ship-login", 3, &DependencySet::from([1, 2])).unwrap();
//!
//! let ready = store.compute_unblocked("ship-login").unwrap();
//! assert_eq!(ready[0].title, "Design");
//!
//! // Finishing everything completes the project
//! let report = store.batch_done("ship-login", &[1, 2, 3]).unwrap();
//! assert!(report.project_completed);
//! assert_eq!(store.project("ship-login").unwrap().status, ProjectStatus::Completed);
//! ```

mod storage;
mod store;
mod types;

pub mod batch;
pub mod config;
pub mod graph;
pub mod report;
pub mod slug;

// Re-export public API
pub use batch::StoreBatchExt;
pub use config::Config;
pub use report::{NextActions, ProjectSummary, StatusReport, StoreReportExt, TicketView};
pub use slug::slugify;
pub use store::{Store, StoreError, TicketChange, TransitionReport};
pub use types::{
    Attachment, DependencySet, LogEntry, Project, ProjectStatus, Ticket, TicketStatus, Transition, ValidationError,
};
