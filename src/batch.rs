//! Batch operations over several tickets of one project.

use crate::store::{Store, TransitionReport, apply_transition, auto_complete, require_project, require_ticket};
use crate::types::TicketStatus;
use chrono::Utc;
use eyre::Result;

/// Extension trait for batch operations on Store.
pub trait StoreBatchExt {
    /// Move several tickets to `status` at once.
    ///
    /// All numbers are resolved before anything is written; one unknown
    /// number fails the whole batch. Auto-completion is evaluated after each
    /// terminal transition, inside the same transaction.
    fn batch_transition(&mut self, ident: &str, nums: &[u32], status: TicketStatus) -> Result<TransitionReport>;

    /// Mark several tickets done.
    fn batch_done(&mut self, ident: &str, nums: &[u32]) -> Result<TransitionReport> {
        self.batch_transition(ident, nums, TicketStatus::Done)
    }

    /// Mark several tickets skipped.
    fn batch_skip(&mut self, ident: &str, nums: &[u32]) -> Result<TransitionReport> {
        self.batch_transition(ident, nums, TicketStatus::Skipped)
    }
}

impl StoreBatchExt for Store {
    fn batch_transition(&mut self, ident: &str, nums: &[u32], status: TicketStatus) -> Result<TransitionReport> {
        let now = Utc::now();
        self.storage().atomically(|storage| {
            let project = require_project(storage, ident)?;
            let tickets = nums
                .iter()
                .map(|&num| require_ticket(storage, &project, num))
                .collect::<Result<Vec<_>>>()?;

            let mut changes = Vec::with_capacity(tickets.len());
            let mut project_completed = false;
            for ticket in tickets {
                // Re-read so a number listed twice sees its first change
                let ticket = require_ticket(storage, &project, ticket.num)?;
                let change = apply_transition(storage, ticket, status, now)?;
                if change.changed && status.is_terminal() && auto_complete(storage, &project, now)? {
                    project_completed = true;
                }
                changes.push(change);
            }

            if !project_completed && changes.iter().any(|c| c.changed) {
                storage.touch_project(project.id, now)?;
            }

            Ok(TransitionReport {
                changes,
                project_completed,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;
    use crate::types::ProjectStatus;

    fn setup_test_store() -> Store {
        Store::open_in_memory().unwrap()
    }

    #[test]
    fn test_batch_done() {
        let mut store = setup_test_store();
        store.create_project("P", None, &["A", "B", "C"]).unwrap();

        let report = store.batch_done("p", &[1, 2]).unwrap();

        assert_eq!(report.changes.len(), 2);
        assert!(report.changes.iter().all(|c| c.ticket.status == TicketStatus::Done));
        assert!(!report.project_completed);
        assert_eq!(store.ticket("p", 3).unwrap().status, TicketStatus::Pending);
    }

    #[test]
    fn test_batch_unknown_ticket_applies_nothing() {
        let mut store = setup_test_store();
        store.create_project("P", None, &["A", "B"]).unwrap();

        let err = store.batch_done("p", &[1, 99]).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::TicketNotFound { num: 99, .. })
        ));
        assert_eq!(store.ticket("p", 1).unwrap().status, TicketStatus::Pending);
    }

    #[test]
    fn test_batch_completing_all_completes_project() {
        let mut store = setup_test_store();
        store.create_project("P", None, &["A", "B"]).unwrap();

        let report = store.batch_skip("p", &[1, 2]).unwrap();

        assert!(report.project_completed);
        assert_eq!(store.project("p").unwrap().status, ProjectStatus::Completed);
    }

    #[test]
    fn test_batch_repeated_number_is_noop_second_time() {
        let mut store = setup_test_store();
        store.create_project("P", None, &["A", "B"]).unwrap();

        let report = store.batch_done("p", &[1, 1]).unwrap();

        assert!(report.changes[0].changed);
        assert!(!report.changes[1].changed);
    }
}
