//! Read-only views of a project for the presentation layer.
//!
//! Everything here is computed from the stored state on demand; nothing is
//! cached or written.

use crate::graph;
use crate::store::{Store, require_project};
use crate::types::{Attachment, LogEntry, Project, ProjectStatus, Ticket};
use eyre::Result;
use serde::Serialize;

/// Number of log entries shown in a full status report.
pub const RECENT_LOG_LIMIT: usize = 5;

/// Headline numbers for a project.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProjectSummary {
    pub slug: String,
    pub title: String,
    pub status: ProjectStatus,
    /// Done plus skipped tickets
    pub done: usize,
    pub total: usize,
}

impl ProjectSummary {
    pub fn new(project: &Project, tickets: &[Ticket]) -> Self {
        Self {
            slug: project.slug.clone(),
            title: project.title.clone(),
            status: project.status,
            done: tickets.iter().filter(|t| t.status.is_terminal()).count(),
            total: tickets.len(),
        }
    }
}

/// A ticket together with its computed blocking state.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TicketView {
    #[serde(flatten)]
    pub ticket: Ticket,

    /// Non-terminal with at least one unsatisfied dependency
    pub blocked: bool,

    /// Display indices still holding this ticket back
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub waiting_on: Vec<u32>,
}

impl TicketView {
    /// Views for every ticket, in the order given.
    pub fn all(tickets: &[Ticket]) -> Vec<TicketView> {
        tickets
            .iter()
            .map(|ticket| {
                let waiting_on = if ticket.status.is_terminal() {
                    Vec::new()
                } else {
                    graph::unsatisfied_dependencies(ticket, tickets)
                };
                TicketView {
                    ticket: ticket.clone(),
                    blocked: !waiting_on.is_empty(),
                    waiting_on,
                }
            })
            .collect()
    }
}

/// Everything a status display shows for one project.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StatusReport {
    #[serde(flatten)]
    pub project: Project,
    pub done: usize,
    pub total: usize,
    pub tickets: Vec<TicketView>,
    /// Display indices of the unblocked tickets
    pub unblocked: Vec<u32>,
    pub attachments: Vec<Attachment>,
    pub recent_log: Vec<LogEntry>,
}

impl StatusReport {
    pub fn summary(&self) -> ProjectSummary {
        ProjectSummary {
            slug: self.project.slug.clone(),
            title: self.project.title.clone(),
            status: self.project.status,
            done: self.done,
            total: self.total,
        }
    }

    /// The unblocked tickets themselves, by display index.
    pub fn unblocked_tickets(&self) -> impl Iterator<Item = &Ticket> {
        self.tickets
            .iter()
            .map(|view| &view.ticket)
            .filter(|t| self.unblocked.contains(&t.num))
    }
}

/// Unblocked tickets of one project.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NextActions {
    pub project: Project,
    pub tickets: Vec<Ticket>,
}

/// Extension trait for building presentation data from a Store.
pub trait StoreReportExt {
    /// Summary of one project.
    fn summary(&self, ident: &str) -> Result<ProjectSummary>;

    /// Summaries of the projects with the given status, or all of them.
    fn summaries(&self, status_filter: Option<ProjectStatus>) -> Result<Vec<ProjectSummary>>;

    /// Full status of one project.
    fn status_report(&self, ident: &str) -> Result<StatusReport>;

    /// Full status of every active project.
    fn active_status_reports(&self) -> Result<Vec<StatusReport>>;

    /// Unblocked work for one project, or for every active project.
    ///
    /// A named project that does not exist is an error; projects with nothing
    /// unblocked are left out, so an empty result means "nothing to do".
    fn next_actions(&self, ident: Option<&str>) -> Result<Vec<NextActions>>;
}

impl StoreReportExt for Store {
    fn summary(&self, ident: &str) -> Result<ProjectSummary> {
        let project = require_project(self.storage(), ident)?;
        let tickets = self.storage().list_tickets(project.id)?;
        Ok(ProjectSummary::new(&project, &tickets))
    }

    fn summaries(&self, status_filter: Option<ProjectStatus>) -> Result<Vec<ProjectSummary>> {
        self.list_projects(status_filter)?
            .iter()
            .map(|project| -> Result<ProjectSummary> {
                let tickets = self.storage().list_tickets(project.id)?;
                Ok(ProjectSummary::new(project, &tickets))
            })
            .collect()
    }

    fn status_report(&self, ident: &str) -> Result<StatusReport> {
        let project = require_project(self.storage(), ident)?;
        build_status_report(self, project)
    }

    fn active_status_reports(&self) -> Result<Vec<StatusReport>> {
        self.list_projects(Some(ProjectStatus::Active))?
            .into_iter()
            .map(|project| build_status_report(self, project))
            .collect()
    }

    fn next_actions(&self, ident: Option<&str>) -> Result<Vec<NextActions>> {
        let projects = match ident {
            Some(ident) => vec![require_project(self.storage(), ident)?],
            None => self.list_projects(Some(ProjectStatus::Active))?,
        };

        let mut out = Vec::new();
        for project in projects {
            let tickets = graph::unblocked(&self.storage().list_tickets(project.id)?);
            if !tickets.is_empty() {
                out.push(NextActions { project, tickets });
            }
        }
        Ok(out)
    }
}

fn build_status_report(store: &Store, project: Project) -> Result<StatusReport> {
    let storage = store.storage();
    let tickets = storage.list_tickets(project.id)?;
    let summary = ProjectSummary::new(&project, &tickets);
    let unblocked = graph::unblocked(&tickets).iter().map(|t| t.num).collect();

    Ok(StatusReport {
        attachments: storage.list_attachments(project.id)?,
        recent_log: storage.recent_log_entries(project.id, RECENT_LOG_LIMIT)?,
        tickets: TicketView::all(&tickets),
        done: summary.done,
        total: summary.total,
        unblocked,
        project,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::StoreBatchExt;
    use crate::types::{DependencySet, TicketStatus};

    fn demo_store() -> Store {
        let mut store = Store::open_in_memory().unwrap();
        store
            .create_project("Demo", None, &["First", "Second", "Third"])
            .unwrap();
        store.add_dependency("demo", 3, &DependencySet::from([1, 2])).unwrap();
        store.batch_done("demo", &[1]).unwrap();
        store.start_ticket("demo", 2).unwrap();
        store
    }

    #[test]
    fn test_summary_counts_terminal_tickets() {
        let store = demo_store();
        let summary = store.summary("demo").unwrap();

        assert_eq!(summary.slug, "demo");
        assert_eq!(summary.done, 1);
        assert_eq!(summary.total, 3);
    }

    #[test]
    fn test_status_report_marks_blocked_tickets() {
        let store = demo_store();
        let report = store.status_report("demo").unwrap();

        let third = &report.tickets[2];
        assert!(third.blocked);
        assert_eq!(third.waiting_on, vec![2]);
        assert!(!report.tickets[0].blocked);
        assert_eq!(report.unblocked, vec![2]);
        assert_eq!(
            report.unblocked_tickets().map(|t| t.title.as_str()).collect::<Vec<_>>(),
            vec!["Second"]
        );
    }

    #[test]
    fn test_status_report_json_shape() {
        let store = demo_store();
        let report = store.status_report("demo").unwrap();
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["slug"], "demo");
        assert_eq!(json["status"], "active");
        assert_eq!(json["done"], 1);
        assert_eq!(json["total"], 3);
        assert_eq!(json["tickets"].as_array().unwrap().len(), 3);
        assert_eq!(json["tickets"][1]["status"], "in-progress");
        assert_eq!(json["tickets"][2]["blocked"], true);
        assert_eq!(json["tickets"][2]["depends_on"], serde_json::json!([1, 2]));
    }

    #[test]
    fn test_next_actions_distinguishes_empty_from_missing() {
        let mut store = Store::open_in_memory().unwrap();
        store.create_project("Alpha", None, &["Task A"]).unwrap();
        store.create_project("Beta", None, &["Task B"]).unwrap();

        let next = store.next_actions(Some("alpha")).unwrap();
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].tickets[0].title, "Task A");

        assert_eq!(store.next_actions(None).unwrap().len(), 2);

        store.batch_done("alpha", &[1]).unwrap();
        assert!(store.next_actions(Some("alpha")).unwrap().is_empty());
        assert!(store.next_actions(Some("missing")).is_err());
    }

    #[test]
    fn test_summaries_filter_by_status() {
        let mut store = Store::open_in_memory().unwrap();
        store.create_project("Active One", None, &[]).unwrap();
        store.create_project("Done One", None, &[]).unwrap();
        store
            .set_project_status("done-one", ProjectStatus::Completed)
            .unwrap();

        assert_eq!(store.summaries(Some(ProjectStatus::Active)).unwrap().len(), 1);
        assert_eq!(store.summaries(None).unwrap().len(), 2);
        assert_eq!(
            store.summaries(Some(ProjectStatus::Completed)).unwrap()[0].slug,
            "done-one"
        );
    }

    #[test]
    fn test_terminal_ticket_never_blocked() {
        let mut store = Store::open_in_memory().unwrap();
        store.create_project("P", None, &["A", "B"]).unwrap();
        store.add_dependency("p", 2, &DependencySet::from([1])).unwrap();
        store.transition_ticket("p", 2, TicketStatus::Skipped).unwrap();

        let report = store.status_report("p").unwrap();
        assert!(!report.tickets[1].blocked);
        assert!(report.tickets[1].waiting_on.is_empty());
    }
}
