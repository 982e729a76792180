//! High-level store API for agentplan.
//!
//! Every mutating operation resolves its inputs, checks the dependency graph
//! and writes inside a single [`Storage::atomically`] call, so a check and the
//! write it guards can never be split by another process.

use crate::config::Config;
use crate::graph;
use crate::slug::{slugify, unique_slug};
use crate::storage::Storage;
use crate::types::{
    Attachment, DependencySet, LogEntry, Project, ProjectStatus, Ticket, TicketStatus, Transition,
    ValidationError, validate_title,
};
use chrono::{DateTime, Utc};
use eyre::{Context, Result};
use std::fs;
use std::path::Path;

/// Errors that can occur during store operations.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// No project with this slug or id.
    ProjectNotFound(String),
    /// No ticket with this display index in the project.
    TicketNotFound { project: String, num: u32 },
    /// The proposed dependencies would close a cycle at this ticket.
    CycleDetected { ticket: u32 },
    /// Ticket status cannot move to the requested state.
    InvalidTransition { from: TicketStatus, to: TicketStatus },
    /// Project status cannot move to the requested state.
    InvalidProjectTransition { from: ProjectStatus, to: ProjectStatus },
    /// Validation error.
    Validation(ValidationError),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::ProjectNotFound(ident) => write!(f, "project '{}' not found", ident),
            StoreError::TicketNotFound { project, num } => {
                write!(f, "ticket #{} not found in project '{}'", num, project)
            }
            StoreError::CycleDetected { ticket } => {
                write!(f, "circular dependency detected at ticket #{}", ticket)
            }
            StoreError::InvalidTransition { from, to } => {
                write!(f, "invalid ticket transition from {} to {}", from, to)
            }
            StoreError::InvalidProjectTransition { from, to } => {
                write!(f, "invalid project transition from {} to {}", from, to)
            }
            StoreError::Validation(e) => write!(f, "validation error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<ValidationError> for StoreError {
    fn from(e: ValidationError) -> Self {
        StoreError::Validation(e)
    }
}

/// One ticket touched by a status change.
#[derive(Debug, Clone, PartialEq)]
pub struct TicketChange {
    /// The ticket as it is now stored
    pub ticket: Ticket,

    /// False when the request was a no-op (terminal ticket, same status)
    pub changed: bool,
}

/// Result of one or more ticket status changes.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionReport {
    pub changes: Vec<TicketChange>,

    /// True if these changes moved the project to completed
    pub project_completed: bool,
}

/// The main agentplan store.
pub struct Store {
    storage: Storage,
}

impl Store {
    /// Open the store described by `config`, creating directory and schema as needed.
    pub fn open(config: &Config) -> Result<Self> {
        fs::create_dir_all(&config.dir)
            .with_context(|| format!("Failed to create data directory {}", config.dir.display()))?;
        Self::open_at(&config.db_path)
    }

    /// Open a store backed by the database file at `db_path`.
    pub fn open_at(db_path: &Path) -> Result<Self> {
        let storage = Storage::open(db_path)?;
        Ok(Self { storage })
    }

    /// Open a throwaway in-memory store.
    pub fn open_in_memory() -> Result<Self> {
        let storage = Storage::open_in_memory()?;
        Ok(Self { storage })
    }

    /// Access the underlying storage.
    pub(crate) fn storage(&self) -> &Storage {
        &self.storage
    }

    // -------------------------------------------------------------------------
    // Projects
    // -------------------------------------------------------------------------

    /// Create a project with an initial batch of tickets numbered 1..n.
    pub fn create_project(
        &mut self,
        title: &str,
        notes: Option<&str>,
        ticket_titles: &[&str],
    ) -> Result<(Project, Vec<Ticket>)> {
        validate_title(title).map_err(|e| eyre::eyre!(StoreError::Validation(e)))?;
        for ticket_title in ticket_titles {
            validate_title(ticket_title).map_err(|e| eyre::eyre!(StoreError::Validation(e)))?;
        }

        let now = Utc::now();
        let (project, tickets) = self.storage.atomically(|storage| {
            let slug = unique_slug(storage, &slugify(title))?;
            let project = storage.insert_project(&slug, title, notes, now)?;

            let mut tickets = Vec::with_capacity(ticket_titles.len());
            for (i, ticket_title) in ticket_titles.iter().enumerate() {
                let num = i as u32 + 1;
                tickets.push(storage.insert_ticket(project.id, num, ticket_title, &DependencySet::new(), None, now)?);
            }
            Ok((project, tickets))
        })?;

        log::info!("Created project '{}' with {} ticket(s)", project.slug, tickets.len());
        Ok((project, tickets))
    }

    /// Look a project up by slug, falling back to its numeric id.
    pub fn resolve_project(&self, ident: &str) -> Result<Option<Project>> {
        resolve_project(&self.storage, ident)
    }

    /// Like [`Store::resolve_project`] but missing projects are an error.
    pub fn project(&self, ident: &str) -> Result<Project> {
        require_project(&self.storage, ident)
    }

    /// List projects, optionally filtered by status.
    pub fn list_projects(&self, status_filter: Option<ProjectStatus>) -> Result<Vec<Project>> {
        self.storage.list_projects(status_filter)
    }

    /// Move a project to `status` (close, abandon, pause, resume).
    pub fn set_project_status(&mut self, ident: &str, status: ProjectStatus) -> Result<Project> {
        let now = Utc::now();
        let project = self.storage.atomically(|storage| {
            let mut project = require_project(storage, ident)?;
            if !project.status.can_transition_to(&status) {
                return Err(eyre::eyre!(StoreError::InvalidProjectTransition {
                    from: project.status,
                    to: status,
                }));
            }
            if project.status != status {
                project.status = status;
                project.updated_at = now;
                storage.update_project(&project)?;
            }
            Ok(project)
        })?;

        log::info!("Project '{}' is now {}", project.slug, project.status);
        Ok(project)
    }

    /// Delete a project and everything it owns.
    pub fn remove_project(&mut self, ident: &str) -> Result<Project> {
        let project = self.storage.atomically(|storage| {
            let project = require_project(storage, ident)?;
            storage.delete_project(project.id)?;
            Ok(project)
        })?;

        log::info!("Removed project '{}'", project.slug);
        Ok(project)
    }

    /// Replace the notes of a project, or of one of its tickets.
    pub fn set_note(&mut self, ident: &str, ticket: Option<u32>, text: &str) -> Result<()> {
        let now = Utc::now();
        self.storage.atomically(|storage| {
            let mut project = require_project(storage, ident)?;
            match ticket {
                Some(num) => {
                    let mut ticket = require_ticket(storage, &project, num)?;
                    ticket.notes = Some(text.to_string());
                    storage.update_ticket(&ticket)?;
                    storage.touch_project(project.id, now)
                }
                None => {
                    project.notes = Some(text.to_string());
                    project.updated_at = now;
                    storage.update_project(&project)
                }
            }
        })
    }

    // -------------------------------------------------------------------------
    // Tickets
    // -------------------------------------------------------------------------

    /// Add a ticket to a project with optional initial dependencies.
    ///
    /// Every dependency must name an existing ticket of the project. Adding a
    /// ticket never reopens a completed or abandoned project.
    pub fn add_ticket(
        &mut self,
        ident: &str,
        title: &str,
        depends_on: &DependencySet,
        notes: Option<&str>,
    ) -> Result<Ticket> {
        validate_title(title).map_err(|e| eyre::eyre!(StoreError::Validation(e)))?;

        let now = Utc::now();
        let ticket = self.storage.atomically(|storage| {
            let project = require_project(storage, ident)?;
            let tickets = storage.list_tickets(project.id)?;
            require_dependencies(&tickets, depends_on)?;

            let num = storage.next_ticket_num(project.id)?;
            let adjacency = graph::candidate_adjacency(&tickets, num, depends_on);
            if let Some(ticket) = graph::find_cycle(&adjacency, num) {
                return Err(eyre::eyre!(StoreError::CycleDetected { ticket }));
            }

            let ticket = storage.insert_ticket(project.id, num, title, depends_on, notes, now)?;
            storage.touch_project(project.id, now)?;
            Ok(ticket)
        })?;

        log::info!("Added ticket #{} '{}'", ticket.num, ticket.title);
        Ok(ticket)
    }

    /// Get a ticket by display index.
    pub fn ticket(&self, ident: &str, num: u32) -> Result<Ticket> {
        let project = require_project(&self.storage, ident)?;
        require_ticket(&self.storage, &project, num)
    }

    /// Tickets of a project by display index, optionally filtered by status.
    pub fn list_tickets(&self, ident: &str, status_filter: Option<TicketStatus>) -> Result<Vec<Ticket>> {
        let project = require_project(&self.storage, ident)?;
        let tickets = self.storage.list_tickets(project.id)?;
        Ok(match status_filter {
            Some(status) => tickets.into_iter().filter(|t| t.status == status).collect(),
            None => tickets,
        })
    }

    /// Make `num` depend on every ticket in `depends_on`, in addition to its
    /// existing dependencies.
    ///
    /// The whole set is rejected if any member is unknown or if the merged
    /// edges would close a cycle; nothing is written in that case.
    pub fn add_dependency(&mut self, ident: &str, num: u32, depends_on: &DependencySet) -> Result<Ticket> {
        let now = Utc::now();
        let ticket = self.storage.atomically(|storage| {
            let project = require_project(storage, ident)?;
            let mut ticket = require_ticket(storage, &project, num)?;
            let tickets = storage.list_tickets(project.id)?;
            require_dependencies(&tickets, depends_on)?;

            let merged = ticket.depends_on.merged(depends_on);
            let adjacency = graph::candidate_adjacency(&tickets, num, &merged);
            if let Some(closing) = graph::find_cycle(&adjacency, num) {
                log::debug!("Rejected dependencies {} for #{}: cycle at #{}", depends_on, num, closing);
                return Err(eyre::eyre!(StoreError::CycleDetected { ticket: closing }));
            }

            ticket.depends_on = merged;
            storage.update_ticket(&ticket)?;
            storage.touch_project(project.id, now)?;
            Ok(ticket)
        })?;

        log::info!("Ticket #{} now depends on {}", ticket.num, ticket.depends_on);
        Ok(ticket)
    }

    /// Change one ticket's status.
    ///
    /// Done and skipped tickets never regress: further requests succeed
    /// without changing anything. Entering done or skipped may complete the
    /// project.
    pub fn transition_ticket(&mut self, ident: &str, num: u32, status: TicketStatus) -> Result<TransitionReport> {
        let now = Utc::now();
        self.storage.atomically(|storage| {
            let project = require_project(storage, ident)?;
            let ticket = require_ticket(storage, &project, num)?;
            let change = apply_transition(storage, ticket, status, now)?;

            let project_completed = change.changed && status.is_terminal() && auto_complete(storage, &project, now)?;
            if change.changed && !project_completed {
                storage.touch_project(project.id, now)?;
            }

            Ok(TransitionReport {
                changes: vec![change],
                project_completed,
            })
        })
    }

    /// Mark a ticket in progress.
    pub fn start_ticket(&mut self, ident: &str, num: u32) -> Result<TransitionReport> {
        self.transition_ticket(ident, num, TicketStatus::InProgress)
    }

    /// Delete a ticket and strip it from every other ticket's dependencies.
    pub fn remove_ticket(&mut self, ident: &str, num: u32) -> Result<Ticket> {
        let now = Utc::now();
        let removed = self.storage.atomically(|storage| {
            let project = require_project(storage, ident)?;
            let ticket = require_ticket(storage, &project, num)?;
            storage.delete_ticket(ticket.id)?;

            for mut other in storage.list_tickets(project.id)? {
                if other.depends_on.remove(num) {
                    log::debug!("Dropped dependency on #{} from #{}", num, other.num);
                    storage.update_ticket(&other)?;
                }
            }

            storage.touch_project(project.id, now)?;
            Ok(ticket)
        })?;

        log::info!("Removed ticket #{} '{}'", removed.num, removed.title);
        Ok(removed)
    }

    /// Tickets that can be worked on right now, by display index.
    pub fn compute_unblocked(&self, ident: &str) -> Result<Vec<Ticket>> {
        let project = require_project(&self.storage, ident)?;
        let tickets = self.storage.list_tickets(project.id)?;
        Ok(graph::unblocked(&tickets))
    }

    // -------------------------------------------------------------------------
    // Attachments and log
    // -------------------------------------------------------------------------

    /// Attach a file path or URL to a project, optionally scoped to a ticket.
    ///
    /// Locations starting with `http://` or `https://` are stored as URLs.
    pub fn attach(&mut self, ident: &str, label: &str, location: &str, ticket: Option<u32>) -> Result<Attachment> {
        if label.trim().is_empty() {
            return Err(eyre::eyre!(StoreError::Validation(ValidationError::EmptyLabel)));
        }
        if location.trim().is_empty() {
            return Err(eyre::eyre!(StoreError::Validation(ValidationError::EmptyLocation)));
        }

        let is_url = location.starts_with("http://") || location.starts_with("https://");
        let (path, url) = if is_url { (None, Some(location)) } else { (Some(location), None) };

        let now = Utc::now();
        self.storage.atomically(|storage| {
            let project = require_project(storage, ident)?;
            let ticket_id = ticket
                .map(|num| require_ticket(storage, &project, num).map(|t| t.id))
                .transpose()?;
            let attachment = storage.insert_attachment(project.id, ticket_id, label, path, url, None, now)?;
            storage.touch_project(project.id, now)?;
            Ok(attachment)
        })
    }

    /// Append a log entry to a project, optionally scoped to a ticket.
    pub fn log(&mut self, ident: &str, entry: &str, ticket: Option<u32>) -> Result<LogEntry> {
        if entry.trim().is_empty() {
            return Err(eyre::eyre!(StoreError::Validation(ValidationError::EmptyLogEntry)));
        }

        let now = Utc::now();
        self.storage.atomically(|storage| {
            let project = require_project(storage, ident)?;
            let ticket_id = ticket
                .map(|num| require_ticket(storage, &project, num).map(|t| t.id))
                .transpose()?;
            let entry = storage.insert_log_entry(project.id, ticket_id, entry, now)?;
            storage.touch_project(project.id, now)?;
            Ok(entry)
        })
    }

    /// Attachments of a project in creation order.
    pub fn list_attachments(&self, ident: &str) -> Result<Vec<Attachment>> {
        let project = require_project(&self.storage, ident)?;
        self.storage.list_attachments(project.id)
    }

    /// The `limit` newest log entries, oldest first.
    pub fn recent_log(&self, ident: &str, limit: usize) -> Result<Vec<LogEntry>> {
        let project = require_project(&self.storage, ident)?;
        self.storage.recent_log_entries(project.id, limit)
    }
}

// -----------------------------------------------------------------------------
// Helpers shared with the extension modules. They expect to run inside an
// open transaction when they write.
// -----------------------------------------------------------------------------

pub(crate) fn resolve_project(storage: &Storage, ident: &str) -> Result<Option<Project>> {
    if let Some(project) = storage.get_project_by_slug(ident)? {
        return Ok(Some(project));
    }
    match ident.parse::<i64>() {
        Ok(id) => storage.get_project(id),
        Err(_) => Ok(None),
    }
}

pub(crate) fn require_project(storage: &Storage, ident: &str) -> Result<Project> {
    resolve_project(storage, ident)?.ok_or_else(|| eyre::eyre!(StoreError::ProjectNotFound(ident.to_string())))
}

pub(crate) fn require_ticket(storage: &Storage, project: &Project, num: u32) -> Result<Ticket> {
    storage.get_ticket(project.id, num)?.ok_or_else(|| {
        eyre::eyre!(StoreError::TicketNotFound {
            project: project.slug.clone(),
            num,
        })
    })
}

/// Every id in `depends_on` must be a ticket of the project.
fn require_dependencies(tickets: &[Ticket], depends_on: &DependencySet) -> Result<()> {
    for dep in depends_on.iter() {
        if !tickets.iter().any(|t| t.num == dep) {
            return Err(eyre::eyre!(StoreError::Validation(ValidationError::UnknownDependency(dep))));
        }
    }
    Ok(())
}

/// Apply a status change to a loaded ticket and persist it.
pub(crate) fn apply_transition(
    storage: &Storage,
    mut ticket: Ticket,
    status: TicketStatus,
    now: DateTime<Utc>,
) -> Result<TicketChange> {
    match ticket.status.transition_to(&status) {
        Transition::Invalid => Err(eyre::eyre!(StoreError::InvalidTransition {
            from: ticket.status,
            to: status,
        })),
        Transition::NoOp => {
            log::debug!("Ticket #{} already {}, leaving it", ticket.num, ticket.status);
            Ok(TicketChange { ticket, changed: false })
        }
        Transition::Apply => {
            ticket.status = status;
            if status.is_terminal() {
                ticket.completed_at = Some(now);
            }
            storage.update_ticket(&ticket)?;
            log::info!("Ticket #{} -> {}", ticket.num, status);
            Ok(TicketChange { ticket, changed: true })
        }
    }
}

/// Complete the project if none of its tickets is pending or in progress.
///
/// Only active or paused projects move; returns true if this call moved it.
pub(crate) fn auto_complete(storage: &Storage, project: &Project, now: DateTime<Utc>) -> Result<bool> {
    let mut current = storage
        .get_project(project.id)?
        .ok_or_else(|| eyre::eyre!(StoreError::ProjectNotFound(project.slug.clone())))?;
    if current.status.is_terminal() {
        return Ok(false);
    }

    let tickets = storage.list_tickets(project.id)?;
    if !graph::all_terminal(&tickets) {
        return Ok(false);
    }

    current.status = ProjectStatus::Completed;
    current.updated_at = now;
    storage.update_project(&current)?;
    log::info!("All tickets finished, project '{}' auto-completed", current.slug);
    Ok(true)
}
