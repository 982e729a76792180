//! Core data types for the agentplan task graph.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Maximum title length accepted for projects and tickets.
pub const MAX_TITLE_LEN: usize = 500;

/// A unit of planning: a titled collection of tickets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    /// Storage identifier, assigned at creation
    pub id: i64,

    /// Unique human-readable identifier derived from the title
    pub slug: String,

    pub title: String,

    pub status: ProjectStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    pub created_at: DateTime<Utc>,

    /// Touched on every mutation of the project or its tickets
    pub updated_at: DateTime<Utc>,
}

/// A single piece of work inside a project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ticket {
    /// Globally unique storage identifier
    pub id: i64,

    /// Owning project
    pub project_id: i64,

    /// Per-project display index (1-based, creation order)
    pub num: u32,

    pub title: String,

    pub status: TicketStatus,

    /// Display indices of tickets in the same project this one waits on
    #[serde(default)]
    pub depends_on: DependencySet,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    pub created_at: DateTime<Utc>,

    /// Set when the ticket enters done or skipped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// A file path or URL attached to a project, optionally scoped to a ticket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Attachment {
    pub id: i64,
    pub project_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<i64>,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Attachment {
    /// The URL if present, otherwise the path.
    pub fn location(&self) -> &str {
        self.url.as_deref().or(self.path.as_deref()).unwrap_or("")
    }
}

/// Append-only progress note.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogEntry {
    pub id: i64,
    pub project_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<i64>,
    pub entry: String,
    pub created_at: DateTime<Utc>,
}

/// Project lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectStatus {
    Active,
    Paused,
    Completed,
    Abandoned,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Active => "active",
            ProjectStatus::Paused => "paused",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Abandoned => "abandoned",
        }
    }

    /// Completed and abandoned projects never move again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProjectStatus::Completed | ProjectStatus::Abandoned)
    }

    /// Check if a status transition is valid.
    pub fn can_transition_to(&self, target: &ProjectStatus) -> bool {
        use ProjectStatus::*;
        match (self, target) {
            // Same status = no-op, allowed
            (a, b) if a == b => true,

            (Active, Paused) | (Paused, Active) => true,
            (Active | Paused, Completed | Abandoned) => true,

            _ => false,
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ProjectStatus::Active),
            "paused" => Ok(ProjectStatus::Paused),
            "completed" => Ok(ProjectStatus::Completed),
            "abandoned" => Ok(ProjectStatus::Abandoned),
            other => Err(format!("unknown project status '{}'", other)),
        }
    }
}

/// Ticket states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TicketStatus {
    Pending,
    InProgress,
    Done,
    Skipped,
}

/// How a requested ticket status change should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Persist the new status.
    Apply,
    /// Leave the ticket untouched and report success.
    NoOp,
    /// The target is never reachable through a transition.
    Invalid,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Pending => "pending",
            TicketStatus::InProgress => "in-progress",
            TicketStatus::Done => "done",
            TicketStatus::Skipped => "skipped",
        }
    }

    /// Done and skipped tickets satisfy their dependents and never regress.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TicketStatus::Done | TicketStatus::Skipped)
    }

    /// Classify a requested transition from this status to `target`.
    pub fn transition_to(&self, target: &TicketStatus) -> Transition {
        use TicketStatus::*;
        match (self, target) {
            // Nothing moves a ticket back to pending
            (_, Pending) => Transition::Invalid,

            // Terminal states do not regress
            (Done | Skipped, _) => Transition::NoOp,

            (InProgress, InProgress) => Transition::NoOp,
            (Pending, InProgress) => Transition::Apply,
            (Pending | InProgress, Done | Skipped) => Transition::Apply,
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TicketStatus::Pending),
            "in-progress" => Ok(TicketStatus::InProgress),
            "done" => Ok(TicketStatus::Done),
            "skipped" => Ok(TicketStatus::Skipped),
            other => Err(format!("unknown ticket status '{}'", other)),
        }
    }
}

/// Ordered set of ticket display indices a ticket depends on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DependencySet(BTreeSet<u32>);

impl DependencySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, num: u32) -> bool {
        self.0.contains(&num)
    }

    /// Insert a dependency; returns false if it was already present.
    pub fn insert(&mut self, num: u32) -> bool {
        self.0.insert(num)
    }

    /// Remove a dependency; returns true if it was present.
    pub fn remove(&mut self, num: u32) -> bool {
        self.0.remove(&num)
    }

    /// Set union of `self` and `other`.
    pub fn merged(&self, other: &DependencySet) -> DependencySet {
        DependencySet(self.0.union(&other.0).copied().collect())
    }

    /// Iterate in ascending order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = u32> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<u32> for DependencySet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        DependencySet(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[u32; N]> for DependencySet {
    fn from(nums: [u32; N]) -> Self {
        nums.into_iter().collect()
    }
}

impl fmt::Display for DependencySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.iter().map(|n| n.to_string()).collect();
        write!(f, "[{}]", parts.join(", "))
    }
}

/// Validation errors for user-supplied input.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    EmptyTitle,
    TitleTooLong,
    InvalidCharacters,
    EmptyLabel,
    EmptyLocation,
    EmptyLogEntry,
    UnknownDependency(u32),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyTitle => write!(f, "title cannot be empty"),
            ValidationError::TitleTooLong => write!(f, "title exceeds {} characters", MAX_TITLE_LEN),
            ValidationError::InvalidCharacters => write!(f, "title contains control characters"),
            ValidationError::EmptyLabel => write!(f, "attachment label cannot be empty"),
            ValidationError::EmptyLocation => write!(f, "attachment location cannot be empty"),
            ValidationError::EmptyLogEntry => write!(f, "log entry cannot be empty"),
            ValidationError::UnknownDependency(num) => {
                write!(f, "dependency #{} does not exist in this project", num)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate a project or ticket title.
pub fn validate_title(title: &str) -> Result<(), ValidationError> {
    if title.trim().is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ValidationError::TitleTooLong);
    }
    if title.chars().any(|c| c.is_control()) {
        return Err(ValidationError::InvalidCharacters);
    }
    Ok(())
}
