//! CLI argument parsing for agentplan.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "agentplan",
    about = "Project management CLI for AI agents",
    version = env!("GIT_DESCRIBE"),
    after_help = "Database: $AGENTPLAN_DB, or $AGENTPLAN_DIR/agentplan.db (default ~/.agentplan/agentplan.db)\n\
                  Logs are written to: ~/.local/share/agentplan/logs/agentplan.log"
)]
pub struct Cli {
    /// Data directory (overrides AGENTPLAN_DIR)
    #[arg(short = 'd', long, global = true)]
    pub dir: Option<PathBuf>,

    /// Database file (overrides AGENTPLAN_DB)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Initialize the database
    Init,

    /// Show version
    Version,

    /// Create a project
    Create {
        /// Project title
        title: String,

        /// Add an inline ticket (repeatable)
        #[arg(short, long = "ticket")]
        tickets: Vec<String>,

        /// Project notes
        #[arg(short, long)]
        notes: Option<String>,
    },

    /// Manage tickets
    #[command(subcommand)]
    Ticket(TicketCommand),

    /// Show next unblocked tickets
    Next {
        /// Project slug or id (default: all active projects)
        project: Option<String>,
    },

    /// Show project status
    Status {
        /// Project slug or id (default: all active projects)
        project: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = StatusFormat::Full)]
        format: StatusFormat,
    },

    /// List projects
    List {
        /// Filter by status
        #[arg(short, long, value_enum, default_value_t = ProjectFilter::Active)]
        status: ProjectFilter,
    },

    /// Attach a file or URL
    Attach {
        project: String,

        /// Short label
        label: String,

        /// File path or http(s) URL
        location: String,

        /// Scope to a ticket number
        #[arg(short, long)]
        ticket: Option<u32>,
    },

    /// Add a log entry
    Log {
        project: String,

        entry: String,

        /// Scope to a ticket number
        #[arg(short, long)]
        ticket: Option<u32>,
    },

    /// Close a project as completed
    Close {
        project: String,

        /// Mark abandoned instead of completed
        #[arg(long)]
        abandon: bool,
    },

    /// Pause an active project
    Pause { project: String },

    /// Resume a paused project
    Resume { project: String },

    /// Set the note on a project or ticket
    Note {
        project: String,

        text: String,

        /// Ticket number (default: the project)
        #[arg(short, long)]
        ticket: Option<u32>,
    },

    /// Add ticket dependencies
    Depend {
        project: String,

        /// Ticket number that waits
        ticket: u32,

        /// Ticket numbers it waits on (comma-separated)
        #[arg(long, required = true, value_delimiter = ',')]
        on: Vec<u32>,
    },

    /// Remove a project, or one of its tickets
    Remove {
        project: String,

        /// Remove only this ticket
        #[arg(short, long)]
        ticket: Option<u32>,
    },
}

#[derive(Subcommand)]
pub enum TicketCommand {
    /// Add a ticket to a project
    Add {
        project: String,

        title: String,

        /// Ticket numbers this one depends on (comma-separated)
        #[arg(long, value_delimiter = ',')]
        depends: Vec<u32>,

        /// Ticket notes
        #[arg(short, long)]
        notes: Option<String>,
    },

    /// Mark tickets done
    Done {
        project: String,

        #[arg(required = true)]
        tickets: Vec<u32>,
    },

    /// Mark tickets skipped
    Skip {
        project: String,

        #[arg(required = true)]
        tickets: Vec<u32>,
    },

    /// Start working on a ticket
    Start { project: String, ticket: u32 },

    /// List tickets of a project
    List {
        project: String,

        /// Filter by status
        #[arg(short, long, value_enum, default_value_t = TicketFilter::All)]
        status: TicketFilter,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StatusFormat {
    Full,
    Compact,
    Json,
    Yaml,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ProjectFilter {
    Active,
    Paused,
    Completed,
    Abandoned,
    All,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum TicketFilter {
    Pending,
    InProgress,
    Done,
    Skipped,
    All,
}
