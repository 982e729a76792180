//! Storage layer for agentplan: a single SQLite database.
//!
//! This is the entity store the rest of the crate builds on. It knows how to
//! read and write rows and how to wrap a sequence of calls in one transaction;
//! it knows nothing about dependency rules or status transitions.

use crate::types::{Attachment, DependencySet, LogEntry, Project, ProjectStatus, Ticket, TicketStatus};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use eyre::{Context, Result};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior, params};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// How long a writer waits for another process holding the database lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const PROJECT_COLUMNS: &str = "id, slug, title, status, notes, created_at, updated_at";
const TICKET_COLUMNS: &str = "id, project_id, num, title, status, depends_on, notes, created_at, completed_at";
const ATTACHMENT_COLUMNS: &str = "id, project_id, ticket_id, label, path, url, notes, created_at";
const LOG_COLUMNS: &str = "id, project_id, ticket_id, entry, created_at";

/// Timestamp layout of databases written before timestamps carried an offset.
const LEGACY_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Storage handle for reading/writing agentplan data.
pub struct Storage {
    db: Connection,
}

impl Storage {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database directory {}", parent.display()))?;
        }

        let db = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite database {}", path.display()))?;
        let storage = Self { db };
        storage.configure()?;
        storage.init_schema()?;

        log::debug!("Opened storage at {}", path.display());
        Ok(storage)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let db = Connection::open_in_memory().context("Failed to open in-memory database")?;
        let storage = Self { db };
        storage.configure()?;
        storage.init_schema()?;
        Ok(storage)
    }

    fn configure(&self) -> Result<()> {
        self.db
            .busy_timeout(BUSY_TIMEOUT)
            .context("Failed to set busy timeout")?;
        // journal_mode answers with the resulting mode, so it has to be read back
        let _mode: String = self
            .db
            .query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))
            .context("Failed to enable WAL journal")?;
        self.db
            .execute_batch("PRAGMA foreign_keys=ON;")
            .context("Failed to enable foreign keys")?;
        Ok(())
    }

    /// Initialize SQLite schema.
    fn init_schema(&self) -> Result<()> {
        self.db
            .execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS projects (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    slug TEXT NOT NULL UNIQUE,
                    title TEXT NOT NULL,
                    status TEXT NOT NULL DEFAULT 'active'
                        CHECK (status IN ('active', 'paused', 'completed', 'abandoned')),
                    notes TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS tickets (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                    num INTEGER NOT NULL,
                    title TEXT NOT NULL,
                    status TEXT NOT NULL DEFAULT 'pending'
                        CHECK (status IN ('pending', 'in-progress', 'done', 'skipped')),
                    depends_on TEXT NOT NULL DEFAULT '[]',
                    notes TEXT,
                    created_at TEXT NOT NULL,
                    completed_at TEXT
                );

                CREATE TABLE IF NOT EXISTS attachments (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                    ticket_id INTEGER REFERENCES tickets(id) ON DELETE CASCADE,
                    label TEXT NOT NULL,
                    path TEXT,
                    url TEXT,
                    notes TEXT,
                    created_at TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_attachments_project ON attachments(project_id);

                CREATE TABLE IF NOT EXISTS log (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                    ticket_id INTEGER REFERENCES tickets(id) ON DELETE CASCADE,
                    entry TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_log_project ON log(project_id);
            "#,
            )
            .context("Failed to initialize schema")?;

        self.migrate_ticket_numbers()?;

        self.db
            .execute_batch("CREATE UNIQUE INDEX IF NOT EXISTS idx_ticket_project_num ON tickets(project_id, num);")
            .context("Failed to create ticket index")?;

        Ok(())
    }

    /// Databases from before per-project display indices lack `tickets.num`.
    /// Add the column and number each project's tickets in id order.
    fn migrate_ticket_numbers(&self) -> Result<()> {
        let has_num: bool = self
            .db
            .query_row(
                "SELECT COUNT(*) FROM pragma_table_info('tickets') WHERE name = 'num'",
                [],
                |row| row.get::<_, i64>(0),
            )
            .map(|count| count > 0)
            .context("Failed to inspect tickets table")?;
        if has_num {
            return Ok(());
        }

        log::info!("Migrating tickets table: adding per-project display numbers");
        let tx = Transaction::new_unchecked(&self.db, TransactionBehavior::Immediate)?;
        tx.execute_batch("ALTER TABLE tickets ADD COLUMN num INTEGER;")
            .context("Failed to add num column")?;

        let ids: Vec<(i64, i64)> = {
            let mut stmt = tx.prepare("SELECT id, project_id FROM tickets ORDER BY project_id, id")?;
            stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<rusqlite::Result<_>>()?
        };

        let mut current_project = None;
        let mut num = 0u32;
        for (id, project_id) in ids {
            if current_project != Some(project_id) {
                current_project = Some(project_id);
                num = 0;
            }
            num += 1;
            tx.execute("UPDATE tickets SET num = ? WHERE id = ?", params![num, id])?;
        }

        tx.commit().context("Failed to commit ticket number migration")?;
        Ok(())
    }

    /// Run `f` inside one IMMEDIATE transaction.
    ///
    /// The write lock is taken up front, so a read-check-write sequence inside
    /// `f` cannot interleave with another process. Any error rolls back every
    /// write made by `f`. Calls must not nest.
    pub fn atomically<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        let tx = Transaction::new_unchecked(&self.db, TransactionBehavior::Immediate)
            .context("Failed to begin transaction")?;
        let value = f(self)?;
        tx.commit().context("Failed to commit transaction")?;
        Ok(value)
    }

    // -------------------------------------------------------------------------
    // Projects
    // -------------------------------------------------------------------------

    /// Insert a new active project.
    pub fn insert_project(&self, slug: &str, title: &str, notes: Option<&str>, now: DateTime<Utc>) -> Result<Project> {
        self.db
            .execute(
                "INSERT INTO projects (slug, title, status, notes, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
                params![
                    slug,
                    title,
                    ProjectStatus::Active.as_str(),
                    notes,
                    now.to_rfc3339(),
                    now.to_rfc3339()
                ],
            )
            .context("Failed to insert project")?;

        Ok(Project {
            id: self.db.last_insert_rowid(),
            slug: slug.to_string(),
            title: title.to_string(),
            status: ProjectStatus::Active,
            notes: notes.map(String::from),
            created_at: now,
            updated_at: now,
        })
    }

    /// Get a project by storage id.
    pub fn get_project(&self, id: i64) -> Result<Option<Project>> {
        let sql = format!("SELECT {} FROM projects WHERE id = ?", PROJECT_COLUMNS);
        Ok(self.db.query_row(&sql, params![id], Self::row_to_project).optional()?)
    }

    /// Get a project by slug.
    pub fn get_project_by_slug(&self, slug: &str) -> Result<Option<Project>> {
        let sql = format!("SELECT {} FROM projects WHERE slug = ?", PROJECT_COLUMNS);
        Ok(self.db.query_row(&sql, params![slug], Self::row_to_project).optional()?)
    }

    /// Check whether a slug is taken.
    pub fn slug_exists(&self, slug: &str) -> Result<bool> {
        let count: i64 = self
            .db
            .query_row("SELECT COUNT(*) FROM projects WHERE slug = ?", params![slug], |row| row.get(0))?;
        Ok(count > 0)
    }

    /// List projects, optionally filtered by status, in creation order.
    pub fn list_projects(&self, status_filter: Option<ProjectStatus>) -> Result<Vec<Project>> {
        let projects = match status_filter {
            Some(status) => {
                let sql = format!("SELECT {} FROM projects WHERE status = ? ORDER BY id", PROJECT_COLUMNS);
                let mut stmt = self.db.prepare(&sql)?;
                stmt.query_map(params![status.as_str()], Self::row_to_project)?
                    .collect::<rusqlite::Result<Vec<_>>>()?
            }
            None => {
                let sql = format!("SELECT {} FROM projects ORDER BY id", PROJECT_COLUMNS);
                let mut stmt = self.db.prepare(&sql)?;
                stmt.query_map([], Self::row_to_project)?
                    .collect::<rusqlite::Result<Vec<_>>>()?
            }
        };
        Ok(projects)
    }

    /// Persist a project's mutable fields.
    pub fn update_project(&self, project: &Project) -> Result<()> {
        self.db
            .execute(
                "UPDATE projects SET title = ?, status = ?, notes = ?, updated_at = ? WHERE id = ?",
                params![
                    project.title,
                    project.status.as_str(),
                    project.notes,
                    project.updated_at.to_rfc3339(),
                    project.id
                ],
            )
            .context("Failed to update project")?;
        Ok(())
    }

    /// Stamp a project's `updated_at`.
    pub fn touch_project(&self, id: i64, now: DateTime<Utc>) -> Result<()> {
        self.db
            .execute(
                "UPDATE projects SET updated_at = ? WHERE id = ?",
                params![now.to_rfc3339(), id],
            )
            .context("Failed to touch project")?;
        Ok(())
    }

    /// Delete a project; tickets, attachments and log entries cascade.
    pub fn delete_project(&self, id: i64) -> Result<bool> {
        let deleted = self
            .db
            .execute("DELETE FROM projects WHERE id = ?", params![id])
            .context("Failed to delete project")?;
        Ok(deleted > 0)
    }

    // -------------------------------------------------------------------------
    // Tickets
    // -------------------------------------------------------------------------

    /// Next free display index for a project.
    pub fn next_ticket_num(&self, project_id: i64) -> Result<u32> {
        let max: Option<u32> = self.db.query_row(
            "SELECT MAX(num) FROM tickets WHERE project_id = ?",
            params![project_id],
            |row| row.get(0),
        )?;
        Ok(max.unwrap_or(0) + 1)
    }

    /// Insert a pending ticket.
    pub fn insert_ticket(
        &self,
        project_id: i64,
        num: u32,
        title: &str,
        depends_on: &DependencySet,
        notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Ticket> {
        self.db
            .execute(
                "INSERT INTO tickets (project_id, num, title, status, depends_on, notes, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
                params![
                    project_id,
                    num,
                    title,
                    TicketStatus::Pending.as_str(),
                    encode_dependencies(depends_on)?,
                    notes,
                    now.to_rfc3339()
                ],
            )
            .context("Failed to insert ticket")?;

        Ok(Ticket {
            id: self.db.last_insert_rowid(),
            project_id,
            num,
            title: title.to_string(),
            status: TicketStatus::Pending,
            depends_on: depends_on.clone(),
            notes: notes.map(String::from),
            created_at: now,
            completed_at: None,
        })
    }

    /// Get a ticket by its project and display index.
    pub fn get_ticket(&self, project_id: i64, num: u32) -> Result<Option<Ticket>> {
        let sql = format!("SELECT {} FROM tickets WHERE project_id = ? AND num = ?", TICKET_COLUMNS);
        Ok(self
            .db
            .query_row(&sql, params![project_id, num], Self::row_to_ticket)
            .optional()?)
    }

    /// All tickets of a project, by display index.
    pub fn list_tickets(&self, project_id: i64) -> Result<Vec<Ticket>> {
        let sql = format!("SELECT {} FROM tickets WHERE project_id = ? ORDER BY num", TICKET_COLUMNS);
        let mut stmt = self.db.prepare(&sql)?;
        let tickets = stmt
            .query_map(params![project_id], Self::row_to_ticket)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tickets)
    }

    /// Persist a ticket's mutable fields.
    pub fn update_ticket(&self, ticket: &Ticket) -> Result<()> {
        self.db
            .execute(
                "UPDATE tickets SET title = ?, status = ?, depends_on = ?, notes = ?, completed_at = ? WHERE id = ?",
                params![
                    ticket.title,
                    ticket.status.as_str(),
                    encode_dependencies(&ticket.depends_on)?,
                    ticket.notes,
                    ticket.completed_at.map(|dt| dt.to_rfc3339()),
                    ticket.id
                ],
            )
            .context("Failed to update ticket")?;
        Ok(())
    }

    /// Delete a ticket; its attachments and log entries cascade.
    pub fn delete_ticket(&self, id: i64) -> Result<bool> {
        let deleted = self
            .db
            .execute("DELETE FROM tickets WHERE id = ?", params![id])
            .context("Failed to delete ticket")?;
        Ok(deleted > 0)
    }

    // -------------------------------------------------------------------------
    // Attachments and log
    // -------------------------------------------------------------------------

    /// Insert an attachment.
    #[allow(clippy::too_many_arguments)]
    pub fn insert_attachment(
        &self,
        project_id: i64,
        ticket_id: Option<i64>,
        label: &str,
        path: Option<&str>,
        url: Option<&str>,
        notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Attachment> {
        self.db
            .execute(
                "INSERT INTO attachments (project_id, ticket_id, label, path, url, notes, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
                params![project_id, ticket_id, label, path, url, notes, now.to_rfc3339()],
            )
            .context("Failed to insert attachment")?;

        Ok(Attachment {
            id: self.db.last_insert_rowid(),
            project_id,
            ticket_id,
            label: label.to_string(),
            path: path.map(String::from),
            url: url.map(String::from),
            notes: notes.map(String::from),
            created_at: now,
        })
    }

    /// Attachments of a project in creation order.
    pub fn list_attachments(&self, project_id: i64) -> Result<Vec<Attachment>> {
        let sql = format!("SELECT {} FROM attachments WHERE project_id = ? ORDER BY id", ATTACHMENT_COLUMNS);
        let mut stmt = self.db.prepare(&sql)?;
        let attachments = stmt
            .query_map(params![project_id], |row| {
                Ok(Attachment {
                    id: row.get(0)?,
                    project_id: row.get(1)?,
                    ticket_id: row.get(2)?,
                    label: row.get(3)?,
                    path: row.get(4)?,
                    url: row.get(5)?,
                    notes: row.get(6)?,
                    created_at: parse_timestamp(row, 7)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(attachments)
    }

    /// Append a log entry.
    pub fn insert_log_entry(
        &self,
        project_id: i64,
        ticket_id: Option<i64>,
        entry: &str,
        now: DateTime<Utc>,
    ) -> Result<LogEntry> {
        self.db
            .execute(
                "INSERT INTO log (project_id, ticket_id, entry, created_at) VALUES (?, ?, ?, ?)",
                params![project_id, ticket_id, entry, now.to_rfc3339()],
            )
            .context("Failed to insert log entry")?;

        Ok(LogEntry {
            id: self.db.last_insert_rowid(),
            project_id,
            ticket_id,
            entry: entry.to_string(),
            created_at: now,
        })
    }

    /// The `limit` newest log entries of a project, oldest first.
    pub fn recent_log_entries(&self, project_id: i64, limit: usize) -> Result<Vec<LogEntry>> {
        let sql = format!("SELECT {} FROM log WHERE project_id = ? ORDER BY id DESC LIMIT ?", LOG_COLUMNS);
        let mut stmt = self.db.prepare(&sql)?;
        let mut entries = stmt
            .query_map(params![project_id, limit as i64], |row| {
                Ok(LogEntry {
                    id: row.get(0)?,
                    project_id: row.get(1)?,
                    ticket_id: row.get(2)?,
                    entry: row.get(3)?,
                    created_at: parse_timestamp(row, 4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        entries.reverse();
        Ok(entries)
    }

    // -------------------------------------------------------------------------
    // Row decoding
    // -------------------------------------------------------------------------

    fn row_to_project(row: &rusqlite::Row) -> rusqlite::Result<Project> {
        Ok(Project {
            id: row.get(0)?,
            slug: row.get(1)?,
            title: row.get(2)?,
            status: parse_enum(row, 3)?,
            notes: row.get(4)?,
            created_at: parse_timestamp(row, 5)?,
            updated_at: parse_timestamp(row, 6)?,
        })
    }

    fn row_to_ticket(row: &rusqlite::Row) -> rusqlite::Result<Ticket> {
        let deps: Option<String> = row.get(5)?;
        let depends_on = match deps.as_deref() {
            None | Some("") => DependencySet::new(),
            Some(json) => serde_json::from_str(json)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?,
        };

        let completed_at = match row.get::<_, Option<String>>(8)? {
            Some(_) => Some(parse_timestamp(row, 8)?),
            None => None,
        };

        Ok(Ticket {
            id: row.get(0)?,
            project_id: row.get(1)?,
            num: row.get(2)?,
            title: row.get(3)?,
            status: parse_enum(row, 4)?,
            depends_on,
            notes: row.get(6)?,
            created_at: parse_timestamp(row, 7)?,
            completed_at,
        })
    }
}

/// Serialize a dependency set for the `depends_on` column.
fn encode_dependencies(deps: &DependencySet) -> Result<String> {
    serde_json::to_string(deps).context("Failed to serialize dependencies")
}

fn parse_timestamp(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    decode_timestamp(&text).map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// RFC 3339, or the offset-less local time older databases were written with.
fn decode_timestamp(text: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(&Utc));
    }

    let naive = NaiveDateTime::parse_from_str(text, LEGACY_TIMESTAMP_FORMAT)?;
    // A skipped local hour (DST gap) has no mapping; read it as UTC
    Ok(match Local.from_local_datetime(&naive).earliest() {
        Some(local) => local.with_timezone(&Utc),
        None => naive.and_utc(),
    })
}

fn parse_enum<T>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    let text: String = row.get(idx)?;
    text.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}
