//! Database location configuration.
//!
//! Resolved once at startup and handed to [`crate::Store::open`]; nothing in
//! the library reads the environment on its own.

use std::path::{Path, PathBuf};

/// Environment variable naming the data directory.
pub const DIR_ENV: &str = "AGENTPLAN_DIR";

/// Environment variable naming the database file.
pub const DB_ENV: &str = "AGENTPLAN_DB";

/// Directory name under the home directory when nothing is configured.
const DEFAULT_DIR_NAME: &str = ".agentplan";

/// Database file name inside the data directory.
const DB_FILE: &str = "agentplan.db";

/// Where the database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Data directory, created on open
    pub dir: PathBuf,

    /// SQLite database file
    pub db_path: PathBuf,
}

impl Config {
    /// Config for a database file in `dir`.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let db_path = dir.join(DB_FILE);
        Self { dir, db_path }
    }

    /// Config for an explicit database file; the directory is its parent.
    pub fn at_path(db_path: impl Into<PathBuf>) -> Self {
        let db_path = db_path.into();
        let dir = db_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self { dir, db_path }
    }

    /// Resolve from explicit overrides, then the process environment, then
    /// `~/.agentplan/agentplan.db`.
    pub fn resolve(dir_override: Option<PathBuf>, db_override: Option<PathBuf>) -> Self {
        Self::resolve_with(dir_override, db_override, |key| std::env::var_os(key).map(PathBuf::from))
    }

    /// Resolution with an injectable environment lookup.
    pub fn resolve_with(
        dir_override: Option<PathBuf>,
        db_override: Option<PathBuf>,
        env: impl Fn(&str) -> Option<PathBuf>,
    ) -> Self {
        let dir = dir_override.or_else(|| env(DIR_ENV));
        match (db_override.or_else(|| env(DB_ENV)), dir) {
            (Some(db_path), Some(dir)) => Self { dir, db_path },
            (Some(db_path), None) => Self::at_path(db_path),
            (None, dir) => Self::in_dir(dir.unwrap_or_else(default_dir)),
        }
    }
}

fn default_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_DIR_NAME)
}
