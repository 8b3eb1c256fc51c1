//! Local package store.
//!
//! Records which packages are installed and the input values they were
//! installed with, in a small SQLite database under the mcpm home.
//!
//! Two invocations racing on the same package name are not coordinated;
//! the last write to a row wins.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;

use crate::vars::InputValues;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS installed_packages (
    name TEXT PRIMARY KEY,
    version TEXT NOT NULL,
    install_path TEXT NOT NULL,
    installed_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS package_input_values (
    package_name TEXT NOT NULL,
    input_name TEXT NOT NULL,
    input_value TEXT NOT NULL,
    is_secret INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (package_name, input_name)
);
";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to create store directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to open package store at {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },
    #[error("Package store query failed: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A row of `installed_packages`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstalledPackage {
    /// Install name, unique per store
    pub name: String,
    pub version: String,
    pub install_path: PathBuf,
    pub installed_at: DateTime<Utc>,
}

/// SQLite-backed record of installed packages.
#[derive(Debug)]
pub struct PackageStore {
    conn: Connection,
}

impl PackageStore {
    /// Open (creating if needed) the store file at `path`.
    ///
    /// Tables are not created until [`PackageStore::init`] runs.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let conn = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self { conn })
    }

    /// In-memory store, used by tests.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(|source| StoreError::Open {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        Ok(Self { conn })
    }

    /// Open the store at `path` and make sure its tables exist.
    pub fn open_initialized(path: &Path) -> StoreResult<Self> {
        let store = Self::open(path)?;
        store.init()?;
        Ok(store)
    }

    /// Create the tables if they are missing.
    ///
    /// Runs in one transaction, so either every table exists afterwards or
    /// none of the new ones do. Existing rows are never touched.
    pub fn init(&self) -> StoreResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute_batch(SCHEMA)?;
        tx.commit()?;
        Ok(())
    }

    pub fn is_installed(&self, name: &str) -> StoreResult<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM installed_packages WHERE name = ?1",
                params![name],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn get(&self, name: &str) -> StoreResult<Option<InstalledPackage>> {
        let row = self
            .conn
            .query_row(
                "SELECT name, version, install_path, installed_at
                 FROM installed_packages WHERE name = ?1",
                params![name],
                row_to_package,
            )
            .optional()?;
        Ok(row)
    }

    /// Insert or replace the record for `name`, stamping `installed_at` now.
    pub fn upsert(&self, name: &str, version: &str, install_path: &Path) -> StoreResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO installed_packages (name, version, install_path, installed_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                name,
                version,
                install_path.to_string_lossy().into_owned(),
                Utc::now()
            ],
        )?;
        tracing::info!(package = name, version, "Recorded package as installed");
        Ok(())
    }

    /// Delete the record for `name` and its stored input values.
    ///
    /// Returns `false` when there was no record.
    pub fn remove(&self, name: &str) -> StoreResult<bool> {
        let tx = self.conn.unchecked_transaction()?;
        let deleted = tx.execute(
            "DELETE FROM installed_packages WHERE name = ?1",
            params![name],
        )?;
        tx.execute(
            "DELETE FROM package_input_values WHERE package_name = ?1",
            params![name],
        )?;
        tx.commit()?;

        if deleted > 0 {
            tracing::info!(package = name, "Removed package record");
        } else {
            tracing::warn!(package = name, "Package was not in the local package store");
        }
        Ok(deleted > 0)
    }

    /// Every installed package, ordered by name.
    pub fn list_all(&self) -> StoreResult<Vec<InstalledPackage>> {
        let mut stmt = self.conn.prepare(
            "SELECT name, version, install_path, installed_at
             FROM installed_packages ORDER BY name",
        )?;
        let rows = stmt.query_map([], row_to_package)?;
        let mut packages = Vec::new();
        for row in rows {
            packages.push(row?);
        }
        Ok(packages)
    }

    /// Store input values for a package, overwriting repeated keys.
    ///
    /// Does nothing when `values` is empty.
    pub fn store_input_values(&self, package_name: &str, values: &InputValues) -> StoreResult<()> {
        if values.is_empty() {
            return Ok(());
        }
        let tx = self.conn.unchecked_transaction()?;
        for (input_name, input_value) in values {
            tx.execute(
                "INSERT OR REPLACE INTO package_input_values
                 (package_name, input_name, input_value, is_secret)
                 VALUES (?1, ?2, ?3, 0)",
                params![package_name, input_name, input_value],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn get_input_values(&self, package_name: &str) -> StoreResult<InputValues> {
        let mut stmt = self.conn.prepare(
            "SELECT input_name, input_value FROM package_input_values
             WHERE package_name = ?1",
        )?;
        let rows = stmt.query_map(params![package_name], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut values = InputValues::new();
        for row in rows {
            let (name, value) = row?;
            values.insert(name, value);
        }
        Ok(values)
    }
}

fn row_to_package(row: &rusqlite::Row<'_>) -> rusqlite::Result<InstalledPackage> {
    let install_path: String = row.get(2)?;
    Ok(InstalledPackage {
        name: row.get(0)?,
        version: row.get(1)?,
        install_path: PathBuf::from(install_path),
        installed_at: row.get(3)?,
    })
}
