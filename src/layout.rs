//! Fixed on-disk layout of a cloned project

use std::path::{Path, PathBuf};

use crate::error::CloneError;
use crate::roles::BOOTSTRAP_FILE_NAME;

/// The three raw dump artifacts captured from the source database
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpKind {
    Roles,
    Schema,
    Data,
}

impl DumpKind {
    pub const ALL: [DumpKind; 3] = [DumpKind::Roles, DumpKind::Schema, DumpKind::Data];

    pub fn file_stem(&self) -> &'static str {
        match self {
            DumpKind::Roles => "roles",
            DumpKind::Schema => "schema",
            DumpKind::Data => "data",
        }
    }
}

/// Well-known artifact paths relative to a project root
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.root.join("backups")
    }

    /// `backups/<kind>.sql`
    pub fn dump(&self, kind: DumpKind) -> PathBuf {
        self.backups_dir().join(format!("{}.sql", kind.file_stem()))
    }

    /// `backups/<kind>.effective.sql`
    pub fn effective(&self, kind: DumpKind) -> PathBuf {
        self.backups_dir()
            .join(format!("{}.effective.sql", kind.file_stem()))
    }

    /// `backups/auth_users.sql`, captured only for seeds that include auth users
    pub fn auth_users_dump(&self) -> PathBuf {
        self.backups_dir().join("auth_users.sql")
    }

    pub fn migrations_dir(&self) -> PathBuf {
        self.root.join("migrations")
    }

    pub fn bootstrap_migration(&self) -> PathBuf {
        self.migrations_dir().join(BOOTSTRAP_FILE_NAME)
    }

    /// `migrations/<timestamp>_baseline.sql`
    pub fn baseline_migration(&self, timestamp: &str) -> PathBuf {
        self.migrations_dir()
            .join(format!("{}_baseline.sql", timestamp))
    }

    pub fn seed(&self) -> PathBuf {
        self.root.join("seed.sql")
    }

    /// All `.sql` files directly inside the migrations directory, sorted by name.
    pub fn migration_files(&self) -> Vec<PathBuf> {
        let dir = self.migrations_dir();
        if !dir.is_dir() {
            return Vec::new();
        }

        let mut files: Vec<PathBuf> = walkdir::WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .filter(|p| p.is_file() && p.extension().map_or(false, |ext| ext == "sql"))
            .collect();
        files.sort();
        files
    }

    /// Remove `backups/*.effective.sql` left over from a previous restore.
    pub fn clear_effective(&self) -> Result<usize, CloneError> {
        let pattern = self.backups_dir().join("*.effective.sql");
        let mut removed = 0;
        if let Ok(paths) = glob::glob(&pattern.to_string_lossy()) {
            for path in paths.filter_map(|p| p.ok()) {
                std::fs::remove_file(&path)
                    .map_err(|source| CloneError::ArtifactWrite { path, source })?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
