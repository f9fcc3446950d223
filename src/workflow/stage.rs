//! Workflow stages and their failure policies

use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::error::CloneError;
use crate::layout::{DumpKind, ProjectLayout};

/// Where a restore writes to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreTarget {
    /// The local development database (local-safe filtering applies)
    Local,
    /// Any other database, by connection string
    Remote(String),
}

/// A step of the clone workflow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Backup,
    Restore(RestoreTarget),
    Baseline,
    MakeSeed,
    Verify,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Backup => "backup",
            Stage::Restore(RestoreTarget::Local) => "restore (local)",
            Stage::Restore(RestoreTarget::Remote(_)) => "restore (remote)",
            Stage::Baseline => "baseline",
            Stage::MakeSeed => "make-seed",
            Stage::Verify => "verify",
        }
    }

    /// Artifacts that must exist before this stage may start
    pub fn required_artifacts(&self, layout: &ProjectLayout) -> Vec<PathBuf> {
        match self {
            Stage::Backup => Vec::new(),
            Stage::Restore(_) => DumpKind::ALL.iter().map(|k| layout.dump(*k)).collect(),
            Stage::Baseline => vec![layout.effective(DumpKind::Schema)],
            Stage::MakeSeed => vec![layout.dump(DumpKind::Data)],
            Stage::Verify => vec![layout.migrations_dir()],
        }
    }

    /// The command that produces this stage's prerequisites
    fn prerequisite_hint(&self) -> &'static str {
        match self {
            Stage::Backup | Stage::Restore(_) | Stage::MakeSeed => "pgclone backup",
            Stage::Baseline => "pgclone restore",
            Stage::Verify => "pgclone baseline",
        }
    }

    /// Fail fast if a prerequisite artifact is missing.
    pub fn check_preconditions(&self, layout: &ProjectLayout) -> Result<(), CloneError> {
        for path in self.required_artifacts(layout) {
            if !path.exists() {
                return Err(CloneError::MissingArtifact {
                    stage: self.name(),
                    path,
                    hint: self.prerequisite_hint(),
                });
            }
        }
        Ok(())
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How the orchestrator reacts when an external step fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Abort the workflow with the error
    FailFast,
    /// Record a warning and carry on with the next step
    WarnAndContinue,
}

impl FailurePolicy {
    /// Apply this policy to the result of one step.
    pub fn handle(
        self,
        step: &str,
        result: Result<(), CloneError>,
        report: &mut StageReport,
    ) -> Result<()> {
        match (result, self) {
            (Ok(()), _) => {
                info!("{}: done", step);
                Ok(())
            }
            (Err(err), FailurePolicy::FailFast) => {
                Err(err).with_context(|| format!("{} failed", step))
            }
            (Err(err), FailurePolicy::WarnAndContinue) => {
                warn!("{} failed, continuing: {}", step, err);
                report.warnings.push(format!("{}: {}", step, err));
                Ok(())
            }
        }
    }
}

/// Outcome of a role bootstrap decision point
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapDecision {
    /// A new bootstrap migration was written for these roles
    Created(Vec<String>),
    /// A bootstrap migration already existed and was left alone
    AlreadyExists,
    /// No roles were detected or forced
    NoRoles,
    /// The user declined to create the detected roles
    Declined,
}

/// What a completed stage produced
#[derive(Debug, Clone)]
pub struct StageReport {
    pub stage: Stage,
    /// Files written by the stage
    pub artifacts: Vec<PathBuf>,
    /// Failures tolerated under `WarnAndContinue`
    pub warnings: Vec<String>,
    /// Bootstrap decisions taken during the stage, in order
    pub bootstrap: Vec<BootstrapDecision>,
}

impl StageReport {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            artifacts: Vec::new(),
            warnings: Vec::new(),
            bootstrap: Vec::new(),
        }
    }

    /// True if the stage completed but some step failed
    pub fn is_degraded(&self) -> bool {
        !self.warnings.is_empty()
    }
}
