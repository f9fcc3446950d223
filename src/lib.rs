//! pgclone: clone a PostgreSQL project into a reproducible local baseline
//!
//! This library dumps roles, schema and data from a source database, rewrites
//! the dumps into idempotent, environment-safe SQL, bootstraps the roles that
//! grants depend on, and produces a baseline migration and a seed file.

pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod filters;
pub mod layout;
pub mod roles;
pub mod seed;
pub mod util;
pub mod workflow;

pub use config::CloneConfig;
pub use error::CloneError;
pub use workflow::{Orchestrator, RestoreTarget, StageReport};

/// Print a short summary of finished stages.
pub fn print_summary(reports: &[StageReport]) {
    for report in reports {
        let status = if report.is_degraded() {
            format!("done with {} warning(s)", report.warnings.len())
        } else {
            "done".to_string()
        };
        println!("{}: {}", report.stage, status);
        for artifact in &report.artifacts {
            println!("  wrote {}", artifact.display());
        }
        for warning in &report.warnings {
            println!("  warning: {}", warning);
        }
    }
}
