//! Backup -> restore -> baseline -> seed orchestration

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::confirm::{Confirm, Decision};
use super::stage::{BootstrapDecision, FailurePolicy, RestoreTarget, Stage, StageReport};
use crate::config::CloneConfig;
use crate::data;
use crate::engine::{DumpEngine, DumpMode, DumpRequest, ErrorMode, SqlExecutor};
use crate::error::CloneError;
use crate::filters::{filter_data, filter_roles, filter_schema};
use crate::layout::{DumpKind, ProjectLayout};
use crate::roles::{write_bootstrap, BootstrapOutcome, RoleName};
use crate::seed::compose_seed;
use crate::util::{read_sql_file, write_sql_file};

/// Drives the clone workflow against injected tooling.
///
/// Stages run strictly one after another. Each checks that the artifacts of
/// the previous stage are on disk before touching anything.
pub struct Orchestrator<'a> {
    config: CloneConfig,
    layout: ProjectLayout,
    engine: &'a dyn DumpEngine,
    executor: &'a dyn SqlExecutor,
    confirm: &'a dyn Confirm,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        config: CloneConfig,
        engine: &'a dyn DumpEngine,
        executor: &'a dyn SqlExecutor,
        confirm: &'a dyn Confirm,
    ) -> Self {
        let layout = ProjectLayout::new(config.project_root.clone());
        Self {
            config,
            layout,
            engine,
            executor,
            confirm,
        }
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    pub fn config(&self) -> &CloneConfig {
        &self.config
    }

    /// Dump roles, schema and data from the source database.
    pub fn backup(&self) -> Result<StageReport> {
        let stage = Stage::Backup;
        stage.check_preconditions(&self.layout)?;
        let source = self.config.require_source_url()?;
        let mut report = StageReport::new(stage);

        info!("Backing up {} schema(s) from source", self.config.schemas.len());

        for (kind, mode) in [
            (DumpKind::Roles, DumpMode::RoleOnly),
            (DumpKind::Schema, DumpMode::SchemaOnly),
            (DumpKind::Data, DumpMode::DataOnly),
        ] {
            let output = self.layout.dump(kind);
            let request = DumpRequest {
                db_url: source,
                mode,
                schemas: &self.config.schemas,
                include_tables: &[],
                exclude_tables: &self.config.exclude_tables,
                output: &output,
            };
            let step = format!("{} dump", kind.file_stem());
            FailurePolicy::FailFast.handle(&step, self.engine.dump(&request), &mut report)?;
            report.artifacts.push(output);
        }

        Ok(report)
    }

    /// Replay the captured dumps into a target database.
    ///
    /// Roles and schema replay stop at their first failing statement; the data
    /// replay runs every row and only warns. The role bootstrap is applied
    /// before anything else touches the target.
    pub fn restore(&self, target: &RestoreTarget) -> Result<StageReport> {
        let stage = Stage::Restore(target.clone());
        stage.check_preconditions(&self.layout)?;
        let mut report = StageReport::new(stage);

        let (target_url, local) = match target {
            RestoreTarget::Local => (self.config.local_db_url.as_str(), true),
            RestoreTarget::Remote(url) => (url.as_str(), false),
        };
        let options = self.config.filter_options(local);
        let schema_policy = self.config.schema_policy();

        let cleared = self.layout.clear_effective()?;
        if cleared > 0 {
            info!("Removed {} stale effective artifact(s)", cleared);
        }

        // Step 1: build the effective roles and schema artifacts
        let roles = filter_roles(&self.read(DumpKind::Roles)?, &options);
        let roles_path = self.layout.effective(DumpKind::Roles);
        write_sql_file(&roles_path, &roles)?;
        report.artifacts.push(roles_path.clone());

        let schema = filter_schema(&self.read(DumpKind::Schema)?, &options);
        let schema_path = self.layout.effective(DumpKind::Schema);
        write_sql_file(&schema_path, &schema)?;
        report.artifacts.push(schema_path.clone());

        // Step 2: make sure granted-to roles exist before the first grant replays
        let decision = self.bootstrap_roles(&[schema.as_str()])?;
        report.bootstrap.push(decision.clone());
        let bootstrap_path = self.layout.bootstrap_migration();
        if !matches!(decision, BootstrapDecision::Declined) && bootstrap_path.exists() {
            let result = self
                .executor
                .execute(target_url, &bootstrap_path, ErrorMode::StopOnError);
            schema_policy.handle("role bootstrap", result, &mut report)?;
        }

        // Step 3: roles, then schema
        let result = self
            .executor
            .execute(target_url, &roles_path, ErrorMode::StopOnError);
        schema_policy.handle("roles replay", result, &mut report)?;

        let result = self
            .executor
            .execute(target_url, &schema_path, ErrorMode::StopOnError);
        schema_policy.handle("schema replay", result, &mut report)?;

        // Step 4: data, row by row, never fatal
        let data = filter_data(&data::prepare(
            &self.read(DumpKind::Data)?,
            self.config.skip_problematic_data,
        ));
        let data_path = self.layout.effective(DumpKind::Data);
        write_sql_file(&data_path, &data)?;
        report.artifacts.push(data_path.clone());

        let result = self
            .executor
            .execute(target_url, &data_path, ErrorMode::Continue);
        FailurePolicy::WarnAndContinue.handle("data replay", result, &mut report)?;

        Ok(report)
    }

    /// Capture the restored local schema as a timestamped baseline migration.
    pub fn baseline(&self) -> Result<StageReport> {
        let stage = Stage::Baseline;
        stage.check_preconditions(&self.layout)?;
        let mut report = StageReport::new(stage);

        let timestamp = chrono::Utc::now().format("%Y%m%d%H%M%S").to_string();
        let output = self.layout.baseline_migration(&timestamp);
        let result = self
            .engine
            .diff(&self.config.local_db_url, &self.config.schemas, &output);
        FailurePolicy::FailFast.handle("baseline diff", result, &mut report)?;
        report.artifacts.push(output);

        Ok(report)
    }

    /// Write `seed.sql` from the data dump (and auth users when configured).
    pub fn make_seed(&self) -> Result<StageReport> {
        let stage = Stage::MakeSeed;
        stage.check_preconditions(&self.layout)?;
        let mut report = StageReport::new(stage);

        let auth_data = if self.config.include_auth_users {
            let source = self.config.require_source_url()?;
            let output = self.layout.auth_users_dump();
            let schemas = vec!["auth".to_string()];
            let tables = vec!["auth.users".to_string()];
            let request = DumpRequest {
                db_url: source,
                mode: DumpMode::DataOnly,
                schemas: &schemas,
                include_tables: &tables,
                exclude_tables: &[],
                output: &output,
            };
            FailurePolicy::FailFast.handle("auth users dump", self.engine.dump(&request), &mut report)?;
            report.artifacts.push(output.clone());
            Some(read_sql_file(&output)?)
        } else {
            None
        };

        let data = data::prepare(
            &self.read(DumpKind::Data)?,
            self.config.skip_problematic_data,
        );
        let seed = compose_seed(auth_data.as_deref(), &data);
        let seed_path = self.layout.seed();
        write_sql_file(&seed_path, &seed)?;
        info!("Wrote {}", seed_path.display());
        report.artifacts.push(seed_path);

        Ok(report)
    }

    /// Rebuild the local database from migrations and seed; any failure is fatal.
    pub fn verify(&self) -> Result<StageReport> {
        let stage = Stage::Verify;
        stage.check_preconditions(&self.layout)?;
        let mut report = StageReport::new(stage);

        let result = self
            .engine
            .reset(self.layout.root())
            .map_err(|err| CloneError::VerificationFailed {
                message: err.to_string(),
            });
        FailurePolicy::FailFast.handle("reset", result, &mut report)?;

        Ok(report)
    }

    /// Full local clone: backup, restore, baseline, seed and optional verification.
    ///
    /// After the baseline exists the bootstrap decision runs a second time with
    /// the full migration set, to catch roles only visible after schema replay.
    pub fn clone_local(&self) -> Result<Vec<StageReport>> {
        let mut reports = vec![self.backup()?, self.restore(&RestoreTarget::Local)?];

        let mut baseline = self.baseline()?;
        let schema = read_sql_file(&self.layout.effective(DumpKind::Schema))?;
        let decision = self.bootstrap_roles(&[schema.as_str()])?;
        baseline.bootstrap.push(decision);
        reports.push(baseline);

        reports.push(self.make_seed()?);

        if self.config.verify {
            reports.push(self.verify()?);
        }

        let warnings: usize = reports.iter().map(|r| r.warnings.len()).sum();
        if warnings > 0 {
            warn!("Clone finished with {} warning(s)", warnings);
        } else {
            info!("Clone finished");
        }
        Ok(reports)
    }

    /// Decide whether to write the role bootstrap migration.
    ///
    /// Candidates are every role referenced by the existing migrations and
    /// `extra_sources`, plus the forced roles. The file is never rewritten.
    pub fn bootstrap_roles(&self, extra_sources: &[&str]) -> Result<BootstrapDecision> {
        let path = self.layout.bootstrap_migration();
        if path.exists() {
            info!("Role bootstrap already exists: {}", path.display());
            return Ok(BootstrapDecision::AlreadyExists);
        }

        let migrations = self
            .layout
            .migration_files()
            .iter()
            .map(|p| read_sql_file(p))
            .collect::<Result<Vec<_>, _>>()?;

        let mut sources: Vec<&str> = migrations.iter().map(|s| s.as_str()).collect();
        sources.extend_from_slice(extra_sources);

        let detected = self.config.role_extractor().extract(&sources);
        let forced = self.config.forced_role_names();
        log_forced_roles(&detected, &forced);

        let mut candidates = detected;
        candidates.extend(forced);

        if candidates.is_empty() {
            info!("No roles need bootstrapping");
            return Ok(BootstrapDecision::NoRoles);
        }

        let names: Vec<String> = candidates.iter().map(|r| r.to_string()).collect();
        let prompt = format!(
            "Create {} role(s) in {}?",
            names.len(),
            file_name(&path)
        );
        if self.confirm.confirm(&prompt, &names)? == Decision::Decline {
            warn!("Role bootstrap declined; grants to these roles may fail");
            return Ok(BootstrapDecision::Declined);
        }

        match write_bootstrap(&candidates, &path)
            .with_context(|| format!("writing {}", path.display()))?
        {
            BootstrapOutcome::Created(n) => {
                info!("Wrote role bootstrap with {} role(s)", n);
                Ok(BootstrapDecision::Created(names))
            }
            BootstrapOutcome::AlreadyExists => Ok(BootstrapDecision::AlreadyExists),
        }
    }

    fn read(&self, kind: DumpKind) -> Result<String, CloneError> {
        read_sql_file(&self.layout.dump(kind))
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Report forced roles that the SQL does not reference (they are still created).
fn log_forced_roles(detected: &BTreeSet<RoleName>, forced: &[RoleName]) {
    let extra: Vec<&str> = forced
        .iter()
        .filter(|r| !detected.contains(*r))
        .map(|r| r.as_str())
        .collect();
    if !extra.is_empty() {
        info!("Forced roles not referenced in SQL: {}", extra.join(", "));
    }
}
