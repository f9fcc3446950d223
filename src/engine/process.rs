//! Process-backed engine: pg_dump, pg_dumpall, psql and the supabase CLI

use std::path::Path;
use std::process::{Command, Output, Stdio};

use tracing::{debug, info};

use super::{DumpEngine, DumpMode, DumpRequest, ErrorMode, SqlExecutor};
use crate::error::CloneError;
use crate::util::write_sql_file;

/// Lines of stderr kept in a `ProcessFailed` error
const STDERR_TAIL_LINES: usize = 20;

/// Verify that every tool is on PATH before anything is touched.
pub fn check_required_tools(tools: &[&str]) -> Result<(), CloneError> {
    for tool in tools {
        if which::which(tool).is_err() {
            return Err(CloneError::MissingTool {
                tool: tool.to_string(),
            });
        }
    }
    Ok(())
}

fn program_name(cmd: &Command) -> String {
    cmd.get_program().to_string_lossy().into_owned()
}

/// Run a command to completion, capturing its output.
fn run_captured(mut cmd: Command) -> Result<Output, CloneError> {
    let program = program_name(&cmd);
    debug!("running {}", program);

    let output = cmd
        .stdin(Stdio::null())
        .output()
        .map_err(|source| CloneError::ProcessSpawn {
            program: program.clone(),
            source,
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let lines: Vec<&str> = stderr.lines().collect();
        let tail = lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join("\n");
        return Err(CloneError::ProcessFailed {
            program,
            status: output.status.to_string(),
            detail: tail,
        });
    }

    Ok(output)
}

/// Dumps with pg_dump/pg_dumpall; diff and reset through the supabase CLI
#[derive(Debug, Clone)]
pub struct PgTools {
    pub pg_dump: String,
    pub pg_dumpall: String,
    pub supabase: String,
}

impl Default for PgTools {
    fn default() -> Self {
        Self {
            pg_dump: "pg_dump".to_string(),
            pg_dumpall: "pg_dumpall".to_string(),
            supabase: "supabase".to_string(),
        }
    }
}

impl PgTools {
    /// Tools this engine shells out to
    pub fn required_tools(&self) -> Vec<&str> {
        vec![
            self.pg_dump.as_str(),
            self.pg_dumpall.as_str(),
            self.supabase.as_str(),
        ]
    }

    fn dump_command(&self, request: &DumpRequest<'_>) -> Command {
        let mut cmd = match request.mode {
            DumpMode::RoleOnly => {
                let mut cmd = Command::new(&self.pg_dumpall);
                cmd.arg("--roles-only").arg("--no-role-passwords");
                cmd
            }
            DumpMode::SchemaOnly => {
                let mut cmd = Command::new(&self.pg_dump);
                cmd.arg("--schema-only");
                cmd
            }
            DumpMode::DataOnly => {
                let mut cmd = Command::new(&self.pg_dump);
                cmd.arg("--data-only");
                cmd
            }
        };

        // Role dumps are cluster-wide; object filters only apply to pg_dump
        if request.mode != DumpMode::RoleOnly {
            for schema in request.schemas {
                cmd.arg(format!("--schema={}", schema));
            }
            for table in request.include_tables {
                cmd.arg(format!("--table={}", table));
            }
            for table in request.exclude_tables {
                cmd.arg(format!("--exclude-table={}", table));
            }
        }

        cmd.arg(format!("--dbname={}", request.db_url))
            .arg(format!("--file={}", request.output.display()));
        cmd
    }
}

impl DumpEngine for PgTools {
    fn dump(&self, request: &DumpRequest<'_>) -> Result<(), CloneError> {
        if let Some(parent) = request.output.parent() {
            std::fs::create_dir_all(parent).map_err(|source| CloneError::ArtifactWrite {
                path: request.output.to_path_buf(),
                source,
            })?;
        }
        run_captured(self.dump_command(request))?;
        info!("wrote {}", request.output.display());
        Ok(())
    }

    fn diff(&self, db_url: &str, schemas: &[String], output: &Path) -> Result<(), CloneError> {
        let mut cmd = Command::new(&self.supabase);
        cmd.arg("db").arg("diff").arg("--db-url").arg(db_url);
        if !schemas.is_empty() {
            cmd.arg("--schema").arg(schemas.join(","));
        }

        let result = run_captured(cmd)?;
        write_sql_file(output, &String::from_utf8_lossy(&result.stdout))?;
        info!("wrote {}", output.display());
        Ok(())
    }

    fn reset(&self, project_root: &Path) -> Result<(), CloneError> {
        let mut cmd = Command::new(&self.supabase);
        cmd.arg("db").arg("reset").current_dir(project_root);
        run_captured(cmd).map(|_| ())
    }
}

/// Runs scripts with psql
#[derive(Debug, Clone)]
pub struct Psql {
    pub program: String,
}

impl Default for Psql {
    fn default() -> Self {
        Self {
            program: "psql".to_string(),
        }
    }
}

impl SqlExecutor for Psql {
    fn execute(&self, db_url: &str, script: &Path, mode: ErrorMode) -> Result<(), CloneError> {
        let on_error_stop = match mode {
            ErrorMode::StopOnError => "ON_ERROR_STOP=1",
            ErrorMode::Continue => "ON_ERROR_STOP=0",
        };

        // Statement errors go straight to the terminal so the user sees them in context
        let status = Command::new(&self.program)
            .arg(format!("--dbname={}", db_url))
            .arg("--no-psqlrc")
            .arg("--quiet")
            .arg("-v")
            .arg(on_error_stop)
            .arg(format!("--file={}", script.display()))
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|source| CloneError::ProcessSpawn {
                program: self.program.clone(),
                source,
            })?;

        if !status.success() {
            return Err(CloneError::ProcessFailed {
                program: self.program.clone(),
                status: status.to_string(),
                detail: format!("while running {}", script.display()),
            });
        }
        Ok(())
    }
}
