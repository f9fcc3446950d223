use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pgclone::config::{load_dotenv, split_list, CloneConfig, DEFAULT_LOCAL_DB_URL};
use pgclone::engine::{check_required_tools, PgTools, Psql};
use pgclone::workflow::{AutoApprove, Confirm, InteractiveConfirm};
use pgclone::{print_summary, Orchestrator, RestoreTarget};

#[derive(Parser)]
#[command(name = "pgclone")]
#[command(
    author,
    version,
    about = "Clone a PostgreSQL project into an idempotent migration baseline and seed"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Dump roles, schema and data from the source database into backups/
    Backup {
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Replay backups/ into the local database (or a remote one)
    Restore {
        #[command(flatten)]
        common: CommonArgs,

        /// Restore into this database instead of the local one
        #[arg(long, env = "PGCLONE_REMOTE_URL")]
        remote_url: Option<String>,
    },
    /// Capture the restored local schema as a baseline migration
    Baseline {
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Write seed.sql from the data backup
    MakeSeed {
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Backup, restore locally, baseline and seed in one go
    CloneLocal {
        #[command(flatten)]
        common: CommonArgs,

        /// Reset the local database afterwards to check the migrations apply cleanly
        #[arg(long)]
        verify: bool,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// Project directory holding backups/, migrations/ and seed.sql
    #[arg(long, env = "PGCLONE_PROJECT_DIR", default_value = ".")]
    project_dir: PathBuf,

    /// Source database connection string
    #[arg(long, env = "PGCLONE_DB_URL")]
    db_url: Option<String>,

    /// Local database connection string
    #[arg(long, env = "PGCLONE_LOCAL_DB_URL", default_value = DEFAULT_LOCAL_DB_URL)]
    local_db_url: String,

    /// Schemas to clone (repeatable or comma separated)
    #[arg(long = "schema", env = "PGCLONE_SCHEMAS", value_delimiter = ',', default_value = "public")]
    schemas: Vec<String>,

    /// Tables to leave out of the dumps (repeatable or comma separated)
    #[arg(long = "exclude-table", value_delimiter = ',')]
    exclude_tables: Vec<String>,

    /// Keep OWNER TO / REASSIGN OWNED BY statements
    #[arg(long)]
    no_strip_owners: bool,

    /// Keep GRANTED BY clauses
    #[arg(long)]
    no_strip_grantors: bool,

    /// Drop data for platform-internal schemas (auth, storage, realtime, ...)
    #[arg(long)]
    skip_problematic_data: bool,

    /// Roles to bootstrap even if no grant references them
    #[arg(long = "force-role", env = "PGCLONE_FORCE_ROLES", value_delimiter = ',')]
    force_roles: Vec<String>,

    /// Names that look like roles in this project's SQL but are not
    #[arg(long = "ignore-role", env = "PGCLONE_IGNORE_ROLES", value_delimiter = ',')]
    ignore_roles: Vec<String>,

    /// Accept detected roles without prompting
    #[arg(short = 'y', long)]
    yes: bool,

    /// Abort when the role or schema replay fails
    #[arg(long)]
    strict: bool,

    /// Include auth.users in the seed
    #[arg(long)]
    include_auth_users: bool,

    #[arg(long, env = "PGCLONE_PSQL", default_value = "psql")]
    psql: String,

    #[arg(long, env = "PGCLONE_PG_DUMP", default_value = "pg_dump")]
    pg_dump: String,

    #[arg(long, env = "PGCLONE_PG_DUMPALL", default_value = "pg_dumpall")]
    pg_dumpall: String,

    #[arg(long, env = "PGCLONE_SUPABASE", default_value = "supabase")]
    supabase: String,
}

impl CommonArgs {
    fn to_config(&self, verify: bool) -> CloneConfig {
        CloneConfig {
            project_root: self.project_dir.clone(),
            source_db_url: self.db_url.clone(),
            local_db_url: self.local_db_url.clone(),
            schemas: split_list(&self.schemas),
            exclude_tables: split_list(&self.exclude_tables),
            strip_owners: !self.no_strip_owners,
            strip_grantors: !self.no_strip_grantors,
            skip_problematic_data: self.skip_problematic_data,
            forced_roles: split_list(&self.force_roles),
            ignored_roles: split_list(&self.ignore_roles),
            strict: self.strict,
            verify,
            include_auth_users: self.include_auth_users,
        }
    }

    fn tools(&self) -> (PgTools, Psql) {
        let engine = PgTools {
            pg_dump: self.pg_dump.clone(),
            pg_dumpall: self.pg_dumpall.clone(),
            supabase: self.supabase.clone(),
        };
        let executor = Psql {
            program: self.psql.clone(),
        };
        (engine, executor)
    }

    /// Prompt on a terminal, accept automatically otherwise
    fn confirm(&self) -> Box<dyn Confirm> {
        if self.yes || !std::io::stdin().is_terminal() {
            Box::new(AutoApprove)
        } else {
            Box::new(InteractiveConfirm)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "pgclone=debug" } else { "pgclone=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    load_dotenv();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let (common, verify) = match &cli.command {
        Commands::Backup { common }
        | Commands::Restore { common, .. }
        | Commands::Baseline { common }
        | Commands::MakeSeed { common } => (common, false),
        Commands::CloneLocal { common, verify } => (common, *verify),
    };

    let config = common.to_config(verify);
    let (engine, executor) = common.tools();
    let confirm = common.confirm();

    let tools: Vec<&str> = match &cli.command {
        Commands::Backup { .. } => vec![common.pg_dump.as_str(), common.pg_dumpall.as_str()],
        Commands::Restore { .. } => vec![common.psql.as_str()],
        Commands::Baseline { .. } => vec![common.supabase.as_str()],
        Commands::MakeSeed { .. } if config.include_auth_users => vec![common.pg_dump.as_str()],
        Commands::MakeSeed { .. } => Vec::new(),
        Commands::CloneLocal { .. } => {
            let mut tools = engine.required_tools();
            tools.push(common.psql.as_str());
            tools
        }
    };
    check_required_tools(&tools)?;

    let orchestrator = Orchestrator::new(config, &engine, &executor, confirm.as_ref());

    let reports = match &cli.command {
        Commands::Backup { .. } => vec![orchestrator.backup()?],
        Commands::Restore { remote_url, .. } => {
            let target = match remote_url {
                Some(url) => RestoreTarget::Remote(url.clone()),
                None => RestoreTarget::Local,
            };
            vec![orchestrator.restore(&target)?]
        }
        Commands::Baseline { .. } => vec![orchestrator.baseline()?],
        Commands::MakeSeed { .. } => vec![orchestrator.make_seed()?],
        Commands::CloneLocal { .. } => orchestrator.clone_local()?,
    };

    print_summary(&reports);

    Ok(())
}
