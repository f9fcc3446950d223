//! Integration tests for the backup, baseline, seed and clone-local stages

use pgclone::engine::DumpMode;
use pgclone::layout::DumpKind;
use pgclone::roles::BOOTSTRAP_FILE_NAME;
use pgclone::workflow::{BootstrapDecision, Stage};
use pgclone::RestoreTarget;

use crate::common::{FakeEngine, FakeExecutor, TestContext};

fn source_engine() -> FakeEngine {
    FakeEngine {
        roles: "CREATE ROLE app_user;\n".to_string(),
        schema: "CREATE SCHEMA auth;\n\
                 CREATE TABLE public.notes (id integer, body text);\n\
                 ALTER TABLE public.notes OWNER TO admin;\n\
                 GRANT SELECT ON TABLE public.notes TO reporting;\n"
            .to_string(),
        data: "COPY public.notes (id, body) FROM stdin;\n1\thello\n2\t\\N\n\\.\n".to_string(),
        auth_users: "COPY auth.users (id, email) FROM stdin;\nu1\ta@example.com\n\\.\n"
            .to_string(),
        baseline: "CREATE TABLE public.notes (id integer, body text);\n\
                   GRANT SELECT ON TABLE public.notes TO reporting;\n"
            .to_string(),
        ..FakeEngine::default()
    }
}

// ============================================================================
// Backup
// ============================================================================

#[test]
fn test_backup_writes_three_dumps() {
    let ctx = TestContext::new();
    let engine = source_engine();
    let executor = FakeExecutor::default();

    let report = ctx.orchestrator(&engine, &executor).backup().unwrap();

    assert_eq!(report.stage, Stage::Backup);
    assert_eq!(
        engine.calls.borrow().as_slice(),
        &["dump RoleOnly", "dump SchemaOnly", "dump DataOnly"]
    );
    for kind in DumpKind::ALL {
        assert!(ctx.layout().dump(kind).exists());
    }
    assert_eq!(report.artifacts.len(), 3);
}

#[test]
fn test_backup_requires_source_url() {
    let mut ctx = TestContext::new();
    ctx.config.source_db_url = None;
    let engine = source_engine();
    let executor = FakeExecutor::default();

    let err = ctx.orchestrator(&engine, &executor).backup().unwrap_err();

    assert!(err.to_string().contains("--db-url"));
    assert!(engine.calls.borrow().is_empty());
}

#[test]
fn test_backup_passes_schemas_and_exclusions() {
    let mut ctx = TestContext::new();
    ctx.config.schemas = vec!["public".to_string(), "billing".to_string()];
    let engine = source_engine();
    let executor = FakeExecutor::default();

    ctx.orchestrator(&engine, &executor).backup().unwrap();

    let requests = engine.dump_requests.borrow();
    let (mode, schemas, tables) = &requests[1];
    assert_eq!(*mode, DumpMode::SchemaOnly);
    assert_eq!(schemas, &vec!["public".to_string(), "billing".to_string()]);
    assert!(tables.is_empty());
}

// ============================================================================
// Baseline, seed and verify
// ============================================================================

#[test]
fn test_baseline_requires_restore() {
    let ctx = TestContext::new();
    let engine = source_engine();
    let executor = FakeExecutor::default();

    let err = ctx.orchestrator(&engine, &executor).baseline().unwrap_err();

    assert!(err.to_string().contains("pgclone restore"));
    assert!(engine.calls.borrow().is_empty());
}

#[test]
fn test_make_seed_requires_data_dump() {
    let ctx = TestContext::new();
    let engine = source_engine();
    let executor = FakeExecutor::default();

    let err = ctx.orchestrator(&engine, &executor).make_seed().unwrap_err();

    assert!(err.to_string().contains("data.sql"));
    assert!(!ctx.layout().seed().exists());
}

#[test]
fn test_make_seed_with_auth_users() {
    let mut ctx = TestContext::new().with_backups(
        "",
        "",
        "COPY public.notes (id, body) FROM stdin;\n1\thello\n\\.\n",
    );
    ctx.config.include_auth_users = true;
    let engine = source_engine();
    let executor = FakeExecutor::default();

    ctx.orchestrator(&engine, &executor).make_seed().unwrap();

    let requests = engine.dump_requests.borrow();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].2, vec!["auth.users".to_string()]);

    let seed = ctx.read(&ctx.layout().seed());
    assert!(seed.contains("INSERT INTO auth.users (id, email) VALUES ('u1', 'a@example.com');"));
    assert!(seed.contains("INSERT INTO public.notes (id, body) VALUES ('1', 'hello');"));
    assert!(seed.find("auth.users").unwrap() < seed.find("public.notes").unwrap());
}

#[test]
fn test_verify_failure_is_fatal() {
    let ctx = TestContext::new().with_migration("20240101000000_baseline.sql", "SELECT 1;\n");
    let engine = FakeEngine {
        fail_reset: true,
        ..FakeEngine::default()
    };
    let executor = FakeExecutor::default();

    let err = ctx.orchestrator(&engine, &executor).verify().unwrap_err();

    assert!(format!("{:#}", err).contains("Verification failed"));
}

// ============================================================================
// Clone local
// ============================================================================

#[test]
fn test_clone_local_runs_every_stage() {
    let ctx = TestContext::new();
    let engine = source_engine();
    let executor = FakeExecutor::default();

    let reports = ctx.orchestrator(&engine, &executor).clone_local().unwrap();

    let stages: Vec<Stage> = reports.iter().map(|r| r.stage.clone()).collect();
    assert_eq!(
        stages,
        vec![
            Stage::Backup,
            Stage::Restore(RestoreTarget::Local),
            Stage::Baseline,
            Stage::MakeSeed,
        ]
    );
    assert_eq!(
        engine.calls.borrow().as_slice(),
        &["dump RoleOnly", "dump SchemaOnly", "dump DataOnly", "diff"]
    );

    // The restore created the bootstrap, so the second decision is a no-op
    assert_eq!(
        reports[1].bootstrap,
        vec![BootstrapDecision::Created(vec!["reporting".to_string()])]
    );
    assert_eq!(reports[2].bootstrap, vec![BootstrapDecision::AlreadyExists]);

    let layout = ctx.layout();
    let migrations: Vec<String> = layout
        .migration_files()
        .iter()
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();
    assert_eq!(migrations.len(), 2);
    assert_eq!(migrations[0], BOOTSTRAP_FILE_NAME);
    assert!(migrations[1].ends_with("_baseline.sql"));

    let seed = ctx.read(&layout.seed());
    assert_eq!(seed.matches("INSERT INTO public.notes").count(), 2);
}

#[test]
fn test_clone_local_second_pass_sees_baseline_roles() {
    let ctx = TestContext::new();
    let engine = FakeEngine {
        schema: "CREATE TABLE public.notes (id integer);\n".to_string(),
        baseline: "GRANT SELECT ON TABLE public.notes TO late_reader;\n".to_string(),
        ..source_engine()
    };
    let executor = FakeExecutor::default();

    let reports = ctx.orchestrator(&engine, &executor).clone_local().unwrap();

    assert_eq!(reports[1].bootstrap, vec![BootstrapDecision::NoRoles]);
    assert_eq!(
        reports[2].bootstrap,
        vec![BootstrapDecision::Created(vec!["late_reader".to_string()])]
    );
    let bootstrap = ctx.read(&ctx.layout().bootstrap_migration());
    assert!(bootstrap.contains("'late_reader'"));
    // Written for the next reset only, not applied to the restored database
    assert!(executor.execution(BOOTSTRAP_FILE_NAME).is_none());
}

#[test]
fn test_clone_local_with_verify() {
    let mut ctx = TestContext::new();
    ctx.config.verify = true;
    let engine = source_engine();
    let executor = FakeExecutor::default();

    let reports = ctx.orchestrator(&engine, &executor).clone_local().unwrap();

    assert_eq!(reports.last().unwrap().stage, Stage::Verify);
    assert_eq!(engine.calls.borrow().last().unwrap(), "reset");
}

#[test]
fn test_clone_local_verify_failure_aborts() {
    let mut ctx = TestContext::new();
    ctx.config.verify = true;
    let engine = FakeEngine {
        fail_reset: true,
        ..source_engine()
    };
    let executor = FakeExecutor::default();

    let err = ctx.orchestrator(&engine, &executor).clone_local().unwrap_err();

    assert!(format!("{:#}", err).contains("Verification failed"));
    // Artifacts of the earlier stages stay on disk
    assert!(ctx.layout().seed().exists());
}

#[test]
fn test_clone_local_data_failure_still_completes() {
    let ctx = TestContext::new();
    let engine = source_engine();
    let executor = FakeExecutor::failing_on(&["data.effective.sql"]);

    let reports = ctx.orchestrator(&engine, &executor).clone_local().unwrap();

    assert!(reports[1].is_degraded());
    assert!(ctx.layout().seed().exists());
}
