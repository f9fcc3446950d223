//! Unit tests for the statement filters
//!
//! These tests exercise the filters through the public API, over dump
//! fragments shaped like real pg_dump output.

use pgclone::filters::{
    copy_blocks_to_inserts, filter_data, filter_managed_schemas, filter_roles, filter_schema,
    harden_setval, make_roles_idempotent, strip_grantors, strip_owners, FilterOptions,
};
use pretty_assertions::assert_eq;

/// Dump text containing none of the statement shapes any filter rewrites
const PLAIN_SCHEMA: &str = "--\n\
-- PostgreSQL database dump\n\
--\n\
\n\
SET statement_timeout = 0;\n\
SET client_encoding = 'UTF8';\n\
SELECT pg_catalog.set_config('search_path', '', false);\n\
CREATE SCHEMA billing;\n\
CREATE TABLE billing.invoices (\n\
    id bigint NOT NULL,\n\
    note text DEFAULT 'pending'\n\
);\n\
ALTER TABLE ONLY billing.invoices\n\
    ADD CONSTRAINT invoices_pkey PRIMARY KEY (id);\n\
CREATE INDEX invoices_note_idx ON billing.invoices USING btree (note);\n\
GRANT SELECT ON TABLE billing.invoices TO reporting;\n\
-- ALTER TABLE billing.invoices OWNER TO admin;\n";

const PLAIN_CRLF: &str = "CREATE TABLE public.t (id int);\r\nINSERT INTO public.t VALUES (1);\r\n";

// ============================================================================
// Identity on non-matching input
// ============================================================================

#[test]
fn test_every_filter_is_identity_without_matches() {
    for input in [PLAIN_SCHEMA, PLAIN_CRLF, "", "\n\n", "no trailing newline"] {
        assert_eq!(strip_owners(input), input);
        assert_eq!(strip_grantors(input), input);
        assert_eq!(filter_managed_schemas(input), input);
        assert_eq!(make_roles_idempotent(input), input);
        assert_eq!(harden_setval(input), input);
        assert_eq!(copy_blocks_to_inserts(input), input);
    }
}

#[test]
fn test_pipelines_are_identity_without_matches() {
    let options = FilterOptions {
        strip_owners: true,
        strip_grantors: true,
        local_safe: true,
    };
    assert_eq!(filter_schema(PLAIN_SCHEMA, &options), PLAIN_SCHEMA);
    assert_eq!(filter_roles(PLAIN_CRLF, &options), PLAIN_CRLF);
    assert_eq!(filter_data(PLAIN_CRLF), PLAIN_CRLF);
}

// ============================================================================
// Ownership and grantors
// ============================================================================

#[test]
fn test_owner_lines_commented_with_crlf_preserved() {
    let input = "ALTER TABLE public.x OWNER TO admin;\r\nREASSIGN OWNED BY old_admin TO postgres;\r\n";
    assert_eq!(
        strip_owners(input),
        "-- ALTER TABLE public.x OWNER TO admin;\r\n-- REASSIGN OWNED BY old_admin TO postgres;\r\n"
    );
}

#[test]
fn test_grantor_clause_removed() {
    let input = "GRANT authenticated TO \"Data Reader\" GRANTED BY \"supabase_admin\";\n";
    assert_eq!(
        strip_grantors(input),
        "GRANT authenticated TO \"Data Reader\";\n"
    );
}

// ============================================================================
// Managed schemas
// ============================================================================

#[test]
fn test_managed_schema_filter_example() {
    let input = "CREATE SCHEMA auth;\nCREATE SCHEMA public;\nCREATE SCHEMA billing;\n";
    assert_eq!(
        filter_managed_schemas(input),
        "-- CREATE SCHEMA auth;\nCREATE SCHEMA public;\nCREATE SCHEMA billing;\n"
    );
}

#[test]
fn test_managed_schema_variants() {
    let input = "ALTER SCHEMA storage OWNER TO supabase_admin;\n\
                 DROP SCHEMA IF EXISTS realtime CASCADE;\n\
                 CREATE SCHEMA IF NOT EXISTS \"vault\";\n\
                 CREATE SCHEMA \"Auth\";\n";
    let out = filter_managed_schemas(input);
    let lines: Vec<&str> = out.lines().collect();
    assert!(lines[0].starts_with("-- ALTER SCHEMA storage"));
    assert!(lines[1].starts_with("-- DROP SCHEMA IF EXISTS realtime"));
    assert!(lines[2].starts_with("-- CREATE SCHEMA IF NOT EXISTS \"vault\""));
    // Quoted names are case-sensitive: "Auth" is a user schema
    assert_eq!(lines[3], "CREATE SCHEMA \"Auth\";");
}

// ============================================================================
// CREATE ROLE rewriting
// ============================================================================

#[test]
fn test_create_role_rewrite_is_idempotent() {
    let input = "CREATE ROLE app_user;\n\
                 ALTER ROLE app_user WITH NOSUPERUSER INHERIT LOGIN;\n\
                 CREATE ROLE \"Data Reader\" WITH NOLOGIN;\n";
    let once = make_roles_idempotent(input);
    let twice = make_roles_idempotent(&once);
    assert_eq!(once, twice);
    assert_eq!(once.matches("EXCEPTION WHEN duplicate_object").count(), 2);
    assert!(once.contains("\nALTER ROLE app_user WITH NOSUPERUSER INHERIT LOGIN;\n"));
}

// ============================================================================
// setval hardening
// ============================================================================

#[test]
fn test_setval_guarded_by_existence_check() {
    for is_called in ["true", "false"] {
        let input = format!("SELECT pg_catalog.setval('s.t_c_seq', 17, {});\n", is_called);
        let out = harden_setval(&input);
        assert!(out.starts_with("DO $$ BEGIN IF EXISTS (SELECT 1 FROM pg_catalog.pg_class c"));
        assert!(out.contains("c.relkind = 'S'"));
        assert!(out.contains("n.nspname = 's' AND c.relname = 't_c_seq'"));
        assert!(out.contains(&format!(
            "THEN PERFORM pg_catalog.setval('s.t_c_seq', 17, {}); END IF; END $$;",
            is_called
        )));
        assert!(!out.contains("SELECT pg_catalog.setval"));
    }
}

// ============================================================================
// COPY conversion
// ============================================================================

#[test]
fn test_copy_block_yields_one_insert_per_row() {
    let rows: Vec<String> = (1..=5).map(|i| format!("{}\tname {}\t\\N", i, i)).collect();
    let input = format!(
        "COPY public.people (id, name, nickname) FROM stdin;\n{}\n\\.\n",
        rows.join("\n")
    );
    let out = copy_blocks_to_inserts(&input);

    assert_eq!(out.matches("INSERT INTO").count(), 5);
    assert_eq!(out.matches("NULL").count(), 5);
    assert!(!out.contains("'NULL'"));
    assert!(!out.contains("\\N"));
    assert!(!out.contains("FROM stdin"));
    assert!(out.contains("INSERT INTO public.people (id, name, nickname) VALUES ('1', 'name 1', NULL);"));
}

#[test]
fn test_copy_escapes_decoded_and_quoted() {
    let input = "COPY public.notes (body) FROM stdin;\nit's\nC:\\\\temp\nx\\ty\n\\.\n";
    let out = copy_blocks_to_inserts(input);
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "INSERT INTO public.notes (body) VALUES ('it''s');");
    assert_eq!(lines[1], "INSERT INTO public.notes (body) VALUES (E'C:\\\\temp');");
    assert_eq!(lines[2], "INSERT INTO public.notes (body) VALUES ('x\ty');");
}

#[test]
fn test_unterminated_copy_left_unchanged() {
    let input = "COPY public.t (id) FROM stdin;\n1\n2\n";
    assert_eq!(copy_blocks_to_inserts(input), input);
}

#[test]
fn test_data_pipeline_converts_and_guards() {
    let input = "SET session_replication_role = replica;\n\
                 COPY public.t (id) FROM stdin;\n\
                 1\n\
                 2\n\
                 \\.\n\
                 SELECT pg_catalog.setval('public.t_id_seq', 2, true);\n";
    let out = filter_data(input);
    assert_eq!(out.matches("INSERT INTO public.t (id)").count(), 2);
    assert!(out.starts_with("SET session_replication_role = replica;\n"));
    assert!(out.contains("PERFORM pg_catalog.setval('public.t_id_seq', 2, true)"));
}

#[test]
fn test_multiline_row_text_not_hardened() {
    let input = "COPY public.snippets (id, body) FROM stdin;\n\
                 1\tfirst\\nSELECT pg_catalog.setval('a.b', 1, true);\n\
                 \\.\n";
    assert_eq!(
        filter_data(input),
        "INSERT INTO public.snippets (id, body) VALUES \
         ('1', 'first\nSELECT pg_catalog.setval(''a.b'', 1, true);');\n"
    );
}
