//! Seed file composition
//!
//! The seed replays captured data on every environment reset. It runs as one
//! transaction with `session_replication_role = replica`, which suspends
//! foreign-key and user triggers so tables can load in any order.

use crate::filters::filter_data;

/// Compose `seed.sql` from optional auth-user data and the primary data dump.
///
/// Both sections go through the data filters, so the result contains no COPY
/// blocks and only guarded setval calls.
pub fn compose_seed(auth_data: Option<&str>, data: &str) -> String {
    let mut seed = String::new();
    seed.push_str("-- Seed data captured from the source project.\n");
    seed.push_str("BEGIN;\n");
    seed.push_str("SET session_replication_role = replica;\n\n");

    if let Some(auth) = auth_data {
        seed.push_str("-- auth users\n");
        push_section(&mut seed, &filter_data(auth));
    }

    seed.push_str("-- data\n");
    push_section(&mut seed, &filter_data(data));

    seed.push_str("SET session_replication_role = origin;\n");
    seed.push_str("COMMIT;\n");
    seed
}

fn push_section(seed: &mut String, body: &str) {
    seed.push_str(body);
    if !body.ends_with('\n') {
        seed.push('\n');
    }
    seed.push('\n');
}
