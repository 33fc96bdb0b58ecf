// SPDX-FileCopyrightText: 2026 MrTooley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedded schema migrations for the SQLite backend.

use mrtooley_core::MrTooleyError;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Applies pending migrations. Refinery records them in
/// `refinery_schema_history`.
pub fn run_migrations(conn: &mut rusqlite::Connection) -> Result<(), MrTooleyError> {
    embedded::migrations::runner()
        .run(conn)
        .map_err(MrTooleyError::storage)?;
    Ok(())
}
