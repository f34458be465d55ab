use anyhow::{bail, Context, Result};
use rusqlite::Connection;

/// Schema scripts in order; entry `n` upgrades `user_version` n to n + 1.
const MIGRATIONS: &[&str] = &[include_str!("schemas/schema_v1.sql")];

fn schema_version() -> i32 {
    MIGRATIONS.len() as i32
}

/// Bring the schema up to date inside a single transaction.
pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    let found: i32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .context("failed to read schema version")?;
    let target = schema_version();

    if found > target {
        bail!("database schema v{found} is newer than this build (v{target})");
    }
    if found == target {
        return Ok(());
    }

    let tx = conn.transaction().context("failed to begin migration")?;
    for (index, script) in MIGRATIONS.iter().enumerate().skip(found.max(0) as usize) {
        tx.execute_batch(script)
            .with_context(|| format!("migration to v{} failed", index + 1))?;
    }
    tx.pragma_update(None, "user_version", target)
        .context("failed to record schema version")?;
    tx.commit().context("failed to commit migration")?;

    log::info!("Database schema migrated from v{found} to v{target}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version(conn: &Connection) -> i32 {
        conn.pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn fresh_database_gets_documents_table() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();
        run_migrations(&mut conn).unwrap();
        assert_eq!(version(&conn), schema_version());

        conn.execute(
            "INSERT INTO documents (key, value, updated_at) VALUES ('k', 'v', 'now')",
            [],
        )
        .unwrap();
    }

    #[test]
    fn newer_schema_is_refused() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", schema_version() + 1)
            .unwrap();
        assert!(run_migrations(&mut conn).is_err());
    }
}
