//! Knowledge store schema: uploaded documents (V1) and the mentor graph (V2).

use libsql::Connection;

use crate::error::DatabaseError;

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// Schema history, oldest first.
static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "uploaded_documents",
        sql: r#"
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                filename TEXT NOT NULL,
                content TEXT NOT NULL,
                file_type TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_documents_created ON documents(created_at);
        "#,
    },
    Migration {
        version: 2,
        name: "mentor_graph",
        sql: r#"
            CREATE TABLE IF NOT EXISTS mentors (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                bio TEXT NOT NULL DEFAULT '',
                link TEXT NOT NULL DEFAULT '',
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS mentor_expertise (
                mentor_id TEXT NOT NULL REFERENCES mentors(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                PRIMARY KEY (mentor_id, name)
            );

            CREATE TABLE IF NOT EXISTS mentor_outcomes (
                mentor_id TEXT NOT NULL REFERENCES mentors(id) ON DELETE CASCADE,
                description TEXT NOT NULL,
                PRIMARY KEY (mentor_id, description)
            );
        "#,
    },
];

/// Bring the schema up to the newest version recorded in `_migrations`.
pub async fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        (),
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("Failed to create _migrations table: {e}")))?;

    let current_version = get_current_version(conn).await?;

    for migration in MIGRATIONS {
        if migration.version > current_version {
            tracing::info!(
                version = migration.version,
                name = migration.name,
                "Upgrading knowledge store schema"
            );
            conn.execute_batch(migration.sql).await.map_err(|e| {
                DatabaseError::Migration(format!(
                    "Migration V{} ({}) failed: {e}",
                    migration.version, migration.name
                ))
            })?;
            record_version(conn, migration.version, migration.name).await?;
        }
    }

    tracing::debug!(version = get_current_version(conn).await?, "Store schema up to date");
    Ok(())
}

/// 0 on a fresh database.
async fn get_current_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM _migrations", ())
        .await
        .map_err(|e| DatabaseError::Migration(format!("Failed to query migration version: {e}")))?;

    let row = rows
        .next()
        .await
        .map_err(|e| DatabaseError::Migration(format!("Failed to read migration version: {e}")))?;

    match row {
        Some(row) => row.get::<i64>(0).map_err(|e| {
            DatabaseError::Migration(format!("Failed to parse migration version: {e}"))
        }),
        None => Ok(0),
    }
}

async fn record_version(conn: &Connection, version: i64, name: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT OR IGNORE INTO _migrations (version, name) VALUES (?1, ?2)",
        libsql::params![version, name],
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("Failed to record migration V{version}: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_conn() -> Connection {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .unwrap();
        db.connect().unwrap()
    }

    async fn table_exists(conn: &Connection, table: &str) -> bool {
        let mut rows = conn
            .query(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                libsql::params![table],
            )
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        row.get::<i64>(0).unwrap() == 1
    }

    #[tokio::test]
    async fn migrations_create_all_tables() {
        let conn = test_conn().await;
        run_migrations(&conn).await.unwrap();
        for table in ["documents", "mentors", "mentor_expertise", "mentor_outcomes"] {
            assert!(table_exists(&conn, table).await, "table '{table}' missing");
        }
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let conn = test_conn().await;
        run_migrations(&conn).await.unwrap();
        run_migrations(&conn).await.unwrap();
        assert_eq!(get_current_version(&conn).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn version_tracking() {
        let conn = test_conn().await;
        run_migrations(&conn).await.unwrap();

        let mut rows = conn
            .query("SELECT version, name FROM _migrations ORDER BY version", ())
            .await
            .unwrap();
        let mut applied = Vec::new();
        while let Some(row) = rows.next().await.unwrap() {
            applied.push((row.get::<i64>(0).unwrap(), row.get::<String>(1).unwrap()));
        }
        assert_eq!(
            applied,
            vec![
                (1, "uploaded_documents".to_string()),
                (2, "mentor_graph".to_string())
            ]
        );
    }
}
