use crate::config::Config;
use anyhow::{Context, Result};
use libsql::{Builder, Connection, Database as LibsqlDatabase};
use std::path::Path;
use tokio::sync::{Mutex, MutexGuard};

const SYSTEM_MIGRATIONS: &[(&str, &str)] =
    &[("system/000_migrations_table.sql", include_str!("migrations/system/000_migrations_table.sql"))];

const MIGRATIONS: &[(&str, &str)] = &[("001_books.sql", include_str!("migrations/001_books.sql"))];

/// Handle to the catalogue store. Built once at startup and shared through
/// the axum state; requests reach the connection only through a [`Session`].
pub struct Database {
    _db: LibsqlDatabase,
    conn: Connection,
    session_lock: Mutex<()>,
}

/// Exclusive use of the store for the length of one request. Dropping the
/// session releases it.
pub struct Session<'a> {
    conn: &'a Connection,
    _guard: MutexGuard<'a, ()>,
}

impl Session<'_> {
    pub fn connection(&self) -> &Connection {
        self.conn
    }
}

impl Database {
    pub async fn new(cfg: &Config, data_dir: &Path) -> Result<Self> {
        let path = cfg.app.database_path(data_dir);
        tracing::info!(path = %path.display(), "[db] opening local database");
        Self::open(&path).await
    }

    pub async fn open(path: &Path) -> Result<Self> {
        let db = Builder::new_local(path)
            .build()
            .await
            .with_context(|| format!("failed to open database at {}", path.display()))?;

        let conn = db.connect()?;
        conn.query("SELECT 1", ()).await?;

        for (filename, sql) in SYSTEM_MIGRATIONS.iter().chain(MIGRATIONS) {
            Self::run_migration(&conn, filename, sql).await?;
        }

        Ok(Database {
            _db: db,
            conn,
            session_lock: Mutex::new(()),
        })
    }

    /// Waits for the store to be free and hands it to the caller.
    ///
    /// A request dropped mid-transaction leaves its transaction open on the
    /// shared connection; the next session rolls it back before use.
    pub async fn session(&self) -> Result<Session<'_>> {
        let guard = self.session_lock.lock().await;

        if !self.conn.is_autocommit() {
            tracing::warn!("[db] rolling back transaction abandoned by a previous request");
            self.conn
                .execute("ROLLBACK", ())
                .await
                .context("failed to roll back abandoned transaction")?;
        }

        Ok(Session {
            conn: &self.conn,
            _guard: guard,
        })
    }

    async fn is_migration_applied(conn: &Connection, name: &str) -> Result<bool> {
        let query = "SELECT 1 FROM _migrations WHERE name = ?";
        match conn.query(query, libsql::params![name]).await {
            Ok(mut rows) => Ok(rows.next().await?.is_some()),
            Err(e) => {
                if e.to_string().contains("no such table") {
                    Ok(false)
                } else {
                    Err(e.into())
                }
            }
        }
    }

    async fn record_migration(conn: &Connection, name: &str) -> Result<()> {
        let query = r#"
            INSERT INTO _migrations (name, applied_at)
            VALUES (?, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        "#;
        conn.execute(query, libsql::params![name]).await?;
        Ok(())
    }

    async fn run_migration(conn: &Connection, name: &str, sql: &str) -> Result<()> {
        if Self::is_migration_applied(conn, name).await? {
            tracing::debug!("migration {} already applied, skipping", name);
            return Ok(());
        }

        tracing::info!("applying migration: {}", name);
        conn.execute_batch(sql)
            .await
            .map_err(|e| anyhow::anyhow!("failed to execute migration {name}: {e}"))?;

        Self::record_migration(conn, name).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IN_MEMORY;

    async fn memory_db() -> Database {
        Database::open(Path::new(IN_MEMORY)).await.unwrap()
    }

    async fn count(conn: &Connection, sql: &str) -> i64 {
        let mut rows = conn.query(sql, ()).await.unwrap();
        let row = rows.next().await.unwrap().unwrap();
        row.get::<i64>(0).unwrap()
    }

    #[tokio::test]
    async fn test_migrations_create_schema() {
        let db = memory_db().await;
        let session = db.session().await.unwrap();
        let conn = session.connection();

        assert_eq!(count(conn, "SELECT COUNT(*) FROM _migrations").await, 2);
        assert_eq!(count(conn, "SELECT COUNT(*) FROM books").await, 0);
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let db = memory_db().await;
        let session = db.session().await.unwrap();
        let conn = session.connection();

        for (filename, sql) in SYSTEM_MIGRATIONS.iter().chain(MIGRATIONS) {
            Database::run_migration(conn, filename, sql).await.unwrap();
        }
        assert_eq!(count(conn, "SELECT COUNT(*) FROM _migrations").await, 2);
    }

    #[tokio::test]
    async fn test_schema_checks_code_lengths() {
        let db = memory_db().await;
        let session = db.session().await.unwrap();
        let conn = session.connection();

        let short_serial = conn
            .execute(
                "INSERT INTO books (serial_number, title, author) VALUES ('12345', 't', 'a')",
                (),
            )
            .await;
        assert!(short_serial.is_err());

        let short_card = conn
            .execute(
                "INSERT INTO books (serial_number, title, author, is_borrowed, borrowed_at, borrower_card)
                 VALUES ('123456', 't', 'a', 1, '2024-01-01T00:00:00Z', '123')",
                (),
            )
            .await;
        assert!(short_card.is_err());

        let half_loan = conn
            .execute(
                "INSERT INTO books (serial_number, title, author, is_borrowed, borrower_card)
                 VALUES ('123456', 't', 'a', 1, '222222')",
                (),
            )
            .await;
        assert!(half_loan.is_err());
    }

    #[tokio::test]
    async fn test_session_rolls_back_abandoned_transaction() {
        let db = memory_db().await;

        {
            let session = db.session().await.unwrap();
            let conn = session.connection();
            conn.execute("BEGIN IMMEDIATE", ()).await.unwrap();
            conn.execute(
                "INSERT INTO books (serial_number, title, author) VALUES ('123456', 't', 'a')",
                (),
            )
            .await
            .unwrap();
            // dropped without COMMIT
        }

        let session = db.session().await.unwrap();
        assert!(session.connection().is_autocommit());
        assert_eq!(count(session.connection(), "SELECT COUNT(*) FROM books").await, 0);
    }
}
