//! Fixture seeding.
//!
//! Resets the `names` table and fills it with a fixed list of rows. Every run
//! starts by dropping the table, so repeated runs converge to the same state
//! even if an earlier run stopped half-way.

use serde::Serialize;
use sqlx::{AnyConnection, Executor, Statement};

use crate::error::DatastoreError;

/// Table holding the fixture rows.
pub const FIXTURE_TABLE: &str = "names";

/// Rows inserted into [`FIXTURE_TABLE`], in insertion order.
pub const FIXTURE_NAMES: [&str; 12] = [
    "Friedrich",
    "Hans",
    "Anna",
    "Bertha",
    "Heinrich",
    "Hermann",
    "Maria",
    "Martha",
    "Otto",
    "Walter",
    "Sieglinde",
    "Emma",
];

const DROP_TABLE: &str = "DROP TABLE IF EXISTS names";
const CREATE_TABLE: &str = "CREATE TABLE names (name VARCHAR(20))";
const INSERT_NAME: &str = "INSERT INTO names VALUES( ? )";

/// Summary of a completed seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub table: String,
    pub rows_inserted: usize,
}

/// Seeds the database behind a connection URL.
pub struct SeedExecutor {
    url: String,
}

impl SeedExecutor {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Connects, seeds, and closes the connection whether or not seeding succeeded.
    pub async fn run(&self) -> Result<SeedReport, DatastoreError> {
        let mut conn = super::connect(&self.url).await?;
        let result = seed_fixtures(&mut conn).await;
        super::close(conn).await;
        result
    }
}

/// Drops and recreates the fixture table, then inserts every fixture row
/// through one prepared statement. Stops at the first failing statement.
pub async fn seed_fixtures(conn: &mut AnyConnection) -> Result<SeedReport, DatastoreError> {
    (&mut *conn)
        .execute(DROP_TABLE)
        .await
        .map_err(|e| query_error(DROP_TABLE, e))?;
    tracing::debug!(table = FIXTURE_TABLE, "Dropped fixture table");

    (&mut *conn)
        .execute(CREATE_TABLE)
        .await
        .map_err(|e| query_error(CREATE_TABLE, e))?;
    tracing::debug!(table = FIXTURE_TABLE, "Created fixture table");

    let insert = (&mut *conn)
        .prepare(INSERT_NAME)
        .await
        .map_err(|e| query_error(INSERT_NAME, e))?;

    let mut rows_inserted = 0;
    for name in FIXTURE_NAMES {
        insert
            .query()
            .bind(name)
            .execute(&mut *conn)
            .await
            .map_err(|e| query_error(INSERT_NAME, e))?;
        rows_inserted += 1;
    }

    tracing::info!(table = FIXTURE_TABLE, rows = rows_inserted, "Seeded fixture data");
    Ok(SeedReport {
        table: FIXTURE_TABLE.to_string(),
        rows_inserted,
    })
}

fn query_error(statement: &str, source: sqlx::Error) -> DatastoreError {
    tracing::error!(statement, error = %source, "Seed statement failed");
    DatastoreError::Query {
        statement: statement.to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sqlite_url(dir: &TempDir) -> String {
        format!("sqlite://{}?mode=rwc", dir.path().join("seed.db").display())
    }

    async fn table_rows(url: &str) -> Vec<String> {
        let mut conn = crate::datastore::connect(url).await.unwrap();
        let rows: Vec<String> = sqlx::query_scalar("SELECT name FROM names")
            .fetch_all(&mut conn)
            .await
            .unwrap();
        crate::datastore::close(conn).await;
        rows
    }

    #[test]
    fn test_fixture_names_fit_column() {
        assert_eq!(FIXTURE_NAMES.len(), 12);
        assert!(FIXTURE_NAMES.iter().all(|n| n.len() <= 20));
    }

    #[tokio::test]
    async fn test_seed_creates_table_from_scratch() {
        let dir = TempDir::new().unwrap();
        let url = sqlite_url(&dir);

        let report = SeedExecutor::new(&url).run().await.unwrap();
        assert_eq!(report.table, "names");
        assert_eq!(report.rows_inserted, 12);
        assert_eq!(table_rows(&url).await, FIXTURE_NAMES.to_vec());
    }

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let url = sqlite_url(&dir);

        SeedExecutor::new(&url).run().await.unwrap();
        let first = table_rows(&url).await;
        SeedExecutor::new(&url).run().await.unwrap();
        let second = table_rows(&url).await;

        assert_eq!(first, second);
        assert_eq!(second.len(), 12);
    }

    #[tokio::test]
    async fn test_seed_replaces_existing_table() {
        let dir = TempDir::new().unwrap();
        let url = sqlite_url(&dir);

        let mut conn = crate::datastore::connect(&url).await.unwrap();
        conn.execute("CREATE TABLE names (name TEXT, extra INTEGER)")
            .await
            .unwrap();
        conn.execute("INSERT INTO names VALUES ('stale', 1), ('leftover', 2)")
            .await
            .unwrap();
        crate::datastore::close(conn).await;

        SeedExecutor::new(&url).run().await.unwrap();
        assert_eq!(table_rows(&url).await, FIXTURE_NAMES.to_vec());
    }

    #[tokio::test]
    async fn test_seed_stops_at_first_failing_statement() {
        let dir = TempDir::new().unwrap();
        let url = sqlite_url(&dir);
        SeedExecutor::new(&url).run().await.unwrap();

        let read_only = format!("sqlite://{}?mode=ro", dir.path().join("seed.db").display());
        let err = SeedExecutor::new(&read_only).run().await.unwrap_err();
        assert!(
            matches!(
                err,
                DatastoreError::Query { ref statement, .. } if statement == DROP_TABLE
            ),
            "{err:?}"
        );

        // Nothing after the failing statement ran.
        assert_eq!(table_rows(&url).await, FIXTURE_NAMES.to_vec());
    }

    #[tokio::test]
    async fn test_seed_unreachable_database() {
        let err = SeedExecutor::new("mysql://root:pw@127.0.0.1:9/myappdb")
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, DatastoreError::Connection(_)));
    }
}
