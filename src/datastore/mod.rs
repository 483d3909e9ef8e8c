//! Application database access.
//!
//! Two operations are provided on top of sqlx's `Any` driver: a readiness
//! poller that waits for the database to accept connections, and a seed
//! executor that resets the fixture table. Connections are opened per
//! operation and closed on every exit path.
//!
//! # Usage
//!
//! ```rust,ignore
//! use seed_forge::datastore::{DatastoreConfig, ReadinessPoller, SeedExecutor, SqlProbe};
//! use tokio_util::sync::CancellationToken;
//!
//! let config = DatastoreConfig::new("127.0.0.1:3306", "root", "mysecretpw", "myappdb");
//! let cancel = CancellationToken::new();
//!
//! ReadinessPoller::default()
//!     .wait(&SqlProbe::new(config.url()), &cancel)
//!     .await?;
//! let report = SeedExecutor::new(config.url()).run().await?;
//! assert_eq!(report.rows_inserted, 12);
//! ```

pub mod readiness;
pub mod seed;

use sqlx::{AnyConnection, Connection};

use crate::args::{keys, ArgumentMap};
use crate::error::DatastoreError;

pub use readiness::{ReadinessPoller, ReadinessProbe, ReadinessReport, SqlProbe};
pub use seed::{SeedExecutor, SeedReport, FIXTURE_NAMES, FIXTURE_TABLE};

/// Default application database name.
pub const DEFAULT_DATABASE: &str = "myappdb";

/// Connection parameters for the application's MySQL database.
#[derive(Clone, PartialEq, Eq)]
pub struct DatastoreConfig {
    /// Host including port, e.g. `127.0.0.1:3306`.
    pub host: String,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl std::fmt::Debug for DatastoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatastoreConfig")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .finish()
    }
}

impl DatastoreConfig {
    pub fn new(
        host: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            password: password.into(),
            database: database.into(),
        }
    }

    /// Reads `MYAPP_HOST`, `MYAPP_USER` and `MYAPP_PASS`; absent keys become empty.
    pub fn from_arguments(args: &ArgumentMap, database: impl Into<String>) -> Self {
        Self::new(
            args.get_or_empty(keys::MYAPP_HOST),
            args.get_or_empty(keys::MYAPP_USER),
            args.get_or_empty(keys::MYAPP_PASS),
            database,
        )
    }

    /// MySQL connection URL with percent-encoded credentials.
    pub fn url(&self) -> String {
        format!(
            "mysql://{}:{}@{}/{}",
            urlencoding::encode(&self.user),
            urlencoding::encode(&self.password),
            self.host,
            self.database
        )
    }

    /// Connection URL safe for logs.
    pub fn redacted_url(&self) -> String {
        format!(
            "mysql://{}:***@{}/{}",
            urlencoding::encode(&self.user),
            self.host,
            self.database
        )
    }
}

/// Opens a single connection to `url`.
pub(crate) async fn connect(url: &str) -> Result<AnyConnection, DatastoreError> {
    sqlx::any::install_default_drivers();
    AnyConnection::connect(url)
        .await
        .map_err(|e| DatastoreError::Connection(e.to_string()))
}

/// Closes `conn`, logging rather than failing if the close itself errors.
pub(crate) async fn close(conn: AnyConnection) {
    if let Err(e) = conn.close().await {
        tracing::debug!(error = %e, "Failed to close database connection cleanly");
    }
}
