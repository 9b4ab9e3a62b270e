//! # brains-db
//!
//! PostgreSQL database layer for the brains note store.
//!
//! This crate provides:
//! - Connection pool management
//! - The stream Ordering Engine (contiguous, gap-free positions under
//!   concurrent insert/move/remove)
//! - The card link index: `[[...]]` resolution, backlinks, broken-link
//!   reporting and repair
//!
//! ## Example
//!
//! ```rust,ignore
//! use brains_db::Database;
//! use brains_core::{InsertPlacement, StreamRepository};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/brains").await?;
//!
//!     let position = db
//!         .streams
//!         .insert_card(stream_id, card_id, InsertPlacement::End, 0)
//!         .await?;
//!
//!     println!("Card appended at position {position}");
//!     Ok(())
//! }
//! ```

pub mod brains;
pub mod card_links;
pub mod link_resolver;
pub mod pool;
pub mod streams;

// Test fixtures for integration tests
// Note: Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

// Re-export core types
pub use brains_core::*;

// Re-export repository implementations
pub use brains::PgBrainDirectory;
pub use card_links::PgCardLinkRepository;
pub use link_resolver::LinkResolver;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use streams::PgStreamRepository;

/// Combined database context with all repositories.
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Stream repository: ordered card membership maintenance.
    pub streams: PgStreamRepository,
    /// Card link repository: link index writes and graph queries.
    pub card_links: PgCardLinkRepository,
    /// Brain/card read directory used by link resolution.
    pub directory: PgBrainDirectory,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            streams: PgStreamRepository::new(pool.clone()),
            card_links: PgCardLinkRepository::new(pool.clone()),
            directory: PgBrainDirectory::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self::new(self.pool.clone())
    }
}
