use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};

use crate::error::TestError;

/// In-memory SQLite database for repository tests
pub struct TestSetup {
    pub db: DatabaseConnection,
}

impl TestSetup {
    /// Connects to a fresh in-memory database without creating any tables
    ///
    /// Useful to exercise error paths where the queried tables are missing.
    pub async fn empty() -> Result<Self, TestError> {
        let db = Database::connect("sqlite::memory:").await?;

        Ok(Self { db })
    }

    /// Connects to a fresh in-memory database with every migration applied
    pub async fn new() -> Result<Self, TestError> {
        let setup = Self::empty().await?;
        Migrator::up(&setup.db, None).await?;

        Ok(setup)
    }
}
