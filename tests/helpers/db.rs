use possum::loader::Loader;
use possum::settings::ResetScope;
use sea_orm::{Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use tempfile::NamedTempFile;

/// Test database with automatic cleanup
pub struct TestDb {
    connection: DatabaseConnection,
    _temp_file: NamedTempFile,
}

impl TestDb {
    /// Create a new test database with migrations applied
    pub async fn new() -> Self {
        // Create temporary SQLite database file
        let temp_file = NamedTempFile::new().expect("Failed to create temp file");
        let db_path = temp_file.path().to_str().expect("Invalid temp file path");
        let db_url = format!("sqlite://{}?mode=rwc", db_path);

        // Connect to database
        let connection = Database::connect(&db_url)
            .await
            .expect("Failed to connect to test database");

        // Run migrations
        migration::Migrator::up(&connection, None)
            .await
            .expect("Failed to run migrations");

        Self {
            connection,
            _temp_file: temp_file,
        }
    }

    /// Get database connection
    pub fn connection(&self) -> &DatabaseConnection {
        &self.connection
    }

    /// A loader sharing this database's connection pool
    #[allow(dead_code)]
    pub fn loader(&self, reset_scope: ResetScope) -> Loader {
        Loader::new(self.connection.clone(), reset_scope)
    }
}

/// Create the account's admin role, as a load does before any statement
#[allow(dead_code)]
pub async fn seed_admin(db: &DatabaseConnection, account: &str) -> String {
    let id = format!("{account}:user:admin");
    possum::storage::create_role(db, &id)
        .await
        .expect("Failed to create admin role");
    id
}
