use crate::config::DatabaseConfig;
use crate::error::AppResult;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};

pub async fn create_connection(config: &DatabaseConfig) -> AppResult<DatabaseConnection> {
    let mut opts = ConnectOptions::new(config.url.clone());
    opts.max_connections(config.max_connections);
    let conn = Database::connect(opts).await?;
    Ok(conn)
}

pub async fn run_migrations(conn: &DatabaseConnection) -> AppResult<()> {
    use migration::{Migrator, MigratorTrait};
    Migrator::up(conn, None).await?;
    Ok(())
}
