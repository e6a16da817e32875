use std::time::Duration;

use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Schema,
};
use tracing::info;

use crate::config::AppConfig;

/// Alias kept at the seam so services depend on a pool type, not a concrete
/// connection.
pub type DbPool = DatabaseConnection;

/// Establish a database connection from application configuration.
pub async fn establish_connection(cfg: &AppConfig) -> Result<DbPool, DbErr> {
    let mut options = ConnectOptions::new(cfg.database_url.clone());
    options
        .max_connections(10)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(8))
        .idle_timeout(Duration::from_secs(60))
        .sqlx_logging(cfg.is_development());

    let conn = Database::connect(options).await?;
    info!("Database connection established");
    Ok(conn)
}

/// Create the schema from entity definitions. Idempotent: tables that
/// already exist are left alone.
pub async fn run_migrations(db: &DbPool) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let statements = vec![
        schema.create_table_from_entity(crate::entities::user::Entity),
        schema.create_table_from_entity(crate::entities::guest::Entity),
        schema.create_table_from_entity(crate::entities::item::Entity),
        schema.create_table_from_entity(crate::entities::request::Entity),
        schema.create_table_from_entity(crate::entities::request_item::Entity),
    ];

    for mut stmt in statements {
        stmt.if_not_exists();
        db.execute(backend.build(&stmt)).await?;
    }

    info!("Schema migration complete");
    Ok(())
}
