/// Database layer for GatherEd
///
/// - `pool`: PostgreSQL connection pool with a start-up health check
/// - `migrations`: embedded schema migrations
///
/// Models live in the `models` module at crate root level.
///
/// # Example
///
/// ```no_run
/// use gathered_shared::db::pool::{create_pool, DatabaseConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = DatabaseConfig {
///         url: std::env::var("DATABASE_URL")?,
///         ..Default::default()
///     };
///
///     let pool = create_pool(config).await?;
///     gathered_shared::db::migrations::run_migrations(&pool).await?;
///     Ok(())
/// }
/// ```

pub mod migrations;
pub mod pool;
