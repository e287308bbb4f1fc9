/// Database layer
///
/// Connection pooling and migrations. Models live in the `models` module at
/// the crate root.
///
/// # Modules
///
/// - `pool`: PostgreSQL connection pool management with health checks
/// - `migrations`: Embedded database migration runner

pub mod migrations;
pub mod pool;
