pub mod export;
pub mod pool;
pub mod queries;
pub mod rows;

pub use pool::{create_pool, run_migrations};
pub use queries::PgStore;
