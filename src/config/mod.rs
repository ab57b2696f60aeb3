pub mod app;
pub mod database;
pub mod seeding;

pub use app::AppConfig;
pub use database::{lazy_pool, run_migrations, DatabaseConfig};
pub use seeding::DatabaseSeeder;
