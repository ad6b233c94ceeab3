pub mod database;

pub use database::sqlite::{
    SqliteQualityControlRepository, SqliteScheduleRepository, SqliteShiftRepository,
    SqliteTaskRepository, SqliteTemplateRepository,
};
pub use database::DatabaseManager;
