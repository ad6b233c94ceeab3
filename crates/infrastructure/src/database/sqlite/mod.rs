pub mod sqlite_quality_control_repository;
pub mod sqlite_schedule_repository;
pub mod sqlite_shift_repository;
pub mod sqlite_task_repository;
pub mod sqlite_template_repository;

pub use sqlite_quality_control_repository::SqliteQualityControlRepository;
pub use sqlite_schedule_repository::SqliteScheduleRepository;
pub use sqlite_shift_repository::SqliteShiftRepository;
pub use sqlite_task_repository::SqliteTaskRepository;
pub use sqlite_template_repository::SqliteTemplateRepository;
