pub mod auto_advance_service;
pub mod quality_control_service;
pub mod schedule_planning_service;
pub mod task_write_service;

pub use auto_advance_service::{AutoAdvanceService, TickReport};
pub use quality_control_service::QualityControlService;
pub use schedule_planning_service::{PlanningPreview, ScheduleRequest, SchedulePlanningService};
pub use task_write_service::TaskWriteService;
