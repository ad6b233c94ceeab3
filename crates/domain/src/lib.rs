pub mod calendar;
pub mod entities;
pub mod expansion;
pub mod repositories;

pub use calendar::*;
pub use entities::*;
pub use expansion::*;
pub use repositories::*;
pub use shiftplan_errors::{PlanningError, PlanningResult};
