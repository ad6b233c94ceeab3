//! 领域仓储抽象
//!
//! 定义数据访问的抽象接口，遵循依赖倒置原则

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shiftplan_errors::PlanningResult;

use crate::entities::{
    ProcessType, QualityControl, Schedule, Shift, ShiftTask, TaskTemplate, TaskType,
};
use crate::expansion::TaskDraft;

/// 班次参考数据仓储
#[async_trait]
pub trait ShiftRepository: Send + Sync {
    async fn find_active(&self) -> PlanningResult<Vec<Shift>>;
    async fn find_by_id(&self, id: i64) -> PlanningResult<Option<Shift>>;
}

/// 模板与工种目录仓储
#[async_trait]
pub trait TemplateRepository: Send + Sync {
    async fn create(&self, template: &TaskTemplate) -> PlanningResult<TaskTemplate>;
    async fn find_by_id(&self, id: i64) -> PlanningResult<Option<TaskTemplate>>;
    /// 启用模板，按 (sequence, id) 升序
    async fn find_active(&self, process_types: &[ProcessType]) -> PlanningResult<Vec<TaskTemplate>>;
    async fn find_all(&self) -> PlanningResult<Vec<TaskTemplate>>;
    async fn delete(&self, id: i64) -> PlanningResult<bool>;
    async fn find_task_types(&self) -> PlanningResult<Vec<TaskType>>;
}

/// 排班计划仓储
#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    /// 原子落库：计划及其全部任务草稿在同一事务内写入，
    /// 任一草稿违反唯一性约束则整体回滚
    async fn create_with_tasks(
        &self,
        schedule: &Schedule,
        drafts: &[TaskDraft],
    ) -> PlanningResult<Schedule>;
    async fn find_by_id(&self, id: i64) -> PlanningResult<Option<Schedule>>;
    async fn find_all(&self) -> PlanningResult<Vec<Schedule>>;
    /// 级联删除计划下的全部任务
    async fn delete(&self, id: i64) -> PlanningResult<bool>;
}

/// 生产任务仓储
#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn create(&self, task: &ShiftTask) -> PlanningResult<ShiftTask>;
    async fn find_by_id(&self, id: i64) -> PlanningResult<Option<ShiftTask>>;
    async fn find_by_schedule(&self, schedule_id: i64) -> PlanningResult<Vec<ShiftTask>>;
    async fn update(&self, task: &ShiftTask) -> PlanningResult<ShiftTask>;
    async fn delete(&self, id: i64) -> PlanningResult<bool>;
    /// 同项目、同自然日窗口、同工艺、同班次的冲突任务数（排除自身）
    async fn count_conflicts(
        &self,
        project_id: i64,
        day_start: DateTime<Utc>,
        day_end: DateTime<Utc>,
        process_type: ProcessType,
        shift_id: i64,
        exclude_id: Option<i64>,
    ) -> PlanningResult<i64>;
    /// 窗口内计划中且开启自动接班的任务
    async fn find_auto_advance_candidates(
        &self,
        day_start: DateTime<Utc>,
        day_end: DateTime<Utc>,
    ) -> PlanningResult<Vec<ShiftTask>>;
    /// 前班任务：同项目、同工艺、同工种，开始时间严格早于给定任务，
    /// 按开始时间降序取最近一条
    async fn find_predecessor(&self, task: &ShiftTask) -> PlanningResult<Option<ShiftTask>>;
}

/// 质检记录仓储
#[async_trait]
pub trait QualityControlRepository: Send + Sync {
    async fn create(&self, control: &QualityControl) -> PlanningResult<QualityControl>;
    async fn find_by_id(&self, id: i64) -> PlanningResult<Option<QualityControl>>;
    /// 任务的全部质检记录，按 id 升序（追加顺序）
    async fn find_by_task(&self, task_id: i64) -> PlanningResult<Vec<QualityControl>>;
    async fn update(&self, control: &QualityControl) -> PlanningResult<QualityControl>;
}
