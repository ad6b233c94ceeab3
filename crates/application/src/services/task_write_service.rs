use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use shiftplan_domain::entities::{calendar_day_window, ShiftTask, TaskStage};
use shiftplan_domain::repositories::TaskRepository;
use shiftplan_errors::{PlanningError, PlanningResult};

/// 任务写入服务 - 写路径上的显式校验和阶段切换
///
/// 唯一性守卫独立于展开引擎运行，手工建的任务同样受保护。
pub struct TaskWriteService {
    task_repo: Arc<dyn TaskRepository>,
}

impl TaskWriteService {
    pub fn new(task_repo: Arc<dyn TaskRepository>) -> Self {
        Self { task_repo }
    }

    pub async fn create(&self, task: &ShiftTask) -> PlanningResult<ShiftTask> {
        self.ensure_unique(task, None).await?;
        self.task_repo.create(task).await
    }

    pub async fn update(&self, task: &ShiftTask) -> PlanningResult<ShiftTask> {
        self.ensure_unique(task, Some(task.id)).await?;
        self.task_repo.update(task).await
    }

    /// 切换任务阶段并应用实际起止时间的副作用
    pub async fn set_stage(&self, task_id: i64, stage: TaskStage) -> PlanningResult<ShiftTask> {
        let mut task = self
            .task_repo
            .find_by_id(task_id)
            .await?
            .ok_or_else(|| PlanningError::task_not_found(task_id))?;
        task.apply_stage(stage, Utc::now());
        self.task_repo.update(&task).await
    }

    pub async fn delete(&self, task_id: i64) -> PlanningResult<()> {
        let deleted = self.task_repo.delete(task_id).await?;
        if !deleted {
            return Err(PlanningError::task_not_found(task_id));
        }
        Ok(())
    }

    /// 唯一性守卫：同项目、同自然日、同工艺、同班次至多一条任务
    async fn ensure_unique(&self, task: &ShiftTask, exclude_id: Option<i64>) -> PlanningResult<()> {
        let (day_start, day_end) = calendar_day_window(task.start_date)?;
        let conflicts = self
            .task_repo
            .count_conflicts(
                task.project_id,
                day_start,
                day_end,
                task.process_type,
                task.shift_id,
                exclude_id,
            )
            .await?;
        if conflicts > 0 {
            debug!(
                "任务唯一性冲突: project={}, day={}, process={}, shift={}",
                task.project_id,
                day_start.date_naive(),
                task.process_type.as_str(),
                task.shift_id
            );
            return Err(PlanningError::DuplicateTask {
                project_id: task.project_id,
                day: day_start.date_naive().to_string(),
                process_type: task.process_type.as_str().to_string(),
                shift_id: task.shift_id,
            });
        }
        Ok(())
    }
}
