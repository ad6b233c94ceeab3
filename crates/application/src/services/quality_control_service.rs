use std::sync::Arc;

use tracing::debug;

use shiftplan_domain::entities::{derive_quality_status, QualityControl, QualityStatus};
use shiftplan_domain::repositories::{QualityControlRepository, TaskRepository};
use shiftplan_errors::{PlanningError, PlanningResult};

/// 质检服务 - 追加/改判质检记录并回写任务的质检状态
///
/// 任务的 quality_status 是显式失效重算的缓存字段：只在质检集合
/// 或某条记录的结果变化时重算，不挂隐式钩子。
pub struct QualityControlService {
    control_repo: Arc<dyn QualityControlRepository>,
    task_repo: Arc<dyn TaskRepository>,
}

impl QualityControlService {
    pub fn new(
        control_repo: Arc<dyn QualityControlRepository>,
        task_repo: Arc<dyn TaskRepository>,
    ) -> Self {
        Self {
            control_repo,
            task_repo,
        }
    }

    /// 追加质检记录并立即重算任务状态
    pub async fn append(&self, control: &QualityControl) -> PlanningResult<QualityControl> {
        // 任务必须存在；质检记录不随任务级联删除
        if self.task_repo.find_by_id(control.task_id).await?.is_none() {
            return Err(PlanningError::task_not_found(control.task_id));
        }
        let created = self.control_repo.create(control).await?;
        self.recompute_task_status(control.task_id).await?;
        Ok(created)
    }

    pub async fn accept(&self, control_id: i64) -> PlanningResult<QualityControl> {
        self.set_status(control_id, QualityStatus::Accepted).await
    }

    pub async fn reject(&self, control_id: i64) -> PlanningResult<QualityControl> {
        self.set_status(control_id, QualityStatus::Rejected).await
    }

    /// 改判一条质检记录并重算所属任务状态
    pub async fn set_status(
        &self,
        control_id: i64,
        status: QualityStatus,
    ) -> PlanningResult<QualityControl> {
        let mut control = self
            .control_repo
            .find_by_id(control_id)
            .await?
            .ok_or_else(|| PlanningError::control_not_found(control_id))?;
        control.status = status;
        let updated = self.control_repo.update(&control).await?;
        self.recompute_task_status(control.task_id).await?;
        Ok(updated)
    }

    async fn recompute_task_status(&self, task_id: i64) -> PlanningResult<()> {
        let Some(mut task) = self.task_repo.find_by_id(task_id).await? else {
            return Ok(());
        };
        let controls = self.control_repo.find_by_task(task_id).await?;
        let status = derive_quality_status(&controls);
        if status != task.quality_status {
            debug!(
                "任务 {} 质检状态: {} -> {}",
                task_id,
                task.quality_status.as_str(),
                status.as_str()
            );
            task.quality_status = status;
            self.task_repo.update(&task).await?;
        }
        Ok(())
    }
}
