use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use shiftplan_domain::entities::{calendar_day_window, ShiftTask, TaskStage};
use shiftplan_domain::repositories::TaskRepository;
use shiftplan_errors::PlanningResult;

/// 自动接班策略 - 周期触发，把前班已完成的当日计划任务接入在制
///
/// 每条任务的提升各自走一次仓储更新，单条失败只记日志并继续处理
/// 剩余任务；与人工编辑并发时后写者生效。
pub struct AutoAdvanceService {
    task_repo: Arc<dyn TaskRepository>,
}

/// 一次扫描的统计结果
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub scanned: usize,
    pub promoted: usize,
    pub failed: usize,
}

impl AutoAdvanceService {
    pub fn new(task_repo: Arc<dyn TaskRepository>) -> Self {
        Self { task_repo }
    }

    /// 执行一次接班扫描
    pub async fn tick(&self) -> PlanningResult<TickReport> {
        self.tick_at(Utc::now()).await
    }

    /// 以给定时间为"当前时刻"执行接班扫描
    #[instrument(name = "auto_advance_tick", skip(self, now))]
    pub async fn tick_at(&self, now: DateTime<Utc>) -> PlanningResult<TickReport> {
        info!("开始自动接班扫描");

        let (day_start, day_end) = calendar_day_window(now)?;
        let candidates = self
            .task_repo
            .find_auto_advance_candidates(day_start, day_end)
            .await?;

        let mut report = TickReport {
            scanned: candidates.len(),
            ..TickReport::default()
        };

        for task in candidates {
            match self.try_promote(&task, now).await {
                Ok(true) => report.promoted += 1,
                Ok(false) => {}
                Err(e) => {
                    // 单任务失败隔离：记日志后继续
                    warn!("任务 {} 自动接班失败: {}", task.id, e);
                    report.failed += 1;
                }
            }
        }

        info!(
            "自动接班扫描完成: 扫描 {} 条，接班 {} 条，失败 {} 条",
            report.scanned, report.promoted, report.failed
        );
        Ok(report)
    }

    /// 前班任务已完成时接班：复制前班执行人，任务进入在制，
    /// 实际开始与结束时间同时写入当前时间戳
    async fn try_promote(&self, task: &ShiftTask, now: DateTime<Utc>) -> PlanningResult<bool> {
        let Some(predecessor) = self.task_repo.find_predecessor(task).await? else {
            debug!("任务 {} 没有前班任务，跳过", task.id);
            return Ok(false);
        };

        if !predecessor.is_completed() {
            debug!(
                "任务 {} 的前班任务 {} 尚未完成，下次扫描重试",
                task.id, predecessor.id
            );
            return Ok(false);
        }

        let mut promoted = task.clone();
        promoted.employee_ids = predecessor.employee_ids.clone();
        promoted.stage = TaskStage::InProgress;
        promoted.actual_start = Some(now);
        promoted.actual_end = Some(now);
        promoted.updated_at = now;

        self.task_repo.update(&promoted).await?;

        info!(
            "任务 {} 已自动接班（前班任务 {}，执行人 {} 名）",
            task.id,
            predecessor.id,
            promoted.employee_ids.len()
        );
        Ok(true)
    }
}
