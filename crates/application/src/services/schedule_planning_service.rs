use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use shiftplan_domain::calendar::ShiftCalendar;
use shiftplan_domain::entities::{PriorityLevel, ProcessFilter, ProductType, Schedule};
use shiftplan_domain::expansion::{expand, MAX_SHIFT_INDEX};
use shiftplan_domain::repositories::{ScheduleRepository, ShiftRepository, TemplateRepository};
use shiftplan_errors::{PlanningError, PlanningResult};

/// 设备检修天数上限
pub const MAX_MAINTENANCE_DAYS: i32 = 30;

/// 计划产量上限（吨）
pub const MAX_PRODUCTION_VOLUME: f64 = 10_000.0;

/// 创建排班系列的请求参数（由表单/命令行收集）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRequest {
    pub project_id: i64,
    pub project_name: String,
    pub start_date: DateTime<Utc>,
    pub process_type: ProcessFilter,
    pub start_shift: i32,
    pub shift_count: i32,
    pub maintenance_days: i32,
    pub product_type: ProductType,
    pub production_volume: f64,
    pub priority: PriorityLevel,
}

impl ScheduleRequest {
    /// 提交前的阻塞式范围校验
    pub fn validate(&self, today: DateTime<Utc>) -> PlanningResult<()> {
        if !(0..=MAX_MAINTENANCE_DAYS).contains(&self.maintenance_days) {
            return Err(PlanningError::range_error(
                "maintenance_days",
                format!("设备检修天数必须在 0..{MAX_MAINTENANCE_DAYS} 之间"),
            ));
        }
        if self.production_volume <= 0.0 || self.production_volume > MAX_PRODUCTION_VOLUME {
            return Err(PlanningError::range_error(
                "production_volume",
                format!("计划产量必须大于 0 且不超过 {MAX_PRODUCTION_VOLUME} 吨"),
            ));
        }
        if self.start_date.date_naive() < today.date_naive() {
            return Err(PlanningError::range_error(
                "start_date",
                "计划开始日期不能在过去",
            ));
        }
        if !(1..=MAX_SHIFT_INDEX).contains(&self.start_shift) {
            return Err(PlanningError::range_error(
                "start_shift",
                format!("起始班次必须在 1..{MAX_SHIFT_INDEX} 之间"),
            ));
        }
        if !(1..=MAX_SHIFT_INDEX).contains(&self.shift_count) {
            return Err(PlanningError::range_error(
                "shift_count",
                format!("班次数量必须在 1..{MAX_SHIFT_INDEX} 之间"),
            ));
        }
        Ok(())
    }

    pub fn schedule_name(&self) -> String {
        format!(
            "Schedule {} from {}",
            self.project_name,
            self.start_date.date_naive()
        )
    }

    /// 预估任务数量和结束日期（向导的粗略估算口径，不查模板）
    pub fn preview(&self) -> PlanningPreview {
        let tasks_per_shift = match self.process_type {
            ProcessFilter::Both => 5,
            ProcessFilter::Parallel => 2,
            ProcessFilter::Main => 3,
        };
        let maintenance_tasks = self.maintenance_days * 2;
        let estimated_task_count = self.shift_count * tasks_per_shift + maintenance_tasks;

        let total_days = i64::from(self.shift_count) + i64::from(self.maintenance_days);
        let estimated_end_date = self.start_date.date_naive() + Duration::days(total_days);

        PlanningPreview {
            estimated_task_count,
            estimated_end_date,
        }
    }
}

/// 向导预估结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanningPreview {
    pub estimated_task_count: i32,
    pub estimated_end_date: NaiveDate,
}

/// 排班规划服务 - 校验请求、展开模板并原子落库
pub struct SchedulePlanningService {
    schedule_repo: Arc<dyn ScheduleRepository>,
    template_repo: Arc<dyn TemplateRepository>,
    shift_repo: Arc<dyn ShiftRepository>,
}

impl SchedulePlanningService {
    pub fn new(
        schedule_repo: Arc<dyn ScheduleRepository>,
        template_repo: Arc<dyn TemplateRepository>,
        shift_repo: Arc<dyn ShiftRepository>,
    ) -> Self {
        Self {
            schedule_repo,
            template_repo,
            shift_repo,
        }
    }

    /// 创建排班系列：计划记录和全部任务要么同时写入，要么全部回滚
    #[instrument(skip(self, request), fields(project_id = request.project_id))]
    pub async fn create_schedule(&self, request: &ScheduleRequest) -> PlanningResult<Schedule> {
        request.validate(Utc::now())?;

        let shifts = self.shift_repo.find_active().await?;
        let calendar = ShiftCalendar::new(shifts)?;

        let templates = self
            .template_repo
            .find_active(request.process_type.process_types())
            .await?;
        let task_type_names: HashMap<i64, String> = self
            .template_repo
            .find_task_types()
            .await?
            .into_iter()
            .map(|t| (t.id, t.name))
            .collect();

        let schedule = Schedule::new(
            request.schedule_name(),
            request.project_id,
            request.start_shift,
            request.shift_count,
            request.maintenance_days,
            request.process_type,
            request.start_date,
        );

        let drafts = expand(&schedule, &templates, &task_type_names, &calendar)?;

        info!(
            "展开完成: 计划 '{}', {} 个班次, {} 条任务草稿",
            schedule.name,
            schedule.shift_count,
            drafts.len()
        );

        let persisted = self.schedule_repo.create_with_tasks(&schedule, &drafts).await?;

        info!("排班系列已创建: id={}", persisted.id);
        Ok(persisted)
    }

    /// 删除排班系列，任务随外键级联删除
    pub async fn delete_schedule(&self, id: i64) -> PlanningResult<()> {
        let deleted = self.schedule_repo.delete(id).await?;
        if !deleted {
            return Err(PlanningError::schedule_not_found(id));
        }
        info!("排班系列已删除: id={id}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn request() -> ScheduleRequest {
        ScheduleRequest {
            project_id: 1,
            project_name: "Blast furnace".to_string(),
            start_date: Utc::now() + Duration::days(1),
            process_type: ProcessFilter::Main,
            start_shift: 1,
            shift_count: 3,
            maintenance_days: 0,
            product_type: ProductType::Steel,
            production_volume: 100.0,
            priority: PriorityLevel::Normal,
        }
    }

    #[test]
    fn test_request_validation_ok() {
        assert!(request().validate(Utc::now()).is_ok());
    }

    #[test]
    fn test_maintenance_days_bounds() {
        let mut r = request();
        r.maintenance_days = 31;
        assert!(matches!(
            r.validate(Utc::now()),
            Err(PlanningError::Range { .. })
        ));
        r.maintenance_days = -1;
        assert!(r.validate(Utc::now()).is_err());
        r.maintenance_days = 30;
        assert!(r.validate(Utc::now()).is_ok());
    }

    #[test]
    fn test_production_volume_bounds() {
        let mut r = request();
        r.production_volume = 0.0;
        assert!(r.validate(Utc::now()).is_err());
        r.production_volume = 10_000.1;
        assert!(r.validate(Utc::now()).is_err());
        r.production_volume = 10_000.0;
        assert!(r.validate(Utc::now()).is_ok());
    }

    #[test]
    fn test_start_date_in_past_rejected() {
        let mut r = request();
        r.start_date = Utc::now() - Duration::days(2);
        assert!(matches!(
            r.validate(Utc::now()),
            Err(PlanningError::Range { .. })
        ));
        // 当天有效
        r.start_date = Utc::now();
        assert!(r.validate(Utc::now()).is_ok());
    }

    #[test]
    fn test_shift_bounds() {
        let mut r = request();
        r.start_shift = 0;
        assert!(r.validate(Utc::now()).is_err());
        r.start_shift = 9;
        assert!(r.validate(Utc::now()).is_err());
        r.start_shift = 8;
        r.shift_count = 0;
        assert!(r.validate(Utc::now()).is_err());
    }

    #[test]
    fn test_schedule_name() {
        let mut r = request();
        r.start_date = Utc.with_ymd_and_hms(2026, 9, 1, 0, 0, 0).unwrap();
        assert_eq!(r.schedule_name(), "Schedule Blast furnace from 2026-09-01");
    }

    #[test]
    fn test_preview_heuristic() {
        let mut r = request();
        r.start_date = Utc.with_ymd_and_hms(2026, 9, 1, 0, 0, 0).unwrap();
        r.shift_count = 4;
        r.maintenance_days = 2;

        let preview = r.preview();
        assert_eq!(preview.estimated_task_count, 4 * 3 + 2 * 2);
        assert_eq!(
            preview.estimated_end_date,
            NaiveDate::from_ymd_opt(2026, 9, 7).unwrap()
        );

        r.process_type = ProcessFilter::Both;
        assert_eq!(r.preview().estimated_task_count, 4 * 5 + 4);

        r.process_type = ProcessFilter::Parallel;
        assert_eq!(r.preview().estimated_task_count, 4 * 2 + 4);
    }
}
