use std::collections::HashMap;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use shiftplan_errors::{PlanningError, PlanningResult};

use crate::calendar::ShiftCalendar;
use crate::entities::{ProcessType, Schedule, TaskStage, TaskTemplate};

/// 冶金厂一个班次固定 8 小时
pub const SHIFT_DURATION_HOURS: i64 = 8;

/// 班次序号和班次数量的上限（与向导的 1..8 选择域一致）
pub const MAX_SHIFT_INDEX: i32 = 8;

/// 无工种名称时的任务默认名
pub const DEFAULT_TASK_NAME: &str = "Shift start";

/// 展开产物：尚未落库的任务草稿
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDraft {
    pub name: String,
    pub process_type: ProcessType,
    pub shift_id: i64,
    pub shift_number: String,
    pub maintenance_day: Option<i32>,
    pub start_date: DateTime<Utc>,
    pub task_type_id: i64,
    pub stage: TaskStage,
}

/// 排班展开引擎：把计划参数按模板展开成有序任务草稿
///
/// 发射顺序为班次迭代优先、模板 sequence 次之。某个班次迭代没有匹配
/// 模板时只是不产出任务；整体筛选结果为空才算配置错误。
pub fn expand(
    schedule: &Schedule,
    templates: &[TaskTemplate],
    task_type_names: &HashMap<i64, String>,
    calendar: &ShiftCalendar,
) -> PlanningResult<Vec<TaskDraft>> {
    if !(1..=MAX_SHIFT_INDEX).contains(&schedule.start_shift) {
        return Err(PlanningError::range_error(
            "start_shift",
            format!("起始班次必须在 1..{MAX_SHIFT_INDEX} 之间"),
        ));
    }
    if !(1..=MAX_SHIFT_INDEX).contains(&schedule.shift_count) {
        return Err(PlanningError::range_error(
            "shift_count",
            format!("班次数量必须在 1..{MAX_SHIFT_INDEX} 之间"),
        ));
    }

    let filter = schedule.process_type.process_types();
    let mut selection: Vec<&TaskTemplate> = templates
        .iter()
        .filter(|t| t.active && filter.contains(&t.process_type))
        .collect();
    // sequence 相同按插入顺序（id）稳定排序
    selection.sort_by_key(|t| (t.sequence, t.id));

    if selection.is_empty() {
        return Err(PlanningError::config_error(
            "没有匹配所选工艺类型的启用模板",
        ));
    }

    let mut drafts = Vec::new();
    for i in 0..schedule.shift_count {
        let absolute_index = i64::from(schedule.start_shift) + i64::from(i);
        let shift = calendar.resolve(absolute_index);
        let start_date = shift_start(schedule.start_date, i64::from(i), shift.start_hour)?;
        let shift_number = ((schedule.start_shift - 1 + i) % MAX_SHIFT_INDEX) + 1;

        for template in selection.iter().filter(|t| t.shift_id == shift.id) {
            let name = task_type_names
                .get(&template.task_type_id)
                .cloned()
                .unwrap_or_else(|| DEFAULT_TASK_NAME.to_string());
            drafts.push(TaskDraft {
                name,
                process_type: template.process_type,
                shift_id: template.shift_id,
                shift_number: shift_number.to_string(),
                maintenance_day: (schedule.maintenance_days > 0).then_some(i + 1),
                start_date,
                task_type_id: template.task_type_id,
                stage: TaskStage::Planned,
            });
        }
    }

    Ok(drafts)
}

/// 第 i 次迭代的任务开始时间：起始时间推进 8h*i 后，把时分秒压到当班开始小时
///
/// i = 0 时日期保持不变，只压时间；跨午夜由 8 小时步进自然推进日期，
/// 夜班不做额外的跳天处理。
fn shift_start(
    start_date: DateTime<Utc>,
    iteration: i64,
    start_hour: i32,
) -> PlanningResult<DateTime<Utc>> {
    let advanced = start_date + Duration::hours(SHIFT_DURATION_HOURS * iteration);
    let clamped = advanced
        .date_naive()
        .and_hms_opt(start_hour as u32, 0, 0)
        .ok_or_else(|| {
            PlanningError::config_error(format!("班次开始小时不合法: {start_hour}"))
        })?;
    Ok(Utc.from_utc_datetime(&clamped))
}
