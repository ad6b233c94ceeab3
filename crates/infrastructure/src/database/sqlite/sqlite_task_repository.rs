use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};

use shiftplan_domain::entities::{ProcessType, ShiftTask};
use shiftplan_domain::repositories::TaskRepository;
use shiftplan_errors::{PlanningError, PlanningResult};

use crate::database::mapping::MappingHelpers;

pub(crate) const TASK_COLUMNS: &str = "id, name, project_id, schedule_id, process_type, shift_id, shift_number, maintenance_day, start_date, task_type_id, stage, auto_tracking, actual_start, actual_end, employee_ids, quality_status, material_consumption_kg, people_fact, problem_description, created_at, updated_at";

/// 生产任务仓储
pub struct SqliteTaskRepository {
    pool: SqlitePool,
}

impl SqliteTaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub(crate) fn row_to_task(row: &sqlx::sqlite::SqliteRow) -> PlanningResult<ShiftTask> {
        let employee_ids = MappingHelpers::parse_employee_ids(row, "employee_ids");

        Ok(ShiftTask {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            project_id: row.try_get("project_id")?,
            schedule_id: row.try_get("schedule_id")?,
            process_type: row.try_get("process_type")?,
            shift_id: row.try_get("shift_id")?,
            shift_number: row.try_get("shift_number")?,
            maintenance_day: row.try_get("maintenance_day")?,
            start_date: row.try_get("start_date")?,
            task_type_id: row.try_get("task_type_id")?,
            stage: row.try_get("stage")?,
            auto_tracking: row.try_get("auto_tracking")?,
            actual_start: row.try_get("actual_start")?,
            actual_end: row.try_get("actual_end")?,
            employee_ids,
            quality_status: row.try_get("quality_status")?,
            material_consumption_kg: row.try_get("material_consumption_kg")?,
            people_fact: row.try_get("people_fact")?,
            problem_description: row.try_get("problem_description")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl TaskRepository for SqliteTaskRepository {
    #[instrument(skip(self, task), fields(
        task_name = %task.name,
        project_id = %task.project_id,
        process_type = %task.process_type.as_str(),
    ))]
    async fn create(&self, task: &ShiftTask) -> PlanningResult<ShiftTask> {
        let employee_ids_json = MappingHelpers::employee_ids_to_json(&task.employee_ids)?;

        let sql = format!(
            r#"
            INSERT INTO tasks (name, project_id, schedule_id, process_type, shift_id, shift_number,
                maintenance_day, start_date, task_type_id, stage, auto_tracking, actual_start,
                actual_end, employee_ids, quality_status, material_consumption_kg, people_fact,
                problem_description, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
            RETURNING {TASK_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(&task.name)
            .bind(task.project_id)
            .bind(task.schedule_id)
            .bind(task.process_type)
            .bind(task.shift_id)
            .bind(&task.shift_number)
            .bind(task.maintenance_day)
            .bind(task.start_date)
            .bind(task.task_type_id)
            .bind(task.stage)
            .bind(task.auto_tracking)
            .bind(task.actual_start)
            .bind(task.actual_end)
            .bind(employee_ids_json)
            .bind(task.quality_status)
            .bind(task.material_consumption_kg)
            .bind(task.people_fact)
            .bind(&task.problem_description)
            .bind(task.created_at)
            .bind(task.updated_at)
            .fetch_one(&self.pool)
            .await?;

        let created = Self::row_to_task(&row)?;
        debug!("创建任务成功: {}", created.entity_description());
        Ok(created)
    }

    async fn find_by_id(&self, id: i64) -> PlanningResult<Option<ShiftTask>> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1");
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(Self::row_to_task).transpose()
    }

    async fn find_by_schedule(&self, schedule_id: i64) -> PlanningResult<Vec<ShiftTask>> {
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE schedule_id = $1 ORDER BY start_date, id"
        );
        let rows = sqlx::query(&sql)
            .bind(schedule_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_task).collect()
    }

    #[instrument(skip(self, task), fields(task_id = %task.id, stage = %task.stage.as_str()))]
    async fn update(&self, task: &ShiftTask) -> PlanningResult<ShiftTask> {
        let employee_ids_json = MappingHelpers::employee_ids_to_json(&task.employee_ids)?;

        let result = sqlx::query(
            r#"
            UPDATE tasks
            SET name = $2, project_id = $3, schedule_id = $4, process_type = $5, shift_id = $6,
                shift_number = $7, maintenance_day = $8, start_date = $9, task_type_id = $10,
                stage = $11, auto_tracking = $12, actual_start = $13, actual_end = $14,
                employee_ids = $15, quality_status = $16, material_consumption_kg = $17,
                people_fact = $18, problem_description = $19, updated_at = $20
            WHERE id = $1
            "#,
        )
        .bind(task.id)
        .bind(&task.name)
        .bind(task.project_id)
        .bind(task.schedule_id)
        .bind(task.process_type)
        .bind(task.shift_id)
        .bind(&task.shift_number)
        .bind(task.maintenance_day)
        .bind(task.start_date)
        .bind(task.task_type_id)
        .bind(task.stage)
        .bind(task.auto_tracking)
        .bind(task.actual_start)
        .bind(task.actual_end)
        .bind(employee_ids_json)
        .bind(task.quality_status)
        .bind(task.material_consumption_kg)
        .bind(task.people_fact)
        .bind(&task.problem_description)
        .bind(task.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PlanningError::task_not_found(task.id));
        }

        debug!("更新任务成功: {}", task.entity_description());
        Ok(task.clone())
    }

    async fn delete(&self, id: i64) -> PlanningResult<bool> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_conflicts(
        &self,
        project_id: i64,
        day_start: DateTime<Utc>,
        day_end: DateTime<Utc>,
        process_type: ProcessType,
        shift_id: i64,
        exclude_id: Option<i64>,
    ) -> PlanningResult<i64> {
        let mut sql = String::from(
            "SELECT COUNT(*) as cnt FROM tasks WHERE project_id = $1 AND start_date BETWEEN $2 AND $3 AND process_type = $4 AND shift_id = $5",
        );
        if exclude_id.is_some() {
            sql.push_str(" AND id != $6");
        }

        let mut query = sqlx::query(&sql)
            .bind(project_id)
            .bind(day_start)
            .bind(day_end)
            .bind(process_type)
            .bind(shift_id);
        if let Some(id) = exclude_id {
            query = query.bind(id);
        }

        let row = query.fetch_one(&self.pool).await?;
        Ok(row.try_get("cnt")?)
    }

    async fn find_auto_advance_candidates(
        &self,
        day_start: DateTime<Utc>,
        day_end: DateTime<Utc>,
    ) -> PlanningResult<Vec<ShiftTask>> {
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE stage = 'PLANNED' AND auto_tracking = 1 AND start_date BETWEEN $1 AND $2 ORDER BY start_date, id"
        );
        let rows = sqlx::query(&sql)
            .bind(day_start)
            .bind(day_end)
            .fetch_all(&self.pool)
            .await?;

        let tasks: PlanningResult<Vec<ShiftTask>> = rows.iter().map(Self::row_to_task).collect();
        let result = tasks?;
        debug!("扫描接班候选任务，命中 {} 条", result.len());
        Ok(result)
    }

    async fn find_predecessor(&self, task: &ShiftTask) -> PlanningResult<Option<ShiftTask>> {
        // `IS` 是 SQLite 的空值安全等值比较，工种同为 NULL 也算匹配
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE project_id = $1 AND process_type = $2 AND task_type_id IS $3 AND start_date < $4 ORDER BY start_date DESC, id DESC LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(task.project_id)
            .bind(task.process_type)
            .bind(task.task_type_id)
            .bind(task.start_date)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_task).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DatabaseManager;
    use chrono::TimeZone;
    use shiftplan_domain::entities::{calendar_day_window, QualityStatus, TaskStage};

    async fn setup() -> DatabaseManager {
        let manager = DatabaseManager::new_in_memory().await.unwrap();
        manager.migrate().await.unwrap();
        manager
    }

    fn sample_task(project_id: i64, start_date: DateTime<Utc>) -> ShiftTask {
        let now = Utc.with_ymd_and_hms(2026, 9, 1, 0, 0, 0).unwrap();
        ShiftTask {
            id: 0,
            name: "Furnace charging".to_string(),
            project_id,
            schedule_id: None,
            process_type: ProcessType::Main,
            shift_id: 1,
            shift_number: "1".to_string(),
            maintenance_day: None,
            start_date,
            task_type_id: Some(1),
            stage: TaskStage::Planned,
            auto_tracking: true,
            actual_start: None,
            actual_end: None,
            employee_ids: vec![11, 12],
            quality_status: QualityStatus::Pending,
            material_consumption_kg: None,
            people_fact: None,
            problem_description: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_create_and_round_trip_fields() {
        let manager = setup().await;
        let repo = SqliteTaskRepository::new(manager.pool().clone());

        let start = Utc.with_ymd_and_hms(2026, 9, 1, 6, 0, 0).unwrap();
        let created = repo.create(&sample_task(1, start)).await.unwrap();
        assert!(created.id > 0);
        assert_eq!(created.employee_ids, vec![11, 12]);
        assert_eq!(created.stage, TaskStage::Planned);
        assert_eq!(created.start_date, start);

        let fetched = repo.find_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "Furnace charging");
        assert_eq!(fetched.quality_status, QualityStatus::Pending);
    }

    #[tokio::test]
    async fn test_update_persists_stage_and_times() {
        let manager = setup().await;
        let repo = SqliteTaskRepository::new(manager.pool().clone());

        let start = Utc.with_ymd_and_hms(2026, 9, 1, 6, 0, 0).unwrap();
        let mut task = repo.create(&sample_task(1, start)).await.unwrap();

        let now = Utc.with_ymd_and_hms(2026, 9, 1, 6, 10, 0).unwrap();
        task.apply_stage(TaskStage::InProgress, now);
        repo.update(&task).await.unwrap();

        let fetched = repo.find_by_id(task.id).await.unwrap().unwrap();
        assert_eq!(fetched.stage, TaskStage::InProgress);
        assert_eq!(fetched.actual_start, Some(now));
        assert_eq!(fetched.actual_end, None);
    }

    #[tokio::test]
    async fn test_update_missing_task_fails() {
        let manager = setup().await;
        let repo = SqliteTaskRepository::new(manager.pool().clone());

        let start = Utc.with_ymd_and_hms(2026, 9, 1, 6, 0, 0).unwrap();
        let mut task = sample_task(1, start);
        task.id = 999;
        let err = repo.update(&task).await.unwrap_err();
        assert!(matches!(err, PlanningError::TaskNotFound { id: 999 }));
    }

    #[tokio::test]
    async fn test_count_conflicts_same_day_same_shift() {
        let manager = setup().await;
        let repo = SqliteTaskRepository::new(manager.pool().clone());

        let start = Utc.with_ymd_and_hms(2026, 9, 1, 6, 0, 0).unwrap();
        let existing = repo.create(&sample_task(1, start)).await.unwrap();

        let (day_start, day_end) = calendar_day_window(start).unwrap();
        let conflicts = repo
            .count_conflicts(1, day_start, day_end, ProcessType::Main, 1, None)
            .await
            .unwrap();
        assert_eq!(conflicts, 1);

        // 排除自身后无冲突
        let conflicts = repo
            .count_conflicts(1, day_start, day_end, ProcessType::Main, 1, Some(existing.id))
            .await
            .unwrap();
        assert_eq!(conflicts, 0);

        // 其它项目、其它班次、其它工艺都不算冲突
        for (project_id, process_type, shift_id) in [
            (2, ProcessType::Main, 1),
            (1, ProcessType::Parallel, 1),
            (1, ProcessType::Main, 2),
        ] {
            let conflicts = repo
                .count_conflicts(project_id, day_start, day_end, process_type, shift_id, None)
                .await
                .unwrap();
            assert_eq!(conflicts, 0);
        }

        // 相邻自然日不冲突
        let next_day = Utc.with_ymd_and_hms(2026, 9, 2, 6, 0, 0).unwrap();
        let (day_start, day_end) = calendar_day_window(next_day).unwrap();
        let conflicts = repo
            .count_conflicts(1, day_start, day_end, ProcessType::Main, 1, None)
            .await
            .unwrap();
        assert_eq!(conflicts, 0);
    }

    #[tokio::test]
    async fn test_auto_advance_candidates_filtering() {
        let manager = setup().await;
        let repo = SqliteTaskRepository::new(manager.pool().clone());

        let start = Utc.with_ymd_and_hms(2026, 9, 1, 6, 0, 0).unwrap();
        let planned = repo.create(&sample_task(1, start)).await.unwrap();

        let mut in_progress = sample_task(2, start);
        in_progress.stage = TaskStage::InProgress;
        repo.create(&in_progress).await.unwrap();

        let mut manual = sample_task(3, start);
        manual.auto_tracking = false;
        repo.create(&manual).await.unwrap();

        let mut other_day = sample_task(4, Utc.with_ymd_and_hms(2026, 9, 2, 6, 0, 0).unwrap());
        other_day.project_id = 4;
        repo.create(&other_day).await.unwrap();

        let (day_start, day_end) = calendar_day_window(start).unwrap();
        let candidates = repo
            .find_auto_advance_candidates(day_start, day_end)
            .await
            .unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, planned.id);
    }

    #[tokio::test]
    async fn test_find_predecessor_picks_latest_matching() {
        let manager = setup().await;
        let repo = SqliteTaskRepository::new(manager.pool().clone());

        let first = repo
            .create(&sample_task(
                1,
                Utc.with_ymd_and_hms(2026, 9, 1, 6, 0, 0).unwrap(),
            ))
            .await
            .unwrap();
        let second = repo
            .create(&sample_task(
                1,
                Utc.with_ymd_and_hms(2026, 9, 1, 14, 0, 0).unwrap(),
            ))
            .await
            .unwrap();
        let third = repo
            .create(&sample_task(
                1,
                Utc.with_ymd_and_hms(2026, 9, 1, 22, 0, 0).unwrap(),
            ))
            .await
            .unwrap();

        let predecessor = repo.find_predecessor(&third).await.unwrap().unwrap();
        assert_eq!(predecessor.id, second.id);

        // 最早的任务没有前班
        assert!(repo.find_predecessor(&first).await.unwrap().is_none());

        // 工种不同不算前班
        let mut other_type = third.clone();
        other_type.task_type_id = Some(2);
        assert!(repo.find_predecessor(&other_type).await.unwrap().is_none());
    }
}
