use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tracing::{debug, instrument};

use shiftplan_domain::entities::{calendar_day_window, QualityStatus, Schedule};
use shiftplan_domain::expansion::TaskDraft;
use shiftplan_domain::repositories::ScheduleRepository;
use shiftplan_errors::{PlanningError, PlanningResult};

use crate::database::mapping::MappingHelpers;

const SCHEDULE_COLUMNS: &str = "id, name, project_id, start_shift, shift_count, maintenance_days, process_type, start_date, created_at";

/// 排班计划仓储
///
/// 计划及其任务在同一事务内落库。任何一条任务草稿与已有任务
/// 冲突（同项目、同自然日、同工艺、同班次）都会让整批回滚。
pub struct SqliteScheduleRepository {
    pool: SqlitePool,
}

impl SqliteScheduleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_schedule(row: &sqlx::sqlite::SqliteRow) -> PlanningResult<Schedule> {
        Ok(Schedule {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            project_id: row.try_get("project_id")?,
            start_shift: row.try_get("start_shift")?,
            shift_count: row.try_get("shift_count")?,
            maintenance_days: row.try_get("maintenance_days")?,
            process_type: row.try_get("process_type")?,
            start_date: row.try_get("start_date")?,
            created_at: row.try_get("created_at")?,
        })
    }

    /// 事务内对既有任务的唯一性校验
    ///
    /// 同一批次内的草稿互不冲突（一个班次迭代可以有多个模板），
    /// 所以校验在任何插入之前统一执行，只看库里已有的任务。
    async fn ensure_draft_unique(
        tx: &mut Transaction<'_, Sqlite>,
        project_id: i64,
        draft: &TaskDraft,
    ) -> PlanningResult<()> {
        let (day_start, day_end) = calendar_day_window(draft.start_date)?;
        let row = sqlx::query(
            "SELECT COUNT(*) as cnt FROM tasks WHERE project_id = $1 AND start_date BETWEEN $2 AND $3 AND process_type = $4 AND shift_id = $5",
        )
        .bind(project_id)
        .bind(day_start)
        .bind(day_end)
        .bind(draft.process_type)
        .bind(draft.shift_id)
        .fetch_one(&mut **tx)
        .await?;

        let count: i64 = row.try_get("cnt")?;
        if count > 0 {
            return Err(PlanningError::DuplicateTask {
                project_id,
                day: draft.start_date.date_naive().to_string(),
                process_type: draft.process_type.as_str().to_string(),
                shift_id: draft.shift_id,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ScheduleRepository for SqliteScheduleRepository {
    #[instrument(skip(self, schedule, drafts), fields(
        schedule_name = %schedule.name,
        project_id = %schedule.project_id,
        draft_count = %drafts.len(),
    ))]
    async fn create_with_tasks(
        &self,
        schedule: &Schedule,
        drafts: &[TaskDraft],
    ) -> PlanningResult<Schedule> {
        let mut tx = self.pool.begin().await?;

        // 先整批校验，再整批插入
        for draft in drafts {
            Self::ensure_draft_unique(&mut tx, schedule.project_id, draft).await?;
        }

        let sql = format!(
            r#"
            INSERT INTO schedules (name, project_id, start_shift, shift_count, maintenance_days, process_type, start_date, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {SCHEDULE_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(&schedule.name)
            .bind(schedule.project_id)
            .bind(schedule.start_shift)
            .bind(schedule.shift_count)
            .bind(schedule.maintenance_days)
            .bind(schedule.process_type)
            .bind(schedule.start_date)
            .bind(schedule.created_at)
            .fetch_one(&mut *tx)
            .await?;
        let created = Self::row_to_schedule(&row)?;

        let now = Utc::now();
        let employee_ids_json = MappingHelpers::employee_ids_to_json(&[])?;
        for draft in drafts {
            sqlx::query(
                r#"
                INSERT INTO tasks (name, project_id, schedule_id, process_type, shift_id, shift_number,
                    maintenance_day, start_date, task_type_id, stage, auto_tracking, employee_ids,
                    quality_status, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 1, $11, $12, $13, $14)
                "#,
            )
            .bind(&draft.name)
            .bind(created.project_id)
            .bind(created.id)
            .bind(draft.process_type)
            .bind(draft.shift_id)
            .bind(&draft.shift_number)
            .bind(draft.maintenance_day)
            .bind(draft.start_date)
            .bind(draft.task_type_id)
            .bind(draft.stage)
            .bind(&employee_ids_json)
            .bind(QualityStatus::Pending)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(
            "创建排班计划成功: '{}' (ID: {}), 生成 {} 条任务",
            created.name,
            created.id,
            drafts.len()
        );
        Ok(created)
    }

    async fn find_by_id(&self, id: i64) -> PlanningResult<Option<Schedule>> {
        let sql = format!("SELECT {SCHEDULE_COLUMNS} FROM schedules WHERE id = $1");
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(Self::row_to_schedule).transpose()
    }

    async fn find_all(&self) -> PlanningResult<Vec<Schedule>> {
        let sql = format!("SELECT {SCHEDULE_COLUMNS} FROM schedules ORDER BY created_at DESC, id DESC");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_schedule).collect()
    }

    #[instrument(skip(self), fields(schedule_id = %id))]
    async fn delete(&self, id: i64) -> PlanningResult<bool> {
        // tasks 外键 ON DELETE CASCADE，任务随计划删除
        let result = sqlx::query("DELETE FROM schedules WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::sqlite::SqliteTaskRepository;
    use crate::database::DatabaseManager;
    use chrono::{DateTime, TimeZone};
    use shiftplan_domain::entities::{ProcessFilter, ProcessType, TaskStage};
    use shiftplan_domain::repositories::TaskRepository;

    async fn setup() -> DatabaseManager {
        let manager = DatabaseManager::new_in_memory().await.unwrap();
        manager.migrate().await.unwrap();
        manager
    }

    fn draft(shift_id: i64, start_date: DateTime<Utc>) -> TaskDraft {
        TaskDraft {
            name: "Melt control".to_string(),
            process_type: ProcessType::Main,
            shift_id,
            shift_number: "1".to_string(),
            maintenance_day: None,
            start_date,
            task_type_id: 2,
            stage: TaskStage::Planned,
        }
    }

    fn schedule(project_id: i64) -> Schedule {
        Schedule::new(
            "Schedule Furnace-1 from 2026-09-01".to_string(),
            project_id,
            1,
            3,
            0,
            ProcessFilter::Main,
            Utc.with_ymd_and_hms(2026, 9, 1, 6, 0, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_create_with_tasks_persists_batch() {
        let manager = setup().await;
        let repo = SqliteScheduleRepository::new(manager.pool().clone());
        let tasks = SqliteTaskRepository::new(manager.pool().clone());

        let drafts = vec![
            draft(1, Utc.with_ymd_and_hms(2026, 9, 1, 6, 0, 0).unwrap()),
            draft(2, Utc.with_ymd_and_hms(2026, 9, 1, 14, 0, 0).unwrap()),
            draft(3, Utc.with_ymd_and_hms(2026, 9, 1, 22, 0, 0).unwrap()),
        ];
        let created = repo.create_with_tasks(&schedule(1), &drafts).await.unwrap();
        assert!(created.id > 0);

        let persisted = tasks.find_by_schedule(created.id).await.unwrap();
        assert_eq!(persisted.len(), 3);
        assert!(persisted.iter().all(|t| t.stage == TaskStage::Planned));
        assert!(persisted.iter().all(|t| t.auto_tracking));
        assert!(persisted.iter().all(|t| t.schedule_id == Some(created.id)));
    }

    #[tokio::test]
    async fn test_sibling_drafts_same_shift_allowed() {
        let manager = setup().await;
        let repo = SqliteScheduleRepository::new(manager.pool().clone());
        let tasks = SqliteTaskRepository::new(manager.pool().clone());

        // 一个班次迭代可以有多个模板产出的草稿，互不视为冲突
        let start = Utc.with_ymd_and_hms(2026, 9, 1, 6, 0, 0).unwrap();
        let mut second = draft(1, start);
        second.name = "Furnace charging".to_string();
        second.task_type_id = 1;

        let created = repo
            .create_with_tasks(&schedule(1), &[draft(1, start), second])
            .await
            .unwrap();
        assert_eq!(tasks.find_by_schedule(created.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_conflicting_batch_rolls_back_entirely() {
        let manager = setup().await;
        let repo = SqliteScheduleRepository::new(manager.pool().clone());
        let tasks = SqliteTaskRepository::new(manager.pool().clone());

        // 先让第一个计划占住早班
        let morning = Utc.with_ymd_and_hms(2026, 9, 1, 6, 0, 0).unwrap();
        repo.create_with_tasks(&schedule(1), &[draft(1, morning)])
            .await
            .unwrap();

        // 第二批里一条干净（白班）、一条冲突（早班）
        let day = Utc.with_ymd_and_hms(2026, 9, 1, 14, 0, 0).unwrap();
        let err = repo
            .create_with_tasks(&schedule(1), &[draft(2, day), draft(1, morning)])
            .await
            .unwrap_err();
        assert!(matches!(err, PlanningError::DuplicateTask { .. }));

        // 整批回滚：第二个计划不存在，白班任务也没有漏写
        assert_eq!(repo.find_all().await.unwrap().len(), 1);
        let (day_start, day_end) =
            shiftplan_domain::entities::calendar_day_window(day).unwrap();
        let leaked = tasks
            .count_conflicts(1, day_start, day_end, ProcessType::Main, 2, None)
            .await
            .unwrap();
        assert_eq!(leaked, 0);
    }

    #[tokio::test]
    async fn test_conflict_with_existing_task_rejected() {
        let manager = setup().await;
        let repo = SqliteScheduleRepository::new(manager.pool().clone());

        let start = Utc.with_ymd_and_hms(2026, 9, 1, 6, 0, 0).unwrap();
        repo.create_with_tasks(&schedule(1), &[draft(1, start)])
            .await
            .unwrap();

        // 第二个计划撞上第一个计划的任务
        let err = repo
            .create_with_tasks(&schedule(1), &[draft(1, start)])
            .await
            .unwrap_err();
        assert!(matches!(err, PlanningError::DuplicateTask { .. }));

        // 其它项目不受影响
        repo.create_with_tasks(&schedule(2), &[draft(1, start)])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_cascades_to_tasks() {
        let manager = setup().await;
        let repo = SqliteScheduleRepository::new(manager.pool().clone());
        let tasks = SqliteTaskRepository::new(manager.pool().clone());

        let start = Utc.with_ymd_and_hms(2026, 9, 1, 6, 0, 0).unwrap();
        let created = repo
            .create_with_tasks(&schedule(1), &[draft(1, start)])
            .await
            .unwrap();

        assert!(repo.delete(created.id).await.unwrap());
        assert!(repo.find_by_id(created.id).await.unwrap().is_none());
        assert!(tasks.find_by_schedule(created.id).await.unwrap().is_empty());

        assert!(!repo.delete(created.id).await.unwrap());
    }
}
