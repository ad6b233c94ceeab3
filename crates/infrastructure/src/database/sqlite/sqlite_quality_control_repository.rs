use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};

use shiftplan_domain::entities::QualityControl;
use shiftplan_domain::repositories::QualityControlRepository;
use shiftplan_errors::{PlanningError, PlanningResult};

const CONTROL_COLUMNS: &str = "id, name, task_id, inspector_id, status, inspected_at, parameters, notes, measurement_data, product_batch, certificate_number, created_at";

/// 质检记录仓储
pub struct SqliteQualityControlRepository {
    pool: SqlitePool,
}

impl SqliteQualityControlRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_control(row: &sqlx::sqlite::SqliteRow) -> PlanningResult<QualityControl> {
        Ok(QualityControl {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            task_id: row.try_get("task_id")?,
            inspector_id: row.try_get("inspector_id")?,
            status: row.try_get("status")?,
            inspected_at: row.try_get("inspected_at")?,
            parameters: row.try_get("parameters")?,
            notes: row.try_get("notes")?,
            measurement_data: row.try_get("measurement_data")?,
            product_batch: row.try_get("product_batch")?,
            certificate_number: row.try_get("certificate_number")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl QualityControlRepository for SqliteQualityControlRepository {
    #[instrument(skip(self, control), fields(task_id = %control.task_id))]
    async fn create(&self, control: &QualityControl) -> PlanningResult<QualityControl> {
        let sql = format!(
            r#"
            INSERT INTO quality_controls (name, task_id, inspector_id, status, inspected_at,
                parameters, notes, measurement_data, product_batch, certificate_number, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {CONTROL_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(&control.name)
            .bind(control.task_id)
            .bind(control.inspector_id)
            .bind(control.status)
            .bind(control.inspected_at)
            .bind(&control.parameters)
            .bind(&control.notes)
            .bind(&control.measurement_data)
            .bind(&control.product_batch)
            .bind(&control.certificate_number)
            .bind(control.created_at)
            .fetch_one(&self.pool)
            .await?;

        let created = Self::row_to_control(&row)?;
        debug!("创建质检记录成功: ID {}, 任务 {}", created.id, created.task_id);
        Ok(created)
    }

    async fn find_by_id(&self, id: i64) -> PlanningResult<Option<QualityControl>> {
        let sql = format!("SELECT {CONTROL_COLUMNS} FROM quality_controls WHERE id = $1");
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(Self::row_to_control).transpose()
    }

    async fn find_by_task(&self, task_id: i64) -> PlanningResult<Vec<QualityControl>> {
        let sql =
            format!("SELECT {CONTROL_COLUMNS} FROM quality_controls WHERE task_id = $1 ORDER BY id");
        let rows = sqlx::query(&sql)
            .bind(task_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_control).collect()
    }

    #[instrument(skip(self, control), fields(control_id = %control.id, status = %control.status.as_str()))]
    async fn update(&self, control: &QualityControl) -> PlanningResult<QualityControl> {
        let result = sqlx::query(
            r#"
            UPDATE quality_controls
            SET name = $2, inspector_id = $3, status = $4, inspected_at = $5, parameters = $6,
                notes = $7, measurement_data = $8, product_batch = $9, certificate_number = $10
            WHERE id = $1
            "#,
        )
        .bind(control.id)
        .bind(&control.name)
        .bind(control.inspector_id)
        .bind(control.status)
        .bind(control.inspected_at)
        .bind(&control.parameters)
        .bind(&control.notes)
        .bind(&control.measurement_data)
        .bind(&control.product_batch)
        .bind(&control.certificate_number)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PlanningError::control_not_found(control.id));
        }
        Ok(control.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::sqlite::SqliteTaskRepository;
    use crate::database::DatabaseManager;
    use chrono::{TimeZone, Utc};
    use shiftplan_domain::entities::{
        ProcessType, QualityStatus, ShiftTask, TaskStage,
    };
    use shiftplan_domain::repositories::TaskRepository;

    async fn setup_with_task() -> (DatabaseManager, i64) {
        let manager = DatabaseManager::new_in_memory().await.unwrap();
        manager.migrate().await.unwrap();

        let now = Utc.with_ymd_and_hms(2026, 9, 1, 6, 0, 0).unwrap();
        let task = ShiftTask {
            id: 0,
            name: "Casting".to_string(),
            project_id: 1,
            schedule_id: None,
            process_type: ProcessType::Main,
            shift_id: 1,
            shift_number: "1".to_string(),
            maintenance_day: None,
            start_date: now,
            task_type_id: Some(3),
            stage: TaskStage::Completed,
            auto_tracking: true,
            actual_start: Some(now),
            actual_end: Some(now),
            employee_ids: vec![],
            quality_status: QualityStatus::Pending,
            material_consumption_kg: None,
            people_fact: None,
            problem_description: None,
            created_at: now,
            updated_at: now,
        };
        let created = SqliteTaskRepository::new(manager.pool().clone())
            .create(&task)
            .await
            .unwrap();
        (manager, created.id)
    }

    #[tokio::test]
    async fn test_create_and_list_in_append_order() {
        let (manager, task_id) = setup_with_task().await;
        let repo = SqliteQualityControlRepository::new(manager.pool().clone());

        for i in 1..=3 {
            repo.create(&QualityControl::new(format!("QC-{i}"), task_id, 7))
                .await
                .unwrap();
        }

        let controls = repo.find_by_task(task_id).await.unwrap();
        assert_eq!(controls.len(), 3);
        assert!(controls.windows(2).all(|w| w[0].id < w[1].id));
        assert!(controls
            .iter()
            .all(|c| c.status == QualityStatus::Pending));
    }

    #[tokio::test]
    async fn test_update_status() {
        let (manager, task_id) = setup_with_task().await;
        let repo = SqliteQualityControlRepository::new(manager.pool().clone());

        let mut control = repo
            .create(&QualityControl::new("QC-1".to_string(), task_id, 7))
            .await
            .unwrap();
        control.status = QualityStatus::Accepted;
        repo.update(&control).await.unwrap();

        let fetched = repo.find_by_id(control.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, QualityStatus::Accepted);
    }

    #[tokio::test]
    async fn test_update_missing_control_fails() {
        let (manager, task_id) = setup_with_task().await;
        let repo = SqliteQualityControlRepository::new(manager.pool().clone());

        let mut control = QualityControl::new("QC-x".to_string(), task_id, 7);
        control.id = 404;
        let err = repo.update(&control).await.unwrap_err();
        assert!(matches!(err, PlanningError::ControlNotFound { id: 404 }));
    }

    #[tokio::test]
    async fn test_create_for_missing_task_violates_foreign_key() {
        let (manager, _) = setup_with_task().await;
        let repo = SqliteQualityControlRepository::new(manager.pool().clone());

        let control = QualityControl::new("QC-x".to_string(), 999, 7);
        assert!(repo.create(&control).await.is_err());
    }

    #[tokio::test]
    async fn test_task_with_controls_cannot_be_deleted() {
        let (manager, task_id) = setup_with_task().await;
        let repo = SqliteQualityControlRepository::new(manager.pool().clone());
        let tasks = SqliteTaskRepository::new(manager.pool().clone());

        repo.create(&QualityControl::new("QC-1".to_string(), task_id, 7))
            .await
            .unwrap();

        // RESTRICT 外键：有质检记录的任务不可删除
        assert!(tasks.delete(task_id).await.is_err());
    }
}
