use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};

use shiftplan_domain::entities::{ProcessType, TaskTemplate, TaskType};
use shiftplan_domain::repositories::TemplateRepository;
use shiftplan_errors::PlanningResult;

const TEMPLATE_COLUMNS: &str =
    "id, sequence, process_type, day_number, shift_id, task_type_id, active";

/// 排班模板与工种目录仓储
pub struct SqliteTemplateRepository {
    pool: SqlitePool,
}

impl SqliteTemplateRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_template(row: &sqlx::sqlite::SqliteRow) -> PlanningResult<TaskTemplate> {
        Ok(TaskTemplate {
            id: row.try_get("id")?,
            sequence: row.try_get("sequence")?,
            process_type: row.try_get("process_type")?,
            day_number: row.try_get("day_number")?,
            shift_id: row.try_get("shift_id")?,
            task_type_id: row.try_get("task_type_id")?,
            active: row.try_get("active")?,
        })
    }

    fn row_to_task_type(row: &sqlx::sqlite::SqliteRow) -> PlanningResult<TaskType> {
        Ok(TaskType {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            process_type: row.try_get("process_type")?,
            category: row.try_get("category")?,
            sequence: row.try_get("sequence")?,
            active: row.try_get("active")?,
        })
    }
}

#[async_trait]
impl TemplateRepository for SqliteTemplateRepository {
    #[instrument(skip(self, template), fields(
        process_type = %template.process_type.as_str(),
        shift_id = %template.shift_id,
    ))]
    async fn create(&self, template: &TaskTemplate) -> PlanningResult<TaskTemplate> {
        template.validate()?;

        let sql = format!(
            r#"
            INSERT INTO templates (sequence, process_type, day_number, shift_id, task_type_id, active)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {TEMPLATE_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(template.sequence)
            .bind(template.process_type)
            .bind(template.day_number)
            .bind(template.shift_id)
            .bind(template.task_type_id)
            .bind(template.active)
            .fetch_one(&self.pool)
            .await?;

        let created = Self::row_to_template(&row)?;
        debug!("创建模板成功: ID {}", created.id);
        Ok(created)
    }

    async fn find_by_id(&self, id: i64) -> PlanningResult<Option<TaskTemplate>> {
        let sql = format!("SELECT {TEMPLATE_COLUMNS} FROM templates WHERE id = $1");
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(Self::row_to_template).transpose()
    }

    async fn find_active(
        &self,
        process_types: &[ProcessType],
    ) -> PlanningResult<Vec<TaskTemplate>> {
        if process_types.is_empty() {
            return Ok(vec![]);
        }

        let placeholders: Vec<String> =
            (1..=process_types.len()).map(|i| format!("${i}")).collect();
        let sql = format!(
            "SELECT {TEMPLATE_COLUMNS} FROM templates WHERE active = 1 AND process_type IN ({}) ORDER BY sequence, id",
            placeholders.join(", ")
        );

        let mut query = sqlx::query(&sql);
        for process_type in process_types {
            query = query.bind(*process_type);
        }

        let rows = query.fetch_all(&self.pool).await?;
        let templates: PlanningResult<Vec<TaskTemplate>> =
            rows.iter().map(Self::row_to_template).collect();
        let result = templates?;
        debug!("查询启用模板成功，返回 {} 条", result.len());
        Ok(result)
    }

    async fn find_all(&self) -> PlanningResult<Vec<TaskTemplate>> {
        let sql = format!("SELECT {TEMPLATE_COLUMNS} FROM templates ORDER BY sequence, id");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_template).collect()
    }

    async fn delete(&self, id: i64) -> PlanningResult<bool> {
        let result = sqlx::query("DELETE FROM templates WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_task_types(&self) -> PlanningResult<Vec<TaskType>> {
        let rows = sqlx::query(
            "SELECT id, name, process_type, category, sequence, active FROM task_types WHERE active = 1 ORDER BY sequence, id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_task_type).collect()
    }
}
