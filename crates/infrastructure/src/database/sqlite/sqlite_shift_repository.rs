use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use shiftplan_domain::entities::Shift;
use shiftplan_domain::repositories::ShiftRepository;
use shiftplan_errors::PlanningResult;

/// 班次参考数据的只读仓储
pub struct SqliteShiftRepository {
    pool: SqlitePool,
}

impl SqliteShiftRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_shift(row: &sqlx::sqlite::SqliteRow) -> PlanningResult<Shift> {
        Ok(Shift {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            code: row.try_get("code")?,
            start_hour: row.try_get("start_hour")?,
            end_hour: row.try_get("end_hour")?,
            active: row.try_get("active")?,
        })
    }
}

#[async_trait]
impl ShiftRepository for SqliteShiftRepository {
    async fn find_active(&self) -> PlanningResult<Vec<Shift>> {
        let rows = sqlx::query(
            "SELECT id, name, code, start_hour, end_hour, active FROM shifts WHERE active = 1 ORDER BY start_hour",
        )
        .fetch_all(&self.pool)
        .await?;

        let shifts: PlanningResult<Vec<Shift>> = rows.iter().map(Self::row_to_shift).collect();
        let result = shifts?;
        debug!("查询启用班次成功，返回 {} 个班次", result.len());
        Ok(result)
    }

    async fn find_by_id(&self, id: i64) -> PlanningResult<Option<Shift>> {
        let row = sqlx::query(
            "SELECT id, name, code, start_hour, end_hour, active FROM shifts WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_shift).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DatabaseManager;
    use shiftplan_domain::entities::ShiftCode;

    async fn setup() -> DatabaseManager {
        let manager = DatabaseManager::new_in_memory().await.unwrap();
        manager.migrate().await.unwrap();
        manager
    }

    #[tokio::test]
    async fn test_seeded_shifts_ordered_by_start_hour() {
        let manager = setup().await;
        let repo = SqliteShiftRepository::new(manager.pool().clone());

        let shifts = repo.find_active().await.unwrap();
        assert_eq!(shifts.len(), 3);
        assert_eq!(shifts[0].code, ShiftCode::Morning);
        assert_eq!(shifts[1].code, ShiftCode::Day);
        assert_eq!(shifts[2].code, ShiftCode::Night);
        assert!(shifts[2].spans_midnight());
    }

    #[tokio::test]
    async fn test_find_by_id() {
        let manager = setup().await;
        let repo = SqliteShiftRepository::new(manager.pool().clone());

        let shift = repo.find_by_id(2).await.unwrap().unwrap();
        assert_eq!(shift.code, ShiftCode::Day);
        assert_eq!(shift.start_hour, 14);

        assert!(repo.find_by_id(99).await.unwrap().is_none());
    }
}
