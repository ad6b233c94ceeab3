//! 数据库迁移：建表、索引和参考数据
//!
//! 班次是固定参考数据，随迁移写入；工种/模板目录由
//! `seed_default_catalog` 单独播种，测试可以自建目录。

use sqlx::SqlitePool;
use tracing::debug;

use shiftplan_errors::PlanningResult;

pub async fn run_migrations(pool: &SqlitePool) -> PlanningResult<()> {
    debug!("Running SQLite database migrations");

    // 班次参考表
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS shifts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            code TEXT NOT NULL UNIQUE,
            start_hour INTEGER NOT NULL,
            end_hour INTEGER NOT NULL,
            active INTEGER NOT NULL DEFAULT 1
        )
        "#,
    )
    .execute(pool)
    .await?;

    // 工种目录
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS task_types (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            process_type TEXT NOT NULL,
            category TEXT,
            sequence INTEGER NOT NULL DEFAULT 10,
            active INTEGER NOT NULL DEFAULT 1
        )
        "#,
    )
    .execute(pool)
    .await?;

    // 排班模板
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS templates (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            sequence INTEGER NOT NULL DEFAULT 10,
            process_type TEXT NOT NULL,
            day_number INTEGER NOT NULL,
            shift_id INTEGER NOT NULL,
            task_type_id INTEGER NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            FOREIGN KEY (shift_id) REFERENCES shifts(id),
            FOREIGN KEY (task_type_id) REFERENCES task_types(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // 排班计划
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schedules (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            project_id INTEGER NOT NULL,
            start_shift INTEGER NOT NULL,
            shift_count INTEGER NOT NULL,
            maintenance_days INTEGER NOT NULL DEFAULT 0,
            process_type TEXT NOT NULL,
            start_date DATETIME NOT NULL,
            created_at DATETIME NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // 生产任务；删除计划时任务级联删除
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tasks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            project_id INTEGER NOT NULL,
            schedule_id INTEGER,
            process_type TEXT NOT NULL,
            shift_id INTEGER NOT NULL,
            shift_number TEXT NOT NULL,
            maintenance_day INTEGER,
            start_date DATETIME NOT NULL,
            task_type_id INTEGER,
            stage TEXT NOT NULL DEFAULT 'PLANNED',
            auto_tracking INTEGER NOT NULL DEFAULT 1,
            actual_start DATETIME,
            actual_end DATETIME,
            employee_ids TEXT NOT NULL DEFAULT '[]',
            quality_status TEXT NOT NULL DEFAULT 'PENDING',
            material_consumption_kg REAL,
            people_fact INTEGER,
            problem_description TEXT,
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL,
            FOREIGN KEY (schedule_id) REFERENCES schedules(id) ON DELETE CASCADE,
            FOREIGN KEY (shift_id) REFERENCES shifts(id),
            FOREIGN KEY (task_type_id) REFERENCES task_types(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // 质检记录；不随任务级联删除（RESTRICT）
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS quality_controls (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            task_id INTEGER NOT NULL,
            inspector_id INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'PENDING',
            inspected_at DATETIME NOT NULL,
            parameters TEXT,
            notes TEXT,
            measurement_data TEXT,
            product_batch TEXT,
            certificate_number TEXT,
            created_at DATETIME NOT NULL,
            FOREIGN KEY (task_id) REFERENCES tasks(id) ON DELETE RESTRICT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // 创建索引
    let indexes = vec![
        "CREATE INDEX IF NOT EXISTS idx_tasks_project_start ON tasks(project_id, start_date)",
        "CREATE INDEX IF NOT EXISTS idx_tasks_schedule_id ON tasks(schedule_id)",
        "CREATE INDEX IF NOT EXISTS idx_tasks_stage ON tasks(stage)",
        "CREATE INDEX IF NOT EXISTS idx_templates_process_type ON templates(process_type)",
        "CREATE INDEX IF NOT EXISTS idx_quality_controls_task_id ON quality_controls(task_id)",
    ];
    for index_sql in indexes {
        sqlx::query(index_sql).execute(pool).await?;
    }

    seed_shifts(pool).await?;

    debug!("Successfully completed SQLite database migrations");
    Ok(())
}

/// 三班倒参考数据：早 06-14，白 14-22，夜 22-06
async fn seed_shifts(pool: &SqlitePool) -> PlanningResult<()> {
    sqlx::query(
        r#"
        INSERT OR IGNORE INTO shifts (id, name, code, start_hour, end_hour, active) VALUES
            (1, 'Morning shift', 'MORNING', 6, 14, 1),
            (2, 'Day shift', 'DAY', 14, 22, 1),
            (3, 'Night shift', 'NIGHT', 22, 6, 1)
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// 默认工种与模板目录（可重复执行）
pub async fn seed_default_catalog(pool: &SqlitePool) -> PlanningResult<()> {
    sqlx::query(
        r#"
        INSERT OR IGNORE INTO task_types (id, name, process_type, category, sequence, active) VALUES
            (1, 'Furnace charging', 'MAIN', 'melting', 10, 1),
            (2, 'Melt control', 'MAIN', 'melting', 20, 1),
            (3, 'Casting', 'MAIN', 'casting', 30, 1),
            (4, 'Slag removal', 'PARALLEL', 'support', 10, 1),
            (5, 'Refractory inspection', 'PARALLEL', 'support', 20, 1),
            (6, 'Equipment maintenance', 'MAINTENANCE', 'upkeep', 10, 1)
        "#,
    )
    .execute(pool)
    .await?;

    // 每个班次一套完整的模板
    sqlx::query(
        r#"
        INSERT OR IGNORE INTO templates (id, sequence, process_type, day_number, shift_id, task_type_id, active) VALUES
            (1, 10, 'MAIN', 1, 1, 1, 1),
            (2, 20, 'MAIN', 1, 1, 2, 1),
            (3, 30, 'MAIN', 1, 1, 3, 1),
            (4, 10, 'MAIN', 1, 2, 1, 1),
            (5, 20, 'MAIN', 1, 2, 2, 1),
            (6, 30, 'MAIN', 1, 2, 3, 1),
            (7, 10, 'MAIN', 1, 3, 1, 1),
            (8, 20, 'MAIN', 1, 3, 2, 1),
            (9, 30, 'MAIN', 1, 3, 3, 1),
            (10, 40, 'PARALLEL', 1, 1, 4, 1),
            (11, 50, 'PARALLEL', 1, 1, 5, 1),
            (12, 40, 'PARALLEL', 1, 2, 4, 1),
            (13, 50, 'PARALLEL', 1, 2, 5, 1),
            (14, 40, 'PARALLEL', 1, 3, 4, 1),
            (15, 50, 'PARALLEL', 1, 3, 5, 1),
            (16, 60, 'MAINTENANCE', 1, 1, 6, 1),
            (17, 60, 'MAINTENANCE', 1, 2, 6, 1),
            (18, 60, 'MAINTENANCE', 1, 3, 6, 1)
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}
