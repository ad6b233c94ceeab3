use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use shiftplan_application::{AutoAdvanceService, ScheduleRequest, SchedulePlanningService};
use shiftplan_config::AppConfig;
use shiftplan_domain::repositories::TaskRepository;
use shiftplan_infrastructure::{
    database::migrations, DatabaseManager, SqliteScheduleRepository, SqliteShiftRepository,
    SqliteTaskRepository, SqliteTemplateRepository,
};

/// 应用运行模式
#[derive(Debug, Clone)]
pub enum AppMode {
    /// 初始化数据库（可选播种默认模板目录）
    Migrate { seed_catalog: bool },
    /// 创建一个排班系列并生成任务
    Plan(Box<ScheduleRequest>),
    /// 执行一次自动接班扫描
    Advance,
    /// 常驻运行，按配置的间隔周期性扫描接班
    Daemon,
}

/// 主应用程序：连接数据库并装配各服务
pub struct Application {
    config: AppConfig,
    db: DatabaseManager,
    task_repo: Arc<dyn TaskRepository>,
    planning_service: SchedulePlanningService,
    auto_advance_service: AutoAdvanceService,
}

impl Application {
    pub async fn new(config: AppConfig) -> Result<Self> {
        let db = DatabaseManager::new(&config.database)
            .await
            .context("连接数据库失败")?;
        db.migrate().await.context("运行数据库迁移失败")?;

        let pool = db.pool().clone();
        let shift_repo = Arc::new(SqliteShiftRepository::new(pool.clone()));
        let template_repo = Arc::new(SqliteTemplateRepository::new(pool.clone()));
        let schedule_repo = Arc::new(SqliteScheduleRepository::new(pool.clone()));
        let task_repo: Arc<dyn TaskRepository> = Arc::new(SqliteTaskRepository::new(pool));

        let planning_service =
            SchedulePlanningService::new(schedule_repo, template_repo, shift_repo);
        let auto_advance_service = AutoAdvanceService::new(Arc::clone(&task_repo));

        Ok(Self {
            config,
            db,
            task_repo,
            planning_service,
            auto_advance_service,
        })
    }

    pub async fn run(&self, mode: AppMode, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        info!("启动应用程序，模式: {:?}", mode_name(&mode));

        match mode {
            AppMode::Migrate { seed_catalog } => self.run_migrate(seed_catalog).await?,
            AppMode::Plan(request) => self.run_plan(&request).await?,
            AppMode::Advance => self.run_advance_once().await?,
            AppMode::Daemon => self.run_daemon(shutdown_rx).await?,
        }

        self.db.close().await;
        Ok(())
    }

    async fn run_migrate(&self, seed_catalog: bool) -> Result<()> {
        // 表结构和班次参考数据在 new() 里已经迁移完成
        self.db.health_check().await.context("数据库健康检查失败")?;
        if seed_catalog {
            migrations::seed_default_catalog(self.db.pool())
                .await
                .context("播种默认工种和模板目录失败")?;
            info!("默认工种和模板目录已就绪");
        }
        info!("数据库初始化完成");
        Ok(())
    }

    async fn run_plan(&self, request: &ScheduleRequest) -> Result<()> {
        let preview = request.preview();
        info!(
            "预估: 约 {} 条任务, 结束日期 {}",
            preview.estimated_task_count, preview.estimated_end_date
        );

        let schedule = self.planning_service.create_schedule(request).await?;
        let tasks = self.task_repo.find_by_schedule(schedule.id).await?;

        info!(
            "排班系列已创建: '{}' (ID: {}), 共 {} 条任务",
            schedule.name,
            schedule.id,
            tasks.len()
        );
        for task in &tasks {
            info!(
                "  {} | 班次 {} | {} | {}",
                task.start_date.format("%Y-%m-%d %H:%M"),
                task.shift_number,
                task.process_type.as_str(),
                task.name
            );
        }
        Ok(())
    }

    async fn run_advance_once(&self) -> Result<()> {
        let report = self.auto_advance_service.tick().await?;
        info!(
            "接班扫描完成: 扫描 {} 条, 接班 {} 条, 失败 {} 条",
            report.scanned, report.promoted, report.failed
        );
        Ok(())
    }

    /// 常驻模式：按配置间隔周期性执行接班扫描，直到收到关闭信号
    async fn run_daemon(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        if !self.config.auto_advance.enabled {
            warn!("自动接班在配置中被禁用，守护模式只等待关闭信号");
            let _ = shutdown_rx.recv().await;
            return Ok(());
        }

        let mut interval = tokio::time::interval(std::time::Duration::from_secs(
            self.config.auto_advance.tick_interval_seconds,
        ));
        info!(
            "接班守护进程已启动，扫描间隔 {} 秒",
            self.config.auto_advance.tick_interval_seconds
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.auto_advance_service.tick().await {
                        Ok(report) if report.scanned > 0 => {
                            info!(
                                "接班扫描: 扫描 {} 条, 接班 {} 条, 失败 {} 条",
                                report.scanned, report.promoted, report.failed
                            );
                        }
                        Ok(_) => {}
                        Err(e) => {
                            error!("接班扫描失败: {e}");
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("接班守护进程收到关闭信号");
                    break;
                }
            }
        }
        Ok(())
    }
}

fn mode_name(mode: &AppMode) -> &'static str {
    match mode {
        AppMode::Migrate { .. } => "migrate",
        AppMode::Plan(_) => "plan",
        AppMode::Advance => "advance",
        AppMode::Daemon => "daemon",
    }
}
