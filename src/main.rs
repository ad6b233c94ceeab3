use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{NaiveDate, TimeZone, Utc};
use clap::{Arg, ArgAction, Command};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod app;
mod shutdown;

use app::{AppMode, Application};
use shiftplan_application::ScheduleRequest;
use shiftplan_config::{AppConfig, ConfigValidator};
use shiftplan_domain::entities::{PriorityLevel, ProcessFilter, ProductType};
use shutdown::ShutdownManager;

#[tokio::main]
async fn main() -> Result<()> {
    // 解析命令行参数
    let matches = build_cli().get_matches();

    let config_path = matches.get_one::<String>("config").expect("has default");
    let mode_str = matches.get_one::<String>("mode").expect("has default");
    let log_level = matches.get_one::<String>("log-level").expect("has default");
    let log_format = matches.get_one::<String>("log-format").expect("has default");

    // 初始化日志系统
    init_logging(log_level, log_format)?;

    info!("启动倒班任务计划系统");
    info!("配置文件: {config_path}");
    info!("运行模式: {mode_str}");

    // 加载配置，命令行覆盖优先于文件和环境变量
    let mut config = AppConfig::load(Some(config_path))
        .with_context(|| format!("加载配置文件失败: {config_path}"))?;
    apply_cli_overrides(&mut config, &matches)?;

    // 解析运行模式
    let app_mode = parse_app_mode(mode_str, &matches)?;
    let is_daemon = matches!(app_mode, AppMode::Daemon);

    // 创建应用实例
    let app = Application::new(config).await?;

    let shutdown_manager = ShutdownManager::new();

    let app_handle = {
        let app = Arc::new(app);
        let shutdown_rx = shutdown_manager.subscribe().await;

        tokio::spawn(async move {
            if let Err(e) = app.run(app_mode, shutdown_rx).await {
                error!("应用运行失败: {e}");
                return Err(e);
            }
            Ok(())
        })
    };

    if is_daemon {
        // 守护模式：等待关闭信号后优雅关闭
        wait_for_shutdown_signal().await;
        info!("收到关闭信号，开始优雅关闭...");
        shutdown_manager.shutdown().await;

        match tokio::time::timeout(Duration::from_secs(30), app_handle).await {
            Ok(Ok(Ok(()))) => {
                info!("应用已优雅关闭");
            }
            Ok(Ok(Err(e))) => {
                error!("应用关闭时发生错误: {e}");
            }
            Ok(Err(e)) => {
                error!("应用任务异常退出: {e}");
            }
            Err(_) => {
                warn!("应用关闭超时，强制退出");
            }
        }
    } else {
        // 一次性模式：运行到完成
        app_handle.await??;
    }

    info!("倒班任务计划系统已退出");
    Ok(())
}

/// 构建命令行定义
fn build_cli() -> Command {
    Command::new("shiftplan")
        .version("1.0.0")
        .about("冶金厂倒班任务计划系统")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径")
                .default_value("config/shiftplan.toml"),
        )
        .arg(
            Arg::new("database-url")
                .long("database-url")
                .value_name("URL")
                .help("数据库连接串（覆盖配置文件和环境变量）"),
        )
        .arg(
            Arg::new("mode")
                .short('m')
                .long("mode")
                .value_name("MODE")
                .help("运行模式")
                .value_parser(["migrate", "plan", "advance", "daemon"])
                .default_value("daemon"),
        )
        .arg(
            Arg::new("seed-catalog")
                .long("seed-catalog")
                .help("migrate模式下播种默认工种和模板目录")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("project-id")
                .long("project-id")
                .value_name("ID")
                .help("项目ID (仅在plan模式下使用)")
                .value_parser(clap::value_parser!(i64))
                .required_if_eq("mode", "plan"),
        )
        .arg(
            Arg::new("project-name")
                .long("project-name")
                .value_name("NAME")
                .help("项目名称 (仅在plan模式下使用)")
                .required_if_eq("mode", "plan"),
        )
        .arg(
            Arg::new("start-date")
                .long("start-date")
                .value_name("YYYY-MM-DD")
                .help("计划开始日期 (仅在plan模式下使用)")
                .required_if_eq("mode", "plan"),
        )
        .arg(
            Arg::new("process")
                .long("process")
                .value_name("PROCESS")
                .help("工艺选择")
                .value_parser(["main", "parallel", "both"])
                .default_value("main"),
        )
        .arg(
            Arg::new("start-shift")
                .long("start-shift")
                .value_name("N")
                .help("起始班次序号 (1-8)")
                .value_parser(clap::value_parser!(i32))
                .default_value("1"),
        )
        .arg(
            Arg::new("shift-count")
                .long("shift-count")
                .value_name("N")
                .help("班次数量 (1-8)")
                .value_parser(clap::value_parser!(i32))
                .default_value("3"),
        )
        .arg(
            Arg::new("maintenance-days")
                .long("maintenance-days")
                .value_name("N")
                .help("设备检修天数 (0-30)")
                .value_parser(clap::value_parser!(i32))
                .default_value("0"),
        )
        .arg(
            Arg::new("product-type")
                .long("product-type")
                .value_name("TYPE")
                .help("产品类型")
                .value_parser(["steel", "cast-iron", "non-ferrous", "alloy"])
                .default_value("steel"),
        )
        .arg(
            Arg::new("volume")
                .long("volume")
                .value_name("TONS")
                .help("计划产量（吨）")
                .value_parser(clap::value_parser!(f64))
                .default_value("100"),
        )
        .arg(
            Arg::new("priority")
                .long("priority")
                .value_name("LEVEL")
                .help("优先级")
                .value_parser(["normal", "high", "urgent"])
                .default_value("normal"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别")
                .value_parser(["trace", "debug", "info", "warn", "error"])
                .default_value("info"),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式")
                .value_parser(["json", "pretty"])
                .default_value("pretty"),
        )
}

/// 初始化日志系统
fn init_logging(log_level: &str, log_format: &str) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match log_format {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
                .context("初始化JSON日志格式失败")?;
        }
        "pretty" => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()
                .context("初始化Pretty日志格式失败")?;
        }
        _ => {
            return Err(anyhow::anyhow!("不支持的日志格式: {log_format}"));
        }
    }

    Ok(())
}

/// 把命令行覆盖项写入已加载的配置，覆盖后重新校验受影响的段
fn apply_cli_overrides(config: &mut AppConfig, matches: &clap::ArgMatches) -> Result<()> {
    if let Some(url) = matches.get_one::<String>("database-url") {
        config.database.url = url.clone();
        config
            .database
            .validate()
            .with_context(|| format!("无效的数据库连接串: {url}"))?;
    }
    Ok(())
}

/// 解析应用运行模式
fn parse_app_mode(mode_str: &str, matches: &clap::ArgMatches) -> Result<AppMode> {
    match mode_str {
        "migrate" => Ok(AppMode::Migrate {
            seed_catalog: matches.get_flag("seed-catalog"),
        }),
        "plan" => Ok(AppMode::Plan(Box::new(parse_schedule_request(matches)?))),
        "advance" => Ok(AppMode::Advance),
        "daemon" => Ok(AppMode::Daemon),
        _ => Err(anyhow::anyhow!("不支持的运行模式: {mode_str}")),
    }
}

/// 从命令行参数装配排班请求
fn parse_schedule_request(matches: &clap::ArgMatches) -> Result<ScheduleRequest> {
    let project_id = *matches.get_one::<i64>("project-id").expect("required");
    let project_name = matches
        .get_one::<String>("project-name")
        .expect("required")
        .clone();

    let date_str = matches.get_one::<String>("start-date").expect("required");
    let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .with_context(|| format!("无效的开始日期: {date_str}"))?;
    let start_of_day = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| anyhow::anyhow!("无效的开始日期: {date_str}"))?;
    let start_date = Utc.from_utc_datetime(&start_of_day);

    let process_type = match matches.get_one::<String>("process").expect("has default").as_str() {
        "parallel" => ProcessFilter::Parallel,
        "both" => ProcessFilter::Both,
        _ => ProcessFilter::Main,
    };
    let product_type = match matches
        .get_one::<String>("product-type")
        .expect("has default")
        .as_str()
    {
        "cast-iron" => ProductType::CastIron,
        "non-ferrous" => ProductType::NonFerrous,
        "alloy" => ProductType::Alloy,
        _ => ProductType::Steel,
    };
    let priority = match matches
        .get_one::<String>("priority")
        .expect("has default")
        .as_str()
    {
        "high" => PriorityLevel::High,
        "urgent" => PriorityLevel::Urgent,
        _ => PriorityLevel::Normal,
    };

    Ok(ScheduleRequest {
        project_id,
        project_name,
        start_date,
        process_type,
        start_shift: *matches.get_one::<i32>("start-shift").expect("has default"),
        shift_count: *matches.get_one::<i32>("shift-count").expect("has default"),
        maintenance_days: *matches
            .get_one::<i32>("maintenance-days")
            .expect("has default"),
        product_type,
        production_volume: *matches.get_one::<f64>("volume").expect("has default"),
        priority,
    })
}

/// 等待关闭信号
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("安装Ctrl+C信号处理器失败");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("安装SIGTERM信号处理器失败")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("收到Ctrl+C信号");
        },
        _ = terminate => {
            info!("收到SIGTERM信号");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_url_flag_overrides_config() {
        let matches = build_cli().get_matches_from([
            "shiftplan",
            "--mode",
            "advance",
            "--database-url",
            "sqlite::memory:",
        ]);

        let mut config = AppConfig::default();
        apply_cli_overrides(&mut config, &matches).unwrap();
        assert_eq!(config.database.url, "sqlite::memory:");
    }

    #[test]
    fn test_database_url_flag_rejects_invalid_url() {
        let matches = build_cli().get_matches_from([
            "shiftplan",
            "--mode",
            "advance",
            "--database-url",
            "mysql://nope",
        ]);

        let mut config = AppConfig::default();
        assert!(apply_cli_overrides(&mut config, &matches).is_err());
    }

    #[test]
    fn test_no_flag_keeps_configured_url() {
        let matches = build_cli().get_matches_from(["shiftplan", "--mode", "advance"]);

        let mut config = AppConfig::default();
        apply_cli_overrides(&mut config, &matches).unwrap();
        assert_eq!(config.database.url, "sqlite:shiftplan.db");
    }

    #[test]
    fn test_plan_mode_request_parsing() {
        let matches = build_cli().get_matches_from([
            "shiftplan",
            "--mode",
            "plan",
            "--project-id",
            "7",
            "--project-name",
            "Furnace-2",
            "--start-date",
            "2026-09-01",
            "--process",
            "both",
            "--shift-count",
            "4",
            "--maintenance-days",
            "2",
        ]);

        let request = parse_schedule_request(&matches).unwrap();
        assert_eq!(request.project_id, 7);
        assert_eq!(request.project_name, "Furnace-2");
        assert_eq!(request.start_date.date_naive().to_string(), "2026-09-01");
        assert!(matches!(request.process_type, ProcessFilter::Both));
        assert_eq!(request.shift_count, 4);
        assert_eq!(request.maintenance_days, 2);
    }
}
