use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Arg, Command};
use followup_config::{AppConfig, LogFormat};
use followup_infrastructure::{init_logging, init_metrics};
use lead_followup::app::{AppMode, Application};
use lead_followup::shutdown::{wait_for_shutdown_signal, ShutdownManager};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("lead-followup")
        .version(env!("CARGO_PKG_VERSION"))
        .about("CRM 线索跟进自动化服务")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径，缺省时按默认路径查找"),
        )
        .arg(
            Arg::new("mode")
                .short('m')
                .long("mode")
                .value_name("MODE")
                .help("运行模式")
                .value_parser(["all", "api", "worker", "retry-sweep", "callback-sweep"])
                .default_value("all"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别，覆盖配置文件")
                .value_parser(["trace", "debug", "info", "warn", "error"]),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式，覆盖配置文件")
                .value_parser(["json", "pretty"]),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config").map(String::as_str);
    let mode_str = matches
        .get_one::<String>("mode")
        .map(String::as_str)
        .unwrap_or("all");

    let config = AppConfig::load(config_path)
        .with_context(|| format!("加载配置失败: {}", config_path.unwrap_or("<默认路径>")))?;

    let log_level = matches
        .get_one::<String>("log-level")
        .cloned()
        .unwrap_or_else(|| config.observability.log_level.clone());
    let log_format = match matches.get_one::<String>("log-format") {
        Some(format) => format.parse::<LogFormat>().map_err(anyhow::Error::msg)?,
        None => config.observability.log_format,
    };
    init_logging(&log_level, log_format)?;

    info!("启动线索跟进服务");
    info!("运行模式: {mode_str}");

    let mode = parse_app_mode(mode_str, &config)?;

    let metrics = if config.observability.metrics_enabled {
        Some(init_metrics()?)
    } else {
        None
    };

    let app = Application::new(config, mode, metrics).await?;

    if mode.is_one_shot() {
        app.run_once().await?;
        info!("一次性扫描已完成");
        return Ok(());
    }

    let shutdown_manager = ShutdownManager::new();
    let app_handle = {
        let shutdown = shutdown_manager.clone();
        tokio::spawn(async move {
            if let Err(e) = app.run(&shutdown).await {
                error!("应用运行失败: {e:#}");
            }
        })
    };

    wait_for_shutdown_signal().await;
    info!("收到关闭信号，开始优雅关闭...");
    shutdown_manager.shutdown();

    match tokio::time::timeout(Duration::from_secs(30), app_handle).await {
        Ok(Ok(())) => info!("应用已优雅关闭"),
        Ok(Err(e)) => error!("应用关闭时发生错误: {e}"),
        Err(_) => warn!("应用关闭超时，强制退出"),
    }

    info!("线索跟进服务已退出");
    Ok(())
}

/// 解析应用运行模式
fn parse_app_mode(mode_str: &str, config: &AppConfig) -> Result<AppMode> {
    match mode_str {
        "all" => Ok(AppMode::All),
        "api" => {
            if !config.api.enabled {
                return Err(anyhow::anyhow!("API模式被禁用，请检查配置"));
            }
            Ok(AppMode::Api)
        }
        "worker" => {
            if !config.sweeps.enabled {
                return Err(anyhow::anyhow!("后台扫描被禁用，请检查配置"));
            }
            Ok(AppMode::Worker)
        }
        "retry-sweep" => Ok(AppMode::RetrySweep),
        "callback-sweep" => Ok(AppMode::CallbackSweep),
        _ => Err(anyhow::anyhow!("不支持的运行模式: {mode_str}")),
    }
}
