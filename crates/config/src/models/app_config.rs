use anyhow::{Context, Result};
use chrono::Duration;
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{
    api_observability::{ApiConfig, ObservabilityConfig},
    database::DatabaseConfig,
    followup::{CallbackConfig, RetryConfig, StatusFlowConfig},
    notifications::NotificationConfig,
    sweeps::SweepConfig,
};
use crate::validation::{ConfigValidator, ValidationUtils};

pub const DEFAULT_CONFIG_PATHS: [&str; 3] = [
    "config/followup.toml",
    "followup.toml",
    "/etc/followup/config.toml",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub retry: RetryConfig,
    pub status_flows: StatusFlowConfig,
    pub callbacks: CallbackConfig,
    pub sweeps: SweepConfig,
    pub notifications: NotificationConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// 依次合并默认值、TOML 文件与 `FOLLOWUP_` 环境变量
    /// （如 `FOLLOWUP_DATABASE__URL`）
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder().add_source(
            ConfigBuilder::try_from(&AppConfig::default()).context("构建默认配置失败")?,
        );

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        } else if let Some(path) = DEFAULT_CONFIG_PATHS
            .iter()
            .find(|path| Path::new(path).exists())
        {
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix("FOLLOWUP")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }

    /// 回调扫描周期不得超过提醒窗口，否则会漏掉落在两次扫描之间的回调
    fn validate_callback_coverage(&self) -> crate::ConfigResult<()> {
        let schedule =
            ValidationUtils::validate_cron(&self.sweeps.callback_cron, "sweeps.callback_cron")?;
        let window = Duration::minutes(self.callbacks.reminder_window_minutes);

        if let Some(gap) = ValidationUtils::max_cron_gap(&schedule, 200) {
            if gap > window {
                return Err(crate::ConfigError::Validation(format!(
                    "sweeps.callback_cron fires every {} minutes, longer than callbacks.reminder_window_minutes ({})",
                    gap.num_minutes(),
                    self.callbacks.reminder_window_minutes
                )));
            }
        }
        Ok(())
    }
}

impl ConfigValidator for AppConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        self.database.validate()?;
        self.api.validate()?;
        self.retry.validate()?;
        self.status_flows.validate()?;
        self.callbacks.validate()?;
        self.sweeps.validate()?;
        self.notifications.validate()?;
        self.observability.validate()?;
        self.validate_callback_coverage()?;
        Ok(())
    }
}
