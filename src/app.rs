use std::sync::Arc;

use anyhow::{Context, Result};
use followup_api::{create_app, AppState};
use followup_config::AppConfig;
use followup_dispatcher::{
    CallbackService, DeferredJobRunner, LeadRetryService, LeadService, RetryService,
    SweepScheduler, TaskStatusHandler,
};
use followup_domain::ports::{Clock, SystemClock};
use followup_infrastructure::{build_transport, DatabaseManager, OutboxDispatcher, SqliteStore};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::shutdown::ShutdownManager;

/// 应用运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    /// API 与后台扫描同时运行
    All,
    /// 仅运行 API 服务器
    Api,
    /// 仅运行后台扫描与作业轮询
    Worker,
    /// 执行一次重试扫描后退出
    RetrySweep,
    /// 执行一次回调提醒扫描后退出
    CallbackSweep,
}

impl AppMode {
    pub fn is_one_shot(&self) -> bool {
        matches!(self, AppMode::RetrySweep | AppMode::CallbackSweep)
    }
}

/// 基于同一组 SQLite 仓储装配的业务服务
#[derive(Clone)]
pub struct FollowupServices {
    pub store: SqliteStore,
    pub leads: Arc<LeadService>,
    pub retry: Arc<dyn RetryService>,
    pub status_handler: Arc<TaskStatusHandler>,
    pub callbacks: Arc<CallbackService>,
    pub jobs: Arc<DeferredJobRunner>,
    pub outbox: Arc<OutboxDispatcher>,
}

impl FollowupServices {
    pub fn build(store: SqliteStore, config: &AppConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let transport = build_transport(&config.notifications).context("创建邮件传输失败")?;
        let outbox = Arc::new(OutboxDispatcher::new(
            store.outbox.clone(),
            store.outbox.clone(),
            transport,
            clock.clone(),
        ));

        let retry: Arc<dyn RetryService> = Arc::new(LeadRetryService::new(
            store.tasks.clone(),
            store.unit_of_work.clone(),
            store.jobs.clone(),
            clock.clone(),
            config.retry.clone(),
        ));

        let leads = Arc::new(LeadService::new(
            store.leads.clone(),
            store.tasks.clone(),
            store.assignments.clone(),
            clock.clone(),
            config.retry.clone(),
        ));

        let status_handler = Arc::new(TaskStatusHandler::new(
            store.tasks.clone(),
            store.leads.clone(),
            store.assignments.clone(),
            store.comments.clone(),
            store.jobs.clone(),
            outbox.clone(),
            clock.clone(),
            config.status_flows.clone(),
        ));

        let callbacks = Arc::new(CallbackService::new(
            store.tasks.clone(),
            store.leads.clone(),
            store.unit_of_work.clone(),
            store.users.clone(),
            outbox.clone(),
            clock.clone(),
            &config.callbacks,
        ));

        let jobs = Arc::new(DeferredJobRunner::new(
            store.jobs.clone(),
            store.tasks.clone(),
            retry.clone(),
            clock,
            config.sweeps.job_batch_size,
        )
        .with_lease(chrono::Duration::minutes(config.sweeps.job_lease_minutes)));

        Ok(Self {
            store,
            leads,
            retry,
            status_handler,
            callbacks,
            jobs,
            outbox,
        })
    }

    pub fn api_state(&self, metrics: Option<PrometheusHandle>) -> AppState {
        AppState {
            leads: Arc::clone(&self.leads),
            status_handler: Arc::clone(&self.status_handler),
            callbacks: Arc::clone(&self.callbacks),
            retry: Arc::clone(&self.retry),
            lead_repo: self.store.leads.clone(),
            task_repo: self.store.tasks.clone(),
            comment_repo: self.store.comments.clone(),
            metrics,
        }
    }
}

/// 主应用程序
pub struct Application {
    config: AppConfig,
    mode: AppMode,
    database: DatabaseManager,
    services: FollowupServices,
    metrics: Option<PrometheusHandle>,
}

impl Application {
    pub async fn new(
        config: AppConfig,
        mode: AppMode,
        metrics: Option<PrometheusHandle>,
    ) -> Result<Self> {
        info!("初始化应用程序，模式: {:?}", mode);

        let database = DatabaseManager::new(&config.database)
            .await
            .context("连接数据库失败")?;
        database.migrate().await.context("运行数据库迁移失败")?;

        let store = SqliteStore::new(database.pool().clone());
        let services = FollowupServices::build(store, &config, Arc::new(SystemClock))?;

        Ok(Self {
            config,
            mode,
            database,
            services,
            metrics,
        })
    }

    pub fn services(&self) -> &FollowupServices {
        &self.services
    }

    /// 运行常驻模式，直到收到关闭信号
    pub async fn run(&self, shutdown: &ShutdownManager) -> Result<()> {
        info!("启动应用程序，模式: {:?}", self.mode);

        let mut handles = Vec::new();

        let run_sweeps = match self.mode {
            AppMode::All => self.config.sweeps.enabled,
            AppMode::Worker => true,
            _ => false,
        };
        if run_sweeps {
            handles.extend(self.spawn_sweeps(shutdown)?);
        }

        let run_api = match self.mode {
            AppMode::All => self.config.api.enabled,
            AppMode::Api => true,
            _ => false,
        };
        if run_api {
            handles.push(self.spawn_api(shutdown).await?);
        }

        for handle in handles {
            if let Err(e) = handle.await {
                error!("后台任务异常退出: {}", e);
            }
        }

        self.database.close().await;
        info!("所有组件已停止");
        Ok(())
    }

    /// 执行一次性扫描
    pub async fn run_once(&self) -> Result<()> {
        match self.mode {
            AppMode::RetrySweep => {
                let report = self.services.retry.scan_and_process_due_retries().await?;
                info!(
                    scanned = report.scanned,
                    retried = report.retried,
                    escalated = report.escalated,
                    failed = report.failed,
                    "重试扫描完成"
                );
            }
            AppMode::CallbackSweep => {
                let report = self.services.callbacks.notify_upcoming_callbacks().await?;
                info!(
                    scanned = report.scanned,
                    notified = report.notified,
                    failed = report.failed,
                    "回调提醒扫描完成"
                );
            }
            mode => return Err(anyhow::anyhow!("{:?} 不是一次性运行模式", mode)),
        }

        // 扫描产生的邮件立即投递
        self.services
            .outbox
            .flush_due_emails(self.config.sweeps.email_batch_size)
            .await?;
        self.database.close().await;
        Ok(())
    }

    fn spawn_sweeps(&self, shutdown: &ShutdownManager) -> Result<Vec<tokio::task::JoinHandle<()>>> {
        info!(
            retry_cron = %self.config.sweeps.retry_cron,
            callback_cron = %self.config.sweeps.callback_cron,
            "启动后台扫描"
        );
        let scheduler = SweepScheduler::new(&self.config.sweeps)?;
        Ok(scheduler.spawn(
            Arc::clone(&self.services.retry),
            Arc::clone(&self.services.callbacks),
            Arc::clone(&self.services.jobs),
            Arc::clone(&self.services.outbox),
            shutdown.sender(),
        ))
    }

    async fn spawn_api(&self, shutdown: &ShutdownManager) -> Result<tokio::task::JoinHandle<()>> {
        let app = create_app(
            self.services.api_state(self.metrics.clone()),
            &self.config.api,
        );

        let listener = TcpListener::bind(&self.config.api.bind_address)
            .await
            .with_context(|| format!("绑定地址失败: {}", self.config.api.bind_address))?;

        info!("API服务器启动在 http://{}", self.config.api.bind_address);

        let mut shutdown_rx = shutdown.subscribe();
        Ok(tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("API服务器收到关闭信号");
            });
            if let Err(e) = server.await {
                error!("API服务器运行失败: {}", e);
            }
        }))
    }
}
