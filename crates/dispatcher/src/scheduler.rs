//! 周期任务驱动
//!
//! 重试扫描与回调提醒按 CRON 表达式触发，作业执行与邮件发送按固定间隔轮询。
//! 所有循环都监听关闭广播。

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use followup_config::SweepConfig;
use followup_errors::FollowupResult;
use followup_infrastructure::notifications::OutboxDispatcher;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::callback_service::CallbackService;
use crate::cron_utils::CronScheduler;
use crate::deferred_jobs::DeferredJobRunner;
use crate::retry_service::RetryService;

/// 可被周期驱动的一次执行
#[async_trait]
pub trait PeriodicJob: Send + Sync {
    fn name(&self) -> &'static str;
    async fn run_once(&self) -> FollowupResult<()>;
}

pub struct RetrySweepJob(pub Arc<dyn RetryService>);

#[async_trait]
impl PeriodicJob for RetrySweepJob {
    fn name(&self) -> &'static str {
        "retry_sweep"
    }

    async fn run_once(&self) -> FollowupResult<()> {
        self.0.scan_and_process_due_retries().await.map(|_| ())
    }
}

pub struct CallbackSweepJob(pub Arc<CallbackService>);

#[async_trait]
impl PeriodicJob for CallbackSweepJob {
    fn name(&self) -> &'static str {
        "callback_sweep"
    }

    async fn run_once(&self) -> FollowupResult<()> {
        self.0.notify_upcoming_callbacks().await.map(|_| ())
    }
}

pub struct DeferredJobPoll(pub Arc<DeferredJobRunner>);

#[async_trait]
impl PeriodicJob for DeferredJobPoll {
    fn name(&self) -> &'static str {
        "deferred_jobs"
    }

    async fn run_once(&self) -> FollowupResult<()> {
        self.0.run_due_jobs().await.map(|_| ())
    }
}

pub struct EmailFlushJob {
    pub dispatcher: Arc<OutboxDispatcher>,
    pub batch_size: usize,
}

#[async_trait]
impl PeriodicJob for EmailFlushJob {
    fn name(&self) -> &'static str {
        "email_flush"
    }

    async fn run_once(&self) -> FollowupResult<()> {
        self.dispatcher
            .flush_due_emails(self.batch_size)
            .await
            .map(|_| ())
    }
}

async fn run_logged(job: &dyn PeriodicJob) {
    let started = Instant::now();
    match job.run_once().await {
        Ok(()) => debug!(
            job = job.name(),
            duration_ms = started.elapsed().as_millis() as u64,
            "周期任务执行完成"
        ),
        Err(e) => error!(job = job.name(), error = %e, "周期任务执行失败"),
    }
}

/// 按 CRON 表达式触发，直到收到关闭信号
pub async fn run_cron_loop(
    job: Arc<dyn PeriodicJob>,
    cron: CronScheduler,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    info!(job = job.name(), cron = cron.expression(), "CRON 循环已启动");
    loop {
        let Some(wait) = cron.time_until_next_execution(Utc::now()) else {
            info!(job = job.name(), "CRON 表达式没有后续触发时间，循环结束");
            return;
        };

        tokio::select! {
            _ = tokio::time::sleep(wait) => run_logged(job.as_ref()).await,
            _ = shutdown_rx.recv() => {
                info!(job = job.name(), "CRON 循环收到关闭信号");
                return;
            }
        }
    }
}

/// 固定间隔轮询，直到收到关闭信号
pub async fn run_interval_loop(
    job: Arc<dyn PeriodicJob>,
    period: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    info!(job = job.name(), period_secs = period.as_secs(), "轮询循环已启动");

    loop {
        tokio::select! {
            _ = interval.tick() => run_logged(job.as_ref()).await,
            _ = shutdown_rx.recv() => {
                info!(job = job.name(), "轮询循环收到关闭信号");
                return;
            }
        }
    }
}

/// 后台调度器：启动四个周期循环
pub struct SweepScheduler {
    retry_sweep: CronScheduler,
    callback_sweep: CronScheduler,
    config: SweepConfig,
}

impl SweepScheduler {
    pub fn new(config: &SweepConfig) -> FollowupResult<Self> {
        Ok(Self {
            retry_sweep: CronScheduler::new(&config.retry_cron)?,
            callback_sweep: CronScheduler::new(&config.callback_cron)?,
            config: config.clone(),
        })
    }

    pub fn spawn(
        self,
        retry: Arc<dyn RetryService>,
        callbacks: Arc<CallbackService>,
        jobs: Arc<DeferredJobRunner>,
        outbox: Arc<OutboxDispatcher>,
        shutdown_tx: &broadcast::Sender<()>,
    ) -> Vec<JoinHandle<()>> {
        vec![
            tokio::spawn(run_cron_loop(
                Arc::new(RetrySweepJob(retry)),
                self.retry_sweep,
                shutdown_tx.subscribe(),
            )),
            tokio::spawn(run_cron_loop(
                Arc::new(CallbackSweepJob(callbacks)),
                self.callback_sweep,
                shutdown_tx.subscribe(),
            )),
            tokio::spawn(run_interval_loop(
                Arc::new(DeferredJobPoll(jobs)),
                Duration::from_secs(self.config.job_poll_interval_seconds),
                shutdown_tx.subscribe(),
            )),
            tokio::spawn(run_interval_loop(
                Arc::new(EmailFlushJob {
                    dispatcher: outbox,
                    batch_size: self.config.email_batch_size,
                }),
                Duration::from_secs(self.config.email_flush_interval_seconds),
                shutdown_tx.subscribe(),
            )),
        ]
    }
}
