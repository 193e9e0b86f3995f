use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::common::config::OrchestratorConfig;
use crate::events::{EventDispatcher, Subscription};
use crate::monitor::{ConnectionEvent, ConnectionMonitor, ConnectionState};
use crate::rpc::{Aria2Api, Aria2Client, RpcError, RpcTransport};

use error::TaskError;
use registry::TaskRegistry;
use task::{StatusUpdate, Task, TaskEvent, TaskSnapshot};

pub mod batch;
pub mod error;
pub mod registry;
pub mod task;

/// 一次提交的参数
#[derive(Debug, Clone, Default)]
pub struct SubmitRequest {
    pub source_url: String,
    pub save_path: String,
    pub file_name: Option<String>,
    /// 额外的 aria2 选项，例如 `split`、`max-connection-per-server`
    pub options: Map<String, Value>,
}

impl SubmitRequest {
    pub fn new(source_url: impl Into<String>, save_path: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            save_path: save_path.into(),
            ..Default::default()
        }
    }

    pub fn file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn option(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.options.insert(key.to_string(), value.into());
        self
    }

    fn daemon_options(&self) -> Map<String, Value> {
        let mut options = self.options.clone();
        options.insert("dir".to_string(), Value::String(self.save_path.clone()));
        if let Some(name) = &self.file_name {
            options.insert("out".to_string(), Value::String(name.clone()));
        }
        options
    }
}

/// 一次定时 tick 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// 守护进程不可用，本轮没有对账
    Disconnected,
    /// 已连接并完成一轮对账，`events` 为发布的事件数
    Reconciled { events: usize },
    /// 监控已停止，迟到的结果被丢弃
    Cancelled,
}

// 下载任务编排器：持有注册表和连接状态，所有修改都经过这里
pub struct Orchestrator {
    api: Aria2Api,
    registry: Mutex<TaskRegistry>,
    monitor: ConnectionMonitor,
    task_events: EventDispatcher<TaskEvent>,
    pass_seq: AtomicU64,
    running: AtomicBool,
}

impl Orchestrator {
    pub fn new(transport: Arc<dyn RpcTransport>) -> Self {
        Self {
            api: Aria2Api::new(transport),
            registry: Mutex::new(TaskRegistry::new()),
            monitor: ConnectionMonitor::new(),
            task_events: EventDispatcher::new("任务状态"),
            pass_seq: AtomicU64::new(0),
            running: AtomicBool::new(false),
        }
    }

    pub fn from_config(config: &OrchestratorConfig) -> Result<Self, RpcError> {
        let client = Aria2Client::new(
            config.rpc_url.clone(),
            config.secret.clone(),
            config.request_timeout(),
        )?;
        Ok(Self::new(Arc::new(client)))
    }

    pub fn api(&self) -> &Aria2Api {
        &self.api
    }

    pub fn is_connected(&self) -> bool {
        self.monitor.is_connected()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.monitor.state()
    }

    pub fn subscribe_tasks<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&TaskEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.task_events.subscribe(handler)
    }

    pub fn subscribe_connection<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&ConnectionEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.monitor.subscribe(handler)
    }

    // ---------------------------------------------------------------- 查询

    pub async fn task(&self, task_id: &str) -> Option<TaskSnapshot> {
        self.registry.lock().await.get(task_id).map(Task::snapshot)
    }

    /// 当前跟踪的全部任务，按提交顺序
    pub async fn tasks(&self) -> Vec<TaskSnapshot> {
        self.registry.lock().await.snapshots()
    }

    // ---------------------------------------------------------------- 控制

    pub async fn submit(
        &self,
        source_url: &str,
        save_path: &str,
        file_name: Option<&str>,
    ) -> Result<String, TaskError> {
        let mut request = SubmitRequest::new(source_url, save_path);
        request.file_name = file_name.map(str::to_string);
        self.submit_with(request).await
    }

    pub async fn submit_with(&self, request: SubmitRequest) -> Result<String, TaskError> {
        url::Url::parse(&request.source_url)
            .map_err(|e| TaskError::InvalidUrl(format!("{} ({})", request.source_url, e)))?;

        let connected = self.is_connected();
        let task_id = self
            .api
            .add_uri(
                std::slice::from_ref(&request.source_url),
                request.daemon_options(),
            )
            .await
            .map_err(|e| self.control_error("添加下载任务", e, connected))?;

        let task = Task::new(
            task_id.clone(),
            request.source_url,
            request.save_path,
            request.file_name,
        );
        self.registry.lock().await.insert(task)?;

        info!("✅ 下载任务已添加: {}", task_id);
        Ok(task_id)
    }

    pub async fn pause(&self, task_id: &str) -> Result<(), TaskError> {
        let connected = self.is_connected();
        self.api
            .pause(task_id)
            .await
            .map_err(|e| self.control_error("暂停任务", e, connected))?;
        info!("⏸️ 任务已暂停: {}", task_id);
        Ok(())
    }

    pub async fn resume(&self, task_id: &str) -> Result<(), TaskError> {
        let connected = self.is_connected();
        self.api
            .unpause(task_id)
            .await
            .map_err(|e| self.control_error("继续任务", e, connected))?;
        info!("▶️ 任务已继续: {}", task_id);
        Ok(())
    }

    /// 删除任务：本地条目立即移除，RPC 失败时不回滚，但错误仍返回给调用方
    pub async fn remove(&self, task_id: &str) -> Result<(), TaskError> {
        if self.registry.lock().await.remove(task_id).is_some() {
            debug!("已从本地注册表移除: {}", task_id);
        }

        let connected = self.is_connected();
        self.api
            .remove(task_id)
            .await
            .map_err(|e| self.control_error("删除任务", e, connected))?;
        info!("🗑️ 任务已删除: {}", task_id);
        Ok(())
    }

    fn control_error(&self, action: &str, err: RpcError, connected: bool) -> TaskError {
        if err.is_transport() {
            self.monitor.record_failure(&err.to_string());
        }
        let err = TaskError::from_rpc(err, connected);
        error!("❌ {}失败: {}", action, err);
        err
    }

    // ---------------------------------------------------------------- 对账

    /// 查询单个任务的最新状态并合并进注册表
    pub async fn refresh_one(&self, task_id: &str) -> Result<TaskSnapshot, TaskError> {
        let connected = self.is_connected();
        let resp = self.api.tell_status(task_id).await.map_err(|e| {
            if e.is_transport() {
                self.monitor.record_failure(&e.to_string());
            }
            TaskError::from_rpc(e, connected)
        })?;
        Ok(self.merge_status(task_id, &(&resp).into()).await.0)
    }

    // 返回值第二项表示任务是否仍在注册表中
    async fn merge_status(&self, task_id: &str, update: &StatusUpdate) -> (TaskSnapshot, bool) {
        let merged = self.registry.lock().await.merge(task_id, update);
        match merged {
            Some(snapshot) => (snapshot, true),
            None => {
                let mut detached = Task::new(task_id, "", "", None);
                detached.merge(update);
                (detached.snapshot(), false)
            }
        }
    }

    /// 刷新所有已注册任务，返回发布的事件数
    pub async fn reconcile_all(&self) -> usize {
        self.reconcile_pass(&CancellationToken::new()).await
    }

    async fn reconcile_pass(&self, cancel: &CancellationToken) -> usize {
        let sequence = self.pass_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let ids = self.registry.lock().await.ids();
        let mut published = 0;

        for task_id in ids {
            let result = self.api.tell_status(&task_id).await;
            if cancel.is_cancelled() {
                debug!("监控已停止，丢弃任务{}的状态", task_id);
                break;
            }

            let resp = match result {
                Ok(resp) => resp,
                Err(e) if e.is_transport() => {
                    // 断线后不再轮询剩余任务，也不再发布事件
                    self.monitor.record_failure(&e.to_string());
                    warn!("更新任务{}状态失败，本轮对账中止: {}", task_id, e);
                    break;
                }
                Err(e) => {
                    warn!("更新任务{}状态失败: {}", task_id, e);
                    continue;
                }
            };

            let (snapshot, tracked) = self.merge_status(&task_id, &(&resp).into()).await;
            if !tracked {
                // 请求期间任务已被删除
                continue;
            }

            let terminal = snapshot.status.is_terminal();
            self.task_events.publish(&TaskEvent {
                task_id: task_id.clone(),
                snapshot,
                sequence,
            });
            published += 1;

            if terminal {
                if let Some(task) = self.registry.lock().await.remove(&task_id) {
                    info!("任务{}已结束 ({})，停止跟踪", task_id, task.status);
                }
            }
        }

        published
    }

    /// 把守护进程中已存在的任务（例如在本进程启动前创建的）纳入跟踪
    pub async fn track(&self, task_id: &str) -> Result<TaskSnapshot, TaskError> {
        let connected = self.is_connected();
        let resp = self
            .api
            .tell_status(task_id)
            .await
            .map_err(|e| self.control_error("跟踪任务", e, connected))?;

        let update = StatusUpdate::from(&resp);
        let source_url = resp
            .files
            .first()
            .and_then(|f| f.uris.first())
            .map(|u| u.uri.clone())
            .unwrap_or_default();
        let mut task = Task::new(task_id, source_url, resp.dir.clone().unwrap_or_default(), None);
        task.merge(&update);

        let snapshot = task.snapshot();
        self.registry.lock().await.insert(task)?;
        debug!("开始跟踪任务: {}", task_id);
        Ok(snapshot)
    }

    /// 直接向守护进程查询所有活跃任务，不经过本地注册表
    pub async fn list_active(&self) -> Result<Vec<TaskSnapshot>, TaskError> {
        let connected = self.is_connected();
        let active = self
            .api
            .tell_active()
            .await
            .map_err(|e| self.control_error("获取活跃任务", e, connected))?;

        Ok(active
            .iter()
            .map(TaskSnapshot::from_status)
            .collect())
    }

    // ---------------------------------------------------------------- 监控

    /// 探测一次守护进程，返回是否可用
    pub async fn probe(&self) -> bool {
        self.monitor.probe(&self.api).await
    }

    pub async fn tick(&self) -> TickOutcome {
        self.tick_with(&CancellationToken::new()).await
    }

    // 每个 tick 先探测，只有连接正常时才对账
    async fn tick_with(&self, cancel: &CancellationToken) -> TickOutcome {
        let probe = self.api.get_version().await;
        if cancel.is_cancelled() {
            return TickOutcome::Cancelled;
        }

        match probe {
            Ok(info) => {
                self.monitor.record_success(&info.version);
            }
            Err(e) => {
                self.monitor.record_failure(&e.to_string());
                return TickOutcome::Disconnected;
            }
        }

        let events = self.reconcile_pass(cancel).await;
        if cancel.is_cancelled() {
            return TickOutcome::Cancelled;
        }
        if !self.is_connected() {
            return TickOutcome::Disconnected;
        }
        TickOutcome::Reconciled { events }
    }

    /// 启动定时监控，已在运行时返回 `None`
    pub fn start(self: &Arc<Self>, interval: Duration) -> Option<MonitorHandle> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("状态监控已在运行");
            return None;
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let this = Arc::clone(self);

        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // 上一个 tick 没跑完之前不会开始下一个
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!("开始状态监控，间隔 {:?}", interval);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let outcome = this.tick_with(&token).await;
                debug!("监控 tick: {:?}", outcome);
                if outcome == TickOutcome::Cancelled {
                    break;
                }
            }

            this.running.store(false, Ordering::SeqCst);
            info!("状态监控已停止");
        });

        Some(MonitorHandle { cancel, join })
    }

    pub fn is_monitoring(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// 运行中的监控循环
#[derive(Debug)]
pub struct MonitorHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl MonitorHandle {
    /// 停止监控，等待当前 tick 结束
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.join.await {
            error!("状态监控任务异常退出: {}", e);
        }
    }
}
