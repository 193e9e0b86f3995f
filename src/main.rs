use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use aria2_orchestrator::common::config::OrchestratorConfig;
use aria2_orchestrator::common::format::{format_file_size, format_speed};
use aria2_orchestrator::common::logger::PrettyLogger;
use aria2_orchestrator::downloader::batch;
use aria2_orchestrator::{
    ConnectionEvent, Orchestrator, TaskError, TaskEvent, TaskSnapshot, TaskStatus, log_error,
    log_info, log_success, log_warning,
};

mod cli;

/// 进度条展示，每个任务一条
#[derive(Clone)]
struct ProgressView {
    multi: MultiProgress,
    bars: Arc<Mutex<HashMap<String, ProgressBar>>>,
}

impl ProgressView {
    fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn style() -> ProgressStyle {
        ProgressStyle::with_template(
            "{spinner:.green} {msg:30} [{bar:40.cyan/blue}] {bytes}/{total_bytes} {prefix}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-")
    }

    fn update(&self, event: &TaskEvent) -> Result<()> {
        let snapshot = &event.snapshot;
        let mut bars = self
            .bars
            .lock()
            .map_err(|_| anyhow::anyhow!("进度条状态被破坏"))?;

        let bar = bars.entry(event.task_id.clone()).or_insert_with(|| {
            let pb = self.multi.add(ProgressBar::new(snapshot.total_bytes));
            pb.set_style(Self::style());
            pb
        });

        bar.set_message(snapshot.display_name().to_string());
        bar.set_length(snapshot.total_bytes);
        bar.set_position(snapshot.completed_bytes);
        bar.set_prefix(format_speed(snapshot.transfer_rate));

        match snapshot.status {
            TaskStatus::Complete => {
                bar.finish_with_message(format!("{} ✓", snapshot.display_name()));
                bars.remove(&event.task_id);
            }
            TaskStatus::Error => {
                let reason = snapshot.last_error.as_deref().unwrap_or("未知错误");
                bar.abandon_with_message(format!("{} ✗ {}", snapshot.display_name(), reason));
                bars.remove(&event.task_id);
            }
            _ => {}
        }
        Ok(())
    }

    fn println(&self, line: impl AsRef<str>) {
        if self.multi.println(line.as_ref()).is_err() {
            println!("{}", line.as_ref());
        }
    }
}

fn print_task_list(tasks: &[TaskSnapshot]) {
    if tasks.is_empty() {
        log_info!("当前没有活跃任务");
        return;
    }
    PrettyLogger::title(format!("活跃任务 ({})", tasks.len()));
    for task in tasks {
        PrettyLogger::task_line(task);
        println!("    {}", task.id.bright_black());
    }
    PrettyLogger::separator();
}

async fn connect(config: &OrchestratorConfig) -> Result<Arc<Orchestrator>> {
    let orchestrator =
        Orchestrator::from_config(config).context("初始化 RPC 客户端失败")?;
    let orchestrator = Arc::new(orchestrator);
    if !orchestrator.probe().await {
        log_warning!("暂时无法连接到 {}，操作仍会尝试发送", config.rpc_url);
    }
    Ok(orchestrator)
}

/// 运行监控循环直到所有任务结束或收到 Ctrl-C
async fn watch(orchestrator: Arc<Orchestrator>, config: &OrchestratorConfig) -> Result<()> {
    let view = ProgressView::new();

    let task_view = view.clone();
    let task_sub = orchestrator.subscribe_tasks(move |event| task_view.update(event));

    let conn_view = view.clone();
    let conn_sub = orchestrator.subscribe_connection(move |event| {
        match event {
            ConnectionEvent::Connected { version } => {
                conn_view.println(format!("{} aria2 {}", "🔗 已连接".green().bold(), version))
            }
            ConnectionEvent::Disconnected { reason } => {
                conn_view.println(format!("{} {}", "⛔ 连接断开".red().bold(), reason))
            }
        }
        Ok(())
    });

    let Some(handle) = orchestrator.start(config.poll_interval()) else {
        anyhow::bail!("状态监控已在运行");
    };

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("收到 Ctrl-C，停止监控");
                break;
            }
            _ = tokio::time::sleep(config.poll_interval()) => {}
        }
        if orchestrator.tasks().await.is_empty() {
            debug!("没有需要跟踪的任务");
            break;
        }
    }

    handle.stop().await;
    task_sub.unsubscribe();
    conn_sub.unsubscribe();
    Ok(())
}

fn report_task_error(action: &str, err: &TaskError) {
    match err {
        TaskError::NotConnected(_) => log_error!("{}失败: 下载守护进程未运行 ({})", action, err),
        TaskError::TaskNotFound(gid) => log_error!("{}失败: 守护进程中没有任务 {}", action, gid),
        _ => log_error!("{}失败: {}", action, err),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    // 初始化日志
    tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    let config = args.load_config()?;
    debug!("使用配置: {:?}", config);

    let orchestrator = connect(&config).await?;

    match args.command {
        cli::Command::Version => {
            let info = orchestrator
                .api()
                .get_version()
                .await
                .with_context(|| format!("无法连接到 {}", config.rpc_url))?;
            PrettyLogger::connection(true, format!("aria2 {}", info.version));
            if !info.enabled_features.is_empty() {
                log_info!("已启用特性: {}", info.enabled_features.join(", "));
            }
        }
        cli::Command::Add {
            url,
            dir,
            out,
            watch: follow,
        } => {
            let dir = dir.to_string_lossy().to_string();
            match orchestrator.submit(&url, &dir, out.as_deref()).await {
                Ok(gid) => {
                    log_success!("已添加下载任务: {}", gid);
                    if follow {
                        watch(Arc::clone(&orchestrator), &config).await?;
                    }
                }
                Err(e) => {
                    report_task_error("添加任务", &e);
                    return Err(e.into());
                }
            }
        }
        cli::Command::Pause { gid } => {
            orchestrator.pause(&gid).await.inspect_err(|e| report_task_error("暂停任务", e))?;
            log_success!("任务已暂停: {}", gid);
        }
        cli::Command::Resume { gid } => {
            orchestrator.resume(&gid).await.inspect_err(|e| report_task_error("继续任务", e))?;
            log_success!("任务已继续: {}", gid);
        }
        cli::Command::Remove { gid } => {
            orchestrator.remove(&gid).await.inspect_err(|e| report_task_error("删除任务", e))?;
            log_success!("任务已删除: {}", gid);
        }
        cli::Command::Active => {
            let tasks = orchestrator
                .list_active()
                .await
                .inspect_err(|e| report_task_error("获取活跃任务", e))?;
            print_task_list(&tasks);
            let total_speed: u64 = tasks.iter().map(|t| t.transfer_rate).sum();
            let remaining: u64 = tasks
                .iter()
                .map(|t| t.total_bytes.saturating_sub(t.completed_bytes))
                .sum();
            log_info!(
                "总速度 {}，剩余 {}",
                format_speed(total_speed),
                format_file_size(remaining)
            );
        }
        cli::Command::Batch {
            file,
            dir,
            concurrency,
        } => {
            let resources = batch::load_resources(&file)
                .await
                .with_context(|| format!("加载资源文件失败: {}", file.display()))?;
            if resources.is_empty() {
                log_warning!("资源文件中没有任何条目");
                return Ok(());
            }

            let report = batch::submit_batch(&orchestrator, resources, &dir, concurrency)
                .await
                .inspect_err(|e| report_task_error("批量添加", e))?;

            log_success!("成功添加 {} / {} 个下载任务", report.succeeded.len(), report.total());
            if !report.failed.is_empty() {
                PrettyLogger::title("失败的任务");
                for failure in &report.failed {
                    log_error!("{}: {}", failure.resource.title, failure.error);
                }
            }
        }
        cli::Command::Watch { gids } => {
            let gids = if gids.is_empty() {
                orchestrator
                    .list_active()
                    .await
                    .inspect_err(|e| report_task_error("获取活跃任务", e))?
                    .into_iter()
                    .map(|t| t.id)
                    .collect()
            } else {
                gids
            };

            for gid in &gids {
                if let Err(e) = orchestrator.track(gid).await {
                    warn!("无法跟踪任务 {}: {}", gid, e);
                }
            }

            if orchestrator.tasks().await.is_empty() {
                log_info!("没有需要跟踪的任务");
                return Ok(());
            }
            watch(Arc::clone(&orchestrator), &config).await?;
            log_success!("所有任务已结束");
        }
    }

    Ok(())
}

