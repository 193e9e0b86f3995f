use std::path::{Path, PathBuf};

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::error::TaskError;
use super::{Orchestrator, SubmitRequest};

const MAX_TITLE_CHARS: usize = 50;

/// 资源列表文件中的一项
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Resource {
    pub title: String,
    pub download_url: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub file_name: Option<String>,
}

#[derive(Debug)]
pub struct BatchSuccess {
    pub task_id: String,
    pub resource: Resource,
}

#[derive(Debug)]
pub struct BatchFailure {
    pub resource: Resource,
    pub error: TaskError,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: Vec<BatchSuccess>,
    pub failed: Vec<BatchFailure>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

/// 从 JSON 文件加载资源列表
pub async fn load_resources(path: impl AsRef<Path>) -> anyhow::Result<Vec<Resource>> {
    let path = path.as_ref();
    let data = tokio::fs::read(path).await?;
    let resources: Vec<Resource> = serde_json::from_slice(&data)?;
    info!("从 {} 加载了 {} 个资源", path.display(), resources.len());
    Ok(resources)
}

/// 清理标题作为文件名：只保留字母数字、空格、`-`、`_`，最多 50 个字符
pub fn safe_file_name(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    let truncated: String = cleaned.trim_end().chars().take(MAX_TITLE_CHARS).collect();
    truncated.trim_end().to_string()
}

fn request_for(resource: &Resource, base_dir: &Path) -> SubmitRequest {
    let dir: PathBuf = if resource.category.is_empty() {
        base_dir.to_path_buf()
    } else {
        base_dir.join(&resource.category)
    };
    let file_name = resource
        .file_name
        .clone()
        .unwrap_or_else(|| format!("{}.zip", safe_file_name(&resource.title)));

    SubmitRequest::new(resource.download_url.clone(), dir.to_string_lossy())
        .file_name(file_name)
        .option("max-connection-per-server", "16")
        .option("split", "16")
}

/// 批量提交下载任务，单个失败不会中断整个批次
pub async fn submit_batch(
    orchestrator: &Orchestrator,
    resources: Vec<Resource>,
    base_dir: &Path,
    concurrency: usize,
) -> Result<BatchReport, TaskError> {
    if !orchestrator.probe().await {
        error!("无法连接到下载守护进程，请确认它正在运行");
        return Err(TaskError::NotConnected(
            "批量提交前的连接检测失败".to_string(),
        ));
    }

    info!("开始批量添加 {} 个下载任务...", resources.len());

    let results: Vec<(Resource, Result<String, TaskError>)> =
        futures::stream::iter(resources.into_iter().map(|resource| async move {
            let request = request_for(&resource, base_dir);
            let result = orchestrator.submit_with(request).await;
            (resource, result)
        }))
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut report = BatchReport::default();
    for (resource, result) in results {
        match result {
            Ok(task_id) => {
                info!("✅ 已添加: {} -> {}", resource.title, task_id);
                report.succeeded.push(BatchSuccess { task_id, resource });
            }
            Err(error) => {
                warn!("❌ 添加失败: {} - {}", resource.title, error);
                report.failed.push(BatchFailure { resource, error });
            }
        }
    }

    info!(
        "📊 批量提交完成: 成功 {} 个，失败 {} 个",
        report.succeeded.len(),
        report.failed.len()
    );
    Ok(report)
}
