use std::fmt;

use serde::{Deserialize, Serialize};

use crate::rpc::models::{StatusResponse, parse_number};

/// 守护进程没有报告文件路径时的显示名
pub const UNKNOWN_FILE_NAME: &str = "未知文件";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Active,
    Paused,
    Complete,
    Error,
    Removed,
}

impl TaskStatus {
    /// 解析 aria2 的状态字符串，`waiting` 视为 pending
    pub fn from_daemon(status: &str) -> Option<Self> {
        match status {
            "waiting" | "pending" => Some(TaskStatus::Pending),
            "active" => Some(TaskStatus::Active),
            "paused" => Some(TaskStatus::Paused),
            "complete" => Some(TaskStatus::Complete),
            "error" => Some(TaskStatus::Error),
            "removed" => Some(TaskStatus::Removed),
            _ => None,
        }
    }

    // 观察到这两种状态后任务退出跟踪
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Complete | TaskStatus::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Active => "active",
            TaskStatus::Paused => "paused",
            TaskStatus::Complete => "complete",
            TaskStatus::Error => "error",
            TaskStatus::Removed => "removed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `round(100 * completed / total)`，总大小未知时为 0
pub fn progress_percent(completed: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let completed = completed.min(total);
    ((completed as f64 / total as f64) * 100.0).round() as u8
}

/// 取路径最后一段作为显示名
pub fn display_name_from_path(path: &str) -> Option<String> {
    path.rsplit(|c| c == '/' || c == '\\')
        .next()
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

/// 一次 tellStatus 带回来的字段，缺失的字段为 `None`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusUpdate {
    pub status: Option<TaskStatus>,
    pub total_bytes: Option<u64>,
    pub completed_bytes: Option<u64>,
    pub transfer_rate: Option<u64>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub file_name: Option<String>,
}

impl From<&StatusResponse> for StatusUpdate {
    fn from(resp: &StatusResponse) -> Self {
        Self {
            status: resp.status.as_deref().and_then(TaskStatus::from_daemon),
            total_bytes: parse_number(resp.total_length.as_deref()),
            completed_bytes: parse_number(resp.completed_length.as_deref()),
            transfer_rate: parse_number(resp.download_speed.as_deref()),
            error_code: resp.error_code.clone(),
            error_message: resp.error_message.clone(),
            file_name: resp
                .files
                .first()
                .and_then(|f| display_name_from_path(&f.path)),
        }
    }
}

impl StatusUpdate {
    // errorCode 为 "0" 或缺失表示没有错误
    fn reported_error(&self) -> Option<String> {
        match self.error_code.as_deref() {
            None | Some("0") | Some("") => None,
            Some(code) => Some(
                self.error_message
                    .clone()
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| format!("下载失败，错误码 {}", code)),
            ),
        }
    }
}

/// 本地缓存的一个下载任务
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    pub source_url: String,
    pub save_path: String,
    /// 提交时指定的文件名，之后不再改变
    pub file_name: Option<String>,
    /// 守护进程报告的文件名，`file_name` 为空时用于显示
    pub reported_name: Option<String>,
    pub status: TaskStatus,
    pub progress_percent: u8,
    pub total_bytes: u64,
    pub completed_bytes: u64,
    pub transfer_rate: u64,
    pub last_error: Option<String>,
}

impl Task {
    pub fn new(
        id: impl Into<String>,
        source_url: impl Into<String>,
        save_path: impl Into<String>,
        file_name: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source_url: source_url.into(),
            save_path: save_path.into(),
            file_name,
            reported_name: None,
            status: TaskStatus::Pending,
            progress_percent: 0,
            total_bytes: 0,
            completed_bytes: 0,
            transfer_rate: 0,
            last_error: None,
        }
    }

    /// 按字段覆盖合并，更新里没有的字段保持原值
    pub fn merge(&mut self, update: &StatusUpdate) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(total) = update.total_bytes {
            self.total_bytes = total;
        }
        if let Some(completed) = update.completed_bytes {
            self.completed_bytes = completed;
        }
        if let Some(rate) = update.transfer_rate {
            self.transfer_rate = rate;
        }
        if update.error_code.is_some() {
            self.last_error = update.reported_error();
        }
        if update.file_name.is_some() {
            self.reported_name = update.file_name.clone();
        }

        if self.total_bytes > 0 {
            self.completed_bytes = self.completed_bytes.min(self.total_bytes);
        }
        self.progress_percent = progress_percent(self.completed_bytes, self.total_bytes);

        // lastError 只在 error 状态下存在
        if self.status != TaskStatus::Error {
            self.last_error = None;
        }
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            id: self.id.clone(),
            status: self.status,
            progress_percent: self.progress_percent,
            total_bytes: self.total_bytes,
            completed_bytes: self.completed_bytes,
            transfer_rate: self.transfer_rate,
            last_error: self.last_error.clone(),
            file_name: self.file_name.clone().or_else(|| self.reported_name.clone()),
        }
    }
}

/// 对外暴露的任务状态副本
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TaskSnapshot {
    pub id: String,
    pub status: TaskStatus,
    pub progress_percent: u8,
    pub total_bytes: u64,
    pub completed_bytes: u64,
    pub transfer_rate: u64,
    pub last_error: Option<String>,
    pub file_name: Option<String>,
}

impl TaskSnapshot {
    /// 直接从守护进程的返回构造（不经过本地注册表）
    pub fn from_status(resp: &StatusResponse) -> Self {
        let mut task = Task::new(resp.gid.clone().unwrap_or_default(), "", "", None);
        task.merge(&StatusUpdate::from(resp));
        task.snapshot()
    }

    pub fn display_name(&self) -> &str {
        self.file_name.as_deref().unwrap_or(UNKNOWN_FILE_NAME)
    }
}

/// 一次对账中某个任务的状态变化
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskEvent {
    pub task_id: String,
    pub snapshot: TaskSnapshot,
    /// 对账轮次，同一任务的事件按轮次非递减
    pub sequence: u64,
}
