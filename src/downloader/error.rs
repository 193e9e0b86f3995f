use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

use crate::rpc::RpcError;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskError {
    #[error("无法访问下载守护进程: {0}")]
    Transport(String),

    #[error("守护进程返回错误 {code}: {message}")]
    Protocol { code: i64, message: String },

    #[error("未连接到下载守护进程: {0}")]
    NotConnected(String),

    #[error("任务未找到: {0}")]
    TaskNotFound(String),

    #[error("任务已存在: {0}")]
    TaskAlreadyExists(String),

    #[error("无效的URL: {0}")]
    InvalidUrl(String),
}

impl TaskError {
    /// 把 RPC 错误归类到任务错误
    ///
    /// `connected` 是发起调用前的连接状态：断线期间的传输错误报告为 `NotConnected`。
    pub fn from_rpc(err: RpcError, connected: bool) -> Self {
        lazy_static! {
            static ref GID_NOT_FOUND: Regex =
                Regex::new(r"(?i)GID\s+(\S+)\s+is\s+not\s+found").unwrap();
        }

        match err {
            RpcError::Transport(msg) if !connected => TaskError::NotConnected(msg),
            RpcError::Transport(msg) => TaskError::Transport(msg),
            RpcError::Protocol { code, message } => match GID_NOT_FOUND.captures(&message) {
                Some(caps) => TaskError::TaskNotFound(caps[1].to_string()),
                None => TaskError::Protocol { code, message },
            },
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, TaskError::Transport(_) | TaskError::NotConnected(_))
    }
}
