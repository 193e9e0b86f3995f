use thiserror::Error;

/// JSON-RPC 调用失败的统一类型
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RpcError {
    #[error("无法访问下载守护进程: {0}")]
    Transport(String),

    #[error("RPC 错误 {code}: {message}")]
    Protocol { code: i64, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcErrorKind {
    Transport,
    Protocol,
}

impl RpcError {
    pub fn kind(&self) -> RpcErrorKind {
        match self {
            RpcError::Transport(_) => RpcErrorKind::Transport,
            RpcError::Protocol { .. } => RpcErrorKind::Protocol,
        }
    }

    pub fn is_transport(&self) -> bool {
        self.kind() == RpcErrorKind::Transport
    }
}

impl From<reqwest::Error> for RpcError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RpcError::Transport(format!("请求超时: {}", e))
        } else {
            RpcError::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for RpcError {
    fn from(e: serde_json::Error) -> Self {
        RpcError::Transport(format!("响应解析失败: {}", e))
    }
}
