use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:16800/jsonrpc";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件失败: {0}")]
    Io(#[from] std::io::Error),

    #[error("配置文件格式错误: {0}")]
    Json(#[from] serde_json::Error),

    #[error("无效的RPC地址: {0}")]
    InvalidUrl(String),

    #[error("无效的配置项 {0}: {1}")]
    InvalidValue(&'static str, String),
}

/// 编排器配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// aria2 JSON-RPC 地址
    pub rpc_url: String,
    /// `--rpc-secret`，为空时不发送 token
    pub secret: Option<String>,
    pub poll_interval_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            secret: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl OrchestratorConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!("加载配置文件: {}", path.display());
        let data = std::fs::read(path)?;
        let config: Self = serde_json::from_slice(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = url::Url::parse(&self.rpc_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{} ({})", self.rpc_url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl(format!(
                "{} (只支持 http/https)",
                self.rpc_url
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "poll_interval_ms",
                "必须大于 0".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "request_timeout_secs",
                "必须大于 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_local_daemon() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.rpc_url, "http://127.0.0.1:16800/jsonrpc");
        assert_eq!(config.poll_interval(), Duration::from_secs(2));
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: OrchestratorConfig =
            serde_json::from_str(r#"{"secret": "s3cret", "poll_interval_ms": 500}"#).unwrap();
        assert_eq!(config.secret.as_deref(), Some("s3cret"));
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.rpc_url, DEFAULT_RPC_URL);
    }

    #[test]
    fn rejects_bad_values() {
        let config = OrchestratorConfig {
            rpc_url: "ws://127.0.0.1:16800/jsonrpc".into(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidUrl(_))));

        let config = OrchestratorConfig {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue("poll_interval_ms", _))
        ));
    }
}
