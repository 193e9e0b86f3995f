use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, ClientBuilder};
use serde_json::Value;
use tracing::debug;

use super::error::RpcError;
use super::models::{RpcRequest, RpcResponse};

/// 与下载守护进程通信的最小接口
///
/// 编排器只依赖这个 trait，测试里可以换成脚本化的假守护进程。
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError>;
}

// 基于 HTTP POST 的 aria2 JSON-RPC 客户端
#[derive(Debug)]
pub struct Aria2Client {
    inner: Client,
    rpc_url: String,
    secret: Option<String>,
    last_id: AtomicI64,
}

impl Aria2Client {
    pub fn new(
        rpc_url: impl Into<String>,
        secret: Option<String>,
        timeout: Duration,
    ) -> Result<Self, RpcError> {
        let inner = ClientBuilder::new()
            .timeout(timeout)
            .default_headers(Self::get_default_headers())
            .build()
            .map_err(|e| RpcError::Transport(format!("创建 HTTP 客户端失败: {}", e)))?;

        Ok(Self {
            inner,
            rpc_url: rpc_url.into(),
            secret: secret.filter(|s| !s.is_empty()),
            last_id: AtomicI64::new(0),
        })
    }

    pub fn get_default_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }

    // 请求 ID 取当前毫秒时间戳，同一毫秒内递增，保证单调
    fn next_id(&self) -> i64 {
        let now = chrono::Utc::now().timestamp_millis();
        let prev = self
            .last_id
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or(now);
        now.max(prev + 1)
    }

    /// 构造参数列表，配置了密钥时 `token:<secret>` 必须是第一个参数
    pub fn build_params(&self, params: Vec<Value>) -> Vec<Value> {
        match &self.secret {
            Some(secret) => {
                let mut with_token = Vec::with_capacity(params.len() + 1);
                with_token.push(Value::String(format!("token:{}", secret)));
                with_token.extend(params);
                with_token
            }
            None => params,
        }
    }

    async fn handle_response(resp: reqwest::Response) -> Result<Value, RpcError> {
        let status = resp.status();
        if !status.is_success() {
            return Err(RpcError::Transport(format!("HTTP {}", status)));
        }

        let raw_body = resp.bytes().await?;
        let body: RpcResponse = serde_json::from_slice(&raw_body)?;

        if let Some(err) = body.error {
            return Err(RpcError::Protocol {
                code: err.code,
                message: err.message,
            });
        }

        Ok(body.result.unwrap_or(Value::Null))
    }
}

#[async_trait]
impl RpcTransport for Aria2Client {
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        let request = RpcRequest {
            id: self.next_id(),
            jsonrpc: "2.0",
            method,
            params: self.build_params(params),
        };
        debug!("RPC 请求: {} (id={})", method, request.id);

        let resp = self
            .inner
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                debug!("RPC 调用失败: {} - {}", method, e);
                RpcError::from(e)
            })?;

        Self::handle_response(resp).await
    }
}
