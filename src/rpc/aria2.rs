use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

use super::client::RpcTransport;
use super::error::RpcError;
use super::models::{StatusResponse, VersionInfo};

pub const GET_VERSION: &str = "aria2.getVersion";
pub const ADD_URI: &str = "aria2.addUri";
pub const TELL_STATUS: &str = "aria2.tellStatus";
pub const PAUSE: &str = "aria2.pause";
pub const UNPAUSE: &str = "aria2.unpause";
pub const REMOVE: &str = "aria2.remove";
pub const TELL_ACTIVE: &str = "aria2.tellActive";

/// aria2 RPC 方法的类型化封装
#[derive(Clone)]
pub struct Aria2Api {
    transport: Arc<dyn RpcTransport>,
}

impl Aria2Api {
    pub fn new(transport: Arc<dyn RpcTransport>) -> Self {
        Self { transport }
    }

    async fn call_typed<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, RpcError> {
        let result = self.transport.call(method, params).await?;
        Ok(serde_json::from_value(result)?)
    }

    // 探活用，无副作用
    pub async fn get_version(&self) -> Result<VersionInfo, RpcError> {
        self.call_typed(GET_VERSION, vec![]).await
    }

    /// 提交下载，返回守护进程分配的 GID
    pub async fn add_uri(
        &self,
        uris: &[String],
        options: Map<String, Value>,
    ) -> Result<String, RpcError> {
        self.call_typed(ADD_URI, vec![json!(uris), Value::Object(options)])
            .await
    }

    pub async fn tell_status(&self, gid: &str) -> Result<StatusResponse, RpcError> {
        self.call_typed(TELL_STATUS, vec![json!(gid)]).await
    }

    pub async fn pause(&self, gid: &str) -> Result<String, RpcError> {
        self.call_typed(PAUSE, vec![json!(gid)]).await
    }

    pub async fn unpause(&self, gid: &str) -> Result<String, RpcError> {
        self.call_typed(UNPAUSE, vec![json!(gid)]).await
    }

    pub async fn remove(&self, gid: &str) -> Result<String, RpcError> {
        self.call_typed(REMOVE, vec![json!(gid)]).await
    }

    pub async fn tell_active(&self) -> Result<Vec<StatusResponse>, RpcError> {
        self.call_typed(TELL_ACTIVE, vec![]).await
    }
}
