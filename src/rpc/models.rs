use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC 2.0 请求信封
#[derive(Debug, Serialize)]
pub struct RpcRequest<'a> {
    pub id: i64,
    pub jsonrpc: &'static str,
    pub method: &'a str,
    pub params: Vec<Value>,
}

/// JSON-RPC 2.0 响应
#[derive(Debug, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub result: Option<Value>,

    #[serde(default)]
    pub error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
pub struct RpcErrorBody {
    #[serde(default)]
    pub code: i64,

    #[serde(default)]
    pub message: String,
}

/// aria2.getVersion 的返回
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    pub version: String,

    #[serde(default)]
    pub enabled_features: Vec<String>,
}

/// aria2.tellStatus / aria2.tellActive 中单个任务的状态
///
/// aria2 把所有数字都编码成十进制字符串，缺失的字段保持 `None`。
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    #[serde(default)]
    pub gid: Option<String>,

    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    pub total_length: Option<String>,

    #[serde(default)]
    pub completed_length: Option<String>,

    #[serde(default)]
    pub download_speed: Option<String>,

    #[serde(default)]
    pub error_code: Option<String>,

    #[serde(default)]
    pub error_message: Option<String>,

    #[serde(default)]
    pub dir: Option<String>,

    #[serde(default)]
    pub files: Vec<FileEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileEntry {
    #[serde(default)]
    pub path: String,

    #[serde(default)]
    pub uris: Vec<UriEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UriEntry {
    pub uri: String,
}

/// 宽松解析 aria2 的数字字符串，无法解析时按 0 处理
pub fn parse_number(value: Option<&str>) -> Option<u64> {
    value.map(|v| v.trim().parse::<u64>().unwrap_or(0))
}
