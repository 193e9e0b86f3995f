pub mod common;
pub mod downloader;
pub mod events;
pub mod monitor;
pub mod rpc;

pub use downloader::error::TaskError;
pub use downloader::task::{TaskEvent, TaskSnapshot, TaskStatus};
pub use downloader::{MonitorHandle, Orchestrator, SubmitRequest, TickOutcome};
pub use monitor::{ConnectionEvent, ConnectionState};
pub use rpc::{RpcError, RpcTransport};
