pub mod aria2;
pub mod client;
pub mod error;
pub mod models;

pub use aria2::Aria2Api;
pub use client::{Aria2Client, RpcTransport};
pub use error::{RpcError, RpcErrorKind};
