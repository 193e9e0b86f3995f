use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use crate::events::{EventDispatcher, Subscription};
use crate::rpc::Aria2Api;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connected { version: String },
    Disconnected { reason: String },
}

/// 守护进程连接状态机
///
/// 初始为 `Disconnected`，只在探测成功后进入 `Connected`。
/// 状态通知是边沿触发的：重复的相同状态不会再次通知订阅者。
pub struct ConnectionMonitor {
    connected: AtomicBool,
    events: EventDispatcher<ConnectionEvent>,
}

impl Default for ConnectionMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionMonitor {
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(false),
            events: EventDispatcher::new("连接状态"),
        }
    }

    pub fn state(&self) -> ConnectionState {
        if self.is_connected() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&ConnectionEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.events.subscribe(handler)
    }

    /// 用 aria2.getVersion 探测守护进程，错误只会转成状态变化
    pub async fn probe(&self, api: &Aria2Api) -> bool {
        match api.get_version().await {
            Ok(info) => {
                self.record_success(&info.version);
                true
            }
            Err(e) => {
                self.record_failure(&e.to_string());
                false
            }
        }
    }

    pub fn record_success(&self, version: &str) -> Option<ConnectionEvent> {
        if self.connected.swap(true, Ordering::SeqCst) {
            return None;
        }
        info!("✅ 下载守护进程连接成功 (aria2 {})", version);
        let event = ConnectionEvent::Connected {
            version: version.to_string(),
        };
        self.events.publish(&event);
        Some(event)
    }

    pub fn record_failure(&self, reason: &str) -> Option<ConnectionEvent> {
        if !self.connected.swap(false, Ordering::SeqCst) {
            debug!("守护进程仍不可用: {}", reason);
            return None;
        }
        warn!("❌ 下载守护进程连接断开: {}", reason);
        let event = ConnectionEvent::Disconnected {
            reason: reason.to_string(),
        };
        self.events.publish(&event);
        Some(event)
    }
}
