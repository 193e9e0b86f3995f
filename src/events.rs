use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tracing::{error, warn};

/// 事件处理函数，返回错误只会被记录，不会影响其他订阅者
pub type Handler<E> = Arc<dyn Fn(&E) -> anyhow::Result<()> + Send + Sync>;

struct Subscribers<E> {
    next_id: u64,
    handlers: Vec<(u64, Handler<E>)>,
}

fn lock<E>(subscribers: &Mutex<Subscribers<E>>) -> MutexGuard<'_, Subscribers<E>> {
    match subscribers.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// 编排器持有的观察者列表
///
/// 投递是同步的：`publish` 返回时所有订阅者都已经处理完毕。
/// 事件不会持久化，晚订阅的处理函数收不到之前发布的事件。
pub struct EventDispatcher<E> {
    name: &'static str,
    subscribers: Arc<Mutex<Subscribers<E>>>,
}

impl<E: 'static> EventDispatcher<E> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            subscribers: Arc::new(Mutex::new(Subscribers {
                next_id: 0,
                handlers: Vec::new(),
            })),
        }
    }

    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&E) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = {
            let mut subscribers = lock(&self.subscribers);
            let id = subscribers.next_id;
            subscribers.next_id += 1;
            subscribers.handlers.push((id, Arc::new(handler)));
            id
        };

        let weak: Weak<Mutex<Subscribers<E>>> = Arc::downgrade(&self.subscribers);
        Subscription {
            detach: Some(Box::new(move || {
                if let Some(subscribers) = weak.upgrade() {
                    lock(&subscribers).handlers.retain(|(hid, _)| *hid != id);
                }
            })),
        }
    }

    /// 把事件投递给当前所有订阅者，返回成功处理的订阅者数量
    pub fn publish(&self, event: &E) -> usize {
        // 先复制一份列表再调用，处理函数内部可以安全地订阅或退订
        let handlers: Vec<(u64, Handler<E>)> = lock(&self.subscribers).handlers.clone();

        let mut delivered = 0;
        for (id, handler) in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => warn!("{} 订阅者 #{} 处理事件失败: {:#}", self.name, id, e),
                Err(_) => error!("{} 订阅者 #{} 处理事件时 panic", self.name, id),
            }
        }
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).handlers.len()
    }
}

/// 退订凭证，丢弃它不会自动退订
pub struct Subscription {
    detach: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.detach.is_some())
            .finish()
    }
}
