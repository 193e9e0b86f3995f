use std::collections::HashMap;

use super::error::TaskError;
use super::task::{StatusUpdate, Task, TaskSnapshot};

/// 正在跟踪的任务，按插入顺序遍历
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: HashMap<String, Task>, // task_id -> Task
    order: Vec<String>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, task: Task) -> Result<(), TaskError> {
        if self.tasks.contains_key(&task.id) {
            return Err(TaskError::TaskAlreadyExists(task.id));
        }
        self.order.push(task.id.clone());
        self.tasks.insert(task.id.clone(), task);
        Ok(())
    }

    pub fn remove(&mut self, task_id: &str) -> Option<Task> {
        let task = self.tasks.remove(task_id)?;
        self.order.retain(|id| id != task_id);
        Some(task)
    }

    /// 合并守护进程返回的状态，任务不在注册表中时返回 `None`
    pub fn merge(&mut self, task_id: &str, update: &StatusUpdate) -> Option<TaskSnapshot> {
        let task = self.tasks.get_mut(task_id)?;
        task.merge(update);
        Some(task.snapshot())
    }

    pub fn get(&self, task_id: &str) -> Option<&Task> {
        self.tasks.get(task_id)
    }

    /// 当前任务 ID 的稳定副本，遍历期间新增的任务留到下一轮
    pub fn ids(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn snapshots(&self) -> Vec<TaskSnapshot> {
        self.order
            .iter()
            .filter_map(|id| self.tasks.get(id))
            .map(Task::snapshot)
            .collect()
    }
}
