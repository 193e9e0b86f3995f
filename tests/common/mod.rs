// Scripted in-process aria2 daemon for orchestrator tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{Value, json};

use aria2_orchestrator::rpc::aria2::{
    ADD_URI, GET_VERSION, PAUSE, REMOVE, TELL_ACTIVE, TELL_STATUS, UNPAUSE,
};
use aria2_orchestrator::{Orchestrator, RpcError, RpcTransport};

#[derive(Default)]
struct DaemonState {
    online: bool,
    next_gid: u64,
    tasks: HashMap<String, Value>, // gid -> tellStatus payload
    calls: Vec<(String, Vec<Value>)>,
    fail_next: Vec<String>, // methods whose next call fails at the transport level
}

pub struct ScriptedDaemon {
    state: Mutex<DaemonState>,
}

impl ScriptedDaemon {
    pub fn online() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(DaemonState {
                online: true,
                next_gid: 1,
                ..Default::default()
            }),
        })
    }

    pub fn offline() -> Arc<Self> {
        let daemon = Self::online();
        daemon.set_online(false);
        daemon
    }

    fn lock(&self) -> MutexGuard<'_, DaemonState> {
        self.state.lock().unwrap()
    }

    pub fn set_online(&self, online: bool) {
        self.lock().online = online;
    }

    /// Overwrite fields of a task's tellStatus payload.
    pub fn update_task(&self, gid: &str, fields: Value) {
        let mut state = self.lock();
        let task = state
            .tasks
            .entry(gid.to_string())
            .or_insert_with(|| waiting_task(gid));
        if let (Some(task), Some(fields)) = (task.as_object_mut(), fields.as_object()) {
            for (k, v) in fields {
                task.insert(k.clone(), v.clone());
            }
        }
    }

    /// Make the next call to `method` fail as if the connection dropped.
    pub fn fail_next_call(&self, method: &str) {
        self.lock().fail_next.push(method.to_string());
    }

    pub fn forget_task(&self, gid: &str) {
        self.lock().tasks.remove(gid);
    }

    pub fn calls_to(&self, method: &str) -> Vec<Vec<Value>> {
        self.lock()
            .calls
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, p)| p.clone())
            .collect()
    }

    pub fn orchestrator(self: &Arc<Self>) -> Arc<Orchestrator> {
        Arc::new(Orchestrator::new(Arc::clone(self) as Arc<dyn RpcTransport>))
    }
}

fn waiting_task(gid: &str) -> Value {
    json!({
        "gid": gid,
        "status": "waiting",
        "totalLength": "0",
        "completedLength": "0",
        "downloadSpeed": "0",
        "errorCode": "0",
        "files": []
    })
}

fn not_found(gid: &str) -> RpcError {
    RpcError::Protocol {
        code: 1,
        message: format!("GID {} is not found", gid),
    }
}

fn gid_param(params: &[Value]) -> String {
    params
        .first()
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

#[async_trait]
impl RpcTransport for ScriptedDaemon {
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        let mut state = self.lock();
        state.calls.push((method.to_string(), params.clone()));

        if !state.online {
            return Err(RpcError::Transport("connection refused".to_string()));
        }
        if let Some(pos) = state.fail_next.iter().position(|m| m == method) {
            state.fail_next.remove(pos);
            return Err(RpcError::Transport("connection reset by peer".to_string()));
        }

        match method {
            GET_VERSION => Ok(json!({ "version": "1.37.0", "enabledFeatures": ["BitTorrent"] })),
            ADD_URI => {
                let gid = format!("{:016x}", state.next_gid);
                state.next_gid += 1;
                let mut task = waiting_task(&gid);
                if let Some(dir) = params.get(1).and_then(|o| o.get("dir")) {
                    task["dir"] = dir.clone();
                }
                state.tasks.insert(gid.clone(), task);
                Ok(json!(gid))
            }
            TELL_STATUS => {
                let gid = gid_param(&params);
                state.tasks.get(&gid).cloned().ok_or_else(|| not_found(&gid))
            }
            PAUSE | UNPAUSE | REMOVE => {
                let gid = gid_param(&params);
                let next_status = match method {
                    PAUSE => "paused",
                    UNPAUSE => "waiting",
                    _ => "removed",
                };
                let task = state.tasks.get_mut(&gid).ok_or_else(|| not_found(&gid))?;
                task["status"] = json!(next_status);
                Ok(json!(gid))
            }
            TELL_ACTIVE => Ok(Value::Array(
                state
                    .tasks
                    .values()
                    .filter(|t| t["status"] == "active")
                    .cloned()
                    .collect(),
            )),
            other => Err(RpcError::Protocol {
                code: 1,
                message: format!("No such method: {}", other),
            }),
        }
    }
}
