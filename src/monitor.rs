//! 节点监控（Monitor）
//!
//! 每个节点一个 Monitor，按固定间隔巡检：
//! 1. 错误循环探针：最近 N 条错误相同则上报 `loop_detected` 并标记 ErrorLoop
//! 2. 超时探针：Running 超过 `timeout_ms` 则上报 `timeout` 并终止节点
//! 3. 健康探针：状态为 ErrorLoop 时再次上报 `loop_detected`
//!
//! 事件保存在容量 100 的环形缓冲区中，同时通过 broadcast 推送给订阅者。
//! Monitor 只持有节点的弱引用，节点释放后巡检任务自动退出。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Weak;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::{broadcast, Mutex};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::NodeStatus;
use crate::node::{AgentNode, NodeConfig, NodeId, NodeInner};

/// 事件缓冲区容量（超出后丢弃最旧的）
pub const EVENT_BUFFER_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorEventKind {
    ErrorDetected,
    LoopDetected,
    Timeout,
    Terminated,
    Recreated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorEvent {
    #[serde(rename = "type")]
    pub kind: MonitorEventKind,
    pub agent_id: NodeId,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub details: Value,
}

impl MonitorEvent {
    pub fn new(kind: MonitorEventKind, agent_id: impl Into<String>, details: Value) -> Self {
        Self {
            kind,
            agent_id: agent_id.into(),
            timestamp: Utc::now(),
            details,
        }
    }
}

pub struct Monitor {
    node: Weak<NodeInner>,
    node_id: NodeId,
    interval: Duration,
    loop_threshold: usize,
    started: AtomicBool,
    cancel: CancellationToken,
    events: Mutex<VecDeque<MonitorEvent>>,
    events_tx: broadcast::Sender<MonitorEvent>,
}

impl Monitor {
    pub(crate) fn new(node: Weak<NodeInner>, node_id: NodeId, config: &NodeConfig) -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_BUFFER_CAPACITY);
        Self {
            node,
            node_id,
            interval: config.monitor_interval(),
            loop_threshold: config.error_loop_threshold,
            started: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            events: Mutex::new(VecDeque::with_capacity(EVENT_BUFFER_CAPACITY)),
            events_tx,
        }
    }

    /// 启动后台巡检；重复调用无效，stop 之后不能再启动
    pub fn start(&self) {
        if self.cancel.is_cancelled() || self.started.swap(true, Ordering::SeqCst) {
            return;
        }

        let node = self.node.clone();
        let cancel = self.cancel.clone();
        let interval = self.interval;
        let node_id = self.node_id.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // 跳过启动时的立即触发
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(inner) = node.upgrade() else { break };
                        let node = AgentNode::from_inner(inner);
                        node.monitor().run_probes(&node).await;
                    }
                }
            }
            debug!(node_id = %node_id, "Monitor stopped");
        });
        debug!(node_id = %self.node_id, interval_ms = self.interval.as_millis() as u64, "Monitor started");
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::SeqCst) && !self.cancel.is_cancelled()
    }

    /// 立即执行一轮巡检（与定时巡检逻辑相同）
    pub async fn check(&self) {
        if let Some(inner) = self.node.upgrade() {
            let node = AgentNode::from_inner(inner);
            self.run_probes(&node).await;
        }
    }

    async fn run_probes(&self, node: &AgentNode) {
        if node.status().await.is_terminal() {
            return;
        }

        if node.is_in_error_loop(self.loop_threshold).await {
            self.report_event(MonitorEvent::new(
                MonitorEventKind::LoopDetected,
                &self.node_id,
                json!({ "probe": "error_loop", "threshold": self.loop_threshold }),
            ))
            .await;
            node.force_error_loop().await;
        }

        if let Some(elapsed) = node.running_elapsed().await {
            let timeout = node.config().timeout();
            if elapsed > timeout {
                self.report_event(MonitorEvent::new(
                    MonitorEventKind::Timeout,
                    &self.node_id,
                    json!({
                        "elapsed_ms": elapsed.as_millis() as u64,
                        "timeout_ms": timeout.as_millis() as u64,
                    }),
                ))
                .await;
                node.terminate("Task timeout").await;
            }
        }

        if node.status().await == NodeStatus::ErrorLoop {
            self.report_event(MonitorEvent::new(
                MonitorEventKind::LoopDetected,
                &self.node_id,
                json!({ "probe": "health" }),
            ))
            .await;
        }
    }

    /// 记录事件并广播；接近错误循环阈值时输出告警
    pub async fn report_event(&self, event: MonitorEvent) {
        match event.kind {
            MonitorEventKind::ErrorDetected => {
                let count = event
                    .details
                    .get("error_count")
                    .and_then(Value::as_u64)
                    .unwrap_or(0);
                if count + 1 >= self.loop_threshold as u64 {
                    warn!(node_id = %event.agent_id, error_count = count, "Node is approaching an error loop");
                } else {
                    debug!(node_id = %event.agent_id, error_count = count, "Error recorded");
                }
            }
            MonitorEventKind::LoopDetected | MonitorEventKind::Timeout => {
                warn!(node_id = %event.agent_id, kind = ?event.kind, details = %event.details, "Monitor event");
            }
            MonitorEventKind::Terminated | MonitorEventKind::Recreated => {
                info!(node_id = %event.agent_id, kind = ?event.kind, details = %event.details, "Monitor event");
            }
        }

        {
            let mut events = self.events.lock().await;
            events.push_back(event.clone());
            while events.len() > EVENT_BUFFER_CAPACITY {
                events.pop_front();
            }
        }
        // 没有订阅者时发送失败，忽略
        let _ = self.events_tx.send(event);
    }

    /// 缓冲区中的事件（从旧到新）
    pub async fn events(&self) -> Vec<MonitorEvent> {
        self.events.lock().await.iter().cloned().collect()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.events_tx.subscribe()
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::hive::Hive;
    use crate::oracle::ScriptedOracle;

    fn node(config: NodeConfig) -> AgentNode {
        Hive::in_memory(Arc::new(ScriptedOracle::new())).create_worker("w", config)
    }

    #[tokio::test]
    async fn test_event_buffer_is_bounded() {
        let node = node(NodeConfig::default().without_monitor());
        for i in 0..(EVENT_BUFFER_CAPACITY + 5) {
            node.monitor()
                .report_event(MonitorEvent::new(
                    MonitorEventKind::Recreated,
                    node.id(),
                    json!({ "i": i }),
                ))
                .await;
        }
        let events = node.monitor().events().await;
        assert_eq!(events.len(), EVENT_BUFFER_CAPACITY);
        assert_eq!(events[0].details["i"], 5);
    }

    #[tokio::test]
    async fn test_loop_probe_marks_error_loop() {
        let node = node(NodeConfig::default().without_monitor());
        node.initialize().await;
        for _ in 0..3 {
            node.record_error("same").await;
        }
        node.monitor().check().await;

        assert_eq!(node.status().await, NodeStatus::ErrorLoop);
        let kinds: Vec<_> = node.monitor().events().await.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds.iter().filter(|k| **k == MonitorEventKind::LoopDetected).count(),
            2
        );
    }

    #[tokio::test]
    async fn test_subscribe_receives_events() {
        let node = node(NodeConfig::default().without_monitor());
        let mut rx = node.monitor().subscribe();
        node.record_error("x").await;
        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, MonitorEventKind::ErrorDetected);
        assert_eq!(event.agent_id, node.id());
    }

    #[tokio::test]
    async fn test_event_serializes_snake_case_type() {
        let event = MonitorEvent::new(MonitorEventKind::LoopDetected, "n", Value::Null);
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "loop_detected");
    }

    #[tokio::test]
    async fn test_start_is_idempotent_and_stop_halts() {
        let node = node(NodeConfig::default());
        node.initialize().await;
        assert!(node.monitor().is_running());
        node.monitor().start();
        node.monitor().stop();
        assert!(!node.monitor().is_running());
        node.monitor().start();
        assert!(!node.monitor().is_running());
    }
}
