//! 脚本化 Oracle（用于测试与离线演示）
//!
//! 按调用顺序消费预置的 execute / self_test 结果，队列耗尽后回退到默认行为
//! （execute 回显指令并成功，self_test 通过）；同时记录每次 execute 收到的指令与上下文，
//! 便于断言上下文隔离。

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::node::TaskContext;
use crate::oracle::{
    ExecutionOutcome, OracleError, PlannedSubtask, ReasoningOracle, SelfTestVerdict,
};

/// 一次 execute 调用的记录
#[derive(Debug, Clone)]
pub struct ExecuteCall {
    pub instruction: String,
    pub context: Option<TaskContext>,
}

#[derive(Default)]
pub struct ScriptedOracle {
    /// None 表示 decompose 失败
    plan: Option<Vec<PlannedSubtask>>,
    execute_queue: Mutex<VecDeque<Result<ExecutionOutcome, OracleError>>>,
    self_test_queue: Mutex<VecDeque<Result<SelfTestVerdict, OracleError>>>,
    execute_delay: Option<Duration>,
    calls: Mutex<Vec<ExecuteCall>>,
    decompose_calls: Mutex<Vec<String>>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// decompose 固定返回该计划
    pub fn with_plan(mut self, plan: Vec<PlannedSubtask>) -> Self {
        self.plan = Some(plan);
        self
    }

    /// 以描述列表快速构造计划，id 依次为 step-1、step-2 ...
    pub fn with_steps(self, steps: &[&str]) -> Self {
        let plan = steps
            .iter()
            .enumerate()
            .map(|(i, d)| PlannedSubtask::new(format!("step-{}", i + 1), *d))
            .collect();
        self.with_plan(plan)
    }

    /// 依次返回的 execute 结果
    pub fn with_execute_results(
        mut self,
        results: Vec<Result<ExecutionOutcome, OracleError>>,
    ) -> Self {
        self.execute_queue.get_mut().extend(results);
        self
    }

    /// 依次返回的 self_test 结果
    pub fn with_self_test_results(
        mut self,
        results: Vec<Result<SelfTestVerdict, OracleError>>,
    ) -> Self {
        self.self_test_queue.get_mut().extend(results);
        self
    }

    /// 每次 execute 前等待的时间（模拟慢调用）
    pub fn with_execute_delay(mut self, delay: Duration) -> Self {
        self.execute_delay = Some(delay);
        self
    }

    /// 到目前为止所有 execute 调用
    pub async fn execute_calls(&self) -> Vec<ExecuteCall> {
        self.calls.lock().await.clone()
    }

    /// 到目前为止所有 decompose 调用的任务文本
    pub async fn decompose_calls(&self) -> Vec<String> {
        self.decompose_calls.lock().await.clone()
    }
}

#[async_trait]
impl ReasoningOracle for ScriptedOracle {
    async fn decompose(&self, task_text: &str) -> Result<Vec<PlannedSubtask>, OracleError> {
        self.decompose_calls.lock().await.push(task_text.to_string());
        self.plan
            .clone()
            .ok_or_else(|| OracleError::Llm("no plan scripted".to_string()))
    }

    async fn execute(
        &self,
        instruction: &str,
        context: Option<&TaskContext>,
    ) -> Result<ExecutionOutcome, OracleError> {
        self.calls.lock().await.push(ExecuteCall {
            instruction: instruction.to_string(),
            context: context.cloned(),
        });
        if let Some(delay) = self.execute_delay {
            tokio::time::sleep(delay).await;
        }
        match self.execute_queue.lock().await.pop_front() {
            Some(result) => result,
            None => Ok(ExecutionOutcome::ok(format!("done: {instruction}"))),
        }
    }

    async fn self_test(
        &self,
        _task_text: &str,
        _produced_output: &str,
    ) -> Result<SelfTestVerdict, OracleError> {
        match self.self_test_queue.lock().await.pop_front() {
            Some(result) => result,
            None => Ok(SelfTestVerdict {
                passed: true,
                feedback: "ok".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_queue_then_default() {
        let oracle = ScriptedOracle::new()
            .with_execute_results(vec![Ok(ExecutionOutcome::failed("boom"))]);

        let first = oracle.execute("a", None).await.unwrap();
        assert!(!first.success);
        let second = oracle.execute("b", None).await.unwrap();
        assert!(second.success);
        assert_eq!(second.output, "done: b");
        assert_eq!(oracle.execute_calls().await.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_plan_fails() {
        let oracle = ScriptedOracle::new();
        assert!(oracle.decompose("x").await.is_err());
        assert_eq!(oracle.decompose_calls().await, vec!["x".to_string()]);
    }
}
