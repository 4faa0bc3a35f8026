//! 多虚拟机编排
//!
//! 按目录顺序逐台分发命令，单台失败只记录不中止；
//! 收到取消信号后，剩余虚拟机记为 `Cancelled`，已收集的结果保持不变。

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::directory::VirtualMachineRef;
use crate::dispatcher::{Dispatcher, ErrorKind, RemoteCommandRequest, RemoteCommandResult};
use crate::session::ComputeSession;

/// 命令模板：为每台虚拟机生成脚本
pub struct CommandTemplate {
    render: Box<dyn Fn(&VirtualMachineRef) -> String + Send + Sync>,
}

impl CommandTemplate {
    /// 所有虚拟机使用同一脚本
    pub fn fixed(script: impl Into<String>) -> Self {
        let script = script.into();
        Self {
            render: Box::new(move |_| script.clone()),
        }
    }

    /// 按虚拟机生成脚本
    pub fn per_vm<F>(render: F) -> Self
    where
        F: Fn(&VirtualMachineRef) -> String + Send + Sync + 'static,
    {
        Self {
            render: Box::new(render),
        }
    }

    pub fn render(&self, vm: &VirtualMachineRef) -> String {
        (self.render)(vm)
    }
}

/// 批量执行报告
///
/// 结果数量始终等于目录中的虚拟机数量，顺序与目录一致。
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    /// 开始时间
    pub started_at: DateTime<Utc>,

    /// 结束时间
    pub finished_at: Option<DateTime<Utc>>,

    /// 是否被中断
    pub interrupted: bool,

    /// 每台虚拟机的结果
    pub results: Vec<RemoteCommandResult>,
}

impl Default for BatchReport {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchReport {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            interrupted: false,
            results: Vec::new(),
        }
    }

    /// 添加结果
    pub fn push(&mut self, result: RemoteCommandResult) {
        if result.error == Some(ErrorKind::Cancelled) {
            self.interrupted = true;
        }
        self.results.push(result);
    }

    /// 完成报告
    pub fn finalize(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.succeeded).count()
    }

    pub fn failure_count(&self) -> usize {
        self.results.len() - self.success_count()
    }

    /// 全部成功（空报告也视为成功）
    pub fn is_full_success(&self) -> bool {
        self.failure_count() == 0
    }

    /// 失败的结果
    pub fn failures(&self) -> impl Iterator<Item = &RemoteCommandResult> {
        self.results.iter().filter(|r| !r.succeeded)
    }

    /// 总耗时
    pub fn duration(&self) -> Duration {
        self.finished_at
            .and_then(|end| (end - self.started_at).to_std().ok())
            .unwrap_or(Duration::ZERO)
    }

    /// 导出为 JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// 多虚拟机编排器
pub struct Orchestrator {
    dispatcher: Dispatcher,
    timeout: Duration,
    retries: u32,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(session: Arc<dyn ComputeSession>, timeout: Duration) -> Self {
        Self {
            dispatcher: Dispatcher::new(session),
            timeout,
            retries: 0,
            cancel: CancellationToken::new(),
        }
    }

    /// 超时结果的重试次数（默认不重试）
    ///
    /// 超时只说明在时限内没拿到结果，Run Command 可能已在虚拟机上执行完毕，
    /// 重试会再执行一次脚本。只对可重复执行的脚本（查询类）开启。
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// 使用外部取消令牌
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// 取消令牌（触发后中止剩余的虚拟机）
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// 对目录中的每台虚拟机执行命令
    pub async fn run(&self, directory: &[VirtualMachineRef], template: &CommandTemplate) -> BatchReport {
        self.run_with(directory, template, |_| {}).await
    }

    /// 执行并在每台虚拟机完成时回调
    pub async fn run_with<F>(
        &self,
        directory: &[VirtualMachineRef],
        template: &CommandTemplate,
        mut on_result: F,
    ) -> BatchReport
    where
        F: FnMut(&RemoteCommandResult),
    {
        info!("开始批量执行: {} 台虚拟机", directory.len());
        let mut report = BatchReport::new();

        for vm in directory {
            let result = if self.cancel.is_cancelled() {
                RemoteCommandResult::cancelled(vm.clone())
            } else {
                let request = RemoteCommandRequest::new(vm.clone(), template.render(vm), self.timeout);
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => {
                        warn!("{}: 执行被中断", vm.name);
                        RemoteCommandResult::cancelled(vm.clone())
                    }
                    result = self.dispatch_with_retries(&request) => result,
                }
            };

            on_result(&result);
            report.push(result);
        }

        report.finalize();
        info!(
            "批量执行完成: {} 成功, {} 失败, 共 {} 台{}",
            report.success_count(),
            report.failure_count(),
            report.len(),
            if report.interrupted { " (已中断)" } else { "" }
        );
        report
    }

    async fn dispatch_with_retries(&self, request: &RemoteCommandRequest) -> RemoteCommandResult {
        let mut attempt = 0;
        loop {
            let result = self.dispatcher.dispatch(request).await;
            if result.error != Some(ErrorKind::Timeout) || attempt >= self.retries {
                return result;
            }
            attempt += 1;
            warn!("{}: 超时，第 {} 次重试", request.target.name, attempt);
        }
    }
}
