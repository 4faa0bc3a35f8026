//! 远程命令分发器
//!
//! 对单台虚拟机执行一次脚本，所有失败都归一化到结果中，不向调用方抛出。

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::{debug, info, warn};
use vmops_azure::AzureError;

use crate::directory::VirtualMachineRef;
use crate::session::{ComputeSession, RemoteOutput};

/// 错误分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// 凭据缺失或被拒绝
    Auth,
    /// 虚拟机不存在或未运行
    NotFound,
    /// 网络错误或超时
    Timeout,
    /// 远端脚本非零退出
    RemoteFailure,
    /// 无法获取虚拟机目录
    DirectoryResolution,
    /// 其他云 API 错误
    Api,
    /// 被操作员中断
    Cancelled,
}

impl ErrorKind {
    /// 对 Azure 错误分类
    pub fn from_azure(error: &AzureError) -> Self {
        match error {
            AzureError::AuthError(_) => ErrorKind::Auth,
            AzureError::NotFound(_) | AzureError::NotRunning(_) => ErrorKind::NotFound,
            AzureError::Timeout(_) | AzureError::HttpError(_) => ErrorKind::Timeout,
            AzureError::OperationFailed(_) => ErrorKind::RemoteFailure,
            AzureError::ApiError(..) | AzureError::ParseError(_) | AzureError::ConfigError(_) => ErrorKind::Api,
        }
    }

    /// 是否终止整个运行
    pub fn is_fatal(&self) -> bool {
        matches!(self, ErrorKind::Auth | ErrorKind::DirectoryResolution)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Auth => "Auth",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::RemoteFailure => "RemoteFailure",
            ErrorKind::DirectoryResolution => "DirectoryResolution",
            ErrorKind::Api => "Api",
            ErrorKind::Cancelled => "Cancelled",
        };
        f.write_str(s)
    }
}

/// 远程命令请求
#[derive(Debug, Clone)]
pub struct RemoteCommandRequest {
    pub target: VirtualMachineRef,
    pub script_body: String,
    pub timeout: Duration,
}

impl RemoteCommandRequest {
    pub fn new(target: VirtualMachineRef, script_body: impl Into<String>, timeout: Duration) -> Self {
        Self {
            target,
            script_body: script_body.into(),
            timeout,
        }
    }
}

/// 远程命令结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteCommandResult {
    pub target: VirtualMachineRef,
    pub succeeded: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub error: Option<ErrorKind>,
    /// 错误详情
    pub detail: Option<String>,
    /// 耗时（毫秒）
    pub elapsed_ms: u64,
}

impl RemoteCommandResult {
    /// 由远端输出构造结果
    ///
    /// 退出码为 0 视为成功；未报告退出码时以 stderr 是否为空判断。
    pub fn from_output(target: VirtualMachineRef, output: RemoteOutput, elapsed: Duration) -> Self {
        let succeeded = match output.exit_code {
            Some(code) => code == 0,
            None => output.stderr.trim().is_empty(),
        };

        let (error, detail) = if succeeded {
            (None, None)
        } else {
            let detail = match output.exit_code {
                Some(code) => format!("远程脚本退出码 {}", code),
                None => "远程脚本输出了错误信息".to_string(),
            };
            (Some(ErrorKind::RemoteFailure), Some(detail))
        };

        Self {
            target,
            succeeded,
            stdout: output.stdout,
            stderr: output.stderr,
            exit_code: output.exit_code,
            error,
            detail,
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    /// 构造失败结果
    pub fn failure(target: VirtualMachineRef, kind: ErrorKind, detail: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            target,
            succeeded: false,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
            error: Some(kind),
            detail: Some(detail.into()),
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    /// 构造被中断的结果
    pub fn cancelled(target: VirtualMachineRef) -> Self {
        Self::failure(target, ErrorKind::Cancelled, "操作已被中断", Duration::ZERO)
    }

    /// 虚拟机名称
    pub fn vm_name(&self) -> &str {
        &self.target.name
    }

    /// 合并的输出（stdout + stderr）
    pub fn combined_output(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// 远程命令分发器
#[derive(Clone)]
pub struct Dispatcher {
    session: Arc<dyn ComputeSession>,
}

impl Dispatcher {
    pub fn new(session: Arc<dyn ComputeSession>) -> Self {
        Self { session }
    }

    /// 执行一次远程命令
    ///
    /// 每次调用恰好返回一个结果，等待时间不超过 `request.timeout`。
    pub async fn dispatch(&self, request: &RemoteCommandRequest) -> RemoteCommandResult {
        let target = request.target.clone();
        let started = Instant::now();

        if request.script_body.trim().is_empty() {
            warn!("{}: 脚本内容为空，跳过", target.name);
            return RemoteCommandResult::failure(target, ErrorKind::RemoteFailure, "脚本内容为空", Duration::ZERO);
        }

        info!("分发远程命令: {} (超时 {:?})", target.name, request.timeout);

        let outcome = timeout(
            request.timeout,
            self.session.run_command(&request.target, &request.script_body),
        )
        .await;

        let elapsed = started.elapsed();

        match outcome {
            Err(_) => {
                warn!("{}: 远程命令超时 ({:?})", target.name, request.timeout);
                RemoteCommandResult::failure(
                    target,
                    ErrorKind::Timeout,
                    format!("远程命令超过 {} 秒未完成", request.timeout.as_secs()),
                    elapsed,
                )
            }
            Ok(Err(e)) => {
                let kind = ErrorKind::from_azure(&e);
                warn!("{}: 远程命令失败 [{}]: {}", target.name, kind, e);
                RemoteCommandResult::failure(target, kind, e.to_string(), elapsed)
            }
            Ok(Ok(output)) => {
                debug!(
                    "{}: 完成, 退出码: {:?}, stdout 长度: {}, stderr 长度: {}",
                    target.name,
                    output.exit_code,
                    output.stdout.len(),
                    output.stderr.len()
                );
                RemoteCommandResult::from_output(target, output, elapsed)
            }
        }
    }
}
