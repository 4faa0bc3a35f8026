//! 云会话抽象
//!
//! 目录解析和命令分发只依赖 `ComputeSession`，不直接持有 Azure SDK 状态，
//! 测试中可替换为内存实现。

use async_trait::async_trait;
use tracing::debug;
use vmops_azure::{AzureClient, OsType, PowerState, Result, VirtualMachine};

use crate::directory::VirtualMachineRef;

/// 退出码标记，由包装脚本打印在标准输出最后一行
pub const EXIT_CODE_MARKER: &str = "__VMOPS_EXIT_CODE=";

/// 远程命令原始输出
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteOutput {
    /// 标准输出
    pub stdout: String,
    /// 标准错误
    pub stderr: String,
    /// 退出码（远端未报告时为 None）
    pub exit_code: Option<i32>,
}

impl RemoteOutput {
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>, exit_code: Option<i32>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code,
        }
    }
}

/// 已认证的云会话
#[async_trait]
pub trait ComputeSession: Send + Sync {
    /// 会话绑定的订阅
    fn subscription_id(&self) -> &str;

    /// 枚举订阅下的虚拟机
    async fn list_virtual_machines(&self) -> Result<Vec<VirtualMachine>>;

    /// 查询电源状态
    async fn power_state(&self, resource_group: &str, vm_name: &str) -> Result<PowerState>;

    /// 在虚拟机内执行脚本并等待完成
    async fn run_command(&self, target: &VirtualMachineRef, script: &str) -> Result<RemoteOutput>;
}

#[async_trait]
impl ComputeSession for AzureClient {
    fn subscription_id(&self) -> &str {
        AzureClient::subscription_id(self)
    }

    async fn list_virtual_machines(&self) -> Result<Vec<VirtualMachine>> {
        self.compute().list_all().await
    }

    async fn power_state(&self, resource_group: &str, vm_name: &str) -> Result<PowerState> {
        self.compute().power_state(resource_group, vm_name).await
    }

    async fn run_command(&self, target: &VirtualMachineRef, script: &str) -> Result<RemoteOutput> {
        let wrapped = wrap_with_exit_marker(target.os_type, script);
        let result = self
            .compute()
            .run_command(&target.resource_group, &target.name, target.os_type, &wrapped)
            .await?;

        let (stdout, exit_code) = split_exit_marker(&result.stdout());
        debug!("{} 退出码: {:?}", target.name, exit_code);

        Ok(RemoteOutput {
            stdout,
            stderr: result.stderr().trim().to_string(),
            exit_code,
        })
    }
}

/// 包装脚本，使其在结束时打印退出码标记
///
/// PowerShell 脚本中直接调用 `exit` 会跳过标记，此时退出码为 None。
pub fn wrap_with_exit_marker(os_type: OsType, script: &str) -> String {
    match os_type {
        OsType::Linux => format!(
            "(\n{}\n)\necho \"{}$?\"\n",
            script, EXIT_CODE_MARKER
        ),
        _ => format!(
            "$global:LASTEXITCODE = 0\n\
             try {{\n{}\n}} catch {{\n    Write-Error $_\n    $global:LASTEXITCODE = 1\n}}\n\
             if ($null -eq $LASTEXITCODE) {{ $LASTEXITCODE = 0 }}\n\
             Write-Output (\"{}\" + $LASTEXITCODE)\n",
            script, EXIT_CODE_MARKER
        ),
    }
}

/// 从标准输出中剥离退出码标记
pub fn split_exit_marker(stdout: &str) -> (String, Option<i32>) {
    let mut exit_code = None;
    let mut lines = Vec::new();

    for line in stdout.lines() {
        match line.trim().strip_prefix(EXIT_CODE_MARKER) {
            Some(code) => exit_code = code.trim().parse::<i32>().ok(),
            None => lines.push(line),
        }
    }

    (lines.join("\n").trim().to_string(), exit_code)
}
