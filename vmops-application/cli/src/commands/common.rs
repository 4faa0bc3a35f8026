//! 公共工具函数模块
//!
//! 提供各命令模块共享的功能，包括：
//! - 配置加载
//! - Azure 会话创建和认证
//! - 目录解析和目标选择
//! - Ctrl-C 中断

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use vmops_azure::AzureClient;
use vmops_executor::{
    ComputeSession, DirectoryResolver, OpsConfig, SelectAll, SelectByName, Selection,
    VirtualMachineRef, VmFilter, VmSelector,
};

use super::prompt;

/// 加载并校验配置
pub fn load_config(path: Option<&str>) -> Result<OpsConfig> {
    let config = match path {
        Some(path) => OpsConfig::load_with_path(Path::new(path))
            .with_context(|| format!("加载配置文件失败: {}", path))?,
        None => OpsConfig::load().context("加载配置失败")?,
    };
    config.validate().context("配置校验失败")?;
    Ok(config)
}

/// 创建并认证 Azure 会话
pub async fn create_session(config: &OpsConfig) -> Result<Arc<dyn ComputeSession>> {
    let client = AzureClient::new(&config.azure.subscription_id, config.credential(), config.azure_config())
        .context("创建 Azure 客户端失败")?;

    client.authenticate().await.context(
        "Azure 认证失败 (请执行 az login 并确认 az account show 指向正确的订阅)",
    )?;

    Ok(Arc::new(client))
}

/// 解析目标目录，失败时终止运行
pub async fn resolve_directory(
    session: Arc<dyn ComputeSession>,
    filter: &VmFilter,
) -> Result<Vec<VirtualMachineRef>> {
    info!("目录过滤条件: {:?}", filter.describe());
    DirectoryResolver::new(session)
        .resolve(filter)
        .await
        .context("获取虚拟机目录失败")
}

/// 选择目标虚拟机
///
/// `--vm` 按名称选择，`--all` 选择全部，否则交互式选择。
pub fn select_targets(
    directory: &[VirtualMachineRef],
    vm: Option<&str>,
    all: bool,
    allow_all: bool,
) -> Result<Vec<VirtualMachineRef>> {
    let selection = match (vm, all) {
        (Some(name), _) => {
            let selection = SelectByName(name.to_string()).select(directory);
            if selection == Selection::Cancel {
                anyhow::bail!("目标目录中没有名为 {} 的虚拟机", name);
            }
            selection
        }
        (None, true) => SelectAll.select(directory),
        (None, false) => prompt::stdin_selector(allow_all).select(directory),
    };

    let targets = selection.apply(directory);
    for vm in &targets {
        if !vm.power_state.is_running() {
            warn!("{} 当前电源状态: {}", vm.name, vm.power_state);
        }
    }
    Ok(targets)
}

/// Ctrl-C 时触发的取消令牌
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n{} 收到中断信号，停止剩余虚拟机...", "⚠️".yellow());
            child.cancel();
        }
    });
    token
}
