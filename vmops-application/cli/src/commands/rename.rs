//! 文件重命名命令

use anyhow::{bail, Result};
use colored::Colorize;
use vmops_executor::{scripts, CommandTemplate, OpsConfig, Orchestrator};

use super::common::{cancel_on_ctrl_c, create_session, resolve_directory, select_targets};
use super::{output, prompt};

pub async fn handle(
    config: &OpsConfig,
    vm: Option<String>,
    path: Option<String>,
    new_name: Option<String>,
    yes: bool,
) -> Result<()> {
    output::print_banner("CLPE File Renamer");

    // 参数在连接 Azure 之前收集并校验
    let (path, new_name) = rename_arguments(path, new_name, prompt::read_line)?;
    let script = scripts::rename_file_script(&path, &new_name)?;
    let filter = config.target_filter()?;

    output::print_filter(&config.azure.subscription_id, &filter);

    let session = create_session(config).await?;
    let directory = resolve_directory(session.clone(), &filter).await?;

    if directory.is_empty() {
        println!("{} 没有找到目标虚拟机", "❌".red());
        return Ok(());
    }

    let targets = select_targets(&directory, vm.as_deref(), false, true)?;
    if targets.is_empty() {
        println!("{} 未选择虚拟机，退出", "👋");
        return Ok(());
    }

    if !yes {
        println!("\n{} 安全确认", "🔒".yellow());
        println!("即将重命名文件:");
        println!("   Path: {}", path);
        println!("   New name: {}", new_name);
        println!(
            "   VMs: {}",
            targets.iter().map(|v| v.name.as_str()).collect::<Vec<_>>().join(", ")
        );
        if !prompt::confirm("\n是否继续?") {
            println!("{} 已取消重命名", "👋");
            return Ok(());
        }
    }

    // 重命名不可重复执行，超时不重试
    let report = Orchestrator::new(session, config.command_timeout())
        .with_cancellation(cancel_on_ctrl_c())
        .run_with(&targets, &CommandTemplate::fixed(script), output::print_result)
        .await;

    output::print_summary(&report);
    Ok(())
}

/// 补齐命令行未给出的路径和新文件名
fn rename_arguments<F>(path: Option<String>, new_name: Option<String>, mut ask: F) -> Result<(String, String)>
where
    F: FnMut(&str) -> Option<String>,
{
    let path = match path {
        Some(path) => path,
        None => ask("文件完整路径: ").unwrap_or_default(),
    };
    if path.trim().is_empty() {
        bail!("未输入文件路径");
    }

    let new_name = match new_name {
        Some(name) => name,
        None => ask("新文件名: ").unwrap_or_default(),
    };
    if new_name.trim().is_empty() {
        bail!("未输入新文件名");
    }

    Ok((path, new_name))
}
