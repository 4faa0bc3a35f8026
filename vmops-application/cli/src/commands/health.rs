//! WEB 虚拟机服务健康检查命令

use anyhow::Result;
use colored::Colorize;
use vmops_executor::health::parse_service_health;
use vmops_executor::{scripts, CommandTemplate, OpsConfig, Orchestrator, RemoteCommandResult};

use super::common::{cancel_on_ctrl_c, create_session, resolve_directory, select_targets};
use super::{output, prompt};

pub async fn handle(config: &OpsConfig, vm: Option<String>, services: Vec<String>, yes: bool) -> Result<()> {
    let filter = config.health_filter()?;

    output::print_banner("CLPE WEB VM Service Health Checker");
    output::print_filter(&config.azure.subscription_id, &filter);

    if !yes && !prompt::confirm("🔐 只对目标订阅中的 CLPE WEB 虚拟机执行，是否继续?") {
        println!("{} 操作已取消", "❌".red());
        return Ok(());
    }

    let session = create_session(config).await?;
    let directory = resolve_directory(session.clone(), &filter).await?;

    if directory.is_empty() {
        println!("{} 没有找到符合条件的 CLPE WEB 虚拟机", "❌".red());
        println!("\n📋 排查建议:");
        println!("   • 确认当前订阅: az account show");
        println!("   • 确认虚拟机标签: {}", config.health.tags.join(", "));
        if let Some(needle) = &config.health.name_contains {
            println!("   • Name 标签需包含: {}", needle);
        }
        println!("   • 确认虚拟机正在运行且 VM Agent 正常");
        return Ok(());
    }

    let targets = select_targets(&directory, vm.as_deref(), false, false)?;
    let Some(target) = targets.first() else {
        println!("{} 未选择 CLPE WEB 虚拟机", "❌".red());
        return Ok(());
    };

    let services = if !services.is_empty() {
        services
    } else if !config.health.default_services.is_empty() {
        config.health.default_services.clone()
    } else {
        println!("\n🔧 服务健康检查: {}", target.name.green());
        prompt::read_service_names()
    };

    if services.is_empty() {
        println!("{} 未指定要检查的服务", "❌".red());
        return Ok(());
    }

    let script = scripts::service_health_script(&services)?;

    println!("\n🎯 将检查 {} 个服务: {}", services.len(), services.join(", "));
    if !yes && !prompt::confirm("是否执行健康检查?") {
        println!("{} 已取消健康检查", "👋");
        return Ok(());
    }

    println!("\n{} 正在 {} 上执行服务健康检查...", "⏳", target.name.green());

    let report = Orchestrator::new(session, config.command_timeout())
        .with_retries(config.run.retries)
        .with_cancellation(cancel_on_ctrl_c())
        .run_with(&targets, &CommandTemplate::fixed(script), render)
        .await;

    output::print_summary(&report);
    Ok(())
}

fn render(result: &RemoteCommandResult) {
    if !result.succeeded {
        output::print_result(result);
        return;
    }

    match parse_service_health(&result.stdout) {
        Ok(services) => output::print_service_health(result.vm_name(), &services),
        Err(e) => {
            println!("{} 服务健康检查结果解析失败: {}", "❌".red(), e);
            output::print_raw_output(result);
        }
    }
}
