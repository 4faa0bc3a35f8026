//! ncrpes 服务监控命令

use std::time::Duration;

use anyhow::Result;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use vmops_executor::health::parse_ncrpes_status;
use vmops_executor::{scripts, BatchReport, CommandTemplate, OpsConfig, Orchestrator, RemoteCommandResult};

use super::common::{cancel_on_ctrl_c, create_session, resolve_directory, select_targets};
use super::{output, prompt};

pub async fn handle(
    config: &OpsConfig,
    all: bool,
    vm: Option<String>,
    yes: bool,
    timeout_secs: Option<u64>,
    json_output: bool,
) -> Result<()> {
    let timeout_secs = timeout_secs.unwrap_or(config.run.command_timeout);
    if timeout_secs == 0 {
        anyhow::bail!("--timeout 必须大于 0");
    }
    if json_output && vm.is_none() && !all {
        anyhow::bail!("--json 需要同时指定 --all 或 --vm");
    }

    let script = scripts::ncrpes_monitor_script(&config.run.service_name)?;
    let filter = config.target_filter()?;

    if !json_output {
        output::print_banner("CLPE NCRPES Service Monitor");
        output::print_filter(&config.azure.subscription_id, &filter);
        println!("{} 发现 CLPE 虚拟机...", "🔍".cyan());
    }

    let session = create_session(config).await?;
    let directory = resolve_directory(session.clone(), &filter).await?;

    if directory.is_empty() {
        if json_output {
            let mut report = BatchReport::new();
            report.finalize();
            output::print_json(&report)?;
        } else {
            println!("{} 没有找到 CLPE 虚拟机", "❌".red());
            println!("请确认虚拟机带有标签: {}", config.target.tags.join(", "));
        }
        return Ok(());
    }

    let targets = select_targets(&directory, vm.as_deref(), all, true)?;
    if targets.is_empty() {
        println!("{} 未选择虚拟机，退出", "👋");
        return Ok(());
    }

    if !yes && !json_output {
        println!("\n{} 安全确认", "🔒".yellow());
        println!("即将在以下虚拟机上监控 {}.exe 服务:", config.run.service_name);
        if targets.len() > 1 {
            println!("   VMs: 全部 {} 台 CLPE 虚拟机", targets.len());
        } else {
            println!("   VM: {}", targets[0].name);
        }
        println!("   Subscription: {}", config.azure.subscription_id);
        if !prompt::confirm("\n确认这是正确的 CLPE 系统?") {
            println!("{} 已取消监控", "👋");
            return Ok(());
        }
    }

    let orchestrator = Orchestrator::new(session, Duration::from_secs(timeout_secs))
        .with_retries(config.run.retries)
        .with_cancellation(cancel_on_ctrl_c());

    let progress = if json_output {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(targets.len() as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                .progress_chars("=>-"),
        );
        bar.set_message(format!("监控 {}.exe", config.run.service_name));
        bar.enable_steady_tick(Duration::from_millis(100));
        bar
    };

    let mut first = true;
    let report = orchestrator
        .run_with(&targets, &CommandTemplate::fixed(script), |result| {
            if !json_output {
                progress.suspend(|| {
                    if !first {
                        output::print_divider();
                    }
                    render(result);
                });
            }
            first = false;
            progress.inc(1);
        })
        .await;
    progress.finish_and_clear();

    if json_output {
        output::print_json(&report)?;
    } else {
        output::print_summary(&report);
    }

    Ok(())
}

fn render(result: &RemoteCommandResult) {
    if !result.succeeded {
        output::print_result(result);
        return;
    }

    match parse_ncrpes_status(&result.stdout) {
        Ok(status) => output::print_ncrpes_report(result.vm_name(), &status),
        Err(e) => {
            println!("{} {} 监控结果解析失败: {}", "❌".red(), result.vm_name(), e);
            output::print_raw_output(result);
        }
    }
}
