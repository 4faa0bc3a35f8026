//! CLI 输出格式化
//!
//! 人类可读的彩色输出写到 stdout，`--json` 时只输出报告 JSON。

use anyhow::Result;
use colored::Colorize;
use vmops_executor::{
    BatchReport, HealthLevel, NcrpesStatus, RemoteCommandResult, ServiceHealth, VirtualMachineRef,
    VmFilter,
};

const WIDE: usize = 80;

/// 标题框
pub fn print_banner(title: &str) {
    println!("{}", format!("╔{}╗", "═".repeat(64)).cyan());
    println!("{}", format!("║  {:<62}║", title).cyan());
    println!("{}", format!("╚{}╝", "═".repeat(64)).cyan());
    println!();
}

/// 目录过滤条件
pub fn print_filter(subscription_id: &str, filter: &VmFilter) {
    println!("{} 过滤条件:", "📋".cyan());
    println!("   • Subscription: {}", subscription_id);
    for line in filter.describe() {
        println!("   • {}", line);
    }
    println!();
}

/// 虚拟机列表
pub fn print_directory(vms: &[VirtualMachineRef]) {
    println!("\n{} 找到 {} 台虚拟机:", "✅".green(), vms.len().to_string().yellow());
    for (i, vm) in vms.iter().enumerate() {
        println!(
            "{}. {} - {} (RG: {})",
            i + 1,
            vm.name.green(),
            vm.role(),
            vm.resource_group
        );
        println!("   Status: {}", vm.power_state.display_with_emoji());
        println!(
            "   Size: {}, Location: {}, OS: {}",
            vm.vm_size.as_deref().unwrap_or("Unknown"),
            vm.location,
            vm.os_type
        );
        println!("   Tags: {}", vm.tags_display().bright_black());
    }
}

/// 通用的单台结果
pub fn print_result(result: &RemoteCommandResult) {
    if result.succeeded {
        println!(
            "{} {} 执行成功 (退出码: {}, 耗时 {} ms)",
            "✅".green(),
            result.vm_name().green(),
            result.exit_code.map_or("N/A".to_string(), |c| c.to_string()),
            result.elapsed_ms
        );
    } else {
        println!(
            "{} {} 执行失败 [{}]: {}",
            "❌".red(),
            result.vm_name().red(),
            result.error.map_or("Unknown".to_string(), |k| k.to_string()),
            result.detail.as_deref().unwrap_or("")
        );
    }

    print_lines("输出:", &result.stdout, 20);
    if !result.stderr.trim().is_empty() {
        println!("   {}", "错误:".red());
        for line in result.stderr.lines().take(10) {
            println!("     {}", line.red());
        }
    }
}

fn print_lines(label: &str, text: &str, limit: usize) {
    if text.trim().is_empty() {
        return;
    }
    println!("   {}", label.bright_black());
    for line in text.lines().take(limit) {
        println!("     {}", line);
    }
    if text.lines().count() > limit {
        println!("     ... (截断)");
    }
}

/// ncrpes 健康报告
pub fn print_ncrpes_report(vm_name: &str, status: &NcrpesStatus) {
    println!("\n{} NCRPES Service Health Report - {}", "🏥", vm_name.bold());
    println!("{}", "=".repeat(WIDE));
    println!("📅 Timestamp: {}", status.timestamp.as_deref().unwrap_or("Unknown"));
    println!("💻 Computer: {}", status.computer_name.as_deref().unwrap_or("Unknown"));

    println!("\n🔧 NCRPES Service Status:");
    if status.service_found {
        let emoji = if status.is_running() { "🟢" } else { "🔴" };
        println!("   {} Service Name: {}", emoji, status.service_name.as_deref().unwrap_or("ncrpes"));
        println!("   Display Name: {}", status.service_display_name.as_deref().unwrap_or("N/A"));
        println!("   Status: {}", status.service_status.as_deref().unwrap_or("Unknown"));
        println!("   Start Type: {}", status.service_start_type.as_deref().unwrap_or("Unknown"));
    } else {
        println!("   {} NCRPES service not found", "❌".red());
        if let Some(err) = &status.service_error {
            println!("   Error: {}", err);
        }
    }

    println!("\n⚙️  NCRPES Process Status:");
    if status.process_found && !status.processes.is_empty() {
        println!("   🟢 Found {} ncrpes.exe process(es)", status.processes.len());
        for (i, proc) in status.processes.iter().enumerate() {
            println!("\n   Process {}:", i + 1);
            println!("     PID: {}", proc.pid.map_or("Unknown".to_string(), |p| p.to_string()));
            println!("     Start Time: {}", proc.start_time.as_deref().unwrap_or("Unknown"));
            println!("     CPU Time: {}s", proc.cpu.unwrap_or(0.0));
            println!("     Memory (Working Set): {} MB", proc.working_set.unwrap_or(0.0));
            println!("     Virtual Memory: {} MB", proc.virtual_memory.unwrap_or(0.0));
            println!("     Handles: {}", proc.handle_count.unwrap_or(0));
            println!("     Threads: {}", proc.thread_count.unwrap_or(0));
        }
    } else {
        println!("   {} No ncrpes.exe processes found", "❌".red());
        if let Some(err) = &status.process_error {
            println!("   Error: {}", err);
        }
    }

    println!("\n🖥️  System Performance:");
    match &status.system_info {
        Some(sys) if sys.error.is_none() => {
            let cpu = sys.cpu_usage.unwrap_or(0.0);
            let mem = sys.memory_usage_percent.unwrap_or(0.0);
            println!("   {} CPU Usage: {}%", HealthLevel::for_cpu(cpu).emoji(), cpu);
            println!("   {} Memory Usage: {}%", HealthLevel::for_memory(mem).emoji(), mem);
            println!("   Total Memory: {} GB", sys.total_memory_gb.unwrap_or(0.0));
            println!("   Free Memory: {} GB", sys.free_memory_gb.unwrap_or(0.0));
        }
        Some(sys) => println!("   {} System info error: {}", "❌".red(), sys.error.as_deref().unwrap_or("")),
        None => println!("   {} System info unavailable", "❌".red()),
    }

    println!("\n{}", "=".repeat(WIDE));
}

/// 服务健康检查结果
pub fn print_service_health(vm_name: &str, services: &[ServiceHealth]) {
    println!("\n📊 Service Health Results - {}", vm_name.bold());
    println!("{}", "=".repeat(WIDE));
    for service in services {
        println!("\n{} Service: {}", service.status_emoji(), service.service_name);
        println!("   Status: {}", service.status);
        println!("   Start Type: {}", service.start_type);
        if let Some(info) = service.process_info.as_deref().filter(|s| !s.is_empty()) {
            println!("   Process: {}", info);
        }
        if let Some(err) = &service.error {
            println!("   Error: {}", err.red());
        }
    }
    println!("\n{}", "=".repeat(WIDE));
}

/// 原始输出 (解析失败时)
pub fn print_raw_output(result: &RemoteCommandResult) {
    print_lines("Raw output:", &result.combined_output(), 40);
}

/// VM 之间的分隔线
pub fn print_divider() {
    println!("\n{}\n", "─".repeat(WIDE));
}

/// 汇总行
pub fn print_summary(report: &BatchReport) {
    println!();
    let summary = format!(
        "执行完成: {} 成功, {} 失败, 共 {} 个目标 (耗时 {:.1}s)",
        report.success_count(),
        report.failure_count(),
        report.len(),
        report.duration().as_secs_f64()
    );
    if report.is_full_success() {
        println!("{} {}", "✅".green(), summary.green());
    } else {
        println!("{} {}", "⚠️".yellow(), summary.yellow());
        for failure in report.failures() {
            println!(
                "   {} {}: {}",
                "•".red(),
                failure.vm_name(),
                failure.detail.as_deref().unwrap_or("")
            );
        }
    }
    if report.interrupted {
        println!("{} 执行被中断，剩余虚拟机已跳过", "⚠️".yellow());
    }
}

/// 报告 JSON
pub fn print_json(report: &BatchReport) -> Result<()> {
    println!("{}", report.to_json()?);
    Ok(())
}
