//! vmops CLI 应用

use std::io;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, Level};

mod commands;

#[derive(Parser)]
#[command(name = "vmops")]
#[command(about = "CLPE 虚拟机运维工具 - ncrpes 监控、服务健康检查、文件重命名", long_about = None)]
#[command(version)]
struct Cli {
    /// 日志级别 (trace/debug/info/warn/error)，默认取配置或 VMOPS_LOG_LEVEL
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// 配置文件路径
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 监控 ncrpes.exe 服务
    Monitor {
        /// 监控全部 CLPE 虚拟机
        #[arg(long, conflicts_with = "vm")]
        all: bool,

        /// 指定虚拟机名称
        #[arg(long)]
        vm: Option<String>,

        /// 跳过安全确认
        #[arg(short, long)]
        yes: bool,

        /// 单台虚拟机超时 (秒)，默认取配置
        #[arg(short, long)]
        timeout: Option<u64>,

        /// JSON 格式输出
        #[arg(long = "json")]
        json_output: bool,
    },

    /// CLPE WEB 虚拟机服务健康检查
    Health {
        /// 指定虚拟机名称
        #[arg(long)]
        vm: Option<String>,

        /// 要检查的服务 (可重复)
        #[arg(short, long = "service")]
        services: Vec<String>,

        /// 跳过安全确认
        #[arg(short, long)]
        yes: bool,
    },

    /// 在虚拟机上重命名文件
    Rename {
        /// 指定虚拟机名称
        #[arg(long)]
        vm: Option<String>,

        /// 文件完整路径，省略时交互输入
        #[arg(long)]
        path: Option<String>,

        /// 新文件名 (不含路径)，省略时交互输入
        #[arg(long)]
        new_name: Option<String>,

        /// 跳过安全确认
        #[arg(short, long)]
        yes: bool,
    },

    /// 列出目标虚拟机
    #[command(name = "list-vms")]
    ListVms {
        /// 标签过滤 (Key:Value，可重复)，默认取配置
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
}

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// 命令行优先，其次配置 (含 VMOPS_LOG_LEVEL)，默认 info
fn log_level(cli: Option<&str>, config: Option<&str>) -> Level {
    parse_level(cli.or(config).unwrap_or("info"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 配置加载失败也要先有日志，级别先取命令行
    let config = commands::common::load_config(cli.config.as_deref());

    let level = log_level(
        cli.log_level.as_deref(),
        config.as_ref().ok().and_then(|c| c.log_level.as_deref()),
    );

    // 日志写到 stderr，stdout 留给报告和 JSON
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();

    info!("vmops CLI 启动");

    let config = config?;

    match cli.command {
        Commands::Monitor {
            all,
            vm,
            yes,
            timeout,
            json_output,
        } => commands::monitor::handle(&config, all, vm, yes, timeout, json_output).await?,
        Commands::Health { vm, services, yes } => {
            commands::health::handle(&config, vm, services, yes).await?
        }
        Commands::Rename {
            vm,
            path,
            new_name,
            yes,
        } => commands::rename::handle(&config, vm, path, new_name, yes).await?,
        Commands::ListVms { tags } => commands::list::handle(&config, tags).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_monitor_args() {
        let cli = Cli::parse_from(["vmops", "monitor", "--vm", "CLPEWEB01", "--yes", "--timeout", "60", "--json"]);
        match cli.command {
            Commands::Monitor {
                all,
                vm,
                yes,
                timeout,
                json_output,
            } => {
                assert!(!all);
                assert_eq!(vm.as_deref(), Some("CLPEWEB01"));
                assert!(yes);
                assert_eq!(timeout, Some(60));
                assert!(json_output);
            }
            _ => panic!("expected monitor"),
        }
    }

    #[test]
    fn test_all_conflicts_with_vm() {
        assert!(Cli::try_parse_from(["vmops", "monitor", "--all", "--vm", "X"]).is_err());
    }

    #[test]
    fn test_parse_health_and_global_flags() {
        let cli = Cli::parse_from([
            "vmops", "health", "-s", "W3SVC", "--service", "Spooler", "--log-level", "debug", "--config", "vmops.toml",
        ]);
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.config.as_deref(), Some("vmops.toml"));
        match cli.command {
            Commands::Health { services, .. } => assert_eq!(services, vec!["W3SVC", "Spooler"]),
            _ => panic!("expected health"),
        }
    }

    #[test]
    fn test_rename_without_arguments() {
        let cli = Cli::try_parse_from(["vmops", "rename"]).unwrap();
        match cli.command {
            Commands::Rename {
                vm,
                path,
                new_name,
                yes,
            } => {
                assert!(vm.is_none());
                assert!(path.is_none());
                assert!(new_name.is_none());
                assert!(!yes);
            }
            _ => panic!("expected rename"),
        }

        let cli = Cli::parse_from(["vmops", "rename", "--path", r"C:\app\a.log", "--new-name", "a.bak"]);
        match cli.command {
            Commands::Rename { path, new_name, .. } => {
                assert_eq!(path.as_deref(), Some(r"C:\app\a.log"));
                assert_eq!(new_name.as_deref(), Some("a.bak"));
            }
            _ => panic!("expected rename"),
        }
    }

    #[test]
    fn test_log_level_precedence() {
        assert_eq!(log_level(None, None), Level::INFO);
        assert_eq!(log_level(None, Some("warn")), Level::WARN);
        assert_eq!(log_level(Some("debug"), Some("warn")), Level::DEBUG);
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("DEBUG"), Level::DEBUG);
        assert_eq!(parse_level("bogus"), Level::INFO);
    }
}
