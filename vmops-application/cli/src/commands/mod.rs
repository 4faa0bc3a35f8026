//! CLI 命令处理模块

pub mod common; // 公共工具函数
pub mod health;
pub mod list;
pub mod monitor;
pub mod output; // 彩色输出
pub mod prompt; // 交互式输入
pub mod rename;
