//! vmops 执行器
//!
//! 虚拟机目录解析、远程命令分发和多虚拟机编排

pub mod config;
pub mod directory;
pub mod dispatcher;
pub mod health;
pub mod orchestrator;
pub mod scripts;
pub mod selector;
pub mod session;

use thiserror::Error;

pub use config::OpsConfig;
pub use directory::{DirectoryResolver, TagFilter, VirtualMachineRef, VmFilter};
pub use dispatcher::{Dispatcher, ErrorKind, RemoteCommandRequest, RemoteCommandResult};
pub use health::{HealthLevel, NcrpesStatus, ProcessInfo, ServiceHealth, SystemInfo};
pub use orchestrator::{BatchReport, CommandTemplate, Orchestrator};
pub use selector::{ChoiceInput, InteractiveSelector, SelectAll, SelectByName, Selection, VmSelector};
pub use session::{ComputeSession, RemoteOutput};

/// 执行器错误
#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("认证失败: {0}")]
    Auth(String),

    #[error("无法获取虚拟机目录: {0}")]
    DirectoryResolution(String),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("脚本参数无效: {0}")]
    InvalidScript(String),

    #[error("输出解析失败: {0}")]
    Parse(String),
}

impl ExecutorError {
    /// 对应的错误分类
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ExecutorError::Auth(_) => Some(ErrorKind::Auth),
            ExecutorError::DirectoryResolution(_) => Some(ErrorKind::DirectoryResolution),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ExecutorError>;
