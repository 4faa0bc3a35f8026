//! vmops Azure 客户端
//!
//! 提供与 Azure Resource Manager 计算资源 API 交互的客户端实现。
//!
//! # 功能
//!
//! - **凭据** (`AzureCredential`): Azure CLI 登录态或显式访问令牌
//! - **虚拟机枚举** (`ComputeApi::list_all`): 自动处理分页
//! - **电源状态** (`ComputeApi::power_state`): 读取实例视图
//! - **Run Command** (`ComputeApi::run_command`): 无需网络直连即可在虚拟机内执行脚本
//!
//! # 示例
//!
//! ```ignore
//! use vmops_azure::{AzureClient, AzureConfig, AzureCredential, OsType};
//!
//! let client = AzureClient::new(
//!     "5b479b96-2b99-464d-a824-2761380620ea",
//!     AzureCredential::AzureCli,
//!     AzureConfig::default(),
//! )?;
//! client.authenticate().await?;
//!
//! for vm in client.compute().list_all().await? {
//!     println!("{} ({})", vm.name, vm.os_type());
//! }
//!
//! let result = client
//!     .compute()
//!     .run_command("RG-CLPE-INT", "CLPEWEB01", OsType::Windows, "Get-Service ncrpes")
//!     .await?;
//! println!("{}", result.stdout());
//! ```

pub mod api;
pub mod client;
pub mod credential;
pub mod error;
pub mod models;

pub use api::ComputeApi;
pub use client::{AzureClient, AzureConfig, DEFAULT_MANAGEMENT_ENDPOINT};
pub use credential::{AccessToken, AzureCredential};
pub use error::{AzureError, Result};
pub use models::{
    resource_group_from_id, InstanceView, InstanceViewStatus, OsType, PowerState,
    RunCommandInput, RunCommandResult, VirtualMachine,
};
