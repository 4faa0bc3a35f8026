//! Azure Compute 数据模型
//!
//! 只建模本工具用到的字段，其余字段在反序列化时忽略。

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// 分页列表响应
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    /// 下一页地址（完整 URL）
    #[serde(default)]
    pub next_link: Option<String>,
}

/// 虚拟机资源
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualMachine {
    /// ARM 资源 ID
    pub id: String,

    /// 虚拟机名称
    pub name: String,

    /// 区域
    #[serde(default)]
    pub location: String,

    /// 资源标签
    #[serde(default)]
    pub tags: Option<HashMap<String, String>>,

    /// 资源属性
    #[serde(default)]
    pub properties: VmProperties,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmProperties {
    #[serde(default)]
    pub hardware_profile: Option<HardwareProfile>,
    #[serde(default)]
    pub storage_profile: Option<StorageProfile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HardwareProfile {
    #[serde(default)]
    pub vm_size: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageProfile {
    #[serde(default)]
    pub os_disk: Option<OsDisk>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OsDisk {
    #[serde(default)]
    pub os_type: Option<String>,
}

impl VirtualMachine {
    /// 从资源 ID 中提取资源组名称
    pub fn resource_group(&self) -> Option<&str> {
        resource_group_from_id(&self.id)
    }

    /// 从资源 ID 中提取订阅 ID
    pub fn subscription_id(&self) -> Option<&str> {
        segment_after(&self.id, "subscriptions")
    }

    /// 操作系统类型
    pub fn os_type(&self) -> OsType {
        self.properties
            .storage_profile
            .as_ref()
            .and_then(|s| s.os_disk.as_ref())
            .and_then(|d| d.os_type.as_deref())
            .map(OsType::from_str_lossy)
            .unwrap_or(OsType::Unknown)
    }

    /// 虚拟机规格
    pub fn vm_size(&self) -> Option<&str> {
        self.properties
            .hardware_profile
            .as_ref()
            .and_then(|h| h.vm_size.as_deref())
    }

    /// 标签（无标签时为空表）
    pub fn tags(&self) -> HashMap<String, String> {
        self.tags.clone().unwrap_or_default()
    }
}

/// 从 ARM 资源 ID 提取资源组
///
/// `/subscriptions/{sub}/resourceGroups/{rg}/providers/...`
pub fn resource_group_from_id(id: &str) -> Option<&str> {
    segment_after(id, "resourceGroups")
}

fn segment_after<'a>(id: &'a str, key: &str) -> Option<&'a str> {
    let mut parts = id.split('/').filter(|p| !p.is_empty());
    while let Some(part) = parts.next() {
        if part.eq_ignore_ascii_case(key) {
            return parts.next();
        }
    }
    None
}

/// 操作系统类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsType {
    Windows,
    Linux,
    Unknown,
}

impl OsType {
    pub fn from_str_lossy(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "windows" => OsType::Windows,
            "linux" => OsType::Linux,
            _ => OsType::Unknown,
        }
    }

    /// Run Command 内置命令 ID
    pub fn run_command_id(&self) -> &'static str {
        match self {
            OsType::Linux => "RunShellScript",
            _ => "RunPowerShellScript",
        }
    }
}

impl fmt::Display for OsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OsType::Windows => write!(f, "Windows"),
            OsType::Linux => write!(f, "Linux"),
            OsType::Unknown => write!(f, "Unknown"),
        }
    }
}

/// 电源状态（来自 instanceView 的 `PowerState/*` 状态码）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerState {
    Starting,
    Running,
    Stopping,
    Stopped,
    Deallocating,
    Deallocated,
    Unknown,
}

impl PowerState {
    /// 从状态码解析，如 `PowerState/running`
    pub fn from_code(code: &str) -> Option<Self> {
        let state = code.strip_prefix("PowerState/")?;
        Some(match state {
            "starting" => PowerState::Starting,
            "running" => PowerState::Running,
            "stopping" => PowerState::Stopping,
            "stopped" => PowerState::Stopped,
            "deallocating" => PowerState::Deallocating,
            "deallocated" => PowerState::Deallocated,
            _ => PowerState::Unknown,
        })
    }

    pub fn is_running(&self) -> bool {
        matches!(self, PowerState::Running)
    }

    /// 带状态图标的显示文本
    pub fn display_with_emoji(&self) -> String {
        let emoji = if self.is_running() { "🟢" } else { "🔴" };
        format!("{} {}", self, emoji)
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PowerState::Starting => "starting",
            PowerState::Running => "running",
            PowerState::Stopping => "stopping",
            PowerState::Stopped => "stopped",
            PowerState::Deallocating => "deallocating",
            PowerState::Deallocated => "deallocated",
            PowerState::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// 实例视图
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InstanceView {
    #[serde(default)]
    pub statuses: Vec<InstanceViewStatus>,
}

impl InstanceView {
    /// 提取电源状态
    pub fn power_state(&self) -> PowerState {
        self.statuses
            .iter()
            .filter_map(|s| s.code.as_deref())
            .find_map(PowerState::from_code)
            .unwrap_or(PowerState::Unknown)
    }
}

/// 实例视图状态 / Run Command 输出条目
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceViewStatus {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub display_status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Run Command 请求体
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunCommandInput {
    pub command_id: String,
    pub script: Vec<String>,
    pub parameters: Vec<RunCommandParameter>,
}

impl RunCommandInput {
    pub fn new(os_type: OsType, script: impl Into<String>) -> Self {
        Self {
            command_id: os_type.run_command_id().to_string(),
            script: vec![script.into()],
            parameters: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunCommandParameter {
    pub name: String,
    pub value: String,
}

/// Run Command 结果
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunCommandResult {
    #[serde(default)]
    pub value: Vec<InstanceViewStatus>,
}

/// Azure-AsyncOperation 轮询结果
#[derive(Debug, Clone, Deserialize)]
pub struct AsyncOperationStatus {
    pub status: String,
    #[serde(default)]
    pub properties: Option<AsyncOperationProperties>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AsyncOperationProperties {
    #[serde(default)]
    pub output: Option<RunCommandResult>,
}

impl RunCommandResult {
    /// 标准输出
    pub fn stdout(&self) -> String {
        self.message_for("StdOut")
    }

    /// 标准错误
    pub fn stderr(&self) -> String {
        self.message_for("StdErr")
    }

    fn message_for(&self, stream: &str) -> String {
        let marker = format!("/{}/", stream);
        self.value
            .iter()
            .filter(|s| s.code.as_deref().map_or(false, |c| c.contains(&marker)))
            .filter_map(|s| s.message.as_deref())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VM_JSON: &str = r#"{
        "id": "/subscriptions/5b479b96-2b99-464d-a824-2761380620ea/resourceGroups/RG-CLPE-INT/providers/Microsoft.Compute/virtualMachines/CLPEWEB01",
        "name": "CLPEWEB01",
        "location": "eastus",
        "tags": {"System": "CENTRAL_LOYALTY_PROMOTIONS_ENGINE", "ARIS": "CLPE", "Name": "clpe-web-01"},
        "properties": {
            "hardwareProfile": {"vmSize": "Standard_D4s_v3"},
            "storageProfile": {"osDisk": {"osType": "Windows", "name": "osdisk"}},
            "provisioningState": "Succeeded"
        }
    }"#;

    #[test]
    fn test_parse_virtual_machine() {
        let vm: VirtualMachine = serde_json::from_str(VM_JSON).unwrap();
        assert_eq!(vm.name, "CLPEWEB01");
        assert_eq!(vm.resource_group(), Some("RG-CLPE-INT"));
        assert_eq!(vm.subscription_id(), Some("5b479b96-2b99-464d-a824-2761380620ea"));
        assert_eq!(vm.os_type(), OsType::Windows);
        assert_eq!(vm.vm_size(), Some("Standard_D4s_v3"));
        assert_eq!(vm.tags().get("ARIS").map(String::as_str), Some("CLPE"));
    }

    #[test]
    fn test_vm_without_profiles() {
        let vm: VirtualMachine = serde_json::from_str(r#"{"id": "/x", "name": "bare"}"#).unwrap();
        assert_eq!(vm.os_type(), OsType::Unknown);
        assert!(vm.tags().is_empty());
        assert_eq!(vm.resource_group(), None);
    }

    #[test]
    fn test_resource_group_case_insensitive() {
        let id = "/subscriptions/s/resourcegroups/rg1/providers/Microsoft.Compute/virtualMachines/v";
        assert_eq!(resource_group_from_id(id), Some("rg1"));
    }

    #[test]
    fn test_instance_view_power_state() {
        let view: InstanceView = serde_json::from_str(
            r#"{"statuses": [
                {"code": "ProvisioningState/succeeded", "level": "Info"},
                {"code": "PowerState/deallocated", "displayStatus": "VM deallocated"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(view.power_state(), PowerState::Deallocated);
        assert_eq!(InstanceView::default().power_state(), PowerState::Unknown);
    }

    #[test]
    fn test_run_command_output_streams() {
        let result: RunCommandResult = serde_json::from_str(
            r#"{"value": [
                {"code": "ComponentStatus/StdOut/succeeded", "level": "Info", "message": "ncrpes.exe RUNNING"},
                {"code": "ComponentStatus/StdErr/succeeded", "level": "Info", "message": ""}
            ]}"#,
        )
        .unwrap();
        assert_eq!(result.stdout(), "ncrpes.exe RUNNING");
        assert_eq!(result.stderr(), "");
    }

    #[test]
    fn test_run_command_input_serialization() {
        let input = RunCommandInput::new(OsType::Windows, "Get-Service ncrpes");
        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(json["commandId"], "RunPowerShellScript");
        assert_eq!(json["script"][0], "Get-Service ncrpes");
        assert!(json["parameters"].as_array().unwrap().is_empty());
        assert_eq!(RunCommandInput::new(OsType::Linux, "ls").command_id, "RunShellScript");
    }
}
